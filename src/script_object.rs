//! Script units and their typed fields.

use regex::Regex;

use crate::fields::{AccessType, FieldType};
use crate::ids::{EventUtilityId, ItemId, TimeSensorId};
use crate::registry::Named;

/// What a field binding points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingTarget {
    Item(ItemId),
    EventUtility(EventUtilityId),
    TimeSensor(TimeSensorId),
}

/// One end of a ROUTE attached to a script field, with the field name on
/// the foreign node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldBinding {
    pub target: BindingTarget,
    pub foreign_field: String,
}

impl FieldBinding {
    pub fn new(target: BindingTarget, foreign_field: impl Into<String>) -> Self {
        Self {
            target,
            foreign_field: foreign_field.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub access: AccessType,
    pub field_type: FieldType,
    from: Option<FieldBinding>,
    to: Option<FieldBinding>,
}

impl Field {
    pub fn new(name: impl Into<String>, access: AccessType, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            access,
            field_type,
            from: None,
            to: None,
        }
    }

    /// Source of the value passed into the script.
    pub fn from_binding(&self) -> Option<&FieldBinding> {
        self.from.as_ref()
    }

    /// Sink for the value read back from the script.
    pub fn to_binding(&self) -> Option<&FieldBinding> {
        self.to.as_ref()
    }

    /// Set the source binding if none exists yet.
    pub fn bind_from(&mut self, binding: FieldBinding) -> bool {
        if self.from.is_some() {
            return false;
        }
        self.from = Some(binding);
        true
    }

    /// Set the sink binding if none exists yet.
    pub fn bind_to(&mut self, binding: FieldBinding) -> bool {
        if self.to.is_some() {
            return false;
        }
        self.to = Some(binding);
        true
    }
}

/// Where a script is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    /// Source compiled, `initialize()` not yet run.
    Loaded,
    Initialized,
    /// Compilation failed; the script is never invoked.
    Failed,
}

/// Slot of one input field in the positional argument list.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstructorSlot {
    pub field: String,
    pub field_type: FieldType,
    pub offset: usize,
}

/// Plan that turns a positional argument list back into typed field
/// bindings. Built once per script from its field list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldConstructor {
    pub slots: Vec<ConstructorSlot>,
    /// Total positional arguments the plan expects.
    pub arity: usize,
}

impl FieldConstructor {
    pub fn from_fields(fields: &[Field], timestamp: bool) -> Self {
        let mut offset = if timestamp { 2 } else { 1 };
        let mut slots = Vec::new();
        for field in fields.iter().skip(1).filter(|f| f.access.is_input()) {
            slots.push(ConstructorSlot {
                field: field.name.clone(),
                field_type: field.field_type,
                offset,
            });
            offset += field.field_type.component_count();
        }
        Self {
            slots,
            arity: offset,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScriptObject {
    pub name: String,
    pub fields: Vec<Field>,
    pub source: String,
    pub urls: Vec<String>,
    pub direct_output: bool,
    pub must_evaluate: bool,
    /// Entry function takes a second (timestamp) parameter.
    pub timestamp_parameter: bool,
    pub per_frame: bool,
    pub state: ScriptState,
    pub constructor: FieldConstructor,
}

impl ScriptObject {
    pub fn new(name: impl Into<String>, fields: Vec<Field>, source: impl Into<String>) -> Self {
        let source = source.into();
        let timestamp_parameter = fields
            .first()
            .map(|entry| entry_takes_timestamp(&source, &entry.name))
            .unwrap_or(false);
        let constructor = FieldConstructor::from_fields(&fields, timestamp_parameter);
        Self {
            name: name.into(),
            fields,
            source,
            urls: Vec::new(),
            direct_output: false,
            must_evaluate: false,
            timestamp_parameter,
            per_frame: false,
            state: ScriptState::Loaded,
            constructor,
        }
    }

    /// Rebuild the argument layout for a known entry signature.
    pub fn set_timestamp_parameter(&mut self, takes_timestamp: bool) {
        if self.timestamp_parameter != takes_timestamp {
            self.timestamp_parameter = takes_timestamp;
            self.constructor = FieldConstructor::from_fields(&self.fields, takes_timestamp);
        }
    }

    /// The first field names the entry-point function.
    pub fn entry_function(&self) -> Option<&str> {
        self.fields.first().map(|f| f.name.as_str())
    }

    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn field_mut(&mut self, name: &str) -> Option<&mut Field> {
        let index = self.field_index(name)?;
        self.fields.get_mut(index)
    }

    pub fn is_entry_field(&self, name: &str) -> bool {
        self.entry_function()
            .map(|entry| entry.eq_ignore_ascii_case(name))
            .unwrap_or(false)
    }
}

impl Named for ScriptObject {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Whether `fn <entry>(...)` in `source` declares more than one parameter.
///
/// An exact-case declaration wins; otherwise the first case-insensitive one
/// is used, the same way the script host resolves the entry function.
pub fn entry_takes_timestamp(source: &str, entry: &str) -> bool {
    let name = regex::escape(entry);
    let exact = format!(r"fn\s+{}\s*\(([^)]*)\)", name);
    let folded = format!(r"(?i)fn\s+{}\s*\(([^)]*)\)", name);
    let mut params = None;
    for pattern in [exact, folded] {
        match Regex::new(&pattern) {
            Ok(re) => {
                params = re
                    .captures(source)
                    .and_then(|caps| caps.get(1))
                    .map(|m| m.as_str().contains(','));
            }
            Err(e) => log::warn!("Could not scan entry signature of '{}': {}", entry, e),
        }
        if params.is_some() {
            break;
        }
    }
    params.unwrap_or(false)
}
