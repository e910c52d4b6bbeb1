//! Script host: runs scene Script nodes on a sandboxed Rhai engine.
//!
//! Each script keeps a persistent binding map that its functions see as
//! `this`. Input fields are written into it before a call, and output fields
//! are read back from it afterwards:
//!
//! ```rhai
//! fn onClick(value) {
//!     if value { this.tint = SFColor(1.0, 0.0, 0.0); }
//! }
//! ```
//!
//! Typed wrapper constructors available to scripts:
//! - `SFColor(r, g, b)` - map with `r`, `g`, `b`
//! - `SFVec2f(x, y)`, `SFVec3f(x, y, z)` - maps with `x`, `y` (and `z`)
//! - `SFRotation(x, y, z, angle)` - map with `x`, `y`, `z`, `angle`
//! - `MFString(a)`, `MFString(a, b)` - arrays of strings
//!
//! `print` and `debug` go to the script logger.

use std::collections::{BTreeMap, HashMap};

use rhai::{CallFnOptions, Dynamic, Engine, Scope, AST, FLOAT, INT};

use crate::config::SandboxLimits;
use crate::error::{BehaviorError, Result};
use crate::fields::{FieldValue, ScriptValue};
use crate::script_diagnostics::{
    from_eval_error, from_parse_error, host_error, ScriptDiagnostic, ScriptPhase,
};
use crate::script_log::{script_log, LogLevel};

/// Field values read back from a script after a call, keyed by field name.
pub type BindingMap = BTreeMap<String, ScriptValue>;

/// One call into a script.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub function: String,
    pub args: Vec<ScriptValue>,
    /// Comma-separated type codes of `args`, e.g. `"b,f,f,f"`.
    pub contract: String,
}

impl Invocation {
    pub fn new(function: impl Into<String>, args: Vec<ScriptValue>) -> Self {
        let contract = args
            .iter()
            .map(ScriptValue::contract_code)
            .collect::<Vec<_>>()
            .join(",");
        Self {
            function: function.into(),
            args,
            contract,
        }
    }
}

/// What the behavior engine needs from a script engine.
pub trait ScriptHost {
    /// Compile `source` and run its top-level statements once.
    fn load(&mut self, script: &str, source: &str) -> Result<()>;

    fn has_function(&self, script: &str, function: &str) -> bool;

    /// Declared parameter count of `function`.
    fn entry_arity(&self, script: &str, function: &str) -> Option<usize>;

    /// Write typed field values into the script's binding map.
    fn construct(&mut self, script: &str, values: &[(String, FieldValue)]) -> Result<()>;

    /// Call a function and return the binding map as it stands afterwards.
    fn invoke(&mut self, script: &str, invocation: &Invocation) -> Result<BindingMap>;

    fn bindings(&self, script: &str) -> Option<BindingMap>;

    fn take_diagnostics(&mut self) -> Vec<ScriptDiagnostic>;

    /// Drop every loaded script and pending diagnostic. Called when a new
    /// scene session starts.
    fn clear(&mut self);
}

struct LoadedScript {
    ast: AST,
    scope: Scope<'static>,
    this: Dynamic,
}

pub struct RhaiScriptHost {
    engine: Engine,
    scripts: HashMap<String, LoadedScript>,
    diagnostics: Vec<ScriptDiagnostic>,
}

impl RhaiScriptHost {
    pub fn new(limits: &SandboxLimits) -> Self {
        let mut engine = Engine::new();

        engine.set_max_expr_depths(limits.max_expr_depth, limits.max_expr_depth);
        engine.set_max_call_levels(limits.max_call_levels);
        engine.set_max_operations(limits.max_operations);
        engine.set_max_string_size(limits.max_string_size);
        engine.set_max_array_size(1_000);
        engine.set_max_map_size(500);

        engine.on_print(|text| script_log(LogLevel::Info, "", text));
        engine.on_debug(|text, source, pos| {
            let message = if pos.is_none() {
                text.to_string()
            } else {
                format!("{} ({})", text, pos)
            };
            script_log(LogLevel::Debug, source.unwrap_or(""), &message);
        });

        register_wrappers(&mut engine);

        Self {
            engine,
            scripts: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn push_diagnostic(&mut self, diag: ScriptDiagnostic) {
        const MAX_DIAGNOSTICS: usize = 32;

        log::warn!("Script '{}' {:?}: {}", diag.script, diag.phase, diag.message);
        self.diagnostics.push(diag);
        if self.diagnostics.len() > MAX_DIAGNOSTICS {
            let excess = self.diagnostics.len() - MAX_DIAGNOSTICS;
            self.diagnostics.drain(0..excess);
        }
    }

    /// Exact match first, then case-insensitive. Returns the declared name
    /// and parameter count.
    fn resolve_function(&self, script: &str, function: &str) -> Option<(String, usize)> {
        let loaded = self.scripts.get(script)?;
        let functions: Vec<_> = loaded.ast.iter_functions().collect();
        functions
            .iter()
            .find(|f| f.name == function)
            .or_else(|| {
                functions
                    .iter()
                    .find(|f| f.name.eq_ignore_ascii_case(function))
            })
            .map(|f| (f.name.to_string(), f.params.len()))
    }

    fn phase_for(function: &str) -> ScriptPhase {
        if function == "initialize" {
            ScriptPhase::Initialize
        } else {
            ScriptPhase::Invoke
        }
    }
}

impl ScriptHost for RhaiScriptHost {
    fn load(&mut self, script: &str, source: &str) -> Result<()> {
        let mut ast = match self.engine.compile(source) {
            Ok(ast) => ast,
            Err(e) => {
                let message = e.to_string();
                self.push_diagnostic(from_parse_error(script, &e));
                return Err(BehaviorError::script(script, "<compile>", message));
            }
        };
        ast.set_source(script);

        let mut scope = Scope::new();
        if let Err(e) = self.engine.run_ast_with_scope(&mut scope, &ast) {
            let message = e.to_string();
            self.push_diagnostic(from_eval_error(script, ScriptPhase::Compile, &e));
            return Err(BehaviorError::script(script, "<top level>", message));
        }

        log::debug!(
            "Loaded script '{}' ({} functions)",
            script,
            ast.iter_functions().count()
        );
        self.scripts.insert(
            script.to_string(),
            LoadedScript {
                ast,
                scope,
                this: Dynamic::from_map(rhai::Map::new()),
            },
        );
        Ok(())
    }

    fn has_function(&self, script: &str, function: &str) -> bool {
        self.resolve_function(script, function).is_some()
    }

    fn entry_arity(&self, script: &str, function: &str) -> Option<usize> {
        self.resolve_function(script, function).map(|(_, arity)| arity)
    }

    fn construct(&mut self, script: &str, values: &[(String, FieldValue)]) -> Result<()> {
        let loaded = self
            .scripts
            .get_mut(script)
            .ok_or_else(|| BehaviorError::unresolved(script, "script host"))?;
        if let Some(mut this) = loaded.this.write_lock::<rhai::Map>() {
            for (field, value) in values {
                this.insert(field.as_str().into(), field_to_dynamic(value));
            }
            return Ok(());
        }
        let diag = host_error(script, ScriptPhase::Construct, "binding map is not an object map");
        self.push_diagnostic(diag);
        Err(BehaviorError::script(script, "<construct>", "binding map corrupted"))
    }

    fn invoke(&mut self, script: &str, invocation: &Invocation) -> Result<BindingMap> {
        let Some((function, arity)) = self.resolve_function(script, &invocation.function) else {
            let message = format!("function '{}' not defined", invocation.function);
            self.push_diagnostic(host_error(script, Self::phase_for(&invocation.function), &message));
            return Err(BehaviorError::script(script, &invocation.function, message));
        };

        let args: Vec<Dynamic> = invocation
            .args
            .iter()
            .take(arity)
            .map(script_to_dynamic)
            .collect();
        log::trace!(
            "Calling {}.{}({}) contract={}",
            script,
            function,
            args.len(),
            invocation.contract
        );

        let loaded = self
            .scripts
            .get_mut(script)
            .ok_or_else(|| BehaviorError::unresolved(script, "script host"))?;
        // A failed call must leave no trace in `this`.
        let before = loaded.this.clone();
        let options = CallFnOptions::new()
            .eval_ast(false)
            .rewind_scope(true)
            .bind_this_ptr(&mut loaded.this);
        let result = self.engine.call_fn_with_options::<Dynamic>(
            options,
            &mut loaded.scope,
            &loaded.ast,
            &function,
            args,
        );

        match result {
            Ok(_) => Ok(binding_map(&loaded.this)),
            Err(e) => {
                loaded.this = before;
                let message = e.to_string();
                let diag = from_eval_error(script, Self::phase_for(&function), &e);
                self.push_diagnostic(diag);
                Err(BehaviorError::script(script, function, message))
            }
        }
    }

    fn bindings(&self, script: &str) -> Option<BindingMap> {
        self.scripts.get(script).map(|loaded| binding_map(&loaded.this))
    }

    fn take_diagnostics(&mut self) -> Vec<ScriptDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    fn clear(&mut self) {
        self.scripts.clear();
        self.diagnostics.clear();
    }
}

fn number(value: &Dynamic) -> FLOAT {
    value
        .as_float()
        .ok()
        .or_else(|| value.as_int().ok().map(|i| i as FLOAT))
        .unwrap_or(0.0)
}

fn record(entries: &[(&str, FLOAT)]) -> rhai::Map {
    entries
        .iter()
        .map(|(k, v)| ((*k).into(), Dynamic::from_float(*v)))
        .collect()
}

fn string_list(value: Dynamic) -> rhai::Array {
    if value.is_array() {
        value.try_cast::<rhai::Array>().unwrap_or_default()
    } else {
        vec![value]
    }
}

fn register_wrappers(engine: &mut Engine) {
    engine
        .register_fn("SFColor", |r: Dynamic, g: Dynamic, b: Dynamic| {
            record(&[("r", number(&r)), ("g", number(&g)), ("b", number(&b))])
        })
        .register_fn("SFVec2f", |x: Dynamic, y: Dynamic| {
            record(&[("x", number(&x)), ("y", number(&y))])
        })
        .register_fn("SFVec3f", |x: Dynamic, y: Dynamic, z: Dynamic| {
            record(&[("x", number(&x)), ("y", number(&y)), ("z", number(&z))])
        })
        .register_fn(
            "SFRotation",
            |x: Dynamic, y: Dynamic, z: Dynamic, angle: Dynamic| {
                record(&[
                    ("x", number(&x)),
                    ("y", number(&y)),
                    ("z", number(&z)),
                    ("angle", number(&angle)),
                ])
            },
        )
        .register_fn("MFString", string_list)
        .register_fn("MFString", |a: Dynamic, b: Dynamic| -> rhai::Array { vec![a, b] });
}

fn vector_map(keys: &[&str], values: &[f32]) -> Dynamic {
    let pairs: Vec<(&str, FLOAT)> = keys.iter().copied().zip(values.iter().copied()).collect();
    Dynamic::from_map(record(&pairs))
}

/// Typed field value to the wrapper shape scripts expect.
pub fn field_to_dynamic(value: &FieldValue) -> Dynamic {
    match value {
        FieldValue::Bool(b) => Dynamic::from_bool(*b),
        FieldValue::Float(f) => Dynamic::from_float(*f),
        FieldValue::Int32(i) => Dynamic::from_int(*i as INT),
        FieldValue::Time(t) => Dynamic::from_float(*t as FLOAT),
        FieldValue::Vec2(v) => vector_map(&["x", "y"], &[v.x, v.y]),
        FieldValue::Vec3(v) => vector_map(&["x", "y", "z"], &[v.x, v.y, v.z]),
        FieldValue::Color(c) => vector_map(&["r", "g", "b"], &[c.x, c.y, c.z]),
        FieldValue::Rotation(r) => vector_map(
            &["x", "y", "z", "angle"],
            &[r.axis.x, r.axis.y, r.axis.z, r.angle],
        ),
        FieldValue::String(s) => Dynamic::from(s.clone()),
        FieldValue::MultiString(list) => {
            Dynamic::from_array(list.iter().cloned().map(Dynamic::from).collect())
        }
    }
}

pub fn script_to_dynamic(value: &ScriptValue) -> Dynamic {
    match value {
        ScriptValue::Null => Dynamic::UNIT,
        ScriptValue::Bool(b) => Dynamic::from_bool(*b),
        ScriptValue::Float(f) => Dynamic::from_float(*f),
        ScriptValue::Int(i) => Dynamic::from_int(*i),
        ScriptValue::Str(s) => Dynamic::from(s.clone()),
        ScriptValue::List(items) => {
            Dynamic::from_array(items.iter().map(script_to_dynamic).collect())
        }
        ScriptValue::Record(map) => Dynamic::from_map(
            map.iter()
                .map(|(k, v)| (k.as_str().into(), script_to_dynamic(v)))
                .collect(),
        ),
    }
}

pub fn dynamic_to_script(value: &Dynamic) -> ScriptValue {
    if value.is_unit() {
        return ScriptValue::Null;
    }
    if let Ok(b) = value.as_bool() {
        return ScriptValue::Bool(b);
    }
    if let Ok(i) = value.as_int() {
        return ScriptValue::Int(i);
    }
    if let Ok(f) = value.as_float() {
        return ScriptValue::Float(f);
    }
    if value.is_string() {
        return ScriptValue::Str(value.clone().into_string().unwrap_or_default());
    }
    if value.is_array() {
        if let Some(arr) = value.clone().try_cast::<rhai::Array>() {
            return ScriptValue::List(arr.iter().map(dynamic_to_script).collect());
        }
    }
    if value.is_map() {
        if let Some(map) = value.clone().try_cast::<rhai::Map>() {
            return ScriptValue::Record(
                map.iter()
                    .map(|(k, v)| (k.to_string(), dynamic_to_script(v)))
                    .collect(),
            );
        }
    }
    log::debug!("Unsupported script value type {}", value.type_name());
    ScriptValue::Null
}

fn binding_map(this: &Dynamic) -> BindingMap {
    match this.read_lock::<rhai::Map>() {
        Some(map) => map
            .iter()
            .map(|(k, v)| (k.to_string(), dynamic_to_script(v)))
            .collect(),
        None => BindingMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    fn host() -> RhaiScriptHost {
        RhaiScriptHost::new(&SandboxLimits::default())
    }

    #[test]
    fn test_invoke_writes_bindings() {
        let mut host = host();
        host.load(
            "S",
            "fn onClick(value) { if value { this.tint = SFColor(1, 0, 0.5); } }",
        )
        .unwrap();
        let bindings = host
            .invoke("S", &Invocation::new("onClick", vec![ScriptValue::Bool(true)]))
            .unwrap();
        let tint = FieldValue::from_script(crate::fields::FieldType::Color, &bindings["tint"]);
        assert_eq!(tint, Some(FieldValue::Color(Vec3::new(1.0, 0.0, 0.5))));
    }

    #[test]
    fn test_args_truncated_to_declared_arity() {
        let mut host = host();
        host.load("S", "fn tick(value) { this.seen = value; }").unwrap();
        assert_eq!(host.entry_arity("S", "tick"), Some(1));
        let invocation = Invocation::new(
            "tick",
            vec![ScriptValue::Float(0.25), ScriptValue::Float(3.0), ScriptValue::Bool(true)],
        );
        assert_eq!(invocation.contract, "f,f,b");
        let bindings = host.invoke("S", &invocation).unwrap();
        assert_eq!(bindings["seen"], ScriptValue::Float(0.25));
    }

    #[test]
    fn test_construct_exposes_fields_as_this() {
        let mut host = host();
        host.load("S", "fn run(v) { this.out = this.tint.g + 1.0; }").unwrap();
        host.construct(
            "S",
            &[("tint".to_string(), FieldValue::Color(Vec3::new(0.0, 2.0, 0.0)))],
        )
        .unwrap();
        let bindings = host.invoke("S", &Invocation::new("run", vec![ScriptValue::Null])).unwrap();
        assert_eq!(bindings["out"], ScriptValue::Float(3.0));
    }

    #[test]
    fn test_compile_error_produces_diagnostic() {
        let mut host = host();
        assert!(host.load("Bad", "fn broken( {").is_err());
        let diags = host.take_diagnostics();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].phase, ScriptPhase::Compile);
        assert_eq!(diags[0].script, "Bad");
    }

    #[test]
    fn test_missing_function_and_runtime_error() {
        let mut host = host();
        host.load("S", "fn boom(v) { let x = undefined_var; }").unwrap();
        assert!(!host.has_function("S", "initialize"));
        assert!(host
            .invoke("S", &Invocation::new("missing", vec![]))
            .is_err());
        let err = host
            .invoke("S", &Invocation::new("boom", vec![ScriptValue::Bool(true)]))
            .unwrap_err();
        assert!(matches!(err, BehaviorError::ScriptInvocation { .. }));
        assert_eq!(host.take_diagnostics().len(), 2);
    }

    #[test]
    fn test_failed_call_discards_partial_writes() {
        let mut host = host();
        host.load(
            "S",
            "fn onClick(v) { if v { this.tint = SFColor(0, 1, 0); throw \"boom\"; } this.count = 1; }",
        )
        .unwrap();
        assert!(host
            .invoke("S", &Invocation::new("onClick", vec![ScriptValue::Bool(true)]))
            .is_err());
        assert!(!host.bindings("S").unwrap().contains_key("tint"));
        let bindings = host
            .invoke("S", &Invocation::new("onClick", vec![ScriptValue::Bool(false)]))
            .unwrap();
        assert!(!bindings.contains_key("tint"));
        assert_eq!(bindings["count"], ScriptValue::Int(1));
    }

    #[test]
    fn test_clear_forgets_scripts() {
        let mut host = host();
        host.load("S", "fn go(v) { }").unwrap();
        assert!(host.load("Bad", "fn (").is_err());
        host.clear();
        assert!(!host.has_function("S", "go"));
        assert!(host.bindings("S").is_none());
        assert!(host.take_diagnostics().is_empty());
    }

    #[test]
    fn test_runaway_loop_is_stopped() {
        let mut host = RhaiScriptHost::new(&SandboxLimits {
            max_operations: 1_000,
            ..SandboxLimits::default()
        });
        host.load("S", "fn spin(v) { loop { } }").unwrap();
        assert!(host.invoke("S", &Invocation::new("spin", vec![ScriptValue::Bool(true)])).is_err());
    }

    #[test]
    fn test_value_conversions() {
        let list = ScriptValue::List(vec![ScriptValue::Str("a.png".into())]);
        assert_eq!(dynamic_to_script(&script_to_dynamic(&list)), list);
        let rotation = field_to_dynamic(&FieldValue::Rotation(crate::math::AxisAngle::new(
            Vec3::Y,
            1.5,
        )));
        let ScriptValue::Record(map) = dynamic_to_script(&rotation) else {
            panic!("expected record");
        };
        assert_eq!(map["angle"], ScriptValue::Float(1.5));
    }
}
