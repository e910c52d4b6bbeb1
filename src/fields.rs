//! The closed field vocabulary shared by the declaration stream, the script
//! marshaller and the script host.
//!
//! X3D names its field types with strings ("SFColor", "SFVec3f", ...). Here
//! they are a fixed enum, and values travel as [`FieldValue`] so every
//! dispatch over a field type is checked for exhaustiveness by the compiler.

use std::collections::BTreeMap;
use std::fmt;

use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::math::AxisAngle;

/// Field type tags. Not extensible at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    #[serde(rename = "SFBool")]
    Bool,
    #[serde(rename = "SFFloat")]
    Float,
    #[serde(rename = "SFInt32")]
    Int32,
    #[serde(rename = "SFTime")]
    Time,
    #[serde(rename = "SFVec2f")]
    Vec2,
    #[serde(rename = "SFVec3f")]
    Vec3,
    #[serde(rename = "SFRotation")]
    Rotation,
    #[serde(rename = "SFColor")]
    Color,
    #[serde(rename = "SFString")]
    String,
    #[serde(rename = "MFString")]
    MultiString,
}

impl FieldType {
    /// Number of positional scalars this type occupies in a script argument list.
    pub fn component_count(self) -> usize {
        match self {
            FieldType::Bool
            | FieldType::Float
            | FieldType::Int32
            | FieldType::Time
            | FieldType::String
            | FieldType::MultiString => 1,
            FieldType::Vec2 => 2,
            FieldType::Vec3 | FieldType::Color => 3,
            FieldType::Rotation => 4,
        }
    }

    pub fn x3d_name(self) -> &'static str {
        match self {
            FieldType::Bool => "SFBool",
            FieldType::Float => "SFFloat",
            FieldType::Int32 => "SFInt32",
            FieldType::Time => "SFTime",
            FieldType::Vec2 => "SFVec2f",
            FieldType::Vec3 => "SFVec3f",
            FieldType::Rotation => "SFRotation",
            FieldType::Color => "SFColor",
            FieldType::String => "SFString",
            FieldType::MultiString => "MFString",
        }
    }

    pub fn from_x3d_name(name: &str) -> Option<Self> {
        const ALL: [FieldType; 10] = [
            FieldType::Bool,
            FieldType::Float,
            FieldType::Int32,
            FieldType::Time,
            FieldType::Vec2,
            FieldType::Vec3,
            FieldType::Rotation,
            FieldType::Color,
            FieldType::String,
            FieldType::MultiString,
        ];
        ALL.into_iter()
            .find(|t| t.x3d_name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.x3d_name())
    }
}

/// Direction of a script field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AccessType {
    InitializeOnly,
    InputOnly,
    #[default]
    InputOutput,
    OutputOnly,
}

impl AccessType {
    /// Fields whose value is passed into the script on invocation.
    pub fn is_input(self) -> bool {
        matches!(self, AccessType::InputOnly | AccessType::InputOutput)
    }

    /// Fields read back from the script after invocation.
    pub fn is_output(self) -> bool {
        matches!(self, AccessType::OutputOnly | AccessType::InputOutput)
    }
}

/// A typed field value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Float(f32),
    Int32(i32),
    Time(f64),
    Vec2(Vec2),
    Vec3(Vec3),
    Rotation(AxisAngle),
    Color(Vec3),
    String(String),
    MultiString(Vec<String>),
}

impl FieldValue {
    pub fn field_type(&self) -> FieldType {
        match self {
            FieldValue::Bool(_) => FieldType::Bool,
            FieldValue::Float(_) => FieldType::Float,
            FieldValue::Int32(_) => FieldType::Int32,
            FieldValue::Time(_) => FieldType::Time,
            FieldValue::Vec2(_) => FieldType::Vec2,
            FieldValue::Vec3(_) => FieldType::Vec3,
            FieldValue::Rotation(_) => FieldType::Rotation,
            FieldValue::Color(_) => FieldType::Color,
            FieldValue::String(_) => FieldType::String,
            FieldValue::MultiString(_) => FieldType::MultiString,
        }
    }

    /// Zero value for a type, used when an input field has no readable source.
    pub fn default_for(field_type: FieldType) -> Self {
        match field_type {
            FieldType::Bool => FieldValue::Bool(false),
            FieldType::Float => FieldValue::Float(0.0),
            FieldType::Int32 => FieldValue::Int32(0),
            FieldType::Time => FieldValue::Time(0.0),
            FieldType::Vec2 => FieldValue::Vec2(Vec2::ZERO),
            FieldType::Vec3 => FieldValue::Vec3(Vec3::ZERO),
            FieldType::Rotation => FieldValue::Rotation(AxisAngle::default()),
            FieldType::Color => FieldValue::Color(Vec3::ZERO),
            FieldType::String => FieldValue::String(String::new()),
            FieldType::MultiString => FieldValue::MultiString(Vec::new()),
        }
    }

    /// Flatten into positional script arguments.
    pub fn to_scalars(&self) -> Vec<ScriptValue> {
        match self {
            FieldValue::Bool(b) => vec![ScriptValue::Bool(*b)],
            FieldValue::Float(f) => vec![ScriptValue::Float(*f)],
            FieldValue::Int32(i) => vec![ScriptValue::Int(*i as i64)],
            FieldValue::Time(t) => vec![ScriptValue::Float(*t as f32)],
            FieldValue::Vec2(v) => vec![ScriptValue::Float(v.x), ScriptValue::Float(v.y)],
            FieldValue::Vec3(v) | FieldValue::Color(v) => vec![
                ScriptValue::Float(v.x),
                ScriptValue::Float(v.y),
                ScriptValue::Float(v.z),
            ],
            FieldValue::Rotation(r) => vec![
                ScriptValue::Float(r.axis.x),
                ScriptValue::Float(r.axis.y),
                ScriptValue::Float(r.axis.z),
                ScriptValue::Float(r.angle),
            ],
            FieldValue::String(s) => vec![ScriptValue::Str(s.clone())],
            FieldValue::MultiString(list) => vec![ScriptValue::List(
                list.iter().cloned().map(ScriptValue::Str).collect(),
            )],
        }
    }

    /// Rebuild a typed value from its positional scalars. Missing or
    /// mistyped scalars read as zero.
    pub fn from_scalars(field_type: FieldType, scalars: &[ScriptValue]) -> Self {
        let float = |i: usize| scalars.get(i).and_then(ScriptValue::as_f32).unwrap_or(0.0);
        match field_type {
            FieldType::Bool => {
                FieldValue::Bool(scalars.first().and_then(ScriptValue::as_bool).unwrap_or(false))
            }
            FieldType::Float => FieldValue::Float(float(0)),
            FieldType::Int32 => FieldValue::Int32(
                scalars.first().and_then(ScriptValue::as_i64).unwrap_or(0) as i32,
            ),
            FieldType::Time => FieldValue::Time(float(0) as f64),
            FieldType::Vec2 => FieldValue::Vec2(Vec2::new(float(0), float(1))),
            FieldType::Vec3 => FieldValue::Vec3(Vec3::new(float(0), float(1), float(2))),
            FieldType::Color => FieldValue::Color(Vec3::new(float(0), float(1), float(2))),
            FieldType::Rotation => FieldValue::Rotation(AxisAngle::new(
                Vec3::new(float(0), float(1), float(2)),
                float(3),
            )),
            FieldType::String => FieldValue::String(
                scalars.first().and_then(ScriptValue::as_str).unwrap_or_default().to_string(),
            ),
            FieldType::MultiString => FieldValue::MultiString(
                scalars.first().map(ScriptValue::to_string_list).unwrap_or_default(),
            ),
        }
    }

    /// Decode a value read back from the script engine's bindings.
    ///
    /// Returns `None` for null bindings and for shapes that cannot be read as
    /// `field_type`.
    pub fn from_script(field_type: FieldType, value: &ScriptValue) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let decoded = match field_type {
            FieldType::Bool => FieldValue::Bool(value.as_bool()?),
            FieldType::Float => FieldValue::Float(value.as_f32()?),
            FieldType::Int32 => FieldValue::Int32(value.as_i64()? as i32),
            FieldType::Time => FieldValue::Time(value.as_f32()? as f64),
            FieldType::Vec2 => {
                let c = value.components(&["x", "y"])?;
                FieldValue::Vec2(Vec2::new(c[0], c[1]))
            }
            FieldType::Vec3 => {
                let c = value.components(&["x", "y", "z"])?;
                FieldValue::Vec3(Vec3::new(c[0], c[1], c[2]))
            }
            FieldType::Color => {
                let c = value
                    .components(&["r", "g", "b"])
                    .or_else(|| value.components(&["x", "y", "z"]))?;
                FieldValue::Color(Vec3::new(c[0], c[1], c[2]))
            }
            FieldType::Rotation => {
                let c = value.components(&["x", "y", "z", "angle"])?;
                FieldValue::Rotation(AxisAngle::new(Vec3::new(c[0], c[1], c[2]), c[3]))
            }
            FieldType::String => FieldValue::String(value.as_str()?.to_string()),
            FieldType::MultiString => FieldValue::MultiString(value.to_string_list()),
        };
        Some(decoded)
    }
}

/// Engine-neutral value exchanged with a script host: positional arguments
/// going in, binding values coming out.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(untagged)]
pub enum ScriptValue {
    #[default]
    Null,
    Bool(bool),
    Float(f32),
    Int(i64),
    Str(String),
    List(Vec<ScriptValue>),
    Record(BTreeMap<String, ScriptValue>),
}

impl ScriptValue {
    pub fn is_null(&self) -> bool {
        matches!(self, ScriptValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ScriptValue::Bool(b) => Some(*b),
            ScriptValue::Int(i) => Some(*i != 0),
            _ => None,
        }
    }

    pub fn as_f32(&self) -> Option<f32> {
        match self {
            ScriptValue::Float(f) => Some(*f),
            ScriptValue::Int(i) => Some(*i as f32),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScriptValue::Int(i) => Some(*i),
            ScriptValue::Float(f) => Some(f.trunc() as i64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScriptValue::Str(s) => Some(s),
            _ => None,
        }
    }

    fn to_string_list(&self) -> Vec<String> {
        match self {
            ScriptValue::Str(s) => vec![s.clone()],
            ScriptValue::List(items) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Read an N-component vector either from a record with the given keys
    /// or from a list of N numbers.
    fn components(&self, keys: &[&str]) -> Option<Vec<f32>> {
        match self {
            ScriptValue::Record(map) => keys
                .iter()
                .map(|k| map.get(*k).and_then(ScriptValue::as_f32))
                .collect(),
            ScriptValue::List(items) if items.len() == keys.len() => {
                items.iter().map(ScriptValue::as_f32).collect()
            }
            _ => None,
        }
    }

    /// One-letter code used in the invocation contract string.
    pub fn contract_code(&self) -> &'static str {
        match self {
            ScriptValue::Null => "n",
            ScriptValue::Bool(_) => "b",
            ScriptValue::Float(_) => "f",
            ScriptValue::Int(_) => "i",
            ScriptValue::Str(_) => "s",
            ScriptValue::List(_) => "l",
            ScriptValue::Record(_) => "r",
        }
    }
}

/// Lenient field-name comparison: case-insensitive, and tolerant of X3D's
/// `set_` / `_changed` decoration on either end.
pub fn field_matches(original: &str, matching: &str) -> bool {
    let original = original.trim().to_ascii_lowercase();
    let matching = matching.trim().to_ascii_lowercase();
    if matching.is_empty() {
        return false;
    }
    original.ends_with(&matching) || original.starts_with(&matching)
}

/// Host properties a bound foreign field name can refer to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    DiffuseColor,
    SpecularColor,
    EmissiveColor,
    Shininess,
    Transparency,
    BeamWidth,
    CutOffAngle,
    Attenuation,
    Location,
    Direction,
    Intensity,
    Radius,
    Color,
    Translation,
    Rotation,
    Orientation,
    Position,
    Scale,
    Center,
    WhichChoice,
    Style,
    Url,
    Text,
    Speed,
    Pitch,
    Duration,
    ElapsedTime,
    StartTime,
    StopTime,
    PauseTime,
    ResumeTime,
    CycleInterval,
    Loop,
    Enabled,
    Toggle,
    On,
}

// Order matters: longer names that end in a shorter one ("diffuseColor" vs
// "color", "rotation" vs "on") must come first.
const PROPERTY_TABLE: &[(&str, Property)] = &[
    ("diffusecolor", Property::DiffuseColor),
    ("specularcolor", Property::SpecularColor),
    ("emissivecolor", Property::EmissiveColor),
    ("shininess", Property::Shininess),
    ("transparency", Property::Transparency),
    ("beamwidth", Property::BeamWidth),
    ("cutoffangle", Property::CutOffAngle),
    ("attenuation", Property::Attenuation),
    ("location", Property::Location),
    ("direction", Property::Direction),
    ("intensity", Property::Intensity),
    ("radius", Property::Radius),
    ("color", Property::Color),
    ("translation", Property::Translation),
    ("rotation", Property::Rotation),
    ("orientation", Property::Orientation),
    ("position", Property::Position),
    ("scale", Property::Scale),
    ("center", Property::Center),
    ("whichchoice", Property::WhichChoice),
    ("style", Property::Style),
    ("url", Property::Url),
    ("string", Property::Text),
    ("speed", Property::Speed),
    ("pitch", Property::Pitch),
    ("duration", Property::Duration),
    ("elapsedtime", Property::ElapsedTime),
    ("starttime", Property::StartTime),
    ("stoptime", Property::StopTime),
    ("pausetime", Property::PauseTime),
    ("resumetime", Property::ResumeTime),
    ("cycleinterval", Property::CycleInterval),
    ("loop", Property::Loop),
    ("enabled", Property::Enabled),
    ("toggle", Property::Toggle),
    ("on", Property::On),
];

impl Property {
    /// Resolve a (possibly decorated) field name against the property table.
    pub fn resolve(field_name: &str) -> Option<Property> {
        PROPERTY_TABLE
            .iter()
            .find(|(name, _)| field_matches(field_name, name))
            .map(|(_, property)| *property)
    }
}
