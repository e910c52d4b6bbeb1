//! The typed declaration stream a scene is built from.
//!
//! Markup parsing happens upstream; by the time a scene reaches this crate
//! every attribute is already a number, a flag or a string. The JSON form is
//! tagged by `node`:
//!
//! ```json
//! [
//!   { "node": "Transform", "DEF": "Door", "translation": [0, 1, 0], "children": [
//!       { "node": "TouchSensor", "DEF": "Knob" },
//!       { "node": "Shape", "geometry": "Box" }
//!   ]},
//!   { "node": "TimeSensor", "DEF": "Clock", "cycleInterval": 2 },
//!   { "node": "ROUTE", "fromNode": "Knob", "fromField": "touchTime",
//!     "toNode": "Clock", "toField": "startTime" }
//! ]
//! ```

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::fields::{AccessType, FieldType};
use crate::routing::Route;

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

fn default_scale3() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_scale2() -> [f32; 2] {
    [1.0, 1.0]
}

fn default_rotation() -> [f32; 4] {
    [0.0, 0.0, 1.0, 0.0]
}

fn default_which_choice() -> i32 {
    -1
}

/// DEF/USE naming shared by every declaration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Naming {
    #[serde(rename = "DEF", default, skip_serializing_if = "Option::is_none")]
    pub def: Option<String>,
    #[serde(rename = "USE", default, skip_serializing_if = "Option::is_none")]
    pub use_: Option<String>,
}

/// Transform and Group. Group ignores the transform fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub translation: [f32; 3],
    #[serde(default = "default_rotation")]
    pub rotation: [f32; 4],
    #[serde(default = "default_scale3")]
    pub scale: [f32; 3],
    #[serde(default)]
    pub center: [f32; 3],
    #[serde(default)]
    pub children: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwitchDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default = "default_which_choice")]
    pub which_choice: i32,
    #[serde(default)]
    pub children: Vec<Declaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDecl {
    #[serde(flatten)]
    pub naming: Naming,
    pub diffuse_color: Option<[f32; 3]>,
    pub specular_color: Option<[f32; 3]>,
    pub emissive_color: Option<[f32; 3]>,
    pub shininess: Option<f32>,
    pub transparency: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TextureKind {
    #[default]
    ImageTexture,
    /// Also creates a media object on the shape.
    MovieTexture,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub kind: TextureKind,
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default = "default_one")]
    pub speed: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureTransformDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub translation: [f32; 2],
    #[serde(default)]
    pub center: [f32; 2],
    #[serde(default = "default_scale2")]
    pub scale: [f32; 2],
    /// Radians.
    #[serde(default)]
    pub rotation: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppearanceDecl {
    pub material: Option<MaterialDecl>,
    pub texture: Option<TextureDecl>,
    pub texture_transform: Option<TextureTransformDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FontStyleDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub family: Vec<String>,
    #[serde(default)]
    pub style: String,
    #[serde(default = "default_one")]
    pub size: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub string: Vec<String>,
    pub font_style: Option<FontStyleDecl>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeDecl {
    #[serde(flatten)]
    pub naming: Naming,
    pub appearance: Option<AppearanceDecl>,
    /// Geometry label (`Box`, `Sphere`, `IndexedFaceSet`, ...).
    pub geometry: Option<String>,
    pub text: Option<TextDecl>,
}

/// PointLight, SpotLight and DirectionalLight. Angles are in radians.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LightDecl {
    #[serde(flatten)]
    pub naming: Naming,
    pub on: Option<bool>,
    pub color: Option<[f32; 3]>,
    pub intensity: Option<f32>,
    pub attenuation: Option<[f32; 3]>,
    pub location: Option<[f32; 3]>,
    pub direction: Option<[f32; 3]>,
    pub beam_width: Option<f32>,
    pub cut_off_angle: Option<f32>,
    pub radius: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewpointDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default = "default_viewpoint_position")]
    pub position: [f32; 3],
    #[serde(default = "default_rotation")]
    pub orientation: [f32; 4],
    #[serde(default)]
    pub description: String,
}

fn default_viewpoint_position() -> [f32; 3] {
    [0.0, 0.0, 10.0]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub url: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameter: Vec<String>,
    #[serde(default)]
    pub children: Vec<Declaration>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSensorDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default = "default_one")]
    pub cycle_interval: f32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default, rename = "loop")]
    pub looping: bool,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub stop_time: f64,
    #[serde(default)]
    pub pause_time: f64,
    #[serde(default)]
    pub resume_time: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolatorDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub key: Vec<f32>,
    #[serde(default)]
    pub key_value: Vec<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleDecl {
    #[serde(flatten)]
    pub naming: Naming,
    #[serde(default)]
    pub toggle: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDecl {
    pub name: String,
    #[serde(default)]
    pub access_type: AccessType,
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptDecl {
    #[serde(flatten)]
    pub naming: Naming,
    /// Script files, tried in order, relative to the scene's directory.
    #[serde(default)]
    pub url: Vec<String>,
    /// Inline source; wins over `url`.
    pub source: Option<String>,
    #[serde(default)]
    pub direct_output: bool,
    #[serde(default)]
    pub must_evaluate: bool,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node")]
pub enum Declaration {
    Transform(GroupDecl),
    Group(GroupDecl),
    Switch(SwitchDecl),
    Shape(ShapeDecl),
    PointLight(LightDecl),
    SpotLight(LightDecl),
    DirectionalLight(LightDecl),
    Viewpoint(ViewpointDecl),
    TouchSensor(SensorDecl),
    PlaneSensor(SensorDecl),
    CylinderSensor(SensorDecl),
    SphereSensor(SensorDecl),
    ProximitySensor(SensorDecl),
    VisibilitySensor(SensorDecl),
    Anchor(AnchorDecl),
    TimeSensor(TimeSensorDecl),
    PositionInterpolator(InterpolatorDecl),
    OrientationInterpolator(InterpolatorDecl),
    BooleanToggle(ToggleDecl),
    Script(ScriptDecl),
    #[serde(rename = "ROUTE")]
    Route(Route),
}

impl Declaration {
    pub fn kind(&self) -> &'static str {
        match self {
            Declaration::Transform(_) => "Transform",
            Declaration::Group(_) => "Group",
            Declaration::Switch(_) => "Switch",
            Declaration::Shape(_) => "Shape",
            Declaration::PointLight(_) => "PointLight",
            Declaration::SpotLight(_) => "SpotLight",
            Declaration::DirectionalLight(_) => "DirectionalLight",
            Declaration::Viewpoint(_) => "Viewpoint",
            Declaration::TouchSensor(_) => "TouchSensor",
            Declaration::PlaneSensor(_) => "PlaneSensor",
            Declaration::CylinderSensor(_) => "CylinderSensor",
            Declaration::SphereSensor(_) => "SphereSensor",
            Declaration::ProximitySensor(_) => "ProximitySensor",
            Declaration::VisibilitySensor(_) => "VisibilitySensor",
            Declaration::Anchor(_) => "Anchor",
            Declaration::TimeSensor(_) => "TimeSensor",
            Declaration::PositionInterpolator(_) => "PositionInterpolator",
            Declaration::OrientationInterpolator(_) => "OrientationInterpolator",
            Declaration::BooleanToggle(_) => "BooleanToggle",
            Declaration::Script(_) => "Script",
            Declaration::Route(_) => "ROUTE",
        }
    }
}

pub fn parse_declarations(json: &str) -> anyhow::Result<Vec<Declaration>> {
    serde_json::from_str(json).context("Failed to parse scene declarations")
}

pub fn read_declarations(path: &Path) -> anyhow::Result<Vec<Declaration>> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read scene file: {}", path.display()))?;
    parse_declarations(&json).with_context(|| format!("In scene file: {}", path.display()))
}
