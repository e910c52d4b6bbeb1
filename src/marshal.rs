//! Moving typed values between the scene and scripts.
//!
//! Going in, a script's input fields are flattened into a positional
//! argument list:
//!
//! | slot | value |
//! |------|-------|
//! | 0    | the trigger (touch edge bool, or frame time mod cycle) |
//! | 1    | timestamp, only when the entry function takes two parameters |
//! | 2..  | each input field after the first, `component_count` scalars each |
//!
//! Coming out, every output field's binding value is written onto the
//! field's sink through a (type, property) dispatch. Combinations with no
//! rule are logged and skipped; they never stop the other fields.

use glam::Vec2;

use crate::error::{BehaviorError, Result};
use crate::fields::{field_matches, FieldType, FieldValue, Property, ScriptValue};
use crate::ids::{
    EventUtilityId, ItemId, MaterialId, MediaId, NodeId, ScriptId, TextId, TextureId,
    TimeSensorId, ViewpointId,
};
use crate::math::{direction_to_orientation, AxisAngle, TextureTransform};
use crate::registry::DefinedItem;
use crate::runtime::Runtime;
use crate::scene_graph::{
    FontStyle, Light, Material, MediaObject, SceneGraph, SceneNode, TextObject, Viewpoint,
};
use crate::script_object::{BindingTarget, Field, FieldBinding, ScriptObject, ScriptState};
use crate::scripting::{BindingMap, Invocation};

/// What caused a script call.
#[derive(Debug, Clone, PartialEq)]
pub struct Trigger {
    pub value: ScriptValue,
    /// Seconds.
    pub timestamp: f64,
}

impl Trigger {
    pub fn event(value: bool, timestamp: f64) -> Self {
        Self {
            value: ScriptValue::Bool(value),
            timestamp,
        }
    }

    pub fn frame(phase: f32, accumulated: f64) -> Self {
        Self {
            value: ScriptValue::Float(phase),
            timestamp: accumulated,
        }
    }

    /// Used while constructing a script before `initialize()`.
    pub fn placeholder(timestamp: f64) -> Self {
        Self {
            value: ScriptValue::Float(0.0),
            timestamp,
        }
    }
}

/// Scene components reachable from a DefinedItem. Components not set on
/// the item directly are taken from its node.
#[derive(Debug, Clone, Copy, Default)]
struct ItemTargets {
    node: Option<NodeId>,
    material: Option<MaterialId>,
    texture: Option<TextureId>,
    media: Option<MediaId>,
    text: Option<TextId>,
    viewpoint: Option<ViewpointId>,
}

impl ItemTargets {
    fn of(item: &DefinedItem, scene: &SceneGraph) -> Self {
        let node = item.node.and_then(|id| scene.node(id));
        let material = item.material.or_else(|| node.and_then(|n| n.material));
        Self {
            node: item.node,
            material,
            texture: item
                .texture
                .or_else(|| material.and_then(|m| scene.material(m)).and_then(|m| m.texture)),
            media: item.media.or_else(|| node.and_then(|n| n.media)),
            text: item.text.or_else(|| node.and_then(|n| n.text)),
            viewpoint: item.viewpoint,
        }
    }

    fn node<'a>(&self, scene: &'a SceneGraph) -> Option<&'a SceneNode> {
        scene.node(self.node?)
    }

    fn node_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut SceneNode> {
        scene.node_mut(self.node?)
    }

    fn viewpoint_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut Viewpoint> {
        scene.viewpoint_mut(self.viewpoint?)
    }

    fn light<'a>(&self, scene: &'a SceneGraph) -> Option<&'a Light> {
        scene.node(self.node?)?.light.as_ref()
    }

    fn light_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut Light> {
        scene.node_mut(self.node?)?.light.as_mut()
    }

    fn material<'a>(&self, scene: &'a SceneGraph) -> Option<&'a Material> {
        scene.material(self.material?)
    }

    fn material_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut Material> {
        scene.material_mut(self.material?)
    }

    fn media<'a>(&self, scene: &'a SceneGraph) -> Option<&'a MediaObject> {
        scene.media(self.media?)
    }

    fn media_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut MediaObject> {
        scene.media_mut(self.media?)
    }

    fn text<'a>(&self, scene: &'a SceneGraph) -> Option<&'a TextObject> {
        scene.text(self.text?)
    }

    fn text_mut<'a>(&self, scene: &'a mut SceneGraph) -> Option<&'a mut TextObject> {
        scene.text_mut(self.text?)
    }

    /// Edit the texture transform and re-derive the matrix from scratch.
    fn edit_texture_transform(
        &self,
        scene: &mut SceneGraph,
        edit: impl FnOnce(&mut TextureTransform),
    ) -> bool {
        let Some(material) = self.material_mut(scene) else {
            return false;
        };
        let mut transform = *material.texture_transform();
        edit(&mut transform);
        material.set_texture_transform(transform);
        true
    }
}

// Read side

/// Current value of a field's source, as `field_type`.
pub fn read_binding(rt: &Runtime, binding: &FieldBinding, field_type: FieldType) -> Result<FieldValue> {
    match binding.target {
        BindingTarget::Item(id) => read_item(rt, id, &binding.foreign_field, field_type),
        BindingTarget::EventUtility(id) => {
            read_event_utility(rt, id, &binding.foreign_field, field_type)
        }
        BindingTarget::TimeSensor(id) => {
            read_time_sensor(rt, id, &binding.foreign_field, field_type)
        }
    }
}

fn read_item(rt: &Runtime, id: ItemId, foreign: &str, field_type: FieldType) -> Result<FieldValue> {
    let item = rt
        .registries
        .items
        .get(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "defined item"))?;
    let unsupported = || BehaviorError::unsupported(foreign, field_type, item.name.clone());
    let property = Property::resolve(foreign).ok_or_else(unsupported)?;
    let scene = &rt.scene;
    let t = ItemTargets::of(item, scene);

    let value = match (field_type, property) {
        (FieldType::Bool, Property::On | Property::Enabled) => {
            t.light(scene).map(|l| FieldValue::Bool(l.on))
        }

        (FieldType::Float, Property::Shininess) => {
            t.material(scene).map(|m| FieldValue::Float(m.shininess))
        }
        (FieldType::Float, Property::Transparency) => {
            t.material(scene).map(|m| FieldValue::Float(m.transparency))
        }
        (FieldType::Float, Property::Rotation) => t
            .material(scene)
            .map(|m| FieldValue::Float(m.texture_transform().rotation)),
        (FieldType::Float, Property::BeamWidth) => t
            .light(scene)
            .map(|l| FieldValue::Float(l.beam_width_deg.to_radians())),
        (FieldType::Float, Property::CutOffAngle) => t
            .light(scene)
            .map(|l| FieldValue::Float(l.cut_off_angle_deg.to_radians())),
        (FieldType::Float, Property::Intensity) => {
            t.light(scene).map(|l| FieldValue::Float(l.intensity))
        }
        (FieldType::Float, Property::Radius) => t.light(scene).map(|l| FieldValue::Float(l.radius)),
        (FieldType::Float, Property::Speed) => t.media(scene).map(|m| FieldValue::Float(m.speed)),
        (FieldType::Float, Property::Pitch) => t.media(scene).map(|m| FieldValue::Float(m.pitch)),

        (FieldType::Time, Property::Duration) => t
            .media(scene)
            .map(|m| FieldValue::Time(m.duration_ms / 1000.0)),
        (FieldType::Time, Property::ElapsedTime) => t
            .media(scene)
            .map(|m| FieldValue::Time(m.position_ms / 1000.0)),

        (FieldType::Color, Property::DiffuseColor) => {
            t.material(scene).map(|m| FieldValue::Color(m.diffuse_color))
        }
        (FieldType::Color, Property::SpecularColor) => {
            t.material(scene).map(|m| FieldValue::Color(m.specular_color))
        }
        (FieldType::Color, Property::EmissiveColor) => {
            t.material(scene).map(|m| FieldValue::Color(m.emissive_color))
        }
        (FieldType::Color, Property::Color) => t.light(scene).map(|l| FieldValue::Color(l.color)),

        (FieldType::Vec3, Property::Attenuation) => {
            t.light(scene).map(|l| FieldValue::Vec3(l.attenuation))
        }
        (FieldType::Vec3, Property::Location) => {
            t.light(scene).map(|l| FieldValue::Vec3(l.location))
        }
        (FieldType::Vec3, Property::Direction) => {
            t.light(scene).map(|l| FieldValue::Vec3(l.direction))
        }
        (FieldType::Vec3, Property::Translation) => t
            .node(scene)
            .map(|n| FieldValue::Vec3(n.transform.translation)),
        (FieldType::Vec3, Property::Scale) => t
            .node(scene)
            .map(|n| FieldValue::Vec3(n.transform.scale)),
        (FieldType::Vec3, Property::Center) => t
            .node(scene)
            .map(|n| FieldValue::Vec3(n.transform.center)),
        (FieldType::Vec3, Property::Position) => match t.viewpoint {
            Some(vp) => scene.viewpoint(vp).map(|v| FieldValue::Vec3(v.position)),
            None => t
            .node(scene)
                .map(|n| FieldValue::Vec3(n.transform.translation)),
        },

        (FieldType::Vec2, Property::Translation) => t.material(scene).map(|m| {
            let v = m.texture_transform().translation;
            FieldValue::Vec2(Vec2::new(v.x, -v.y))
        }),
        (FieldType::Vec2, Property::Scale) => t
            .material(scene)
            .map(|m| FieldValue::Vec2(m.texture_transform().scale)),
        (FieldType::Vec2, Property::Center) => t.material(scene).map(|m| {
            let v = m.texture_transform().center;
            FieldValue::Vec2(Vec2::new(-v.x, v.y))
        }),

        (FieldType::Rotation, Property::Rotation) => Some(FieldValue::Rotation(item.axis_angle)),
        (FieldType::Rotation, Property::Orientation) => match t.viewpoint {
            Some(vp) => scene
                .viewpoint(vp)
                .map(|v| FieldValue::Rotation(AxisAngle::from_quat(v.orientation))),
            None => Some(FieldValue::Rotation(item.axis_angle)),
        },

        (FieldType::Int32, Property::WhichChoice) => t
            .node(scene)
            .and_then(|n| n.switch)
            .map(|s| FieldValue::Int32(s.which_choice)),

        (FieldType::String, Property::Style) => t
            .text(scene)
            .map(|text| FieldValue::String(text.style.as_str().to_string())),

        (FieldType::MultiString, Property::Url) => match t.texture {
            Some(tex) => scene
                .texture(tex)
                .map(|tex| FieldValue::MultiString(tex.urls.clone())),
            None => t.media(scene).map(|m| FieldValue::MultiString(m.urls.clone())),
        },
        (FieldType::MultiString, Property::Text) => t
            .text(scene)
            .map(|text| FieldValue::MultiString(text.lines.clone())),

        _ => None,
    };
    value.ok_or_else(unsupported)
}

fn read_event_utility(
    rt: &Runtime,
    id: EventUtilityId,
    foreign: &str,
    field_type: FieldType,
) -> Result<FieldValue> {
    let eu = rt
        .registries
        .event_utilities
        .get(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "event utility"))?;
    match field_type {
        FieldType::Bool => Ok(FieldValue::Bool(eu.toggle)),
        _ => Err(BehaviorError::unsupported(foreign, field_type, eu.name.clone())),
    }
}

fn read_time_sensor(
    rt: &Runtime,
    id: TimeSensorId,
    foreign: &str,
    field_type: FieldType,
) -> Result<FieldValue> {
    let ts = rt
        .registries
        .time_sensors
        .get(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "time sensor"))?;
    let unsupported = || BehaviorError::unsupported(foreign, field_type, ts.name.clone());
    if field_type == FieldType::Bool {
        let value = if field_matches(foreign, "enabled") {
            ts.enabled
        } else {
            ts.looping
        };
        return Ok(FieldValue::Bool(value));
    }
    let seconds = match Property::resolve(foreign) {
        Some(Property::CycleInterval) => ts.cycle_interval() as f64,
        Some(Property::StartTime) => ts.start_time,
        Some(Property::StopTime) => ts.stop_time,
        Some(Property::PauseTime) => ts.pause_time,
        Some(Property::ResumeTime) => ts.resume_time,
        _ => return Err(unsupported()),
    };
    match field_type {
        FieldType::Float => Ok(FieldValue::Float(seconds as f32)),
        FieldType::Time => Ok(FieldValue::Time(seconds)),
        _ => Err(unsupported()),
    }
}

// Write side

/// Apply a value read back from a script onto a field's sink.
pub fn write_binding(
    rt: &mut Runtime,
    field_name: &str,
    binding: &FieldBinding,
    value: FieldValue,
) -> Result<()> {
    match binding.target {
        BindingTarget::Item(id) => write_item(rt, id, &binding.foreign_field, value),
        BindingTarget::EventUtility(id) => {
            let eu = rt
                .registries
                .event_utilities
                .get_mut(id)
                .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "event utility"))?;
            match value {
                FieldValue::Bool(b) => {
                    eu.toggle = b;
                    Ok(())
                }
                other => Err(BehaviorError::unsupported(
                    binding.foreign_field.as_str(),
                    other.field_type(),
                    eu.name.clone(),
                )),
            }
        }
        BindingTarget::TimeSensor(id) => {
            write_time_sensor(rt, id, field_name, &binding.foreign_field, value)
        }
    }
}

fn write_time_sensor(
    rt: &mut Runtime,
    id: TimeSensorId,
    field_name: &str,
    foreign: &str,
    value: FieldValue,
) -> Result<()> {
    let field_type = value.field_type();
    let ts = rt
        .registries
        .time_sensors
        .get_mut(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "time sensor"))?;
    let seconds = match value {
        FieldValue::Bool(b) => {
            let enabled = field_matches(foreign, "enabled")
                || (!field_matches(foreign, "loop") && field_matches(field_name, "enabled"));
            if enabled {
                ts.enabled = b;
            } else {
                ts.looping = b;
            }
            rt.sync_repeat_mode(id);
            return Ok(());
        }
        FieldValue::Time(t) => t,
        FieldValue::Float(f) => f as f64,
        _ => return Err(BehaviorError::unsupported(foreign, field_type, ts.name.clone())),
    };
    match Property::resolve(foreign) {
        Some(Property::StartTime) => ts.start_time = seconds,
        Some(Property::StopTime) => ts.stop_time = seconds,
        Some(Property::PauseTime) => ts.pause_time = seconds,
        Some(Property::ResumeTime) => ts.resume_time = seconds,
        Some(Property::CycleInterval) => {
            // Already-baked channels keep their key times.
            ts.set_cycle_interval(seconds as f32);
            log::debug!("TimeSensor '{}' cycleInterval -> {}", ts.name, ts.cycle_interval());
        }
        _ => return Err(BehaviorError::unsupported(foreign, field_type, ts.name.clone())),
    }
    Ok(())
}

fn write_item(rt: &mut Runtime, id: ItemId, foreign: &str, value: FieldValue) -> Result<()> {
    let item = rt
        .registries
        .items
        .get(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "defined item"))?;
    let item_name = item.name.clone();
    let t = ItemTargets::of(item, &rt.scene);
    let field_type = value.field_type();
    let unsupported = || BehaviorError::unsupported(foreign, field_type, item_name.clone());
    let property = Property::resolve(foreign).ok_or_else(unsupported)?;
    let scene = &mut rt.scene;

    let applied = match (property, value) {
        (Property::On | Property::Enabled, FieldValue::Bool(b)) => {
            t.light_mut(scene).map(|l| l.on = b).is_some()
        }

        (Property::Shininess, FieldValue::Float(f)) => {
            t.material_mut(scene).map(|m| m.shininess = f).is_some()
        }
        (Property::Transparency, FieldValue::Float(f)) => {
            t.material_mut(scene).map(|m| m.transparency = f).is_some()
        }
        (Property::Rotation, FieldValue::Float(f)) => {
            t.edit_texture_transform(scene, |tt| tt.rotation = f)
        }
        (Property::BeamWidth, FieldValue::Float(f)) => t
            .light_mut(scene)
            .map(|l| l.beam_width_deg = f.to_degrees())
            .is_some(),
        (Property::CutOffAngle, FieldValue::Float(f)) => t
            .light_mut(scene)
            .map(|l| l.cut_off_angle_deg = f.to_degrees())
            .is_some(),
        (Property::Intensity, FieldValue::Float(f)) => {
            t.light_mut(scene).map(|l| l.intensity = f).is_some()
        }
        (Property::Radius, FieldValue::Float(f)) => {
            t.light_mut(scene).map(|l| l.radius = f).is_some()
        }
        (Property::Speed, FieldValue::Float(f)) => {
            t.media_mut(scene).map(|m| m.speed = f).is_some()
        }
        (Property::Pitch, FieldValue::Float(f)) => {
            t.media_mut(scene).map(|m| m.pitch = f).is_some()
        }

        (Property::StartTime | Property::ElapsedTime, FieldValue::Time(s)) => t
            .media_mut(scene)
            .map(|m| m.seek(s * 1000.0))
            .is_some(),
        (Property::StopTime, FieldValue::Time(_)) => t.media_mut(scene).map(|m| m.stop()).is_some(),
        (Property::PauseTime, FieldValue::Time(_)) => {
            t.media_mut(scene).map(|m| m.pause()).is_some()
        }
        (Property::ResumeTime, FieldValue::Time(_)) => {
            t.media_mut(scene).map(|m| m.play()).is_some()
        }

        (Property::DiffuseColor, FieldValue::Color(c)) => {
            t.material_mut(scene).map(|m| m.diffuse_color = c).is_some()
        }
        (Property::SpecularColor, FieldValue::Color(c)) => {
            t.material_mut(scene).map(|m| m.specular_color = c).is_some()
        }
        (Property::EmissiveColor, FieldValue::Color(c)) => {
            t.material_mut(scene).map(|m| m.emissive_color = c).is_some()
        }
        (Property::Color, FieldValue::Color(c)) => {
            t.light_mut(scene).map(|l| l.color = c).is_some()
        }

        (Property::Translation, FieldValue::Vec3(v)) => t
            .node_mut(scene)
            .map(|n| n.transform.translation = v)
            .is_some(),
        (Property::Scale, FieldValue::Vec3(v)) => t
            .node_mut(scene)
            .map(|n| n.transform.scale = v)
            .is_some(),
        (Property::Center, FieldValue::Vec3(v)) => t
            .node_mut(scene)
            .map(|n| n.transform.center = v)
            .is_some(),
        (Property::Attenuation, FieldValue::Vec3(v)) => {
            t.light_mut(scene).map(|l| l.attenuation = v).is_some()
        }
        (Property::Location, FieldValue::Vec3(v)) => {
            t.light_mut(scene).map(|l| l.location = v).is_some()
        }
        (Property::Direction, FieldValue::Vec3(v)) => {
            let applied = t.light_mut(scene).map(|l| l.direction = v).is_some();
            if applied {
                if let Some(node) = t.node_mut(scene) {
                    node.transform.rotation = direction_to_orientation(v);
                }
                if let Some(item) = rt.registries.items.get_mut(id) {
                    item.direction = v;
                }
            }
            applied
        }
        (Property::Position, FieldValue::Vec3(v)) => match t.viewpoint {
            Some(vp) => scene.viewpoint_mut(vp).map(|p| p.position = v).is_some(),
            None => t
            .node_mut(scene)
                .map(|n| n.transform.translation = v)
                .is_some(),
        },

        (Property::Translation, FieldValue::Vec2(v)) => {
            t.edit_texture_transform(scene, |tt| tt.translation = Vec2::new(v.x, -v.y))
        }
        (Property::Scale, FieldValue::Vec2(v)) => {
            t.edit_texture_transform(scene, |tt| tt.scale = v)
        }
        (Property::Center, FieldValue::Vec2(v)) => {
            t.edit_texture_transform(scene, |tt| tt.center = Vec2::new(-v.x, v.y))
        }

        (Property::Rotation | Property::Orientation, FieldValue::Rotation(aa)) => {
            let rotation = aa.to_quat();
            let mut applied = false;
            if let Some(vp) = t.viewpoint_mut(scene) {
                vp.orientation = rotation;
                applied = true;
            }
            if let Some(node) = t.node_mut(scene) {
                node.transform.rotation = rotation;
                applied = true;
            }
            if applied {
                if let Some(item) = rt.registries.items.get_mut(id) {
                    item.axis_angle = aa;
                }
            }
            applied
        }

        (Property::WhichChoice, FieldValue::Int32(i)) => t
            .node
            .map(|n| scene.set_which_choice(n, i).is_some())
            .unwrap_or(false),

        (Property::Style, FieldValue::String(s)) => match FontStyle::parse(&s) {
            Some(style) => t.text_mut(scene).map(|text| text.style = style).is_some(),
            None => {
                log::warn!("Unknown font style '{}' for '{}'", s, item_name);
                false
            }
        },

        (Property::Url, FieldValue::MultiString(urls)) => {
            if let Some(texture) = t.texture {
                rt.assets.request_texture(scene, texture, urls);
                true
            } else if let Some(media) = t.media_mut(scene) {
                if media.urls != urls {
                    media.reload(urls);
                }
                true
            } else {
                false
            }
        }
        (Property::Text, FieldValue::MultiString(lines)) => {
            t.text_mut(scene).map(|text| text.lines = lines).is_some()
        }
        (Property::Text, FieldValue::String(line)) => {
            t.text_mut(scene).map(|text| text.lines = vec![line]).is_some()
        }

        _ => false,
    };

    if applied {
        Ok(())
    } else {
        Err(unsupported())
    }
}

// Invocation

/// Positional arguments for one call of the script's entry function.
pub fn build_arguments(rt: &Runtime, script: &ScriptObject, trigger: &Trigger) -> Vec<ScriptValue> {
    let mut args = vec![trigger.value.clone()];
    if script.timestamp_parameter {
        args.push(ScriptValue::Float(trigger.timestamp as f32));
    }
    for field in script.fields.iter().skip(1).filter(|f| f.access.is_input()) {
        args.extend(input_value(rt, script, field, trigger).to_scalars());
    }
    args
}

fn input_value(rt: &Runtime, script: &ScriptObject, field: &Field, trigger: &Trigger) -> FieldValue {
    if let Some(binding) = field.from_binding() {
        match read_binding(rt, binding, field.field_type) {
            Ok(value) => return value,
            Err(e) => log::warn!("Script '{}' field '{}': {}", script.name, field.name, e),
        }
        return FieldValue::default_for(field.field_type);
    }
    match field.field_type {
        FieldType::Bool => trigger
            .value
            .as_bool()
            .map(FieldValue::Bool)
            .unwrap_or(FieldValue::Bool(false)),
        FieldType::Float => trigger
            .value
            .as_f32()
            .map(FieldValue::Float)
            .unwrap_or(FieldValue::Float(0.0)),
        other => FieldValue::default_for(other),
    }
}

/// Rehydrate positional arguments into named, typed field values using the
/// script's constructor plan.
pub fn constructor_values(script: &ScriptObject, args: &[ScriptValue]) -> Vec<(String, FieldValue)> {
    script
        .constructor
        .slots
        .iter()
        .map(|slot| {
            let end = (slot.offset + slot.field_type.component_count()).min(args.len());
            let scalars = args.get(slot.offset..end).unwrap_or(&[]);
            (
                slot.field.clone(),
                FieldValue::from_scalars(slot.field_type, scalars),
            )
        })
        .collect()
}

/// Write every non-null output binding back onto its sink.
pub fn apply_results(rt: &mut Runtime, id: ScriptId, bindings: &BindingMap) {
    let Some(script) = rt.registries.scripts.get(id) else {
        return;
    };
    let mut writes = Vec::new();
    for field in script.fields.iter().filter(|f| f.access.is_output()) {
        let Some(raw) = bindings.get(&field.name).or_else(|| {
            bindings
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(&field.name))
                .map(|(_, v)| v)
        }) else {
            continue;
        };
        if raw.is_null() {
            continue;
        }
        let Some(sink) = field.to_binding() else {
            log::trace!("Script '{}' field '{}' has no sink", script.name, field.name);
            continue;
        };
        match FieldValue::from_script(field.field_type, raw) {
            Some(value) => writes.push((field.name.clone(), sink.clone(), value)),
            None => log::warn!(
                "Script '{}' field '{}': value {:?} is not a {}",
                script.name,
                field.name,
                raw,
                field.field_type
            ),
        }
    }

    for (field, sink, value) in writes {
        if let Err(e) = write_binding(rt, &field, &sink, value) {
            log::warn!("Skipping read-back of '{}': {}", field, e);
        }
    }
}

/// Construct the script's bindings and run `initialize()` once.
pub fn initialize_script(rt: &mut Runtime, id: ScriptId) {
    let Some(script) = rt.registries.scripts.get(id) else {
        return;
    };
    if script.state != ScriptState::Loaded {
        return;
    }
    let name = script.name.clone();
    let args = build_arguments(rt, script, &Trigger::placeholder(rt.clock));
    let values = constructor_values(script, &args);

    if let Err(e) = rt.host.construct(&name, &values) {
        log::warn!("{}", e);
    }
    if rt.host.has_function(&name, "initialize") {
        match rt.host.invoke(&name, &Invocation::new("initialize", Vec::new())) {
            Ok(bindings) => apply_results(rt, id, &bindings),
            Err(e) => log::warn!("{}", e),
        }
    }
    if let Some(script) = rt.registries.scripts.get_mut(id) {
        script.state = ScriptState::Initialized;
    }
    log::debug!("Initialized script '{}'", name);
}

/// Call the script's entry function for `trigger` and apply its outputs.
///
/// On failure nothing is written back.
pub fn run_entry(rt: &mut Runtime, id: ScriptId, trigger: &Trigger) -> Result<()> {
    let state = rt
        .registries
        .scripts
        .get(id)
        .map(|s| s.state)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "script"))?;
    match state {
        ScriptState::Failed => return Ok(()),
        ScriptState::Loaded => initialize_script(rt, id),
        ScriptState::Initialized => {}
    }

    let script = rt
        .registries
        .scripts
        .get(id)
        .ok_or_else(|| BehaviorError::unresolved(id.to_string(), "script"))?;
    let name = script.name.clone();
    let entry = script
        .entry_function()
        .ok_or_else(|| BehaviorError::script(name.as_str(), "<entry>", "script declares no fields"))?
        .to_string();
    let args = build_arguments(rt, script, trigger);
    let values = constructor_values(script, &args);

    rt.host.construct(&name, &values)?;
    let bindings = rt.host.invoke(&name, &Invocation::new(entry, args))?;
    apply_results(rt, id, &bindings);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BehaviorConfig;
    use crate::events::MessageQueue;
    use crate::fields::AccessType;
    use crate::nodes::TimeSensor;
    use crate::scene_graph::{LightKind, TextureState};
    use glam::{Mat3, Vec3};

    fn runtime() -> Runtime {
        Runtime::new(BehaviorConfig::default(), MessageQueue::new().sender())
    }

    /// A box with a material and a named DefinedItem pointing at both.
    fn add_box(rt: &mut Runtime) -> ItemId {
        let node = rt.scene.add_node(rt.scene.root(), "Box");
        let material = rt.scene.add_material(Material {
            diffuse_color: Vec3::new(0.1, 0.2, 0.3),
            ..Material::default()
        });
        rt.scene.node_mut(node).unwrap().material = Some(material);
        let mut item = DefinedItem::new("Box");
        item.node = Some(node);
        item.material = Some(material);
        rt.registries.items.insert(item)
    }

    fn click_script(source: &str, item: ItemId) -> ScriptObject {
        let mut color = Field::new("boolColor", AccessType::InputOutput, FieldType::Color);
        color.bind_from(FieldBinding::new(BindingTarget::Item(item), "diffuseColor"));
        ScriptObject::new(
            "Clicker",
            vec![Field::new("onClick", AccessType::InputOnly, FieldType::Bool), color],
            source,
        )
    }

    #[test]
    fn test_argument_layout_without_timestamp() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let script = click_script("fn onClick(value) {}", item);
        let args = build_arguments(&rt, &script, &Trigger::event(true, 2.0));
        assert_eq!(
            args,
            vec![
                ScriptValue::Bool(true),
                ScriptValue::Float(0.1),
                ScriptValue::Float(0.2),
                ScriptValue::Float(0.3),
            ]
        );
    }

    #[test]
    fn test_argument_layout_with_timestamp() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let script = click_script("fn onClick(value, ts) {}", item);
        let args = build_arguments(&rt, &script, &Trigger::event(false, 2.0));
        assert_eq!(args.len(), 5);
        assert_eq!(args[1], ScriptValue::Float(2.0));
        let values = constructor_values(&script, &args);
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].0, "boolColor");
        assert_eq!(values[0].1, FieldValue::Color(Vec3::new(0.1, 0.2, 0.3)));
    }

    #[test]
    fn test_unbound_inputs_adopt_trigger_or_default() {
        let rt = runtime();
        let script = ScriptObject::new(
            "S",
            vec![
                Field::new("tick", AccessType::InputOnly, FieldType::Float),
                Field::new("flag", AccessType::InputOnly, FieldType::Bool),
                Field::new("phase", AccessType::InputOnly, FieldType::Float),
                Field::new("where", AccessType::InputOnly, FieldType::Vec2),
                Field::new("out", AccessType::OutputOnly, FieldType::Vec3),
            ],
            "fn tick(v) {}",
        );
        let args = build_arguments(&rt, &script, &Trigger::frame(0.5, 3.5));
        assert_eq!(
            args,
            vec![
                ScriptValue::Float(0.5),
                ScriptValue::Bool(false),
                ScriptValue::Float(0.5),
                ScriptValue::Float(0.0),
                ScriptValue::Float(0.0),
            ]
        );
    }

    #[test]
    fn test_switch_index_clamped() {
        let mut rt = runtime();
        let node = rt.scene.add_node(rt.scene.root(), "Choice");
        rt.scene.add_node(node, "a");
        rt.scene.add_node(node, "b");
        let mut item = DefinedItem::new("Choice");
        item.node = Some(node);
        let id = rt.registries.items.insert(item);
        let binding = FieldBinding::new(BindingTarget::Item(id), "set_whichChoice");

        write_binding(&mut rt, "pick", &binding, FieldValue::Int32(7)).unwrap();
        assert_eq!(rt.scene.node(node).unwrap().switch.unwrap().which_choice, 2);
        write_binding(&mut rt, "pick", &binding, FieldValue::Int32(-3)).unwrap();
        assert_eq!(rt.scene.node(node).unwrap().switch.unwrap().which_choice, 2);
        write_binding(&mut rt, "pick", &binding, FieldValue::Int32(1)).unwrap();
        assert_eq!(
            read_binding(&rt, &binding, FieldType::Int32).unwrap(),
            FieldValue::Int32(1)
        );
    }

    #[test]
    fn test_texture_matrix_rederived_from_current_fields() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let write = |rt: &mut Runtime, field: &str, value: FieldValue| {
            let binding = FieldBinding::new(BindingTarget::Item(item), field);
            write_binding(rt, "f", &binding, value).unwrap();
        };
        write(&mut rt, "translation", FieldValue::Vec2(Vec2::new(0.5, 0.25)));
        write(&mut rt, "scale", FieldValue::Vec2(Vec2::new(2.0, 3.0)));
        write(&mut rt, "center", FieldValue::Vec2(Vec2::new(0.1, 0.2)));
        write(&mut rt, "rotation", FieldValue::Float(0.7));
        write(&mut rt, "rotation", FieldValue::Float(0.3));

        let material = rt.scene.material(rt.registries.items.get(item).unwrap().material.unwrap()).unwrap();
        let expected = TextureTransform {
            translation: Vec2::new(0.5, -0.25),
            center: Vec2::new(-0.1, 0.2),
            scale: Vec2::new(2.0, 3.0),
            rotation: 0.3,
        }
        .matrix();
        assert!(material.texture_matrix().abs_diff_eq(expected, 1e-6));
        assert_ne!(material.texture_matrix(), Mat3::IDENTITY);

        let binding = FieldBinding::new(BindingTarget::Item(item), "translation");
        assert_eq!(
            read_binding(&rt, &binding, FieldType::Vec2).unwrap(),
            FieldValue::Vec2(Vec2::new(0.5, 0.25))
        );
    }

    #[test]
    fn test_light_direction_and_angles() {
        let mut rt = runtime();
        let node = rt.scene.add_node(rt.scene.root(), "Spot");
        rt.scene.node_mut(node).unwrap().light = Some(Light::new(LightKind::Spot));
        let mut item = DefinedItem::new("Spot");
        item.node = Some(node);
        let id = rt.registries.items.insert(item);

        let direction = FieldBinding::new(BindingTarget::Item(id), "direction");
        write_binding(&mut rt, "d", &direction, FieldValue::Vec3(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        assert_eq!(
            rt.scene.node(node).unwrap().transform.rotation,
            direction_to_orientation(Vec3::new(1.0, 0.0, 0.0))
        );
        assert_eq!(rt.registries.items.get(id).unwrap().direction, Vec3::X);

        let cutoff = FieldBinding::new(BindingTarget::Item(id), "cutOffAngle");
        write_binding(&mut rt, "c", &cutoff, FieldValue::Float(std::f32::consts::FRAC_PI_4)).unwrap();
        let light = rt.scene.node(node).unwrap().light.as_ref().unwrap();
        assert!((light.cut_off_angle_deg - 45.0).abs() < 1e-4);
        let FieldValue::Float(radians) = read_binding(&rt, &cutoff, FieldType::Float).unwrap() else {
            panic!("expected float");
        };
        assert!((radians - std::f32::consts::FRAC_PI_4).abs() < 1e-5);
    }

    #[test]
    fn test_unsupported_field_does_not_block_others() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let mut bad = Field::new("label", AccessType::OutputOnly, FieldType::String);
        bad.bind_to(FieldBinding::new(BindingTarget::Item(item), "diffuseColor"));
        let mut good = Field::new("tint", AccessType::OutputOnly, FieldType::Color);
        good.bind_to(FieldBinding::new(BindingTarget::Item(item), "emissiveColor"));
        let script = ScriptObject::new(
            "S",
            vec![Field::new("go", AccessType::InputOnly, FieldType::Bool), bad, good],
            "fn go(v) {}",
        );
        let id = rt.registries.scripts.insert(script);

        let mut bindings = BindingMap::new();
        bindings.insert("label".into(), ScriptValue::Str("nope".into()));
        let mut color = std::collections::BTreeMap::new();
        color.insert("r".to_string(), ScriptValue::Float(1.0));
        color.insert("g".to_string(), ScriptValue::Float(0.5));
        color.insert("b".to_string(), ScriptValue::Int(0));
        bindings.insert("tint".into(), ScriptValue::Record(color));
        apply_results(&mut rt, id, &bindings);

        let material = rt.scene.material(MaterialId(0)).unwrap();
        assert_eq!(material.emissive_color, Vec3::new(1.0, 0.5, 0.0));
        assert_eq!(material.diffuse_color, Vec3::new(0.1, 0.2, 0.3));
    }

    #[test]
    fn test_time_sensor_loop_write_sets_repeat_mode() {
        use crate::animation::{Channel, RepeatMode};
        let mut rt = runtime();
        let node = rt.scene.add_node(rt.scene.root(), "Box");
        let anim = rt.animator.add(
            "Box",
            node,
            Channel::Translation(Vec::new()),
            1.0,
            60.0,
            RepeatMode::Once,
        );
        let mut ts = TimeSensor::new("Clock", 1.0);
        ts.animations.push(anim);
        let id = rt.registries.time_sensors.insert(ts);

        let binding = FieldBinding::new(BindingTarget::TimeSensor(id), "loop");
        write_binding(&mut rt, "repeat", &binding, FieldValue::Bool(true)).unwrap();
        assert_eq!(rt.animator.get(anim).unwrap().repeat, RepeatMode::Loop);

        let binding = FieldBinding::new(BindingTarget::TimeSensor(id), "enabled");
        write_binding(&mut rt, "on", &binding, FieldValue::Bool(false)).unwrap();
        assert_eq!(rt.animator.get(anim).unwrap().repeat, RepeatMode::Once);

        let binding = FieldBinding::new(BindingTarget::TimeSensor(id), "cycleInterval");
        write_binding(&mut rt, "period", &binding, FieldValue::Time(4.0)).unwrap();
        assert_eq!(rt.registries.time_sensors.get(id).unwrap().cycle_interval(), 4.0);
    }

    #[test]
    fn test_texture_url_reload_only_when_changed() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let texture = rt.scene.add_texture(vec!["a.png".to_string()]);
        rt.registries.items.get_mut(item).unwrap().texture = Some(texture);
        let binding = FieldBinding::new(BindingTarget::Item(item), "url");

        write_binding(&mut rt, "u", &binding, FieldValue::MultiString(vec!["a.png".into()])).unwrap();
        assert_eq!(rt.scene.texture(texture).unwrap().state, TextureState::Ready);
        write_binding(&mut rt, "u", &binding, FieldValue::MultiString(vec!["b.png".into()])).unwrap();
        assert_eq!(rt.scene.texture(texture).unwrap().state, TextureState::Pending);
        assert_eq!(rt.scene.texture(texture).unwrap().urls, vec!["b.png".to_string()]);
    }

    #[test]
    fn test_run_entry_initializes_once_and_writes_back() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let mut script = click_script(
            "fn initialize() { this.count = 0; }\n\
             fn onClick(value) {\n\
                 this.count += 1;\n\
                 if value { this.boolColor = SFColor(this.count, 0.0, 0.0); }\n\
             }",
            item,
        );
        script.fields[1].bind_to(FieldBinding::new(BindingTarget::Item(item), "emissiveColor"));
        let source = script.source.clone();
        let id = rt.registries.scripts.insert(script);
        rt.host.load("Clicker", &source).unwrap();

        run_entry(&mut rt, id, &Trigger::event(true, 0.0)).unwrap();
        run_entry(&mut rt, id, &Trigger::event(true, 0.1)).unwrap();
        assert_eq!(
            rt.registries.scripts.get(id).unwrap().state,
            ScriptState::Initialized
        );
        let material = rt.scene.material(MaterialId(0)).unwrap();
        assert_eq!(material.emissive_color, Vec3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_failed_invocation_writes_nothing() {
        let mut rt = runtime();
        let item = add_box(&mut rt);
        let mut script = click_script(
            "fn onClick(value) { this.boolColor = SFColor(1, 1, 1); throw \"boom\"; }",
            item,
        );
        script.fields[1].bind_to(FieldBinding::new(BindingTarget::Item(item), "emissiveColor"));
        let source = script.source.clone();
        let id = rt.registries.scripts.insert(script);
        rt.host.load("Clicker", &source).unwrap();

        assert!(run_entry(&mut rt, id, &Trigger::event(true, 0.0)).is_err());
        let material = rt.scene.material(MaterialId(0)).unwrap();
        assert_eq!(material.emissive_color, Vec3::ZERO);
    }
}
