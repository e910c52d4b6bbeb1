//! Building a scene from its declaration stream.
//!
//! Declarations are visited in document order. Grouping nodes recurse into
//! their children; behavior nodes go into their registries; ROUTEs are
//! collected in order for the graph builder.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::{Vec2, Vec3};

use crate::declarations::{
    AnchorDecl, Declaration, FontStyleDecl, GroupDecl, InterpolatorDecl, LightDecl, MaterialDecl,
    Naming, ScriptDecl, SensorDecl, ShapeDecl, SwitchDecl, TextDecl, TextureDecl, TextureKind,
    TextureTransformDecl, TimeSensorDecl, ToggleDecl, ViewpointDecl,
};
use crate::ids::{MaterialId, MediaId, NodeId, TextId, TextureId};
use crate::interactive::InteractiveObject;
use crate::math::{direction_to_orientation, AxisAngle, TextureTransform};
use crate::nodes::{
    AnchorTarget, EventUtility, Interpolator, InterpolatorKind, Sensor, SensorKind, TimeSensor,
};
use crate::registry::DefinedItem;
use crate::routing::Route;
use crate::runtime::Runtime;
use crate::scene_graph::{FontStyle, Light, LightKind, Material, MediaObject, TextObject, Viewpoint};
use crate::script_object::{Field, ScriptObject, ScriptState};

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

pub struct SceneLoader<'a> {
    rt: &'a mut Runtime,
    base_dir: Option<PathBuf>,
    routes: Vec<Route>,
    materials: HashMap<String, MaterialId>,
    textures: HashMap<String, (TextureId, Option<MediaId>)>,
    texture_transforms: HashMap<String, TextureTransform>,
    fonts: HashMap<String, FontStyleDecl>,
    sensor_owners: Vec<NodeId>,
}

impl<'a> SceneLoader<'a> {
    pub fn new(rt: &'a mut Runtime, base_dir: Option<&Path>) -> Self {
        Self {
            rt,
            base_dir: base_dir.map(Path::to_path_buf),
            routes: Vec::new(),
            materials: HashMap::new(),
            textures: HashMap::new(),
            texture_transforms: HashMap::new(),
            fonts: HashMap::new(),
            sensor_owners: Vec::new(),
        }
    }

    /// Load every declaration and return the ROUTEs in document order.
    pub fn load(mut self, declarations: &[Declaration]) -> Vec<Route> {
        let root = self.rt.scene.root();
        for declaration in declarations {
            self.declaration(declaration, root);
        }
        for owner in std::mem::take(&mut self.sensor_owners) {
            self.rt.scene.attach_colliders(owner);
        }
        log::info!(
            "Loaded {} nodes, {} items, {} sensors, {} timers, {} interpolators, {} toggles, {} scripts, {} routes",
            self.rt.scene.node_count(),
            self.rt.registries.items.len(),
            self.rt.registries.sensors.len(),
            self.rt.registries.time_sensors.len(),
            self.rt.registries.interpolators.len(),
            self.rt.registries.event_utilities.len(),
            self.rt.registries.scripts.len(),
            self.routes.len()
        );
        self.routes
    }

    fn declaration(&mut self, declaration: &Declaration, parent: NodeId) {
        match declaration {
            Declaration::Transform(group) => self.group(group, parent, true),
            Declaration::Group(group) => self.group(group, parent, false),
            Declaration::Switch(switch) => self.switch(switch, parent),
            Declaration::Shape(shape) => self.shape(shape, parent),
            Declaration::PointLight(light) => self.light(light, LightKind::Point, parent),
            Declaration::SpotLight(light) => self.light(light, LightKind::Spot, parent),
            Declaration::DirectionalLight(light) => {
                self.light(light, LightKind::Directional, parent)
            }
            Declaration::Viewpoint(viewpoint) => self.viewpoint(viewpoint),
            Declaration::TouchSensor(sensor) => self.sensor(sensor, SensorKind::Touch, parent),
            Declaration::PlaneSensor(sensor) => self.sensor(sensor, SensorKind::Plane, parent),
            Declaration::CylinderSensor(sensor) => {
                self.sensor(sensor, SensorKind::Cylinder, parent)
            }
            Declaration::SphereSensor(sensor) => self.sensor(sensor, SensorKind::Sphere, parent),
            Declaration::ProximitySensor(sensor) => {
                self.sensor(sensor, SensorKind::Proximity, parent)
            }
            Declaration::VisibilitySensor(sensor) => {
                self.sensor(sensor, SensorKind::Visibility, parent)
            }
            Declaration::Anchor(anchor) => self.anchor(anchor, parent),
            Declaration::TimeSensor(ts) => self.time_sensor(ts),
            Declaration::PositionInterpolator(i) => {
                self.interpolator(i, InterpolatorKind::Position)
            }
            Declaration::OrientationInterpolator(i) => {
                self.interpolator(i, InterpolatorKind::Orientation)
            }
            Declaration::BooleanToggle(toggle) => self.toggle(toggle),
            Declaration::Script(script) => self.script(script),
            Declaration::Route(route) => self.routes.push(route.clone()),
        }
    }

    fn define(&mut self, naming: &Naming, fill: impl FnOnce(&mut DefinedItem)) {
        let Some(name) = &naming.def else {
            return;
        };
        let mut item = DefinedItem::new(name.as_str());
        fill(&mut item);
        self.rt.registries.items.insert(item);
    }

    /// Handle `USE` on a node: deep-copy the DEF'd subtree under `parent`.
    fn reuse_node(&mut self, naming: &Naming, parent: NodeId) -> bool {
        let Some(name) = &naming.use_ else {
            return false;
        };
        let source = self
            .rt
            .registries
            .items
            .find(name)
            .and_then(|id| self.rt.registries.items.get(id))
            .and_then(|item| item.node);
        match source.and_then(|node| self.rt.scene.clone_subtree(node, parent)) {
            Some(copy) => log::debug!("USE '{}' cloned as {}", name, copy),
            None => log::warn!("USE '{}' does not name a DEF'd node", name),
        }
        true
    }

    fn node_name(naming: &Naming, kind: &str) -> String {
        naming.def.clone().unwrap_or_else(|| kind.to_string())
    }

    fn group(&mut self, group: &GroupDecl, parent: NodeId, transform: bool) {
        if self.reuse_node(&group.naming, parent) {
            return;
        }
        let kind = if transform { "Transform" } else { "Group" };
        let node = self
            .rt
            .scene
            .add_node(parent, Self::node_name(&group.naming, kind));
        let rotation = AxisAngle::from_array(group.rotation);
        if transform {
            if let Some(n) = self.rt.scene.node_mut(node) {
                n.transform.translation = Vec3::from(group.translation);
                n.transform.rotation = rotation.to_quat();
                n.transform.scale = Vec3::from(group.scale);
                n.transform.center = Vec3::from(group.center);
            }
        }
        self.define(&group.naming, |item| {
            item.node = Some(node);
            item.axis_angle = rotation;
        });
        for child in &group.children {
            self.declaration(child, node);
        }
    }

    fn switch(&mut self, switch: &SwitchDecl, parent: NodeId) {
        if self.reuse_node(&switch.naming, parent) {
            return;
        }
        let node = self
            .rt
            .scene
            .add_node(parent, Self::node_name(&switch.naming, "Switch"));
        self.define(&switch.naming, |item| item.node = Some(node));
        for child in &switch.children {
            self.declaration(child, node);
        }
        self.rt.scene.set_which_choice(node, switch.which_choice);
    }

    fn shape(&mut self, shape: &ShapeDecl, parent: NodeId) {
        if self.reuse_node(&shape.naming, parent) {
            return;
        }
        let node = self
            .rt
            .scene
            .add_node(parent, Self::node_name(&shape.naming, "Shape"));
        let mesh = shape.geometry.as_ref().map(|g| self.rt.scene.add_mesh(g.as_str()));

        let mut material = None;
        let mut texture = None;
        let mut media = None;
        if let Some(appearance) = &shape.appearance {
            material = appearance.material.as_ref().and_then(|m| self.material(m));
            if let Some(decl) = &appearance.texture {
                (texture, media) = self.texture(decl);
            }
            let transform = appearance
                .texture_transform
                .as_ref()
                .and_then(|t| self.texture_transform(t));
            if material.is_none() && (texture.is_some() || transform.is_some()) {
                material = Some(self.rt.scene.add_material(Material::default()));
            }
            if let Some(m) = material.and_then(|id| self.rt.scene.material_mut(id)) {
                if texture.is_some() {
                    m.texture = texture;
                }
                if let Some(transform) = transform {
                    m.set_texture_transform(transform);
                }
            }
            if let Some(decl) = &appearance.texture_transform {
                self.define(&decl.naming, |item| item.material = material);
            }
        }
        let text = shape.text.as_ref().and_then(|t| self.text(t));

        if let Some(n) = self.rt.scene.node_mut(node) {
            n.mesh = mesh;
            n.material = material;
            n.media = media;
            n.text = text;
        }
        self.define(&shape.naming, |item| {
            item.node = Some(node);
            item.mesh = mesh;
            item.material = material;
            item.texture = texture;
            item.media = media;
            item.text = text;
        });
    }

    fn material(&mut self, decl: &MaterialDecl) -> Option<MaterialId> {
        if let Some(name) = &decl.naming.use_ {
            let found = self.materials.get(&key(name)).copied();
            if found.is_none() {
                log::warn!("USE '{}' does not name a DEF'd Material", name);
            }
            return found;
        }
        let mut material = Material::default();
        if let Some(c) = decl.diffuse_color {
            material.diffuse_color = Vec3::from(c);
        }
        if let Some(c) = decl.specular_color {
            material.specular_color = Vec3::from(c);
        }
        if let Some(c) = decl.emissive_color {
            material.emissive_color = Vec3::from(c);
        }
        if let Some(s) = decl.shininess {
            material.shininess = s;
        }
        if let Some(t) = decl.transparency {
            material.transparency = t;
        }
        let id = self.rt.scene.add_material(material);
        if let Some(name) = &decl.naming.def {
            self.materials.entry(key(name)).or_insert(id);
        }
        self.define(&decl.naming, |item| item.material = Some(id));
        Some(id)
    }

    fn texture(&mut self, decl: &TextureDecl) -> (Option<TextureId>, Option<MediaId>) {
        if let Some(name) = &decl.naming.use_ {
            return match self.textures.get(&key(name)) {
                Some((texture, media)) => (Some(*texture), *media),
                None => {
                    log::warn!("USE '{}' does not name a DEF'd texture", name);
                    (None, None)
                }
            };
        }
        let texture = self.rt.scene.add_texture(decl.url.clone());
        let media = match decl.kind {
            TextureKind::ImageTexture => None,
            TextureKind::MovieTexture => {
                let mut media = MediaObject::new(decl.url.clone());
                media.looping = decl.looping;
                media.speed = decl.speed;
                Some(self.rt.scene.add_media(media))
            }
        };
        if let Some(name) = &decl.naming.def {
            self.textures.entry(key(name)).or_insert((texture, media));
        }
        self.define(&decl.naming, |item| {
            item.texture = Some(texture);
            item.media = media;
        });
        (Some(texture), media)
    }

    fn texture_transform(&mut self, decl: &TextureTransformDecl) -> Option<TextureTransform> {
        if let Some(name) = &decl.naming.use_ {
            let found = self.texture_transforms.get(&key(name)).copied();
            if found.is_none() {
                log::warn!("USE '{}' does not name a DEF'd TextureTransform", name);
            }
            return found;
        }
        let [tx, ty] = decl.translation;
        let [cx, cy] = decl.center;
        let transform = TextureTransform {
            translation: Vec2::new(tx, -ty),
            center: Vec2::new(-cx, cy),
            scale: Vec2::from(decl.scale),
            rotation: decl.rotation,
        };
        if let Some(name) = &decl.naming.def {
            self.texture_transforms.entry(key(name)).or_insert(transform);
        }
        Some(transform)
    }

    fn text(&mut self, decl: &TextDecl) -> Option<TextId> {
        let font = match &decl.font_style {
            Some(style) => match &style.naming.use_ {
                Some(name) => {
                    let found = self.fonts.get(&key(name)).cloned();
                    if found.is_none() {
                        log::warn!("USE '{}' does not name a DEF'd FontStyle", name);
                    }
                    found
                }
                None => {
                    if let Some(name) = &style.naming.def {
                        self.fonts.entry(key(name)).or_insert_with(|| style.clone());
                    }
                    Some(style.clone())
                }
            },
            None => None,
        }
        .unwrap_or_default();

        let style = if font.style.is_empty() {
            FontStyle::Plain
        } else {
            FontStyle::parse(&font.style).unwrap_or_else(|| {
                log::warn!("Unknown font style '{}'; using PLAIN", font.style);
                FontStyle::Plain
            })
        };
        let text = self.rt.scene.add_text(TextObject {
            lines: decl.string.clone(),
            family: font.family.first().cloned().unwrap_or_else(|| "SERIF".to_string()),
            style,
            size: if font.size > 0.0 { font.size } else { 1.0 },
        });
        self.define(&decl.naming, |item| item.text = Some(text));
        if let Some(style) = &decl.font_style {
            self.define(&style.naming, |item| item.text = Some(text));
        }
        Some(text)
    }

    fn light(&mut self, decl: &LightDecl, kind: LightKind, parent: NodeId) {
        if self.reuse_node(&decl.naming, parent) {
            return;
        }
        let kind_name = match kind {
            LightKind::Point => "PointLight",
            LightKind::Spot => "SpotLight",
            LightKind::Directional => "DirectionalLight",
        };
        let node = self
            .rt
            .scene
            .add_node(parent, Self::node_name(&decl.naming, kind_name));
        let mut light = Light::new(kind);
        if let Some(on) = decl.on {
            light.on = on;
        }
        if let Some(c) = decl.color {
            light.color = Vec3::from(c);
        }
        if let Some(i) = decl.intensity {
            light.intensity = i;
        }
        if let Some(a) = decl.attenuation {
            light.attenuation = Vec3::from(a);
        }
        if let Some(l) = decl.location {
            light.location = Vec3::from(l);
        }
        if let Some(d) = decl.direction {
            light.direction = Vec3::from(d);
        }
        if let Some(b) = decl.beam_width {
            light.beam_width_deg = b.to_degrees();
        }
        if let Some(c) = decl.cut_off_angle {
            light.cut_off_angle_deg = c.to_degrees();
        }
        if let Some(r) = decl.radius {
            light.radius = r;
        }
        let direction = light.direction;
        let orient = light.has_direction();
        if let Some(n) = self.rt.scene.node_mut(node) {
            if orient {
                n.transform.rotation = direction_to_orientation(direction);
            }
            n.light = Some(light);
        }
        self.define(&decl.naming, |item| {
            item.node = Some(node);
            item.direction = direction;
        });
    }

    fn viewpoint(&mut self, decl: &ViewpointDecl) {
        let orientation = AxisAngle::from_array(decl.orientation);
        let viewpoint = self.rt.scene.add_viewpoint(Viewpoint {
            name: Self::node_name(&decl.naming, "Viewpoint"),
            position: Vec3::from(decl.position),
            orientation: orientation.to_quat(),
            description: decl.description.clone(),
        });
        self.define(&decl.naming, |item| {
            item.viewpoint = Some(viewpoint);
            item.axis_angle = orientation;
        });
    }

    fn sensor(&mut self, decl: &SensorDecl, kind: SensorKind, owner: NodeId) {
        let mut sensor = Sensor::new(decl.naming.def.clone().unwrap_or_default(), kind, Some(owner));
        sensor.enabled = decl.enabled;
        let id = self.rt.registries.sensors.insert(sensor);
        self.sensor_owners.push(owner);
        log::debug!("{:?} sensor {} owned by {}", kind, id, owner);
    }

    fn anchor(&mut self, decl: &AnchorDecl, parent: NodeId) {
        let node = self
            .rt
            .scene
            .add_node(parent, Self::node_name(&decl.naming, "Anchor"));
        for child in &decl.children {
            self.declaration(child, node);
        }
        let target = AnchorTarget {
            url: decl.url.first().cloned().unwrap_or_default(),
            description: decl.description.clone(),
            parameter: decl.parameter.clone(),
        };
        let sensor = Sensor::anchor(decl.naming.def.clone().unwrap_or_default(), node, target);
        let id = self.rt.registries.sensors.insert(sensor);
        self.sensor_owners.push(node);
        self.rt.objects.push(InteractiveObject::anchor(id));
        self.define(&decl.naming, |item| item.node = Some(node));
    }

    fn time_sensor(&mut self, decl: &TimeSensorDecl) {
        let mut ts = TimeSensor::new(decl.naming.def.clone().unwrap_or_default(), decl.cycle_interval);
        ts.enabled = decl.enabled;
        ts.looping = decl.looping;
        ts.start_time = decl.start_time;
        ts.stop_time = decl.stop_time;
        ts.pause_time = decl.pause_time;
        ts.resume_time = decl.resume_time;
        self.rt.registries.time_sensors.insert(ts);
    }

    fn interpolator(&mut self, decl: &InterpolatorDecl, kind: InterpolatorKind) {
        let interpolator = Interpolator::new(
            decl.naming.def.clone().unwrap_or_default(),
            kind,
            decl.key.clone(),
            decl.key_value.clone(),
        );
        self.rt.registries.interpolators.insert(interpolator);
    }

    fn toggle(&mut self, decl: &ToggleDecl) {
        let toggle = EventUtility::new(decl.naming.def.clone().unwrap_or_default(), decl.toggle);
        self.rt.registries.event_utilities.insert(toggle);
    }

    fn script_source(&self, decl: &ScriptDecl) -> Option<String> {
        if let Some(source) = &decl.source {
            return Some(source.clone());
        }
        decl.url.iter().find_map(|url| {
            let path = Path::new(url);
            let path = match &self.base_dir {
                Some(base) if path.is_relative() => base.join(path),
                _ => path.to_path_buf(),
            };
            match std::fs::read_to_string(&path) {
                Ok(source) => Some(source),
                Err(e) => {
                    log::warn!("Script url {} unreadable: {}", path.display(), e);
                    None
                }
            }
        })
    }

    fn script(&mut self, decl: &ScriptDecl) {
        let name = decl.naming.def.clone().unwrap_or_default();
        let fields = decl
            .fields
            .iter()
            .map(|f| Field::new(f.name.as_str(), f.access_type, f.field_type))
            .collect();
        let source = self.script_source(decl);
        let mut script = ScriptObject::new(name.as_str(), fields, source.clone().unwrap_or_default());
        script.urls = decl.url.clone();
        script.direct_output = decl.direct_output;
        script.must_evaluate = decl.must_evaluate;

        match source {
            Some(source) => {
                if let Err(e) = self.rt.host.load(&name, &source) {
                    log::warn!("{}", e);
                    script.state = ScriptState::Failed;
                } else if let Some(arity) = script
                    .entry_function()
                    .and_then(|entry| self.rt.host.entry_arity(&name, entry))
                {
                    script.set_timestamp_parameter(arity > 1);
                }
            }
            None => {
                log::warn!("Script '{}' has no source", name);
                script.state = ScriptState::Failed;
            }
        }
        self.rt.registries.scripts.insert(script);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BehaviorConfig;
    use crate::declarations::parse_declarations;
    use crate::events::MessageQueue;

    fn load(json: &str) -> (Runtime, Vec<Route>) {
        let mut rt = Runtime::new(BehaviorConfig::default(), MessageQueue::new().sender());
        let decls = parse_declarations(json).unwrap();
        let routes = SceneLoader::new(&mut rt, None).load(&decls);
        (rt, routes)
    }

    #[test]
    fn test_light_angles_stored_in_degrees() {
        let (rt, _) = load(
            r#"[{ "node": "SpotLight", "DEF": "Spot", "beamWidth": 0.5, "cutOffAngle": 1.0,
                  "direction": [0, -1, 0] }]"#,
        );
        let item = rt.registries.items.find("spot").unwrap();
        let node = rt.registries.items.get(item).unwrap().node.unwrap();
        let light = rt.scene.node(node).unwrap().light.as_ref().unwrap();
        assert!((light.beam_width_deg - 28.647_89).abs() < 1e-3);
        assert!((light.cut_off_angle_deg - 57.295_78).abs() < 1e-3);
        assert_eq!(
            rt.scene.node(node).unwrap().transform.rotation,
            direction_to_orientation(Vec3::new(0.0, -1.0, 0.0))
        );
    }

    #[test]
    fn test_which_choice_clamped_at_load() {
        let (rt, _) = load(
            r#"[{ "node": "Switch", "DEF": "Sw", "whichChoice": 7, "children": [
                  { "node": "Shape" }, { "node": "Shape" } ] }]"#,
        );
        let node = rt.scene.find_node("Sw").unwrap();
        assert_eq!(rt.scene.node(node).unwrap().switch.unwrap().which_choice, 2);
    }

    #[test]
    fn test_sensor_owner_subtree_pickable() {
        let (rt, _) = load(
            r#"[{ "node": "Transform", "DEF": "Door", "children": [
                  { "node": "TouchSensor", "DEF": "Knob" },
                  { "node": "Shape", "DEF": "Panel", "geometry": "Box" } ] },
                { "node": "Shape", "DEF": "Other" }]"#,
        );
        let sensor = rt.registries.sensors.find("knob").unwrap();
        let owner = rt.registries.sensors.get(sensor).unwrap().owner.unwrap();
        assert_eq!(Some(owner), rt.scene.find_node("Door"));
        let panel = rt.scene.find_node("Panel").unwrap();
        assert!(rt.scene.node(panel).unwrap().pickable);
        let other = rt.scene.find_node("Other").unwrap();
        assert!(!rt.scene.node(other).unwrap().pickable);
    }

    #[test]
    fn test_anchor_creates_interactive_object() {
        let (rt, _) = load(
            r#"[{ "node": "Anchor", "DEF": "Link", "url": ["https://example.org"],
                  "description": "home", "children": [ { "node": "Shape" } ] }]"#,
        );
        assert_eq!(rt.objects.len(), 1);
        let sensor = rt.objects[0].sensor().unwrap();
        let anchor = rt.registries.sensors.get(sensor).unwrap();
        assert_eq!(anchor.kind, SensorKind::Anchor);
        assert_eq!(anchor.anchor.as_ref().unwrap().url, "https://example.org");
    }

    #[test]
    fn test_use_shares_material_and_clones_nodes() {
        let (rt, _) = load(
            r#"[{ "node": "Transform", "DEF": "Tree", "children": [
                  { "node": "Shape", "DEF": "Leaf",
                    "appearance": { "material": { "DEF": "Green", "diffuseColor": [0, 1, 0] } } } ] },
                { "node": "Shape", "DEF": "Bush",
                  "appearance": { "material": { "USE": "green" } } },
                { "node": "Transform", "USE": "Tree" }]"#,
        );
        let leaf = rt.registries.items.find("Leaf").unwrap();
        let bush = rt.registries.items.find("Bush").unwrap();
        assert_eq!(
            rt.registries.items.get(leaf).unwrap().material,
            rt.registries.items.get(bush).unwrap().material
        );
        let trees = rt.scene.nodes().filter(|(_, n)| n.name == "Tree").count();
        assert_eq!(trees, 2);
    }

    #[test]
    fn test_time_sensor_and_interpolator_defaults() {
        let (rt, routes) = load(
            r#"[{ "node": "TimeSensor", "DEF": "Clock", "cycleInterval": -3 },
                { "node": "PositionInterpolator", "DEF": "Path",
                  "key": [0, 1], "keyValue": [0, 0, 0, 1, 1, 1, 9] },
                { "node": "ROUTE", "fromNode": "Clock", "fromField": "fraction_changed",
                  "toNode": "Path", "toField": "set_fraction" }]"#,
        );
        let clock = rt.registries.time_sensors.find("clock").unwrap();
        let clock = rt.registries.time_sensors.get(clock).unwrap();
        assert_eq!(clock.cycle_interval(), 1.0);
        assert!(clock.enabled);
        assert!(!clock.looping);
        let path = rt.registries.interpolators.find("path").unwrap();
        assert_eq!(rt.registries.interpolators.get(path).unwrap().key_count(), 2);
        assert_eq!(routes.len(), 1);
    }

    #[test]
    fn test_script_without_source_fails() {
        let (rt, _) = load(
            r#"[{ "node": "Script", "DEF": "Broken", "url": ["missing.rhai"],
                  "fields": [ { "name": "go", "type": "SFBool" } ] },
                { "node": "Script", "DEF": "Bad", "source": "fn go(v) {",
                  "fields": [ { "name": "go", "type": "SFBool" } ] },
                { "node": "Script", "DEF": "Good", "source": "fn go(v) { }",
                  "fields": [ { "name": "go", "type": "SFBool" } ] }]"#,
        );
        let state = |name: &str| {
            let id = rt.registries.scripts.find(name).unwrap();
            rt.registries.scripts.get(id).unwrap().state
        };
        assert_eq!(state("Broken"), ScriptState::Failed);
        assert_eq!(state("Bad"), ScriptState::Failed);
        assert_eq!(state("Good"), ScriptState::Loaded);
    }

    #[test]
    fn test_timestamp_slot_follows_compiled_entry() {
        let (rt, _) = load(
            r#"[{ "node": "Script", "DEF": "Stamped", "source": "fn onclick(over, ts) { }",
                  "fields": [ { "name": "onClick", "type": "SFBool" } ] },
                { "node": "Script", "DEF": "Plain",
                  "source": "// fn onClick(over, ts)\nfn onclick(over) { }",
                  "fields": [ { "name": "onClick", "type": "SFBool" } ] }]"#,
        );
        let script = |name: &str| {
            let id = rt.registries.scripts.find(name).unwrap();
            rt.registries.scripts.get(id).unwrap().clone()
        };
        assert!(script("Stamped").timestamp_parameter);
        assert!(!script("Plain").timestamp_parameter);
        assert_eq!(script("Plain").constructor.arity, 1);
    }

    #[test]
    fn test_texture_transform_stored_in_texture_space() {
        let (rt, _) = load(
            r#"[{ "node": "Shape", "DEF": "Poster", "appearance": {
                  "texture": { "DEF": "Img", "url": ["poster.png"] },
                  "textureTransform": { "translation": [0.5, 0.25], "center": [0.1, 0.2] } } }]"#,
        );
        let item = rt.registries.items.find("Poster").unwrap();
        let material = rt.registries.items.get(item).unwrap().material.unwrap();
        let material = rt.scene.material(material).unwrap();
        assert!(material.texture.is_some());
        assert_eq!(material.texture_transform().translation, Vec2::new(0.5, -0.25));
        assert_eq!(material.texture_transform().center, Vec2::new(-0.1, 0.2));
        assert_eq!(material.texture_matrix(), material.texture_transform().matrix());
    }
}
