//! Scene graph store that behaviors read from and write to.
//!
//! This is the property surface of the host engine: node hierarchy,
//! transforms, lights, materials, textures, media and text objects, and
//! viewpoints. Rendering happens elsewhere; this store only holds state.

use glam::{Mat3, Quat, Vec3};

use crate::ids::{MaterialId, MediaId, MeshId, NodeId, TextId, TextureId, ViewpointId};
use crate::math::TextureTransform;

/// Local transform of a node.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
    pub center: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
            center: Vec3::ZERO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightKind {
    Point,
    Spot,
    Directional,
}

/// Light component. Cone angles are kept in degrees, the host's unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub on: bool,
    pub color: Vec3,
    pub intensity: f32,
    pub attenuation: Vec3,
    pub location: Vec3,
    /// As declared. The owning node's rotation is derived from it.
    pub direction: Vec3,
    pub beam_width_deg: f32,
    pub cut_off_angle_deg: f32,
    pub radius: f32,
}

impl Light {
    pub fn new(kind: LightKind) -> Self {
        Self {
            kind,
            on: true,
            color: Vec3::ONE,
            intensity: 1.0,
            attenuation: Vec3::new(1.0, 0.0, 0.0),
            location: Vec3::ZERO,
            direction: Vec3::new(0.0, 0.0, -1.0),
            beam_width_deg: 90.0,
            cut_off_angle_deg: 45.0,
            radius: 100.0,
        }
    }

    pub fn has_location(&self) -> bool {
        matches!(self.kind, LightKind::Point | LightKind::Spot)
    }

    pub fn has_direction(&self) -> bool {
        matches!(self.kind, LightKind::Spot | LightKind::Directional)
    }
}

/// Switch grouping: `which_choice` is always in `0..=child_count`, where
/// `child_count` means "no child visible".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Switch {
    pub which_choice: i32,
}

#[derive(Debug, Clone, Default)]
pub struct SceneNode {
    pub name: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub transform: Transform,
    pub visible: bool,
    /// A collider is attached and the node can be picked.
    pub pickable: bool,
    pub light: Option<Light>,
    pub switch: Option<Switch>,
    pub mesh: Option<MeshId>,
    pub material: Option<MaterialId>,
    pub media: Option<MediaId>,
    pub text: Option<TextId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub geometry: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub diffuse_color: Vec3,
    pub specular_color: Vec3,
    pub emissive_color: Vec3,
    pub shininess: f32,
    pub transparency: f32,
    pub texture: Option<TextureId>,
    pub(crate) texture_transform: TextureTransform,
    pub(crate) texture_matrix: Mat3,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            diffuse_color: Vec3::splat(0.8),
            specular_color: Vec3::ZERO,
            emissive_color: Vec3::ZERO,
            shininess: 0.2,
            transparency: 0.0,
            texture: None,
            texture_transform: TextureTransform::default(),
            texture_matrix: Mat3::IDENTITY,
        }
    }
}

impl Material {
    pub fn texture_transform(&self) -> &TextureTransform {
        &self.texture_transform
    }

    pub fn texture_matrix(&self) -> Mat3 {
        self.texture_matrix
    }

    /// Replace the texture transform components and recompute the matrix.
    pub fn set_texture_transform(&mut self, transform: TextureTransform) {
        self.texture_transform = transform;
        self.texture_matrix = transform.matrix();
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TextureState {
    Ready,
    Pending,
    Loaded(usize),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    pub urls: Vec<String>,
    pub state: TextureState,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Stopped,
    Playing,
    Paused,
}

/// A movie/audio source. Decoding is external; this tracks playback state.
#[derive(Debug, Clone, PartialEq)]
pub struct MediaObject {
    pub urls: Vec<String>,
    pub state: MediaState,
    pub position_ms: f64,
    pub duration_ms: f64,
    pub speed: f32,
    pub pitch: f32,
    pub looping: bool,
}

impl MediaObject {
    pub fn new(urls: Vec<String>) -> Self {
        Self {
            urls,
            state: MediaState::Stopped,
            position_ms: 0.0,
            duration_ms: 0.0,
            speed: 1.0,
            pitch: 1.0,
            looping: false,
        }
    }

    pub fn play(&mut self) {
        self.state = MediaState::Playing;
    }

    pub fn pause(&mut self) {
        if self.state == MediaState::Playing {
            self.state = MediaState::Paused;
        }
    }

    pub fn stop(&mut self) {
        self.state = MediaState::Stopped;
        self.position_ms = 0.0;
    }

    pub fn seek(&mut self, position_ms: f64) {
        self.position_ms = position_ms.max(0.0);
    }

    /// Switch to a new source and start it from the beginning.
    pub fn reload(&mut self, urls: Vec<String>) {
        self.stop();
        self.urls = urls;
        self.play();
    }

    /// Advance the playback clock.
    pub fn advance(&mut self, dt: f32) {
        if self.state != MediaState::Playing {
            return;
        }
        self.position_ms += dt as f64 * 1000.0 * self.speed as f64;
        if self.duration_ms > 0.0 && self.position_ms >= self.duration_ms {
            if self.looping {
                self.position_ms %= self.duration_ms;
            } else {
                self.position_ms = self.duration_ms;
                self.state = MediaState::Stopped;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FontStyle {
    #[default]
    Plain,
    Bold,
    Italic,
    BoldItalic,
}

impl FontStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "PLAIN" => Some(FontStyle::Plain),
            "BOLD" => Some(FontStyle::Bold),
            "ITALIC" => Some(FontStyle::Italic),
            "BOLDITALIC" => Some(FontStyle::BoldItalic),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FontStyle::Plain => "PLAIN",
            FontStyle::Bold => "BOLD",
            FontStyle::Italic => "ITALIC",
            FontStyle::BoldItalic => "BOLDITALIC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextObject {
    pub lines: Vec<String>,
    pub family: String,
    pub style: FontStyle,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Viewpoint {
    pub name: String,
    pub position: Vec3,
    pub orientation: Quat,
    pub description: String,
}

/// The scene store. Node 0 is the root.
#[derive(Debug, Clone)]
pub struct SceneGraph {
    nodes: Vec<SceneNode>,
    meshes: Vec<Mesh>,
    materials: Vec<Material>,
    textures: Vec<Texture>,
    media: Vec<MediaObject>,
    texts: Vec<TextObject>,
    viewpoints: Vec<Viewpoint>,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    pub fn new() -> Self {
        let root = SceneNode {
            name: "root".to_string(),
            visible: true,
            ..Default::default()
        };
        Self {
            nodes: vec![root],
            meshes: Vec::new(),
            materials: Vec::new(),
            textures: Vec::new(),
            media: Vec::new(),
            texts: Vec::new(),
            viewpoints: Vec::new(),
        }
    }

    pub fn root(&self) -> NodeId {
        NodeId(0)
    }

    /// Create a node under `parent`.
    pub fn add_node(&mut self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(SceneNode {
            name: name.into(),
            parent: Some(parent),
            visible: true,
            ..Default::default()
        });
        if let Some(parent) = self.nodes.get_mut(parent.0) {
            parent.children.push(id);
        }
        id
    }

    pub fn node(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id.0)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut SceneNode> {
        self.nodes.get_mut(id.0)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &SceneNode)> {
        self.nodes.iter().enumerate().map(|(i, n)| (NodeId(i), n))
    }

    pub fn find_node(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .position(|n| n.name.eq_ignore_ascii_case(name))
            .map(NodeId)
    }

    /// All nodes below `id`, depth first, not including `id` itself.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self
            .node(id)
            .map(|n| n.children.iter().rev().copied().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            out.push(next);
            if let Some(node) = self.node(next) {
                stack.extend(node.children.iter().rev().copied());
            }
        }
        out
    }

    /// Mark `owner` and its subtree as pickable.
    pub fn attach_colliders(&mut self, owner: NodeId) {
        let mut targets = self.descendants(owner);
        targets.push(owner);
        for id in targets {
            if let Some(node) = self.node_mut(id) {
                node.pickable = true;
            }
        }
    }

    /// Deep-copy the subtree at `source` under `parent`. Materials, meshes,
    /// textures and media stay shared with the original.
    pub fn clone_subtree(&mut self, source: NodeId, parent: NodeId) -> Option<NodeId> {
        let template = self.node(source)?.clone();
        let copy = self.add_node(parent, template.name.clone());
        if let Some(node) = self.node_mut(copy) {
            node.transform = template.transform;
            node.visible = template.visible;
            node.light = template.light;
            node.switch = template.switch;
            node.mesh = template.mesh;
            node.material = template.material;
            node.media = template.media;
            node.text = template.text;
        }
        for child in template.children {
            self.clone_subtree(child, copy);
        }
        Some(copy)
    }

    /// Set a switch's active child, clamping out-of-range values to the
    /// child count. Returns the stored index.
    pub fn set_which_choice(&mut self, id: NodeId, value: i32) -> Option<i32> {
        let node = self.node_mut(id)?;
        let count = node.children.len() as i32;
        let clamped = if value < 0 || value >= count { count } else { value };
        node.switch.get_or_insert_with(Switch::default).which_choice = clamped;
        Some(clamped)
    }

    pub fn add_mesh(&mut self, geometry: impl Into<String>) -> MeshId {
        self.meshes.push(Mesh {
            geometry: geometry.into(),
        });
        MeshId(self.meshes.len() - 1)
    }

    pub fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    pub fn add_material(&mut self, material: Material) -> MaterialId {
        self.materials.push(material);
        MaterialId(self.materials.len() - 1)
    }

    pub fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    pub fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    pub fn add_texture(&mut self, urls: Vec<String>) -> TextureId {
        self.textures.push(Texture {
            urls,
            state: TextureState::Ready,
        });
        TextureId(self.textures.len() - 1)
    }

    pub fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0)
    }

    pub fn texture_mut(&mut self, id: TextureId) -> Option<&mut Texture> {
        self.textures.get_mut(id.0)
    }

    pub fn add_media(&mut self, media: MediaObject) -> MediaId {
        self.media.push(media);
        MediaId(self.media.len() - 1)
    }

    pub fn media(&self, id: MediaId) -> Option<&MediaObject> {
        self.media.get(id.0)
    }

    pub fn media_mut(&mut self, id: MediaId) -> Option<&mut MediaObject> {
        self.media.get_mut(id.0)
    }

    pub fn media_objects_mut(&mut self) -> impl Iterator<Item = &mut MediaObject> {
        self.media.iter_mut()
    }

    pub fn add_text(&mut self, text: TextObject) -> TextId {
        self.texts.push(text);
        TextId(self.texts.len() - 1)
    }

    pub fn text(&self, id: TextId) -> Option<&TextObject> {
        self.texts.get(id.0)
    }

    pub fn text_mut(&mut self, id: TextId) -> Option<&mut TextObject> {
        self.texts.get_mut(id.0)
    }

    pub fn add_viewpoint(&mut self, viewpoint: Viewpoint) -> ViewpointId {
        self.viewpoints.push(viewpoint);
        ViewpointId(self.viewpoints.len() - 1)
    }

    pub fn viewpoint(&self, id: ViewpointId) -> Option<&Viewpoint> {
        self.viewpoints.get(id.0)
    }

    pub fn viewpoint_mut(&mut self, id: ViewpointId) -> Option<&mut Viewpoint> {
        self.viewpoints.get_mut(id.0)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_node_links_parent() {
        let mut scene = SceneGraph::new();
        let root = scene.root();
        let child = scene.add_node(root, "child");
        assert_eq!(scene.node(child).unwrap().parent, Some(root));
        assert_eq!(scene.node(root).unwrap().children, vec![child]);
        assert_eq!(scene.find_node("CHILD"), Some(child));
    }

    #[test]
    fn test_descendants_depth_first() {
        let mut scene = SceneGraph::new();
        let a = scene.add_node(scene.root(), "a");
        let b = scene.add_node(a, "b");
        let c = scene.add_node(b, "c");
        let d = scene.add_node(a, "d");
        assert_eq!(scene.descendants(a), vec![b, c, d]);
    }

    #[test]
    fn test_attach_colliders_marks_subtree() {
        let mut scene = SceneGraph::new();
        let owner = scene.add_node(scene.root(), "owner");
        let leaf = scene.add_node(owner, "leaf");
        let other = scene.add_node(scene.root(), "other");
        scene.attach_colliders(owner);
        assert!(scene.node(owner).unwrap().pickable);
        assert!(scene.node(leaf).unwrap().pickable);
        assert!(!scene.node(other).unwrap().pickable);
    }

    #[test]
    fn test_switch_clamp() {
        let mut scene = SceneGraph::new();
        let switch = scene.add_node(scene.root(), "switch");
        for i in 0..3 {
            scene.add_node(switch, format!("choice{}", i));
        }
        assert_eq!(scene.set_which_choice(switch, 1), Some(1));
        assert_eq!(scene.set_which_choice(switch, 7), Some(3));
        assert_eq!(scene.set_which_choice(switch, -1), Some(3));
        assert_eq!(scene.node(switch).unwrap().switch.unwrap().which_choice, 3);
    }

    #[test]
    fn test_clone_subtree_shares_material() {
        let mut scene = SceneGraph::new();
        let material = scene.add_material(Material::default());
        let shape = scene.add_node(scene.root(), "shape");
        scene.node_mut(shape).unwrap().material = Some(material);
        scene.add_node(shape, "inner");

        let copy = scene.clone_subtree(shape, scene.root()).unwrap();
        assert_ne!(copy, shape);
        assert_eq!(scene.node(copy).unwrap().material, Some(material));
        assert_eq!(scene.node(copy).unwrap().children.len(), 1);
    }

    #[test]
    fn test_media_controls() {
        let mut media = MediaObject::new(vec!["clip.mp4".into()]);
        media.duration_ms = 1000.0;
        media.play();
        media.advance(0.5);
        assert!((media.position_ms - 500.0).abs() < 1e-6);
        media.pause();
        assert_eq!(media.state, MediaState::Paused);
        media.stop();
        assert_eq!(media.position_ms, 0.0);
        media.reload(vec!["other.mp4".into()]);
        assert_eq!(media.state, MediaState::Playing);
        assert_eq!(media.urls, vec!["other.mp4".to_string()]);
    }

    #[test]
    fn test_font_style_parse() {
        assert_eq!(FontStyle::parse("bolditalic"), Some(FontStyle::BoldItalic));
        assert_eq!(FontStyle::parse("heavy"), None);
        assert_eq!(FontStyle::Bold.as_str(), "BOLD");
    }
}
