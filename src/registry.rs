//! Named-entity registries, including the DEF/USE symbol table.

use std::marker::PhantomData;

use glam::Vec3;

use crate::ids::{
    EventUtilityId, InterpolatorId, ItemId, MaterialId, MediaId, MeshId, NodeId, ScriptId,
    SensorId, TextId, TextureId, TimeSensorId, ViewpointId,
};
use crate::math::AxisAngle;
use crate::nodes::{EventUtility, Interpolator, Sensor, TimeSensor};
use crate::script_object::ScriptObject;

/// Anything with a DEF name.
pub trait Named {
    fn name(&self) -> &str;
}

/// Append-only store with case-insensitive name lookup. The first entry
/// with a given name wins lookups.
#[derive(Debug, Clone)]
pub struct Registry<I, T> {
    items: Vec<T>,
    _id: PhantomData<I>,
}

impl<I, T> Default for Registry<I, T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            _id: PhantomData,
        }
    }
}

impl<I, T> Registry<I, T>
where
    I: From<usize> + Into<usize> + Copy,
    T: Named,
{
    pub fn insert(&mut self, item: T) -> I {
        if self.find(item.name()).is_some() {
            log::warn!("Duplicate DEF name '{}'; lookups keep the first", item.name());
        }
        self.items.push(item);
        I::from(self.items.len() - 1)
    }

    pub fn find(&self, name: &str) -> Option<I> {
        self.items
            .iter()
            .position(|item| item.name().eq_ignore_ascii_case(name))
            .map(I::from)
    }

    pub fn get(&self, id: I) -> Option<&T> {
        self.items.get(id.into())
    }

    pub fn get_mut(&mut self, id: I) -> Option<&mut T> {
        self.items.get_mut(id.into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (I, &T)> {
        self.items.iter().enumerate().map(|(i, item)| (I::from(i), item))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Symbol-table entry for a DEF'd scene entity.
///
/// The host keeps rotations as quaternions, but scripts read and write
/// axis-angle, so the last axis-angle and direction are cached here.
#[derive(Debug, Clone, Default)]
pub struct DefinedItem {
    pub name: String,
    pub node: Option<NodeId>,
    pub mesh: Option<MeshId>,
    pub material: Option<MaterialId>,
    pub texture: Option<TextureId>,
    pub media: Option<MediaId>,
    pub text: Option<TextId>,
    pub viewpoint: Option<ViewpointId>,
    pub axis_angle: AxisAngle,
    pub direction: Vec3,
}

impl DefinedItem {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: Vec3::new(0.0, 0.0, -1.0),
            ..Default::default()
        }
    }
}

impl Named for DefinedItem {
    fn name(&self) -> &str {
        &self.name
    }
}

pub type SymbolTable = Registry<ItemId, DefinedItem>;

/// All leaf registries of one loaded scene.
#[derive(Debug, Default)]
pub struct Registries {
    pub items: SymbolTable,
    pub sensors: Registry<SensorId, Sensor>,
    pub time_sensors: Registry<TimeSensorId, TimeSensor>,
    pub interpolators: Registry<InterpolatorId, Interpolator>,
    pub event_utilities: Registry<EventUtilityId, EventUtility>,
    pub scripts: Registry<ScriptId, ScriptObject>,
}
