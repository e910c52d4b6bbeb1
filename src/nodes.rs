//! Leaf behavior nodes: sensors, timers, interpolators and toggles.

use glam::Vec3;

use crate::ids::{AnimationId, NodeId};
use crate::registry::Named;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Anchor,
    Touch,
    Plane,
    Cylinder,
    Sphere,
    Proximity,
    Visibility,
}

/// Where an Anchor leads.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnchorTarget {
    pub url: String,
    pub description: String,
    pub parameter: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Sensor {
    pub name: String,
    pub kind: SensorKind,
    /// Grouping node whose subtree is picked.
    pub owner: Option<NodeId>,
    pub enabled: bool,
    pub hit_point: Vec3,
    /// Only set for [`SensorKind::Anchor`].
    pub anchor: Option<AnchorTarget>,
}

impl Sensor {
    pub fn new(name: impl Into<String>, kind: SensorKind, owner: Option<NodeId>) -> Self {
        Self {
            name: name.into(),
            kind,
            owner,
            enabled: true,
            hit_point: Vec3::ZERO,
            anchor: None,
        }
    }

    pub fn anchor(name: impl Into<String>, owner: NodeId, target: AnchorTarget) -> Self {
        Self {
            anchor: Some(target),
            ..Self::new(name, SensorKind::Anchor, Some(owner))
        }
    }
}

impl Named for Sensor {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Cyclic timer. Only `cycle_interval`, `looping` and `enabled` affect
/// playback; the start/stop/pause/resume times are stored as declared.
#[derive(Debug, Clone)]
pub struct TimeSensor {
    pub name: String,
    cycle_interval: f32,
    pub enabled: bool,
    pub looping: bool,
    pub start_time: f64,
    pub stop_time: f64,
    pub pause_time: f64,
    pub resume_time: f64,
    /// Animations baked from this timer.
    pub animations: Vec<AnimationId>,
}

impl TimeSensor {
    pub fn new(name: impl Into<String>, cycle_interval: f32) -> Self {
        let mut sensor = Self {
            name: name.into(),
            cycle_interval: 1.0,
            enabled: true,
            looping: false,
            start_time: 0.0,
            stop_time: 0.0,
            pause_time: 0.0,
            resume_time: 0.0,
            animations: Vec::new(),
        };
        sensor.set_cycle_interval(cycle_interval);
        sensor
    }

    pub fn cycle_interval(&self) -> f32 {
        self.cycle_interval
    }

    /// Non-positive intervals fall back to one second.
    pub fn set_cycle_interval(&mut self, seconds: f32) {
        self.cycle_interval = if seconds > 0.0 { seconds } else { 1.0 };
    }
}

impl Named for TimeSensor {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterpolatorKind {
    /// Three floats per key, used for translation and scale.
    Position,
    /// Axis-angle, four floats per key.
    Orientation,
}

impl InterpolatorKind {
    pub fn components(self) -> usize {
        match self {
            InterpolatorKind::Position => 3,
            InterpolatorKind::Orientation => 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Interpolator {
    pub name: String,
    pub kind: InterpolatorKind,
    pub keys: Vec<f32>,
    key_values: Vec<f32>,
}

impl Interpolator {
    /// Keys that lack a full value tuple are dropped, as are values
    /// beyond the last key.
    pub fn new(
        name: impl Into<String>,
        kind: InterpolatorKind,
        mut keys: Vec<f32>,
        mut key_values: Vec<f32>,
    ) -> Self {
        let name = name.into();
        let width = kind.components();
        let complete = key_values.len() / width;
        if key_values.len() % width != 0 || complete != keys.len() {
            log::warn!(
                "Interpolator '{}': {} keys but {} values of width {}; truncating",
                name,
                keys.len(),
                key_values.len(),
                width
            );
        }
        let count = complete.min(keys.len());
        keys.truncate(count);
        key_values.truncate(count * width);
        Self {
            name,
            kind,
            keys,
            key_values,
        }
    }

    pub fn key_count(&self) -> usize {
        self.keys.len()
    }

    /// The value tuple for key `index`.
    pub fn value(&self, index: usize) -> &[f32] {
        let width = self.kind.components();
        &self.key_values[index * width..(index + 1) * width]
    }
}

impl Named for Interpolator {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Boolean toggle cell (BooleanToggle).
#[derive(Debug, Clone)]
pub struct EventUtility {
    pub name: String,
    pub toggle: bool,
}

impl EventUtility {
    pub fn new(name: impl Into<String>, toggle: bool) -> Self {
        Self {
            name: name.into(),
            toggle,
        }
    }

    /// Invert and return the new value.
    pub fn flip(&mut self) -> bool {
        self.toggle = !self.toggle;
        self.toggle
    }
}

impl Named for EventUtility {
    fn name(&self) -> &str {
        &self.name
    }
}
