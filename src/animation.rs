//! Baked keyframe animations and the animator that plays them.
//!
//! Times are in ticks. A TimeSensor with cycle interval `c` played at tick
//! rate `F` gives an animation of `c * F` ticks, and an interpolator key `k`
//! lands at tick `k * c * F`.

use glam::{Quat, Vec3};

use crate::ids::{AnimationId, NodeId};
use crate::math::AxisAngle;
use crate::nodes::{Interpolator, InterpolatorKind};
use crate::scene_graph::SceneGraph;

/// Which transform component a channel drives, picked from the ROUTE's
/// target field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelTarget {
    Translation,
    Rotation,
    Scale,
}

impl ChannelTarget {
    pub fn from_field(to_field: &str) -> Option<Self> {
        let field = to_field.trim().to_ascii_lowercase();
        if field.ends_with("translation") || field.ends_with("position") {
            Some(ChannelTarget::Translation)
        } else if field.ends_with("rotation") || field.ends_with("orientation") {
            Some(ChannelTarget::Rotation)
        } else if field.ends_with("scale") {
            Some(ChannelTarget::Scale)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Key<T> {
    pub time: f32,
    pub value: T,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Channel {
    Translation(Vec<Key<Vec3>>),
    Rotation(Vec<Key<Quat>>),
    Scale(Vec<Key<Vec3>>),
}

impl Channel {
    /// Sample an interpolator into a channel at `ticks_per_second`.
    ///
    /// Returns `None` when the interpolator's width doesn't fit the target
    /// (rotation needs an orientation interpolator and vice versa).
    pub fn bake(
        interpolator: &Interpolator,
        target: ChannelTarget,
        cycle_interval: f32,
        ticks_per_second: f32,
    ) -> Option<Self> {
        let time = |j: usize| interpolator.keys[j] * cycle_interval * ticks_per_second;
        let count = interpolator.key_count();
        let vec3 = |j: usize| {
            let v = interpolator.value(j);
            Vec3::new(v[0], v[1], v[2])
        };
        match (interpolator.kind, target) {
            (InterpolatorKind::Position, ChannelTarget::Translation) => Some(Channel::Translation(
                (0..count).map(|j| Key { time: time(j), value: vec3(j) }).collect(),
            )),
            (InterpolatorKind::Position, ChannelTarget::Scale) => Some(Channel::Scale(
                (0..count).map(|j| Key { time: time(j), value: vec3(j) }).collect(),
            )),
            (InterpolatorKind::Orientation, ChannelTarget::Rotation) => Some(Channel::Rotation(
                (0..count)
                    .map(|j| {
                        let v = interpolator.value(j);
                        Key {
                            time: time(j),
                            value: AxisAngle::from_array([v[0], v[1], v[2], v[3]]).to_quat(),
                        }
                    })
                    .collect(),
            )),
            _ => None,
        }
    }

    pub fn key_times(&self) -> Vec<f32> {
        match self {
            Channel::Translation(keys) | Channel::Scale(keys) => keys.iter().map(|k| k.time).collect(),
            Channel::Rotation(keys) => keys.iter().map(|k| k.time).collect(),
        }
    }

    fn apply(&self, tick: f32, scene: &mut SceneGraph, node: NodeId) {
        let Some(node) = scene.node_mut(node) else {
            return;
        };
        match self {
            Channel::Translation(keys) => {
                if let Some(v) = sample(keys, tick, |a, b, t| a.lerp(b, t)) {
                    node.transform.translation = v;
                }
            }
            Channel::Scale(keys) => {
                if let Some(v) = sample(keys, tick, |a, b, t| a.lerp(b, t)) {
                    node.transform.scale = v;
                }
            }
            Channel::Rotation(keys) => {
                if let Some(q) = sample(keys, tick, |a, b, t| a.slerp(b, t)) {
                    node.transform.rotation = q;
                }
            }
        }
    }
}

/// Piecewise sample, clamped to the first and last key.
fn sample<T: Copy>(keys: &[Key<T>], tick: f32, mix: impl Fn(T, T, f32) -> T) -> Option<T> {
    let first = keys.first()?;
    let last = keys.last()?;
    if tick <= first.time {
        return Some(first.value);
    }
    if tick >= last.time {
        return Some(last.value);
    }
    let next = keys.iter().position(|k| k.time > tick)?;
    let (a, b) = (keys[next - 1], keys[next]);
    let span = b.time - a.time;
    let t = if span > 0.0 { (tick - a.time) / span } else { 1.0 };
    Some(mix(a.value, b.value, t))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatMode {
    /// Play once and hold the last frame.
    Once,
    Loop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Finished,
}

#[derive(Debug, Clone)]
pub struct KeyframeAnimation {
    pub id: AnimationId,
    pub name: String,
    pub target: NodeId,
    pub channel: Channel,
    /// Length in ticks.
    pub duration: f32,
    pub ticks_per_second: f32,
    pub repeat: RepeatMode,
    pub state: PlaybackState,
    elapsed: f32,
}

impl KeyframeAnimation {
    pub fn elapsed_ticks(&self) -> f32 {
        self.elapsed
    }
}

/// Owns every animation of one scene session. Ids are indices into this
/// arena, so a fresh animator starts numbering from zero.
#[derive(Debug, Default)]
pub struct Animator {
    animations: Vec<KeyframeAnimation>,
    autoplay: Vec<AnimationId>,
}

impl Animator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(
        &mut self,
        target_name: &str,
        target: NodeId,
        channel: Channel,
        cycle_interval: f32,
        ticks_per_second: f32,
        repeat: RepeatMode,
    ) -> AnimationId {
        let id = AnimationId(self.animations.len());
        self.animations.push(KeyframeAnimation {
            id,
            name: format!("{}_KeyFrameAnimation_{}", target_name, id.0),
            target,
            channel,
            duration: cycle_interval * ticks_per_second,
            ticks_per_second,
            repeat,
            state: PlaybackState::Stopped,
            elapsed: 0.0,
        });
        id
    }

    pub fn get(&self, id: AnimationId) -> Option<&KeyframeAnimation> {
        self.animations.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeyframeAnimation> {
        self.animations.iter()
    }

    pub fn len(&self) -> usize {
        self.animations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.animations.is_empty()
    }

    /// Queue an animation to start when the scene becomes active.
    pub fn autoplay(&mut self, id: AnimationId) {
        self.autoplay.push(id);
    }

    pub fn start_autoplay(&mut self) {
        for id in std::mem::take(&mut self.autoplay) {
            self.start(id);
        }
    }

    /// Start from the beginning.
    pub fn start(&mut self, id: AnimationId) {
        if let Some(animation) = self.animations.get_mut(id.0) {
            animation.elapsed = 0.0;
            animation.state = PlaybackState::Playing;
            log::debug!("Starting animation {}", animation.name);
        }
    }

    pub fn is_playing(&self, id: AnimationId) -> bool {
        self.get(id)
            .map(|a| a.state == PlaybackState::Playing)
            .unwrap_or(false)
    }

    pub fn set_repeat(&mut self, id: AnimationId, repeat: RepeatMode) {
        if let Some(animation) = self.animations.get_mut(id.0) {
            animation.repeat = repeat;
        }
    }

    /// Advance every playing animation by `dt` seconds and write the sampled
    /// values into the scene.
    pub fn step(&mut self, dt: f32, scene: &mut SceneGraph) {
        for animation in &mut self.animations {
            if animation.state != PlaybackState::Playing {
                continue;
            }
            animation.elapsed += dt * animation.ticks_per_second;
            if animation.elapsed >= animation.duration {
                match animation.repeat {
                    RepeatMode::Loop if animation.duration > 0.0 => {
                        animation.elapsed %= animation.duration;
                    }
                    _ => {
                        animation.elapsed = animation.duration;
                        animation.state = PlaybackState::Finished;
                    }
                }
            }
            animation
                .channel
                .apply(animation.elapsed, scene, animation.target);
        }
    }
}
