//! Mutable state shared by the event listeners, the marshaller and the
//! per-frame scheduler. Only ever touched from the frame callback.

use crate::anchor::{AnchorNavigator, LoggingNavigator};
use crate::animation::{Animator, RepeatMode};
use crate::assets::AssetLoader;
use crate::config::BehaviorConfig;
use crate::events::EventSender;
use crate::ids::TimeSensorId;
use crate::interactive::InteractiveObject;
use crate::registry::Registries;
use crate::scene_graph::SceneGraph;
use crate::scripting::{RhaiScriptHost, ScriptHost};

pub struct Runtime {
    pub config: BehaviorConfig,
    pub scene: SceneGraph,
    pub registries: Registries,
    pub objects: Vec<InteractiveObject>,
    pub animator: Animator,
    pub host: Box<dyn ScriptHost>,
    pub assets: AssetLoader,
    pub navigator: Box<dyn AnchorNavigator>,
    /// Seconds since the scene became active.
    pub clock: f64,
}

impl Runtime {
    pub fn new(config: BehaviorConfig, sender: EventSender) -> Self {
        let host = RhaiScriptHost::new(&config.sandbox);
        Self {
            config,
            scene: SceneGraph::new(),
            registries: Registries::default(),
            objects: Vec::new(),
            animator: Animator::new(),
            host: Box::new(host),
            assets: AssetLoader::new(sender, None),
            navigator: Box::new(LoggingNavigator::default()),
            clock: 0.0,
        }
    }

    /// Re-derive the repeat mode of every animation a TimeSensor drives.
    /// A disabled timer lets its animations run to the end and stop there.
    pub fn sync_repeat_mode(&mut self, time_sensor: TimeSensorId) {
        let Some(ts) = self.registries.time_sensors.get(time_sensor) else {
            return;
        };
        let mode = if ts.enabled && ts.looping {
            RepeatMode::Loop
        } else {
            RepeatMode::Once
        };
        for id in ts.animations.clone() {
            self.animator.set_repeat(id, mode);
        }
    }
}
