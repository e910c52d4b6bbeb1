//! Top-level driver: load a scene, wire it, and run it frame by frame.

use std::path::Path;

use anyhow::Context;

use crate::activation::{activate, Behavior};
use crate::anchor::AnchorNavigator;
use crate::animation::Animator;
use crate::assets::apply_texture_load;
use crate::config::BehaviorConfig;
use crate::declarations::{read_declarations, Declaration};
use crate::error::Result;
use crate::events::{EventSender, HostMessage, MessageQueue, SensorEvent};
use crate::ids::SensorId;
use crate::interactive::InteractiveObject;
use crate::loader::SceneLoader;
use crate::registry::Registries;
use crate::routing::{GraphBuilder, Route};
use crate::runtime::Runtime;
use crate::scene_graph::SceneGraph;
use crate::scheduler::FrameScheduler;
use crate::script_diagnostics::ScriptDiagnostic;
use crate::script_log;
use crate::scripting::ScriptHost;

const MAX_DIAGNOSTICS: usize = 64;

pub struct InteractivityManager {
    runtime: Runtime,
    scheduler: FrameScheduler,
    queue: MessageQueue,
    routes: Vec<Route>,
    behaviors: Vec<Behavior>,
    diagnostics: Vec<ScriptDiagnostic>,
    frame: u64,
}

impl InteractivityManager {
    pub fn new(config: BehaviorConfig) -> Result<Self> {
        config.validate()?;
        script_log::set_frame_log_limit(config.script_log_limit);
        let queue = MessageQueue::new();
        let scheduler = FrameScheduler::new(config.scheduler_mode);
        let runtime = Runtime::new(config, queue.sender());
        Ok(Self {
            runtime,
            scheduler,
            queue,
            routes: Vec::new(),
            behaviors: Vec::new(),
            diagnostics: Vec::new(),
            frame: 0,
        })
    }

    pub fn set_navigator(&mut self, navigator: Box<dyn AnchorNavigator>) {
        self.runtime.navigator = navigator;
    }

    /// Replace the script engine. Scripts loaded so far are not carried over.
    pub fn set_script_host(&mut self, host: Box<dyn ScriptHost>) {
        self.runtime.host = host;
    }

    /// Start a new scene session from a declaration stream. Everything from
    /// the previous scene is dropped, and id counters start over.
    pub fn load(&mut self, declarations: &[Declaration]) {
        self.load_with_base(declarations, None);
    }

    /// Load a JSON declaration file. Relative script and texture urls are
    /// resolved against its directory.
    pub fn load_file(&mut self, path: &Path) -> anyhow::Result<()> {
        let declarations = read_declarations(path)?;
        let base = path.parent().map(Path::to_path_buf);
        self.load_with_base(&declarations, base.as_deref());
        Ok(())
    }

    fn load_with_base(&mut self, declarations: &[Declaration], base_dir: Option<&Path>) {
        self.reset();
        self.runtime.assets.set_base_dir(base_dir.map(Path::to_path_buf));
        self.routes = SceneLoader::new(&mut self.runtime, base_dir).load(declarations);
    }

    fn reset(&mut self) {
        self.runtime.scene = SceneGraph::new();
        self.runtime.registries = Registries::default();
        self.runtime.host.clear();
        self.runtime.objects.clear();
        self.runtime.animator = Animator::new();
        self.runtime.clock = 0.0;
        self.scheduler = FrameScheduler::new(self.runtime.config.scheduler_mode);
        self.routes.clear();
        self.behaviors.clear();
        self.diagnostics.clear();
        self.frame = 0;
        self.queue.drain();
    }

    /// Resolve the ROUTEs into InteractiveObjects, then classify and
    /// activate each one. Returns how many routes resolved.
    pub fn finish_scene(&mut self) -> usize {
        let applied = {
            let rt = &mut self.runtime;
            GraphBuilder::new(&mut rt.registries, &mut rt.objects).apply_all(&self.routes)
        };
        self.behaviors = activate(&mut self.runtime, &mut self.scheduler);
        log::info!(
            "Scene wired: {}/{} routes, {} interactive objects, {} animations, {} per-frame scripts",
            applied,
            self.routes.len(),
            self.runtime.objects.len(),
            self.runtime.animator.len(),
            self.scheduler.slots().len()
        );
        self.collect_diagnostics();
        applied
    }

    /// Handle for delivering events from any thread.
    pub fn sender(&self) -> EventSender {
        self.queue.sender()
    }

    pub fn push_event(&self, event: SensorEvent) {
        if self.queue.sender().sensor(event).is_err() {
            log::warn!("Event queue closed; dropping sensor event");
        }
    }

    /// Advance the scene by `dt` seconds.
    pub fn frame(&mut self, dt: f32) {
        script_log::reset_frame_log_count();
        self.runtime.clock += dt as f64;

        for message in self.queue.drain() {
            match message {
                HostMessage::Sensor(event) => self.dispatch(&event),
                HostMessage::TextureLoaded(load) => {
                    apply_texture_load(&mut self.runtime.scene, load)
                }
            }
        }

        if self.frame == 0 {
            self.runtime.animator.start_autoplay();
        }
        self.scheduler.run_frame(dt, &mut self.runtime);

        let rt = &mut self.runtime;
        rt.animator.step(dt, &mut rt.scene);
        for media in rt.scene.media_objects_mut() {
            media.advance(dt);
        }
        for behavior in &mut self.behaviors {
            behavior.end_frame(&self.runtime);
        }
        self.collect_diagnostics();
        self.frame += 1;
    }

    /// Move script failures out of the host, keeping the most recent ones.
    fn collect_diagnostics(&mut self) {
        self.diagnostics.extend(self.runtime.host.take_diagnostics());
        if self.diagnostics.len() > MAX_DIAGNOSTICS {
            let excess = self.diagnostics.len() - MAX_DIAGNOSTICS;
            self.diagnostics.drain(0..excess);
        }
    }

    fn dispatch(&mut self, event: &SensorEvent) {
        let Some(sensor) = self.runtime.registries.sensors.get_mut(event.sensor) else {
            log::warn!("Event for unknown sensor {}", event.sensor);
            return;
        };
        if !sensor.enabled {
            log::debug!("Sensor '{}' disabled; event ignored", sensor.name);
            return;
        }
        sensor.hit_point = event.hit_point;
        for behavior in &mut self.behaviors {
            behavior.handle_event(event, &mut self.runtime);
        }
    }

    pub fn find_sensor(&self, name: &str) -> Option<SensorId> {
        self.runtime.registries.sensors.find(name)
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut Runtime {
        &mut self.runtime
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.runtime.scene
    }

    pub fn registries(&self) -> &Registries {
        &self.runtime.registries
    }

    pub fn objects(&self) -> &[InteractiveObject] {
        &self.runtime.objects
    }

    pub fn behaviors(&self) -> &[Behavior] {
        &self.behaviors
    }

    pub fn animator(&self) -> &Animator {
        &self.runtime.animator
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Script failures since the scene was loaded, oldest first.
    pub fn diagnostics(&self) -> &[ScriptDiagnostic] {
        &self.diagnostics
    }

    pub fn take_diagnostics(&mut self) -> Vec<ScriptDiagnostic> {
        std::mem::take(&mut self.diagnostics)
    }

    pub fn frame_count(&self) -> u64 {
        self.frame
    }
}

/// Load, wire and return a manager for a declaration file.
pub fn open_scene(path: &Path, config: BehaviorConfig) -> anyhow::Result<InteractivityManager> {
    let mut manager = InteractivityManager::new(config).context("Invalid behavior configuration")?;
    manager.load_file(path)?;
    manager.finish_scene();
    Ok(manager)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::declarations::parse_declarations;

    fn manager(json: &str) -> InteractivityManager {
        let mut manager = InteractivityManager::new(BehaviorConfig::default()).unwrap();
        manager.load(&parse_declarations(json).unwrap());
        manager.finish_scene();
        manager
    }

    #[test]
    fn test_disabled_sensor_ignored() {
        let mut m = manager(
            r#"[{ "node": "Group", "children": [
                  { "node": "TouchSensor", "DEF": "Off", "enabled": false },
                  { "node": "PointLight", "DEF": "Lamp", "on": false } ] },
                { "node": "ROUTE", "fromNode": "Off", "fromField": "isOver",
                  "toNode": "Lamp", "toField": "on" }]"#,
        );
        let sensor = m.find_sensor("Off").unwrap();
        m.push_event(SensorEvent::new(sensor, true, false));
        m.frame(1.0 / 60.0);
        let lamp = m.scene().find_node("Lamp").unwrap();
        assert!(!m.scene().node(lamp).unwrap().light.as_ref().unwrap().on);
    }

    #[test]
    fn test_reload_starts_new_session() {
        let json = r#"[{ "node": "Transform", "DEF": "Box" },
            { "node": "TimeSensor", "DEF": "Clock" },
            { "node": "PositionInterpolator", "DEF": "Path", "key": [0, 1],
              "keyValue": [0, 0, 0, 1, 0, 0] },
            { "node": "ROUTE", "fromNode": "Clock", "fromField": "fraction_changed",
              "toNode": "Path", "toField": "set_fraction" },
            { "node": "ROUTE", "fromNode": "Path", "fromField": "value_changed",
              "toNode": "Box", "toField": "set_translation" }]"#;
        let mut m = manager(json);
        assert_eq!(m.animator().len(), 1);
        m.frame(0.1);
        m.load(&parse_declarations(json).unwrap());
        m.finish_scene();
        assert_eq!(m.animator().len(), 1);
        assert_eq!(m.animator().iter().next().unwrap().id.0, 0);
        assert_eq!(m.frame_count(), 0);
    }

    #[test]
    fn test_script_failures_collected_per_session() {
        let json = r#"[{ "node": "Script", "DEF": "Bad", "source": "fn go(v) {",
              "fields": [ { "name": "go", "type": "SFBool" } ] },
            { "node": "Script", "DEF": "Good", "source": "fn go(v) { }",
              "fields": [ { "name": "go", "type": "SFBool" } ] }]"#;
        let mut m = manager(json);
        assert!(m.runtime().host.bindings("Good").is_some());
        assert_eq!(m.diagnostics().len(), 1);
        assert_eq!(m.diagnostics()[0].script, "Bad");
        m.frame(1.0 / 60.0);
        assert_eq!(m.diagnostics().len(), 1);

        m.load(&parse_declarations("[]").unwrap());
        m.finish_scene();
        assert!(m.diagnostics().is_empty());
        assert!(m.runtime().host.bindings("Good").is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BehaviorConfig {
            frames_per_second: 0.0,
            ..BehaviorConfig::default()
        };
        assert!(InteractivityManager::new(config).is_err());
    }
}
