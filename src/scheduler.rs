//! Per-frame script execution.
//!
//! A script wired from a TimeSensor runs every frame with
//! `accumulated % cycleInterval` as its trigger value and the accumulated
//! time as its timestamp. Nothing here blocks: each call finishes before the
//! frame continues.

use crate::config::SchedulerMode;
use crate::ids::{ScriptId, TimeSensorId};
use crate::marshal::{initialize_script, run_entry, Trigger};
use crate::runtime::Runtime;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Registered; constructor and `initialize()` run on the next frame.
    Pending,
    Running,
}

#[derive(Debug, Clone)]
pub struct FrameSlot {
    pub script: ScriptId,
    pub time_sensor: TimeSensorId,
    pub state: SlotState,
    accumulated: f64,
}

impl FrameSlot {
    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }
}

#[derive(Debug, Default)]
pub struct FrameScheduler {
    mode: SchedulerMode,
    slots: Vec<FrameSlot>,
}

impl FrameScheduler {
    pub fn new(mode: SchedulerMode) -> Self {
        Self {
            mode,
            slots: Vec::new(),
        }
    }

    /// Queue `script` to run every frame and mark it per-frame. In
    /// single-slot mode the script it replaces loses that mark.
    pub fn register(&mut self, script: ScriptId, time_sensor: TimeSensorId, rt: &mut Runtime) {
        if self.slots.iter().any(|s| s.script == script) {
            return;
        }
        let slot = FrameSlot {
            script,
            time_sensor,
            state: SlotState::Pending,
            accumulated: 0.0,
        };
        if self.mode == SchedulerMode::SingleSlot {
            if let Some(previous) = self.slots.pop() {
                log::warn!(
                    "Per-frame script {} replaces {}; only one runs in single-slot mode",
                    script,
                    previous.script
                );
                set_per_frame(rt, previous.script, false);
            }
        }
        set_per_frame(rt, script, true);
        self.slots.push(slot);
    }

    pub fn slots(&self) -> &[FrameSlot] {
        &self.slots
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn run_frame(&mut self, dt: f32, rt: &mut Runtime) {
        for slot in &mut self.slots {
            if slot.state == SlotState::Pending {
                initialize_script(rt, slot.script);
                slot.state = SlotState::Running;
            }
            slot.accumulated += dt as f64;
            let cycle = rt
                .registries
                .time_sensors
                .get(slot.time_sensor)
                .map(|ts| ts.cycle_interval())
                .filter(|c| *c > 0.0)
                .unwrap_or(1.0) as f64;
            let trigger = Trigger::frame((slot.accumulated % cycle) as f32, slot.accumulated);
            if let Err(e) = run_entry(rt, slot.script, &trigger) {
                log::warn!("Per-frame script: {}", e);
            }
        }
    }
}

fn set_per_frame(rt: &mut Runtime, script: ScriptId, per_frame: bool) {
    if let Some(object) = rt.registries.scripts.get_mut(script) {
        object.per_frame = per_frame;
    }
}
