//! Turning resolved InteractiveObjects into live behaviors.
//!
//! Each object is classified once, after the whole scene is loaded, by which
//! of its slots are filled (first match wins):
//!
//! 1. TimeSensor + Interpolator + DefinedItem: baked keyframe animation,
//!    started by the sensor if one is wired, otherwise autoplayed.
//! 2. touch Sensor + EventUtility + DefinedItem: toggle-driven property.
//! 3. Script: sensor-driven, per-frame (TimeSensor) or EventUtility-driven.
//! 4. Sensor + DefinedItem: direct light or media control.
//! 5. Sensor + EventUtility: toggle with no direct target.
//! 6. Anchor sensor alone: navigation.
//!
//! Anything else is inert.

use crate::animation::{Channel, ChannelTarget, RepeatMode};
use crate::error::BehaviorError;
use crate::events::SensorEvent;
use crate::fields::{field_matches, FieldValue};
use crate::ids::{
    AnimationId, EventUtilityId, InterpolatorId, ItemId, MediaId, ScriptId, SensorId, TimeSensorId,
};
use crate::interactive::InteractiveObject;
use crate::marshal::{initialize_script, run_entry, write_binding, Trigger};
use crate::nodes::SensorKind;
use crate::runtime::Runtime;
use crate::scheduler::FrameScheduler;
use crate::script_object::{BindingTarget, FieldBinding};

/// Which sensor output a listener follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorField {
    IsOver,
    /// `isActive`, and `touchTime` which fires with it.
    IsActive,
}

impl SensorField {
    pub fn parse(from_field: Option<&str>) -> Self {
        match from_field {
            Some(field) if field_matches(field, "isOver") => SensorField::IsOver,
            _ => SensorField::IsActive,
        }
    }

    fn read(self, event: &SensorEvent) -> bool {
        match self {
            SensorField::IsOver => event.is_over,
            SensorField::IsActive => event.is_active,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Low,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Turns a stream of sensor states into edges. Repeating the current state
/// produces nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeLatch {
    field: SensorField,
    level: Level,
}

impl EdgeLatch {
    pub fn new(field: SensorField) -> Self {
        Self {
            field,
            level: Level::Low,
        }
    }

    pub fn update(&mut self, event: &SensorEvent) -> Option<Edge> {
        let level = if self.field.read(event) {
            Level::High
        } else {
            Level::Low
        };
        if level == self.level {
            return None;
        }
        self.level = level;
        Some(match level {
            Level::High => Edge::Rising,
            Level::Low => Edge::Falling,
        })
    }
}

/// Guard against restarting an animation that is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerState {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaAction {
    Start,
    Pause,
    Stop,
}

impl MediaAction {
    fn from_field(to_field: &str) -> Option<Self> {
        if field_matches(to_field, "startTime") {
            Some(MediaAction::Start)
        } else if field_matches(to_field, "pauseTime") {
            Some(MediaAction::Pause)
        } else if field_matches(to_field, "stopTime") {
            Some(MediaAction::Stop)
        } else {
            None
        }
    }
}

/// A media action fires at most once while the pointer stays over the
/// sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaLatch {
    Armed,
    Fired,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BehaviorKind {
    Animation {
        animation: AnimationId,
        listener: Option<(SensorId, EdgeLatch)>,
        trigger: TriggerState,
    },
    Toggle {
        sensor: SensorId,
        latch: EdgeLatch,
        event_utility: EventUtilityId,
        target: Option<ItemId>,
    },
    SensorScript {
        sensor: SensorId,
        latch: EdgeLatch,
        script: ScriptId,
    },
    FrameScript {
        script: ScriptId,
        time_sensor: TimeSensorId,
    },
    /// Runs whenever its EventUtility is flipped by a toggle.
    EventScript {
        script: ScriptId,
        event_utility: EventUtilityId,
    },
    DirectLight {
        sensor: SensorId,
        item: ItemId,
        hover: EdgeLatch,
    },
    DirectMedia {
        sensor: SensorId,
        item: ItemId,
        action: MediaAction,
        latch: EdgeLatch,
        state: MediaLatch,
    },
    Anchor {
        sensor: SensorId,
        latch: EdgeLatch,
    },
    Inert,
}

impl BehaviorKind {
    pub fn pattern(&self) -> &'static str {
        match self {
            BehaviorKind::Animation { listener: None, .. } => "animation",
            BehaviorKind::Animation { .. } => "triggered-animation",
            BehaviorKind::Toggle { target: Some(_), .. } => "toggle",
            BehaviorKind::Toggle { .. } => "toggle-only",
            BehaviorKind::SensorScript { .. } => "sensor-script",
            BehaviorKind::FrameScript { .. } => "frame-script",
            BehaviorKind::EventScript { .. } => "event-script",
            BehaviorKind::DirectLight { .. } => "direct-light",
            BehaviorKind::DirectMedia { .. } => "direct-media",
            BehaviorKind::Anchor { .. } => "anchor",
            BehaviorKind::Inert => "inert",
        }
    }

    pub fn sensor(&self) -> Option<SensorId> {
        match self {
            BehaviorKind::Animation { listener, .. } => listener.map(|(sensor, _)| sensor),
            BehaviorKind::Toggle { sensor, .. }
            | BehaviorKind::SensorScript { sensor, .. }
            | BehaviorKind::DirectLight { sensor, .. }
            | BehaviorKind::DirectMedia { sensor, .. }
            | BehaviorKind::Anchor { sensor, .. } => Some(*sensor),
            _ => None,
        }
    }
}

/// An activated InteractiveObject.
#[derive(Debug, Clone, PartialEq)]
pub struct Behavior {
    /// Index into the runtime's object list.
    pub object: usize,
    pub kind: BehaviorKind,
}

impl Behavior {
    pub fn pattern(&self) -> &'static str {
        self.kind.pattern()
    }

    /// React to one sensor event. Events for other sensors are ignored.
    pub fn handle_event(&mut self, event: &SensorEvent, rt: &mut Runtime) {
        if self.kind.sensor() != Some(event.sensor) {
            return;
        }
        match &mut self.kind {
            BehaviorKind::Animation {
                animation,
                listener: Some((_, latch)),
                trigger,
            } => {
                if latch.update(event) != Some(Edge::Rising) {
                    return;
                }
                match *trigger {
                    TriggerState::Idle => {
                        rt.animator.start(*animation);
                        *trigger = TriggerState::Running;
                    }
                    TriggerState::Running => {
                        log::debug!("Animation {} already running; trigger ignored", animation);
                    }
                }
            }
            BehaviorKind::Toggle {
                latch,
                event_utility,
                ..
            } => {
                if latch.update(event) == Some(Edge::Rising) {
                    flip_event_utility(rt, *event_utility);
                }
            }
            BehaviorKind::SensorScript { latch, script, .. } => {
                if let Some(edge) = latch.update(event) {
                    let trigger = Trigger::event(edge == Edge::Rising, rt.clock);
                    if let Err(e) = run_entry(rt, *script, &trigger) {
                        log::warn!("{}", e);
                    }
                }
            }
            BehaviorKind::DirectLight { item, hover, .. } => {
                if let Some(edge) = hover.update(event) {
                    let binding = FieldBinding::new(BindingTarget::Item(*item), "on");
                    let on = FieldValue::Bool(edge == Edge::Rising);
                    if let Err(e) = write_binding(rt, "on", &binding, on) {
                        log::warn!("{}", e);
                    }
                }
            }
            BehaviorKind::DirectMedia {
                item,
                action,
                latch,
                state,
                ..
            } => {
                if !event.is_over {
                    *state = MediaLatch::Armed;
                }
                if latch.update(event) == Some(Edge::Rising) && *state == MediaLatch::Armed {
                    apply_media_action(rt, *item, *action);
                    *state = MediaLatch::Fired;
                }
            }
            BehaviorKind::Anchor { sensor, latch } => {
                if latch.update(event) != Some(Edge::Rising) {
                    return;
                }
                let Some(sensor) = rt.registries.sensors.get(*sensor) else {
                    return;
                };
                match &sensor.anchor {
                    Some(target) => rt.navigator.navigate(sensor, &target.url),
                    None => log::warn!("Anchor sensor '{}' has no destination", sensor.name),
                }
            }
            _ => {}
        }
    }

    /// Re-arm a sensor-started animation once it has finished.
    pub fn end_frame(&mut self, rt: &Runtime) {
        if let BehaviorKind::Animation {
            animation,
            trigger: trigger @ TriggerState::Running,
            ..
        } = &mut self.kind
        {
            if !rt.animator.is_playing(*animation) {
                *trigger = TriggerState::Idle;
            }
        }
    }
}

/// Flip the toggle and push its new value to every object sharing it.
fn flip_event_utility(rt: &mut Runtime, id: EventUtilityId) {
    let Some(value) = rt.registries.event_utilities.get_mut(id).map(|eu| eu.flip()) else {
        return;
    };
    log::debug!("EventUtility {} -> {}", id, value);

    let sharing: Vec<InteractiveObject> = rt
        .objects
        .iter()
        .filter(|o| o.event_utility() == Some(id))
        .cloned()
        .collect();
    for object in sharing {
        if let (Some(item), Some(field)) = (object.defined_item(), object.defined_item_to_field()) {
            let binding = FieldBinding::new(BindingTarget::Item(item), field);
            if let Err(e) = write_binding(rt, "toggle", &binding, FieldValue::Bool(value)) {
                log::debug!("Toggle target skipped: {}", e);
            }
        }
        if let (Some(script), None) = (object.script(), object.sensor()) {
            if let Err(e) = run_entry(rt, script, &Trigger::event(value, rt.clock)) {
                log::warn!("{}", e);
            }
        }
    }
}

fn media_of(rt: &Runtime, item: ItemId) -> Option<MediaId> {
    let item = rt.registries.items.get(item)?;
    item.media
        .or_else(|| item.node.and_then(|n| rt.scene.node(n)).and_then(|n| n.media))
}

fn apply_media_action(rt: &mut Runtime, item: ItemId, action: MediaAction) {
    let Some(media) = media_of(rt, item).and_then(|id| rt.scene.media_mut(id)) else {
        log::warn!("No media object behind item {}", item);
        return;
    };
    match action {
        MediaAction::Start => media.play(),
        MediaAction::Pause => media.pause(),
        MediaAction::Stop => media.stop(),
    }
    log::debug!("Media {:?} -> {:?}", action, media.state);
}

/// Classify and activate every InteractiveObject in the runtime.
pub fn activate(rt: &mut Runtime, scheduler: &mut FrameScheduler) -> Vec<Behavior> {
    let objects = rt.objects.clone();
    objects
        .iter()
        .enumerate()
        .map(|(index, object)| {
            let kind = classify(rt, scheduler, object);
            match kind {
                BehaviorKind::Inert => log::info!("InteractiveObject {} is inert: {:?}", index, object),
                _ => log::debug!("InteractiveObject {} -> {}", index, kind.pattern()),
            }
            Behavior {
                object: index,
                kind,
            }
        })
        .collect()
}

fn classify(rt: &mut Runtime, scheduler: &mut FrameScheduler, o: &InteractiveObject) -> BehaviorKind {
    let sensor_kind = o
        .sensor()
        .and_then(|s| rt.registries.sensors.get(s))
        .map(|s| s.kind);
    let latch = || EdgeLatch::new(SensorField::parse(o.sensor_from_field()));

    if let (Some(ts), Some(interpolator), Some(item)) =
        (o.time_sensor(), o.interpolator(), o.defined_item())
    {
        let Some(animation) = bake(rt, o, ts, interpolator, item) else {
            return BehaviorKind::Inert;
        };
        let listener = o.sensor().map(|sensor| (sensor, latch()));
        if listener.is_none() {
            rt.animator.autoplay(animation);
        }
        return BehaviorKind::Animation {
            animation,
            listener,
            trigger: TriggerState::Idle,
        };
    }

    if let (Some(sensor), Some(event_utility), Some(item)) =
        (o.sensor(), o.event_utility(), o.defined_item())
    {
        if sensor_kind == Some(SensorKind::Touch) {
            return BehaviorKind::Toggle {
                sensor,
                latch: latch(),
                event_utility,
                target: Some(item),
            };
        }
    }

    if let Some(script) = o.script() {
        if let Some(sensor) = o.sensor() {
            initialize_script(rt, script);
            return BehaviorKind::SensorScript {
                sensor,
                latch: latch(),
                script,
            };
        }
        if let Some(time_sensor) = o.time_sensor() {
            scheduler.register(script, time_sensor, rt);
            return BehaviorKind::FrameScript {
                script,
                time_sensor,
            };
        }
        if let Some(event_utility) = o.event_utility() {
            initialize_script(rt, script);
            return BehaviorKind::EventScript {
                script,
                event_utility,
            };
        }
        return BehaviorKind::Inert;
    }

    if let (Some(sensor), Some(item), None) = (o.sensor(), o.defined_item(), o.event_utility()) {
        let has_light = rt
            .registries
            .items
            .get(item)
            .and_then(|i| i.node)
            .and_then(|n| rt.scene.node(n))
            .map(|n| n.light.is_some())
            .unwrap_or(false);
        if has_light {
            return BehaviorKind::DirectLight {
                sensor,
                item,
                hover: EdgeLatch::new(SensorField::IsOver),
            };
        }
        let action = o.defined_item_to_field().and_then(MediaAction::from_field);
        if let (Some(_), Some(action)) = (media_of(rt, item), action) {
            return BehaviorKind::DirectMedia {
                sensor,
                item,
                action,
                latch: latch(),
                state: MediaLatch::Armed,
            };
        }
        return BehaviorKind::Inert;
    }

    if let (Some(sensor), Some(event_utility), None) =
        (o.sensor(), o.event_utility(), o.defined_item())
    {
        return BehaviorKind::Toggle {
            sensor,
            latch: latch(),
            event_utility,
            target: None,
        };
    }

    if let (Some(sensor), Some(SensorKind::Anchor)) = (o.sensor(), sensor_kind) {
        return BehaviorKind::Anchor {
            sensor,
            latch: EdgeLatch::new(SensorField::IsActive),
        };
    }

    BehaviorKind::Inert
}

/// Build the keyframe animation for a TimeSensor + Interpolator + item chain.
fn bake(
    rt: &mut Runtime,
    o: &InteractiveObject,
    ts_id: TimeSensorId,
    interpolator_id: InterpolatorId,
    item_id: ItemId,
) -> Option<AnimationId> {
    let item = rt.registries.items.get(item_id)?;
    let Some(node) = item.node.filter(|n| rt.scene.node(*n).is_some()) else {
        log::warn!(
            "{}",
            BehaviorError::AnimationTargetMissing {
                item: item.name.clone()
            }
        );
        return None;
    };
    let to_field = o.defined_item_to_field().unwrap_or_default();
    let Some(target) = ChannelTarget::from_field(to_field) else {
        log::warn!(
            "Interpolated field '{}' on '{}' is not a transform channel",
            to_field,
            item.name
        );
        return None;
    };
    let ts = rt.registries.time_sensors.get(ts_id)?;
    let interpolator = rt.registries.interpolators.get(interpolator_id)?;
    let cycle = ts.cycle_interval();
    let fps = rt.config.frames_per_second;
    let Some(channel) = Channel::bake(interpolator, target, cycle, fps) else {
        log::warn!(
            "Interpolator '{}' cannot drive {:?} of '{}'",
            interpolator.name,
            target,
            item.name
        );
        return None;
    };
    let name = item.name.clone();

    let id = rt.animator.add(&name, node, channel, cycle, fps, RepeatMode::Once);
    rt.registries.time_sensors.get_mut(ts_id)?.animations.push(id);
    rt.sync_repeat_mode(ts_id);
    log::info!("Baked animation {} for '{}'", id, name);
    Some(id)
}
