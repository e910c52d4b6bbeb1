//! The resolved wiring record.

use serde::Serialize;

use crate::ids::{EventUtilityId, InterpolatorId, ItemId, ScriptId, SensorId, TimeSensorId};

/// Joins at most one of each behavior participant. Slots only ever go from
/// empty to filled while ROUTEs are resolved.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractiveObject {
    sensor: Option<SensorId>,
    sensor_from_field: Option<String>,
    time_sensor: Option<TimeSensorId>,
    interpolator: Option<InterpolatorId>,
    event_utility: Option<EventUtilityId>,
    script: Option<ScriptId>,
    defined_item: Option<ItemId>,
    /// Field on the DefinedItem this object writes to.
    defined_item_to_field: Option<String>,
    /// Field on the DefinedItem this object reads from (item → script).
    defined_item_from_field: Option<String>,
}

impl InteractiveObject {
    pub fn new() -> Self {
        Self::default()
    }

    /// The one-slot object an Anchor declaration creates.
    pub fn anchor(sensor: SensorId) -> Self {
        Self {
            sensor: Some(sensor),
            ..Self::default()
        }
    }

    pub fn sensor(&self) -> Option<SensorId> {
        self.sensor
    }

    pub fn sensor_from_field(&self) -> Option<&str> {
        self.sensor_from_field.as_deref()
    }

    pub fn time_sensor(&self) -> Option<TimeSensorId> {
        self.time_sensor
    }

    pub fn interpolator(&self) -> Option<InterpolatorId> {
        self.interpolator
    }

    pub fn event_utility(&self) -> Option<EventUtilityId> {
        self.event_utility
    }

    pub fn script(&self) -> Option<ScriptId> {
        self.script
    }

    pub fn defined_item(&self) -> Option<ItemId> {
        self.defined_item
    }

    pub fn defined_item_to_field(&self) -> Option<&str> {
        self.defined_item_to_field.as_deref()
    }

    pub fn defined_item_from_field(&self) -> Option<&str> {
        self.defined_item_from_field.as_deref()
    }

    // Fill helpers: each returns whether the slot was empty and is now set.

    pub fn fill_sensor(&mut self, sensor: SensorId, from_field: &str) -> bool {
        if self.sensor.is_some() {
            return false;
        }
        self.sensor = Some(sensor);
        self.sensor_from_field = Some(from_field.to_string());
        true
    }

    pub fn fill_time_sensor(&mut self, time_sensor: TimeSensorId) -> bool {
        fill(&mut self.time_sensor, time_sensor)
    }

    pub fn fill_interpolator(&mut self, interpolator: InterpolatorId) -> bool {
        fill(&mut self.interpolator, interpolator)
    }

    pub fn fill_event_utility(&mut self, event_utility: EventUtilityId) -> bool {
        fill(&mut self.event_utility, event_utility)
    }

    pub fn fill_script(&mut self, script: ScriptId) -> bool {
        fill(&mut self.script, script)
    }

    /// Set the write target. An item already present from the reading side
    /// may gain a target field only if it is the same item.
    pub fn fill_defined_item_to(&mut self, item: ItemId, to_field: &str) -> bool {
        if self.defined_item_to_field.is_some() {
            return false;
        }
        match self.defined_item {
            Some(existing) if existing != item => false,
            _ => {
                self.defined_item = Some(item);
                self.defined_item_to_field = Some(to_field.to_string());
                true
            }
        }
    }

    pub fn fill_defined_item_from(&mut self, item: ItemId, from_field: &str) -> bool {
        if self.defined_item.is_some() {
            return false;
        }
        self.defined_item = Some(item);
        self.defined_item_from_field = Some(from_field.to_string());
        true
    }

    pub fn has_defined_item_target(&self) -> bool {
        self.defined_item.is_some() && self.defined_item_to_field.is_some()
    }
}

fn fill<T>(slot: &mut Option<T>, value: T) -> bool {
    if slot.is_some() {
        return false;
    }
    *slot = Some(value);
    true
}
