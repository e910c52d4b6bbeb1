//! ROUTE resolution: turns (fromNode, fromField, toNode, toField) tuples
//! into [`InteractiveObject`] records.
//!
//! Tuples are applied strictly in declaration order. Each one either extends
//! an existing record (filling only empty slots) or creates a new one. The
//! destination kind decides the branch, tested in this order: TimeSensor,
//! Interpolator, EventUtility, Script, DefinedItem. Only the first matching
//! branch runs.

use serde::{Deserialize, Serialize};

use crate::error::{BehaviorError, Result};
use crate::ids::{
    EventUtilityId, InterpolatorId, ItemId, ScriptId, SensorId, TimeSensorId,
};
use crate::interactive::InteractiveObject;
use crate::registry::{Named, Registries, Registry};
use crate::script_object::{BindingTarget, FieldBinding};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Route {
    pub from_node: String,
    pub from_field: String,
    pub to_node: String,
    pub to_field: String,
}

impl Route {
    pub fn new(
        from_node: impl Into<String>,
        from_field: impl Into<String>,
        to_node: impl Into<String>,
        to_field: impl Into<String>,
    ) -> Self {
        Self {
            from_node: from_node.into(),
            from_field: from_field.into(),
            to_node: to_node.into(),
            to_field: to_field.into(),
        }
    }
}

/// What each end of a route resolved to, per registry.
#[derive(Debug, Default, Clone, Copy)]
struct Endpoints {
    from_sensor: Option<SensorId>,
    from_time_sensor: Option<TimeSensorId>,
    to_time_sensor: Option<TimeSensorId>,
    from_interpolator: Option<InterpolatorId>,
    to_interpolator: Option<InterpolatorId>,
    from_event_utility: Option<EventUtilityId>,
    to_event_utility: Option<EventUtilityId>,
    from_script: Option<ScriptId>,
    to_script: Option<ScriptId>,
    from_item: Option<ItemId>,
    to_item: Option<ItemId>,
}

impl Endpoints {
    fn resolve(registries: &Registries, route: &Route) -> Self {
        let (to_time_sensor, from_time_sensor) = lookup(&registries.time_sensors, route);
        let (to_interpolator, from_interpolator) = lookup(&registries.interpolators, route);
        let (to_event_utility, from_event_utility) = lookup(&registries.event_utilities, route);
        let (to_script, from_script) = lookup(&registries.scripts, route);
        let (to_item, from_item) = lookup(&registries.items, route);
        Self {
            from_sensor: registries.sensors.find(&route.from_node),
            from_time_sensor,
            to_time_sensor,
            from_interpolator,
            to_interpolator,
            from_event_utility,
            to_event_utility,
            from_script,
            to_script,
            from_item,
            to_item,
        }
    }

    fn has_source(&self) -> bool {
        self.from_sensor.is_some()
            || self.from_time_sensor.is_some()
            || self.from_interpolator.is_some()
            || self.from_event_utility.is_some()
            || self.from_script.is_some()
            || self.from_item.is_some()
    }
}

/// Destination and source in one registry. A node routed to itself only
/// counts as the destination.
fn lookup<I, T>(registry: &Registry<I, T>, route: &Route) -> (Option<I>, Option<I>)
where
    I: From<usize> + Into<usize> + Copy + PartialEq,
    T: Named,
{
    let to = registry.find(&route.to_node);
    let from = registry.find(&route.from_node).filter(|from| Some(*from) != to);
    (to, from)
}

/// Incremental builder over the registries of one scene.
pub struct GraphBuilder<'a> {
    registries: &'a mut Registries,
    objects: &'a mut Vec<InteractiveObject>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(registries: &'a mut Registries, objects: &'a mut Vec<InteractiveObject>) -> Self {
        Self {
            registries,
            objects,
        }
    }

    /// Apply every route in order. Unresolvable routes are logged and
    /// skipped. Returns how many were applied.
    pub fn apply_all(&mut self, routes: &[Route]) -> usize {
        let mut applied = 0;
        for route in routes {
            match self.apply(route) {
                Ok(()) => applied += 1,
                Err(e) => log::warn!(
                    "Dropping ROUTE {}.{} -> {}.{}: {}",
                    route.from_node,
                    route.from_field,
                    route.to_node,
                    route.to_field,
                    e
                ),
            }
        }
        applied
    }

    pub fn apply(&mut self, route: &Route) -> Result<()> {
        let ep = Endpoints::resolve(self.registries, route);
        if !ep.has_source() {
            return Err(BehaviorError::unresolved(&route.from_node, "ROUTE fromNode"));
        }

        if let Some(ts) = ep.to_time_sensor {
            self.route_to_time_sensor(route, &ep, ts);
        } else if let Some(interpolator) = ep.to_interpolator {
            self.route_to_interpolator(&ep, interpolator);
        } else if let Some(eu) = ep.to_event_utility {
            self.route_to_event_utility(route, &ep, eu)?;
        } else if let Some(script) = ep.to_script {
            self.route_to_script(route, &ep, script)?;
        } else if let Some(item) = ep.to_item {
            self.route_to_defined_item(route, &ep, item)?;
        } else {
            return Err(BehaviorError::unresolved(&route.to_node, "ROUTE toNode"));
        }
        log::debug!(
            "ROUTE {}.{} -> {}.{} resolved ({} objects)",
            route.from_node,
            route.from_field,
            route.to_node,
            route.to_field,
            self.objects.len()
        );
        Ok(())
    }

    fn route_to_time_sensor(&mut self, route: &Route, ep: &Endpoints, ts: TimeSensorId) {
        if let Some(sensor) = ep.from_sensor {
            let mut found = false;
            for object in self.objects.iter_mut().filter(|o| o.time_sensor() == Some(ts)) {
                found |= object.fill_sensor(sensor, &route.from_field);
            }
            if !found {
                let mut object = InteractiveObject::new();
                object.fill_sensor(sensor, &route.from_field);
                object.fill_time_sensor(ts);
                self.objects.push(object);
            }
        } else if let Some(script) = ep.from_script {
            // Script output driving a timer field, e.g. startTime.
            let binding = FieldBinding::new(BindingTarget::TimeSensor(ts), &route.to_field);
            if let Err(e) = bind_script_to(self.registries, script, &route.from_field, binding) {
                log::warn!("{}", e);
            }
        } else {
            let mut object = InteractiveObject::new();
            object.fill_time_sensor(ts);
            self.objects.push(object);
        }
    }

    fn route_to_interpolator(&mut self, ep: &Endpoints, interpolator: InterpolatorId) {
        let mut found = false;
        if let Some(ts) = ep.from_time_sensor {
            for object in self
                .objects
                .iter_mut()
                .filter(|o| o.interpolator() == Some(interpolator))
            {
                found |= object.fill_time_sensor(ts);
            }
            if !found {
                for object in self.objects.iter_mut().filter(|o| {
                    o.time_sensor() == Some(ts) && o.interpolator().is_none() && o.script().is_none()
                }) {
                    found |= object.fill_interpolator(interpolator);
                }
            }
        }
        if !found {
            let mut object = InteractiveObject::new();
            if let Some(ts) = ep.from_time_sensor {
                object.fill_time_sensor(ts);
            }
            object.fill_interpolator(interpolator);
            self.objects.push(object);
        }
    }

    fn route_to_event_utility(
        &mut self,
        route: &Route,
        ep: &Endpoints,
        eu: EventUtilityId,
    ) -> Result<()> {
        let mut found = false;
        if let Some(sensor) = ep.from_sensor {
            for object in self
                .objects
                .iter_mut()
                .filter(|o| o.event_utility() == Some(eu))
            {
                found |= object.fill_sensor(sensor, &route.from_field);
            }
        } else if let Some(script) = ep.from_script {
            let open = self
                .objects
                .iter()
                .any(|o| o.event_utility() == Some(eu) && o.script().is_none());
            if open {
                let binding = FieldBinding::new(BindingTarget::EventUtility(eu), &route.to_field);
                bind_script_to(self.registries, script, &route.from_field, binding)?;
                found = true;
            }
        }
        if !found {
            let mut object = InteractiveObject::new();
            if let Some(sensor) = ep.from_sensor {
                object.fill_sensor(sensor, &route.from_field);
            }
            object.fill_event_utility(eu);
            if let Some(script) = ep.from_script {
                object.fill_script(script);
                let binding = FieldBinding::new(BindingTarget::EventUtility(eu), &route.to_field);
                bind_script_to(self.registries, script, &route.from_field, binding)?;
            }
            self.objects.push(object);
        }
        Ok(())
    }

    fn route_to_script(&mut self, route: &Route, ep: &Endpoints, script: ScriptId) -> Result<()> {
        // A route into the entry field drives the call itself; any other
        // field only supplies a parameter.
        let drives_entry = self
            .registries
            .scripts
            .get(script)
            .map(|s| s.is_entry_field(&route.to_field))
            .unwrap_or(false);

        for index in 0..self.objects.len() {
            if self.objects[index].script() != Some(script) {
                continue;
            }
            let object = &mut self.objects[index];
            if let (Some(sensor), None) = (ep.from_sensor, object.sensor()) {
                object.fill_sensor(sensor, &route.from_field);
                return Ok(());
            }
            if let (Some(item), None) = (ep.from_item, object.defined_item()) {
                let binding = FieldBinding::new(BindingTarget::Item(item), &route.from_field);
                return bind_script_from(self.registries, script, &route.to_field, binding);
            }
            if let (Some(eu), None) = (ep.from_event_utility, object.event_utility()) {
                if drives_entry {
                    object.fill_event_utility(eu);
                    return Ok(());
                }
                let binding = FieldBinding::new(BindingTarget::EventUtility(eu), &route.from_field);
                return bind_script_from(self.registries, script, &route.to_field, binding);
            }
            if let (Some(ts), None) = (ep.from_time_sensor, object.time_sensor()) {
                if drives_entry {
                    object.fill_time_sensor(ts);
                    return Ok(());
                }
                let binding = FieldBinding::new(BindingTarget::TimeSensor(ts), &route.from_field);
                return bind_script_from(self.registries, script, &route.to_field, binding);
            }
        }

        let mut object = InteractiveObject::new();
        object.fill_script(script);
        let mut result = Ok(());
        if let Some(sensor) = ep.from_sensor {
            object.fill_sensor(sensor, &route.from_field);
        } else if let Some(item) = ep.from_item {
            object.fill_defined_item_from(item, &route.from_field);
            let binding = FieldBinding::new(BindingTarget::Item(item), &route.from_field);
            result = bind_script_from(self.registries, script, &route.to_field, binding);
        } else if let Some(eu) = ep.from_event_utility {
            if drives_entry {
                object.fill_event_utility(eu);
            } else {
                let binding = FieldBinding::new(BindingTarget::EventUtility(eu), &route.from_field);
                result = bind_script_from(self.registries, script, &route.to_field, binding);
            }
        } else if let Some(ts) = ep.from_time_sensor {
            if drives_entry {
                object.fill_time_sensor(ts);
            } else {
                let binding = FieldBinding::new(BindingTarget::TimeSensor(ts), &route.from_field);
                result = bind_script_from(self.registries, script, &route.to_field, binding);
            }
        } else {
            log::debug!(
                "ROUTE {}.{} feeds script '{}' from an unsupported node kind",
                route.from_node,
                route.from_field,
                route.to_node
            );
        }
        self.objects.push(object);
        result
    }

    fn route_to_defined_item(&mut self, route: &Route, ep: &Endpoints, item: ItemId) -> Result<()> {
        let mut found = false;
        let mut script_bound = false;
        for object in self.objects.iter_mut() {
            if ep.from_interpolator.is_some() && object.interpolator() == ep.from_interpolator {
                found |= object.fill_defined_item_to(item, &route.to_field);
            } else if ep.from_event_utility.is_some()
                && object.event_utility() == ep.from_event_utility
            {
                found |= object.fill_defined_item_to(item, &route.to_field);
            } else if ep.from_script.is_some()
                && object.script() == ep.from_script
                && !object.has_defined_item_target()
            {
                found = true;
                script_bound = true;
                break;
            }
        }
        if script_bound {
            if let Some(script) = ep.from_script {
                let binding = FieldBinding::new(BindingTarget::Item(item), &route.to_field);
                bind_script_to(self.registries, script, &route.from_field, binding)?;
            }
        }

        if !found {
            let mut object = InteractiveObject::new();
            if let Some(interpolator) = ep.from_interpolator {
                object.fill_interpolator(interpolator);
            }
            object.fill_defined_item_to(item, &route.to_field);
            if let Some(sensor) = ep.from_sensor {
                object.fill_sensor(sensor, &route.from_field);
            }
            if let Some(eu) = ep.from_event_utility {
                object.fill_event_utility(eu);
            }
            if let Some(script) = ep.from_script {
                object.fill_script(script);
                let binding = FieldBinding::new(BindingTarget::Item(item), &route.to_field);
                bind_script_to(self.registries, script, &route.from_field, binding)?;
            }
            self.objects.push(object);
        }
        Ok(())
    }
}

fn bind_script_from(
    registries: &mut Registries,
    script: ScriptId,
    field: &str,
    binding: FieldBinding,
) -> Result<()> {
    let script = registries
        .scripts
        .get_mut(script)
        .ok_or_else(|| BehaviorError::unresolved(field, "script"))?;
    let script_name = script.name.clone();
    let field = script
        .field_mut(field)
        .ok_or_else(|| BehaviorError::unresolved(field, format!("field of script '{}'", script_name)))?;
    if !field.bind_from(binding) {
        log::debug!("Field '{}' of '{}' already has a source", field.name, script_name);
    }
    Ok(())
}

fn bind_script_to(
    registries: &mut Registries,
    script: ScriptId,
    field: &str,
    binding: FieldBinding,
) -> Result<()> {
    let script = registries
        .scripts
        .get_mut(script)
        .ok_or_else(|| BehaviorError::unresolved(field, "script"))?;
    let script_name = script.name.clone();
    let field = script
        .field_mut(field)
        .ok_or_else(|| BehaviorError::unresolved(field, format!("field of script '{}'", script_name)))?;
    if !field.bind_to(binding) {
        log::debug!("Field '{}' of '{}' already has a sink", field.name, script_name);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{AccessType, FieldType};
    use crate::nodes::{EventUtility, Interpolator, InterpolatorKind, Sensor, SensorKind, TimeSensor};
    use crate::registry::DefinedItem;
    use crate::script_object::{Field, ScriptObject};

    fn registries() -> Registries {
        let mut r = Registries::default();
        r.sensors.insert(Sensor::new("Touch", SensorKind::Touch, None));
        r.time_sensors.insert(TimeSensor::new("Clock", 2.0));
        r.interpolators.insert(Interpolator::new(
            "Mover",
            InterpolatorKind::Position,
            vec![0.0, 1.0],
            vec![0.0; 6],
        ));
        r.items.insert(DefinedItem::new("Box"));
        r.items.insert(DefinedItem::new("Lamp"));
        r.event_utilities.insert(EventUtility::new("Toggle", false));
        r.scripts.insert(ScriptObject::new(
            "Logic",
            vec![
                Field::new("onTouch", AccessType::InputOnly, FieldType::Bool),
                Field::new("tint", AccessType::InputOutput, FieldType::Color),
                Field::new("period", AccessType::InputOnly, FieldType::Time),
            ],
            "fn onTouch(v) {}",
        ));
        r
    }

    fn chain() -> Vec<Route> {
        vec![
            Route::new("Touch", "isActive", "Clock", "startTime"),
            Route::new("Clock", "fraction_changed", "Mover", "set_fraction"),
            Route::new("Mover", "value_changed", "Box", "translation"),
        ]
    }

    fn build(routes: &[Route]) -> (Registries, Vec<InteractiveObject>) {
        let mut r = registries();
        let mut objects = Vec::new();
        GraphBuilder::new(&mut r, &mut objects).apply_all(routes);
        (r, objects)
    }

    #[test]
    fn test_chain_merges_into_one_object() {
        let (_, objects) = build(&chain());
        assert_eq!(objects.len(), 1);
        let o = &objects[0];
        assert_eq!(o.sensor(), Some(SensorId(0)));
        assert_eq!(o.sensor_from_field(), Some("isActive"));
        assert_eq!(o.time_sensor(), Some(TimeSensorId(0)));
        assert_eq!(o.interpolator(), Some(InterpolatorId(0)));
        assert_eq!(o.defined_item(), Some(ItemId(0)));
        assert_eq!(o.defined_item_to_field(), Some("translation"));
    }

    #[test]
    fn test_timer_first_then_sensor_merges() {
        let routes = chain();
        let reordered = vec![routes[1].clone(), routes[2].clone(), routes[0].clone()];
        let (_, objects) = build(&reordered);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].sensor(), Some(SensorId(0)));
        assert_eq!(objects[0].defined_item(), Some(ItemId(0)));
    }

    #[test]
    fn test_unresolved_routes_are_dropped() {
        let mut r = registries();
        let mut objects = Vec::new();
        let mut builder = GraphBuilder::new(&mut r, &mut objects);
        assert!(builder.apply(&Route::new("Nowhere", "x", "Box", "translation")).is_err());
        assert!(builder.apply(&Route::new("Touch", "isOver", "Nowhere", "x")).is_err());
        assert_eq!(builder.apply_all(&chain()), 3);
        assert_eq!(objects.len(), 1);
    }

    #[test]
    fn test_toggle_wiring() {
        let (_, objects) = build(&[
            Route::new("Touch", "isActive", "Toggle", "set_boolean"),
            Route::new("Toggle", "toggle_changed", "Lamp", "on"),
        ]);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].sensor(), Some(SensorId(0)));
        assert_eq!(objects[0].event_utility(), Some(EventUtilityId(0)));
        assert_eq!(objects[0].defined_item(), Some(ItemId(1)));
    }

    #[test]
    fn test_script_routes_bind_fields() {
        let (r, objects) = build(&[
            Route::new("Touch", "isOver", "Logic", "onTouch"),
            Route::new("Box", "diffuseColor", "Logic", "tint"),
            Route::new("Logic", "tint", "Lamp", "color"),
            Route::new("Clock", "cycleInterval", "Logic", "period"),
        ]);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].script(), Some(ScriptId(0)));
        assert_eq!(objects[0].sensor(), Some(SensorId(0)));
        // parameter routes bind fields instead of filling slots
        assert_eq!(objects[0].time_sensor(), None);

        let script = r.scripts.get(ScriptId(0)).unwrap();
        let tint = &script.fields[1];
        assert_eq!(tint.from_binding().unwrap().target, BindingTarget::Item(ItemId(0)));
        assert_eq!(tint.from_binding().unwrap().foreign_field, "diffuseColor");
        assert_eq!(tint.to_binding().unwrap().target, BindingTarget::Item(ItemId(1)));
        let period = &script.fields[2];
        assert_eq!(
            period.from_binding().unwrap().target,
            BindingTarget::TimeSensor(TimeSensorId(0))
        );
    }

    #[test]
    fn test_timer_into_entry_field_fills_slot() {
        let (_, objects) = build(&[Route::new("Clock", "fraction_changed", "Logic", "onTouch")]);
        assert_eq!(objects.len(), 1);
        assert_eq!(objects[0].time_sensor(), Some(TimeSensorId(0)));
        assert_eq!(objects[0].script(), Some(ScriptId(0)));
    }

    #[test]
    fn test_self_route_counts_only_as_destination() {
        let r = registries();
        let route = Route::new("Box", "translation", "Box", "translation");
        let (to, from) = lookup(&r.items, &route);
        assert_eq!(to, Some(ItemId(0)));
        assert_eq!(from, None);
    }
}
