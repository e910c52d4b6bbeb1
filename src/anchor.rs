//! Anchor navigation.

use crate::nodes::Sensor;

/// Receives anchor activations. Where the destination is opened (web view,
/// scene switch, external browser) is up to the embedding application.
pub trait AnchorNavigator {
    fn navigate(&mut self, sensor: &Sensor, destination: &str);
}

/// Default navigator: records and logs each activation.
#[derive(Debug, Default)]
pub struct LoggingNavigator {
    pub visited: Vec<String>,
}

impl AnchorNavigator for LoggingNavigator {
    fn navigate(&mut self, sensor: &Sensor, destination: &str) {
        let description = sensor
            .anchor
            .as_ref()
            .map(|a| a.description.as_str())
            .unwrap_or_default();
        log::info!(
            "Anchor '{}' -> {} {}",
            sensor.name,
            destination,
            description
        );
        self.visited.push(destination.to_string());
    }
}
