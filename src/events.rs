//! Messages delivered to the render thread.
//!
//! Picking and asset loading may happen on other threads. They only ever
//! enqueue a [`HostMessage`]; the queue is drained by the frame callback so
//! every scene mutation and script call happens on one thread.

use std::sync::mpsc::{channel, Receiver, SendError, Sender};

use glam::Vec3;
use serde::Deserialize;

use crate::ids::{SensorId, TextureId};

/// Current pointer state over one sensor. Edges are derived by the
/// listener from consecutive events.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensorEvent {
    pub sensor: SensorId,
    pub is_over: bool,
    pub is_active: bool,
    pub hit_point: Vec3,
}

impl SensorEvent {
    pub fn new(sensor: SensorId, is_over: bool, is_active: bool) -> Self {
        Self {
            sensor,
            is_over,
            is_active,
            hit_point: Vec3::ZERO,
        }
    }

    pub fn with_hit_point(mut self, hit_point: Vec3) -> Self {
        self.hit_point = hit_point;
        self
    }
}

/// Result of a background texture read.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureLoad {
    pub texture: TextureId,
    pub url: String,
    /// Byte count on success.
    pub result: Result<usize, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HostMessage {
    Sensor(SensorEvent),
    TextureLoaded(TextureLoad),
}

/// Cloneable, `Send` handle for enqueueing messages from any thread.
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<HostMessage>,
}

impl EventSender {
    pub fn send(&self, message: HostMessage) -> Result<(), SendError<HostMessage>> {
        self.tx.send(message)
    }

    pub fn sensor(&self, event: SensorEvent) -> Result<(), SendError<HostMessage>> {
        self.send(HostMessage::Sensor(event))
    }
}

pub struct MessageQueue {
    tx: Sender<HostMessage>,
    rx: Receiver<HostMessage>,
}

impl Default for MessageQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel();
        Self { tx, rx }
    }

    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// Everything queued so far, in arrival order. Never blocks.
    pub fn drain(&self) -> Vec<HostMessage> {
        self.rx.try_iter().collect()
    }
}

/// A sensor event scheduled for a given frame, as read from an events file.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedEvent {
    pub frame: u32,
    pub sensor: String,
    #[serde(default)]
    pub is_over: bool,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub hit_point: Option<[f32; 3]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let queue = MessageQueue::new();
        let sender = queue.sender();
        sender.sensor(SensorEvent::new(SensorId(0), true, false)).unwrap();
        sender.sensor(SensorEvent::new(SensorId(1), false, true)).unwrap();
        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(
            drained[0],
            HostMessage::Sensor(SensorEvent::new(SensorId(0), true, false))
        );
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_sender_works_across_threads() {
        let queue = MessageQueue::new();
        let sender = queue.sender();
        std::thread::spawn(move || {
            sender.sensor(SensorEvent::new(SensorId(2), true, true)).unwrap();
        })
        .join()
        .unwrap();
        assert_eq!(queue.drain().len(), 1);
    }

    #[test]
    fn test_scripted_event_parse() {
        let event: ScriptedEvent =
            serde_json::from_str(r#"{"frame": 3, "sensor": "Touch", "isActive": true}"#).unwrap();
        assert_eq!(event.frame, 3);
        assert!(event.is_active);
        assert!(!event.is_over);
        assert!(event.hit_point.is_none());
    }
}
