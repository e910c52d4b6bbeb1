pub mod error;
pub mod config;
pub mod ids;
pub mod math;
pub mod fields;
pub mod scene_graph;
pub mod nodes;
pub mod registry;
pub mod script_object;
pub mod interactive;
pub mod routing;

// Behavior execution
pub mod animation;
pub mod anchor;
pub mod assets;
pub mod events;
pub mod runtime;
pub mod marshal;
pub mod scheduler;
pub mod activation;

// Script engine
pub mod scripting;
pub mod script_log;
pub mod script_diagnostics;

// Scene input and driver
pub mod declarations;
pub mod loader;
pub mod manager;

pub mod cli;

pub use activation::{Behavior, BehaviorKind};
pub use config::BehaviorConfig;
pub use declarations::Declaration;
pub use error::{BehaviorError, Result};
pub use events::{EventSender, SensorEvent};
pub use manager::InteractivityManager;
pub use routing::Route;
