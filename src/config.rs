//! Runtime configuration for the behavior engine.
//!
//! Loaded from camelCase JSON; every field has a default so an empty object
//! `{}` is a valid configuration.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BehaviorError, Result};

/// Default animation tick rate (ticks per second).
fn default_frames_per_second() -> f32 {
    60.0
}

fn default_max_operations() -> u64 {
    100_000
}

fn default_max_call_levels() -> usize {
    64
}

fn default_max_expr_depth() -> usize {
    64
}

fn default_max_string_size() -> usize {
    10_000
}

fn default_script_log_limit() -> u32 {
    100
}

/// How per-frame scripts share the frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SchedulerMode {
    /// One per-frame script at a time; a later registration replaces the
    /// current one.
    #[default]
    SingleSlot,
    /// Every registered per-frame script runs each frame in registration order.
    Ordered,
}

/// Script engine sandbox limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SandboxLimits {
    /// Upper bound on operations per call; stops runaway loops.
    #[serde(default = "default_max_operations")]
    pub max_operations: u64,

    #[serde(default = "default_max_call_levels")]
    pub max_call_levels: usize,

    #[serde(default = "default_max_expr_depth")]
    pub max_expr_depth: usize,

    #[serde(default = "default_max_string_size")]
    pub max_string_size: usize,
}

impl Default for SandboxLimits {
    fn default() -> Self {
        Self {
            max_operations: default_max_operations(),
            max_call_levels: default_max_call_levels(),
            max_expr_depth: default_max_expr_depth(),
            max_string_size: default_max_string_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BehaviorConfig {
    /// Tick rate F used when baking keyframe animations.
    #[serde(default = "default_frames_per_second")]
    pub frames_per_second: f32,

    #[serde(default)]
    pub scheduler_mode: SchedulerMode,

    #[serde(default)]
    pub sandbox: SandboxLimits,

    /// Script log messages allowed per frame before further output is dropped.
    #[serde(default = "default_script_log_limit")]
    pub script_log_limit: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            frames_per_second: default_frames_per_second(),
            scheduler_mode: SchedulerMode::default(),
            sandbox: SandboxLimits::default(),
            script_log_limit: default_script_log_limit(),
        }
    }
}

impl BehaviorConfig {
    /// Read and validate a JSON configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| BehaviorError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let config: BehaviorConfig =
            serde_json::from_str(text).map_err(|e| BehaviorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frames_per_second.is_nan() || self.frames_per_second <= 0.0 {
            return Err(BehaviorError::Config(
                "framesPerSecond must be positive".to_string(),
            ));
        }
        let sandbox = &self.sandbox;
        if sandbox.max_operations == 0
            || sandbox.max_call_levels == 0
            || sandbox.max_expr_depth == 0
            || sandbox.max_string_size == 0
        {
            return Err(BehaviorError::Config(
                "sandbox limits must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = BehaviorConfig::from_json("{}").unwrap();
        assert_eq!(config.frames_per_second, 60.0);
        assert_eq!(config.scheduler_mode, SchedulerMode::SingleSlot);
        assert_eq!(config.sandbox.max_operations, 100_000);
        assert_eq!(config.script_log_limit, 100);
    }

    #[test]
    fn test_camel_case_fields() {
        let config = BehaviorConfig::from_json(
            r#"{"framesPerSecond": 30, "schedulerMode": "ordered", "sandbox": {"maxOperations": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.frames_per_second, 30.0);
        assert_eq!(config.scheduler_mode, SchedulerMode::Ordered);
        assert_eq!(config.sandbox.max_operations, 5);
        assert_eq!(config.sandbox.max_call_levels, 64);
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        assert!(BehaviorConfig::from_json(r#"{"framesPerSecond": 0}"#).is_err());
        assert!(BehaviorConfig::from_json(r#"{"sandbox": {"maxCallLevels": 0}}"#).is_err());
        assert!(BehaviorConfig::from_json("not json").is_err());
    }
}
