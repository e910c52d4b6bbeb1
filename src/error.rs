//! Error types for scene wiring and behavior execution.
//!
//! None of these are fatal to a scene load. Callers log them with `log::warn!`
//! and carry on with whatever partial wiring survived.

use thiserror::Error;

use crate::fields::FieldType;

#[derive(Debug, Error)]
pub enum BehaviorError {
    /// A ROUTE endpoint or field binding names nothing in any registry.
    #[error("unresolved reference '{name}' ({context})")]
    UnresolvedReference { name: String, context: String },

    /// The marshaller has no rule for this type on this kind of target.
    #[error("unsupported {field_type} field '{field}' for target '{target}'")]
    UnsupportedTarget {
        field: String,
        field_type: FieldType,
        target: String,
    },

    /// The script engine reported a compile or runtime failure.
    #[error("script '{script}' failed in {function}: {message}")]
    ScriptInvocation {
        script: String,
        function: String,
        message: String,
    },

    /// A keyframe animation targets a DefinedItem with no scene node.
    #[error("animation target missing for '{item}'")]
    AnimationTargetMissing { item: String },

    #[error("invalid declaration: {0}")]
    Declaration(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl BehaviorError {
    pub fn unresolved(name: impl Into<String>, context: impl Into<String>) -> Self {
        BehaviorError::UnresolvedReference {
            name: name.into(),
            context: context.into(),
        }
    }

    pub fn unsupported(
        field: impl Into<String>,
        field_type: FieldType,
        target: impl Into<String>,
    ) -> Self {
        BehaviorError::UnsupportedTarget {
            field: field.into(),
            field_type,
            target: target.into(),
        }
    }

    pub fn script(
        script: impl Into<String>,
        function: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        BehaviorError::ScriptInvocation {
            script: script.into(),
            function: function.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, BehaviorError>;
