//! Structured script diagnostics.
//!
//! Rhai reports parse and runtime errors with positions. These are wrapped
//! into a stable, serializable record. The manager collects them every frame
//! and `simulate` prints them under `"diagnostics"`.

use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptDiagnosticKind {
    ParseError,
    RuntimeError,
    /// The script called into something that does not exist or has the
    /// wrong shape.
    HostApiMisuse,
}

/// Which stage of a script's life failed.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScriptPhase {
    Compile,
    Construct,
    Initialize,
    Invoke,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ScriptLocation {
    /// 1-based.
    pub line: u32,
    /// 1-based.
    pub column: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScriptDiagnostic {
    pub script: String,
    pub kind: ScriptDiagnosticKind,
    pub phase: ScriptPhase,
    pub message: String,
    pub location: Option<ScriptLocation>,
}

fn classify(err: &rhai::EvalAltResult) -> ScriptDiagnosticKind {
    use rhai::EvalAltResult as E;
    match err {
        E::ErrorInFunctionCall(_, _, inner, _) => classify(inner),
        E::ErrorFunctionNotFound(..)
        | E::ErrorVariableNotFound(..)
        | E::ErrorPropertyNotFound(..)
        | E::ErrorMismatchDataType(..)
        | E::ErrorMismatchOutputType(..)
        | E::ErrorIndexingType(..) => ScriptDiagnosticKind::HostApiMisuse,
        _ => ScriptDiagnosticKind::RuntimeError,
    }
}

fn location(pos: rhai::Position) -> Option<ScriptLocation> {
    let line = pos.line()? as u32;
    Some(ScriptLocation {
        line,
        column: (pos.position().unwrap_or(0) as u32).max(1),
    })
}

pub fn from_parse_error(script: &str, err: &rhai::ParseError) -> ScriptDiagnostic {
    ScriptDiagnostic {
        script: script.to_string(),
        kind: ScriptDiagnosticKind::ParseError,
        phase: ScriptPhase::Compile,
        message: err.to_string(),
        location: location(err.position()),
    }
}

pub fn from_eval_error(
    script: &str,
    phase: ScriptPhase,
    err: &rhai::EvalAltResult,
) -> ScriptDiagnostic {
    ScriptDiagnostic {
        script: script.to_string(),
        kind: classify(err),
        phase,
        message: err.to_string(),
        location: location(err.position()),
    }
}

/// A failure detected by the host rather than the engine (e.g. a missing
/// entry function).
pub fn host_error(script: &str, phase: ScriptPhase, message: impl Into<String>) -> ScriptDiagnostic {
    ScriptDiagnostic {
        script: script.to_string(),
        kind: ScriptDiagnosticKind::HostApiMisuse,
        phase,
        message: message.into(),
        location: None,
    }
}
