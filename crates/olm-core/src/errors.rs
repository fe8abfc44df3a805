//! Structured error types shared across the online-model crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`OlmError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (element ids, positions, sizes, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the online model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum OlmError {
    /// A transfer or response matrix could not be inverted.
    #[error("singular matrix: {0}")]
    SingularMatrix(ErrorInfo),
    /// Tracker, probe and map capabilities do not match.
    #[error("incompatible probe: {0}")]
    IncompatibleProbe(ErrorInfo),
    /// Generic propagation failure (missing element data, invalid sub-length, ...).
    #[error("model error: {0}")]
    Model(ErrorInfo),
    /// A design or live parameter could not be retrieved during resync.
    #[error("synchronization error: {0}")]
    Synchronization(ErrorInfo),
    /// Query on a trajectory that never recorded a state.
    #[error("empty trajectory: {0}")]
    EmptyTrajectory(ErrorInfo),
    /// Invalid tracker, probe or lattice configuration.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization, schema and checkpoint I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl OlmError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            OlmError::SingularMatrix(info)
            | OlmError::IncompatibleProbe(info)
            | OlmError::Model(info)
            | OlmError::Synchronization(info)
            | OlmError::EmptyTrajectory(info)
            | OlmError::Config(info)
            | OlmError::Serde(info) => info,
        }
    }

    /// Name of the error family, as serialized.
    pub fn family(&self) -> &'static str {
        match self {
            OlmError::SingularMatrix(_) => "SingularMatrix",
            OlmError::IncompatibleProbe(_) => "IncompatibleProbe",
            OlmError::Model(_) => "Model",
            OlmError::Synchronization(_) => "Synchronization",
            OlmError::EmptyTrajectory(_) => "EmptyTrajectory",
            OlmError::Config(_) => "Config",
            OlmError::Serde(_) => "Serde",
        }
    }

    /// Re-raises the error as [`OlmError::Model`], keeping its code and
    /// recording the original family and code under `cause_family` and
    /// `cause_code`.
    pub fn into_model(self) -> Self {
        match self {
            OlmError::Model(_) => self,
            other => {
                let family = other.family();
                let info = match other {
                    OlmError::SingularMatrix(info)
                    | OlmError::IncompatibleProbe(info)
                    | OlmError::Model(info)
                    | OlmError::Synchronization(info)
                    | OlmError::EmptyTrajectory(info)
                    | OlmError::Config(info)
                    | OlmError::Serde(info) => info,
                };
                let code = info.code.clone();
                OlmError::Model(
                    info.with_context("cause_family", family)
                        .with_context("cause_code", code),
                )
            }
        }
    }

    /// Shorthand for a [`OlmError::Model`] error.
    pub fn model(code: impl Into<String>, message: impl Into<String>) -> Self {
        OlmError::Model(ErrorInfo::new(code, message))
    }

    /// Attaches a context entry to the payload regardless of the family.
    pub fn with_context(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let wrap = |info: ErrorInfo| info.with_context(key, value);
        match self {
            OlmError::SingularMatrix(info) => OlmError::SingularMatrix(wrap(info)),
            OlmError::IncompatibleProbe(info) => OlmError::IncompatibleProbe(wrap(info)),
            OlmError::Model(info) => OlmError::Model(wrap(info)),
            OlmError::Synchronization(info) => OlmError::Synchronization(wrap(info)),
            OlmError::EmptyTrajectory(info) => OlmError::EmptyTrajectory(wrap(info)),
            OlmError::Config(info) => OlmError::Config(wrap(info)),
            OlmError::Serde(info) => OlmError::Serde(wrap(info)),
        }
    }
}
