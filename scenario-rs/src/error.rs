use std::fmt;

use thiserror::Error;

/// Error returned by a simulation engine. Kept boxed so the engine's error
/// reaches the caller untouched.
pub type EngineError = Box<dyn std::error::Error + Send + Sync>;

/// The engine call that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineStage {
    Create,
    Apply,
    Run,
}

impl fmt::Display for EngineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineStage::Create => write!(f, "create"),
            EngineStage::Apply => write!(f, "apply"),
            EngineStage::Run => write!(f, "run"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("invalid input for `{field}`: {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("simulation engine failed during {stage}: {source}")]
    EngineExecution {
        stage: EngineStage,
        #[source]
        source: EngineError,
    },

    #[error("result table has no series named `{0}`")]
    MissingSeries(String),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to write csv output: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScenarioError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ScenarioError::InvalidInput {
            field: field.into(),
            reason: reason.into(),
        }
    }

    pub fn missing(field: impl Into<String>) -> Self {
        Self::invalid(field, "required field is missing")
    }

    pub fn engine(stage: EngineStage, source: EngineError) -> Self {
        ScenarioError::EngineExecution { stage, source }
    }
}

pub type Result<T> = std::result::Result<T, ScenarioError>;
