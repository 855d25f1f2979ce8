use crate::domain::model::PipelineStage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration key: {key}")]
    MissingConfigurationKey { key: String },

    #[error("Invalid value for '{field}': '{value}' ({reason})")]
    InvalidConfigValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Degenerate bounding box at latitude {lat}")]
    DegenerateGeometry { lat: f64 },

    #[error("Domain {level} cannot be nested along {axis}: parent has only {parent_count} cells")]
    NestingInfeasible {
        level: usize,
        axis: &'static str,
        parent_count: u32,
    },

    #[error("External process '{program}' failed with exit code {}", exit_code.map(|c| c.to_string()).unwrap_or_else(|| "none (terminated by signal)".to_string()))]
    ExternalProcess {
        program: String,
        exit_code: Option<i32>,
    },

    #[error("Run interrupted before completion")]
    Interrupted,

    #[error("Reanalysis data unavailable for {date}: {reason}")]
    DataUnavailable { date: String, reason: String },

    #[error("Interpolation output metadata unavailable: {reason}")]
    MetadataUnavailable { reason: String },

    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        stage: PipelineStage,
        #[source]
        source: Box<PipelineError>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    ExternalProcess,
    DataUnavailable,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::ConfigError {
            message: message.into(),
        }
    }

    pub fn missing_key(key: impl Into<String>) -> Self {
        PipelineError::MissingConfigurationKey { key: key.into() }
    }

    pub fn invalid_value(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        PipelineError::InvalidConfigValue {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// The stage a failure is attributed to, if it went through the sequencer.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            PipelineError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            PipelineError::ConfigError { .. }
            | PipelineError::MissingConfigurationKey { .. }
            | PipelineError::InvalidConfigValue { .. }
            | PipelineError::DegenerateGeometry { .. }
            | PipelineError::NestingInfeasible { .. }
            | PipelineError::TomlError(_) => ErrorCategory::Configuration,
            PipelineError::ExternalProcess { .. } | PipelineError::Interrupted => {
                ErrorCategory::ExternalProcess
            }
            PipelineError::DataUnavailable { .. }
            | PipelineError::MetadataUnavailable { .. }
            | PipelineError::HttpError(_) => ErrorCategory::DataUnavailable,
            PipelineError::IoError(_) | PipelineError::SerializationError(_) => {
                ErrorCategory::System
            }
            PipelineError::StageFailed { source, .. } => source.category(),
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::DataUnavailable => ErrorSeverity::Medium,
            ErrorCategory::ExternalProcess => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            PipelineError::StageFailed { stage, source } => format!(
                "{} Partial outputs of {} were left in the run directory; regenerate the run from scratch.",
                source.recovery_suggestion(),
                stage
            ),
            PipelineError::MissingConfigurationKey { key } => {
                format!("Add '{}' to the namelist template", key)
            }
            PipelineError::InvalidConfigValue { field, .. } => {
                format!("Fix the value of '{}' in the run configuration", field)
            }
            PipelineError::DegenerateGeometry { .. } => {
                "Move the domain center away from the poles".to_string()
            }
            PipelineError::NestingInfeasible { level, .. } => format!(
                "Enlarge the desired cell counts of domain d{:02} or reduce max_dom",
                level
            ),
            PipelineError::ExternalProcess { program, .. } => format!(
                "Inspect the log files written by {} in the run directory",
                program
            ),
            PipelineError::Interrupted => {
                "Delete the run directory and start the run again".to_string()
            }
            PipelineError::DataUnavailable { date, .. } => format!(
                "Download the reanalysis files for {} before starting the run",
                date
            ),
            PipelineError::MetadataUnavailable { .. } => {
                "Check that the interpolation stage produced met_em files".to_string()
            }
            PipelineError::HttpError(_) => {
                "Check the retrieval service URL, key and network connectivity".to_string()
            }
            PipelineError::TomlError(_) | PipelineError::ConfigError { .. } => {
                "Check the run configuration file syntax".to_string()
            }
            PipelineError::IoError(_) | PipelineError::SerializationError(_) => {
                "Check file permissions and free disk space".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::ExternalProcess => format!("A model stage failed: {}", self),
            ErrorCategory::DataUnavailable => format!("Input data is missing: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
