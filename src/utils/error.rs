use crate::domain::model::MatchKey;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MigrationError {
    #[error("Invalid TOTP secret: {reason}")]
    InvalidSecret { reason: String },

    #[error("Ambiguous match: several destination items share {key}")]
    AmbiguousMatch { key: MatchKey },

    #[error("Could not {action} {target}: {message}")]
    Adapter {
        action: String,
        target: String,
        message: String,
    },

    #[error("Setup failed: {message}")]
    FatalSetup { message: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration error in {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Record,
    Destination,
    Setup,
    Configuration,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MigrationError {
    pub fn adapter(action: &str, target: impl ToString, message: impl ToString) -> Self {
        Self::Adapter {
            action: action.to_string(),
            target: target.to_string(),
            message: message.to_string(),
        }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::FatalSetup {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidSecret { .. } | Self::AmbiguousMatch { .. } => ErrorCategory::Record,
            Self::Adapter { .. } => ErrorCategory::Destination,
            Self::FatalSetup { .. }
            | Self::IoError(_)
            | Self::SerializationError(_)
            | Self::CsvError(_) => ErrorCategory::Setup,
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => ErrorCategory::Configuration,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Record => ErrorSeverity::Low,
            ErrorCategory::Destination => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Setup => ErrorSeverity::Critical,
        }
    }

    /// Errors that abort the run before any plan is built.
    pub fn is_fatal(&self) -> bool {
        self.severity() >= ErrorSeverity::High
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            Self::InvalidSecret { .. } => {
                "Check the TOTP value of this entry in the source export"
            }
            Self::AmbiguousMatch { .. } => {
                "Rename or merge the duplicate destination items, then re-run"
            }
            Self::Adapter { .. } => {
                "Re-run the same command; operations that already succeeded are safe to repeat"
            }
            Self::FatalSetup { .. } => {
                "Make sure the 'op' CLI is installed and signed in, and the export is unencrypted"
            }
            Self::IoError(_) => "Check that the file exists and is readable",
            Self::SerializationError(_) | Self::CsvError(_) => {
                "Export the source vault again as unencrypted JSON or CSV"
            }
            Self::ConfigValidationError { .. }
            | Self::InvalidConfigValueError { .. }
            | Self::MissingConfigError { .. } => "Fix the command line flags or the settings file",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::IoError(e) => format!("Could not read or write a file: {}", e),
            Self::SerializationError(e) => format!("The export is not valid JSON: {}", e),
            Self::CsvError(e) => format!("The export is not valid CSV: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MigrationError>;
