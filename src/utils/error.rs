use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("API request failed: {0}")]
    ApiError(#[from] reqwest::Error),

    #[error("API returned {status} for {url}")]
    HttpStatusError { status: u16, url: String },

    #[error("Authentication failed: {message}")]
    AuthenticationError { message: String },

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid reporting period '{value}': {reason}")]
    InvalidPeriodError { value: String, reason: String },

    #[error("Invalid unit: {reason}")]
    InvalidUnitError { reason: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Authentication,
    Configuration,
    Data,
    Storage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl EtlError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => ErrorCategory::Network,
            EtlError::AuthenticationError { .. } => ErrorCategory::Authentication,
            EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::MissingConfigError { .. } => ErrorCategory::Configuration,
            EtlError::InvalidPeriodError { .. }
            | EtlError::InvalidUnitError { .. }
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. }
            | EtlError::SerializationError(_)
            | EtlError::CsvError(_) => ErrorCategory::Data,
            EtlError::IoError(_) | EtlError::ZipError(_) => ErrorCategory::Storage,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Network => ErrorSeverity::Medium,
            ErrorCategory::Data => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Authentication | ErrorCategory::Storage => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::HttpStatusError { status: 401 | 403, .. }
            | EtlError::AuthenticationError { .. } => {
                "Log in again and refresh the session cookies in your profile"
            }
            EtlError::ApiError(_) | EtlError::HttpStatusError { .. } => {
                "Check your network connection and that the portal is reachable, then rerun"
            }
            EtlError::MissingConfigError { .. }
            | EtlError::ConfigError { .. }
            | EtlError::ConfigValidationError { .. }
            | EtlError::InvalidConfigValueError { .. } => {
                "Review the profile TOML file against the documented settings"
            }
            EtlError::InvalidUnitError { .. } => {
                "Every unit in the registry needs a non-empty name and a unique positive number"
            }
            EtlError::InvalidPeriodError { .. } => {
                "Reporting periods look like 2024-1 or 2024-Q1 with a quarter between 1 and 4"
            }
            EtlError::CsvError(_) => "Make sure the input file is a CSV produced by the download command",
            EtlError::IoError(_) | EtlError::ZipError(_) => {
                "Check that the output directory exists and is writable"
            }
            EtlError::SerializationError(_)
            | EtlError::ProcessingError { .. }
            | EtlError::ValidationError { .. } => {
                "The portal returned data in an unexpected shape; rerun with --verbose for details"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Network => format!("Could not reach the reporting portal: {}", self),
            ErrorCategory::Authentication => format!("Login failed: {}", self),
            ErrorCategory::Configuration => format!("The profile is invalid: {}", self),
            ErrorCategory::Data => format!("Report data could not be processed: {}", self),
            ErrorCategory::Storage => format!("Output could not be written: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
