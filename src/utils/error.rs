use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Parquet error: {0}")]
    ParquetError(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    ArrowError(#[from] arrow::error::ArrowError),

    #[error("SQL error: {0}")]
    SqlError(#[from] rusqlite::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Required column '{column}' is missing from the input")]
    MissingColumn { column: String },

    #[error("Input not found: {path}")]
    InputNotFound { path: String },

    #[error("No input files matching '{pattern}' found in {dir}")]
    NoInputFiles { dir: String, pattern: String },

    #[error("Population could not be imputed for states: {}", states.join(", "))]
    UnresolvedPopulation { states: Vec<String> },

    #[error("{} writer(s) failed: {}", failures.len(), failures.join("; "))]
    WritersFailed { failures: Vec<String> },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },
}

/// Broad family an error belongs to, used for logging and exit codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InputMissing,
    Parse,
    Storage,
    Configuration,
    System,
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
            EtlError::MissingColumn { .. }
            | EtlError::InputNotFound { .. }
            | EtlError::NoInputFiles { .. }
            | EtlError::ZipError(_) => ErrorCategory::InputMissing,
            EtlError::CsvError(_)
            | EtlError::SerializationError(_)
            | EtlError::UnresolvedPopulation { .. }
            | EtlError::ProcessingError { .. } => ErrorCategory::Parse,
            EtlError::ParquetError(_)
            | EtlError::ArrowError(_)
            | EtlError::SqlError(_)
            | EtlError::WritersFailed { .. } => ErrorCategory::Storage,
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            EtlError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Storage => ErrorSeverity::Medium,
            ErrorCategory::InputMissing | ErrorCategory::Parse => ErrorSeverity::High,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            EtlError::MissingColumn { .. } => {
                "Check that the input files are HIST_PAINEL_COVIDBR exports with a header row"
            }
            EtlError::InputNotFound { .. } => {
                "Check the --archive and --input-dir paths; download the HIST_PAINEL_COVIDBR archive if needed"
            }
            EtlError::NoInputFiles { .. } => {
                "Check --input-dir/--archive and that --file-pattern matches the extracted files"
            }
            EtlError::ZipError(_) => "Re-download the archive; it is missing or corrupt",
            EtlError::CsvError(_) => "Make sure the files are ';'-separated UTF-8 text",
            EtlError::UnresolvedPopulation { .. } => {
                "Use --population-fallback keep or global to tolerate states without population data"
            }
            EtlError::SqlError(_) | EtlError::WritersFailed { .. } => {
                "Re-run the pipeline; for SQL output use replace mode to avoid partial appends"
            }
            EtlError::ParquetError(_) | EtlError::ArrowError(_) => {
                "Check free disk space and write permissions for the Parquet output"
            }
            EtlError::ConfigError { .. }
            | EtlError::MissingConfigError { .. }
            | EtlError::InvalidConfigValueError { .. }
            | EtlError::ConfigValidationError { .. } => {
                "Fix the configuration value and run again"
            }
            EtlError::IoError(_) => "Check file paths and permissions",
            EtlError::SerializationError(_) | EtlError::ProcessingError { .. } => {
                "Run with --verbose and inspect the log for the failing step"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::InputMissing => format!("Input problem: {}", self),
            ErrorCategory::Parse => format!("Could not process the data: {}", self),
            ErrorCategory::Storage => format!("Could not save the results: {}", self),
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_column_is_input_missing() {
        let err = EtlError::MissingColumn {
            column: "data".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::InputMissing);
        assert_eq!(err.exit_code(), 1);
        assert!(err.to_string().contains("data"));
    }

    #[test]
    fn test_absent_source_is_input_missing() {
        let err = EtlError::InputNotFound {
            path: "covid.zip".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::InputMissing);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.exit_code(), 1);
        assert!(err.user_friendly_message().starts_with("Input problem"));
        assert!(err.to_string().contains("covid.zip"));
    }

    #[test]
    fn test_writer_failures_are_storage_errors() {
        let err = EtlError::WritersFailed {
            failures: vec!["sql: disk I/O error".to_string()],
        };
        assert_eq!(err.category(), ErrorCategory::Storage);
        assert_eq!(err.severity(), ErrorSeverity::Medium);
        assert!(err.user_friendly_message().starts_with("Could not save"));
    }
}
