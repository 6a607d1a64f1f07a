use thiserror::Error;

#[derive(Error, Debug)]
pub enum Ged2DotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    #[error("Unresolved reference {reference} in record {source_record}")]
    ResolutionError {
        reference: String,
        source_record: String,
    },

    #[error("Duplicate record id {id} (first declared at line {first_line}, again at line {line})")]
    DuplicateIdError {
        id: String,
        first_line: usize,
        line: usize,
    },

    #[error("Root person {id} not found in the input")]
    RootNotFoundError { id: String },

    #[error("Input encoding error: {message}")]
    EncodingError { message: String },

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Parse,
    Resolution,
    Configuration,
    Io,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl Ged2DotError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    pub fn resolution(reference: impl Into<String>, source_record: impl Into<String>) -> Self {
        Self::ResolutionError {
            reference: reference.into(),
            source_record: source_record.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::ParseError { .. } | Self::EncodingError { .. } => ErrorCategory::Parse,
            Self::ResolutionError { .. }
            | Self::DuplicateIdError { .. }
            | Self::RootNotFoundError { .. } => ErrorCategory::Resolution,
            Self::ConfigValidationError { .. }
            | Self::MissingConfigError { .. }
            | Self::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            Self::IoError(_) | Self::SerializationError(_) => ErrorCategory::Io,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Parse | ErrorCategory::Resolution => ErrorSeverity::High,
            ErrorCategory::Io => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            Self::ParseError { line, .. } => format!(
                "Check line {} of the GEDCOM file: every line needs a level number and a tag",
                line
            ),
            Self::ResolutionError { reference, .. } => format!(
                "Declare a record for {} or remove the reference to it",
                reference
            ),
            Self::DuplicateIdError { id, .. } => {
                format!("Give each record a unique id; {} is used twice", id)
            }
            Self::RootNotFoundError { .. } => {
                "Set tree.root_person_id to the id of an INDI record in the input".to_string()
            }
            Self::EncodingError { .. } => {
                "Set input.encoding to \"latin-1\" or re-save the file as UTF-8".to_string()
            }
            Self::MissingConfigError { field } => {
                format!("Add '{}' to the configuration file or pass it as a flag", field)
            }
            Self::ConfigValidationError { .. } | Self::InvalidConfigValueError { .. } => {
                "Fix the configuration value and run again".to_string()
            }
            Self::IoError(_) => "Check that the input exists and the output is writable".to_string(),
            Self::SerializationError(_) => "Report this as a bug".to_string(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Parse => format!("The GEDCOM input could not be read: {}", self),
            ErrorCategory::Resolution => format!("The family data is inconsistent: {}", self),
            ErrorCategory::Configuration => format!("The configuration is invalid: {}", self),
            ErrorCategory::Io => format!("Reading or writing failed: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, Ged2DotError>;
