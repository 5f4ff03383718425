use std::fmt;

#[derive(Debug)]
pub enum IdsError {
    /// The capture tool executable could not be located.
    SourceUnavailable(String),
    /// The capture target (file or interface) could not be opened.
    SourceOpen(String),
    /// The model artifact could not be loaded at startup.
    Model(String),
    /// The classifier failed on a single record.
    Classification(String),
    ConfigError(String),
    IoError(String),
}

impl fmt::Display for IdsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdsError::SourceUnavailable(msg) => write!(f, "Capture tool unavailable: {}", msg),
            IdsError::SourceOpen(msg) => write!(f, "Cannot open capture source: {}", msg),
            IdsError::Model(msg) => write!(f, "Model error: {}", msg),
            IdsError::Classification(msg) => write!(f, "Classification error: {}", msg),
            IdsError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            IdsError::IoError(msg) => write!(f, "IO error: {}", msg),
        }
    }
}

impl std::error::Error for IdsError {}

impl From<std::io::Error> for IdsError {
    fn from(err: std::io::Error) -> Self {
        IdsError::IoError(err.to_string())
    }
}

impl From<csv::Error> for IdsError {
    fn from(err: csv::Error) -> Self {
        IdsError::IoError(err.to_string())
    }
}

impl From<ctrlc::Error> for IdsError {
    fn from(err: ctrlc::Error) -> Self {
        IdsError::ConfigError(err.to_string())
    }
}

impl From<pyo3::PyErr> for IdsError {
    fn from(err: pyo3::PyErr) -> Self {
        IdsError::Model(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, IdsError>;
