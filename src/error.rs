use thiserror::Error;

#[derive(Error, Debug)]
pub enum CompendiumError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),
    #[error("Unrecognized option data: {0}")]
    UnrecognizedOption(String),
    #[error("Internal invariant violated: {0}")]
    Invariant(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Document error: {0}")]
    Document(String),
    #[error("Serialization error: {0}")]
    Serde(String),
}

pub type Result<T> = std::result::Result<T, CompendiumError>;

// Helper conversions
impl From<serde_json::Error> for CompendiumError {
    fn from(e: serde_json::Error) -> Self { Self::Serde(e.to_string()) }
}

impl From<config::ConfigError> for CompendiumError {
    fn from(e: config::ConfigError) -> Self { Self::Config(e.to_string()) }
}
