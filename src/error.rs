use thiserror::Error;

/// Errors produced by the navigation daemon.
#[derive(Error, Debug)]
pub enum LakshyaError {
    #[error("Connection error: {0}")]
    Connection(#[from] std::io::Error),

    #[error("Vision feed error: {0}")]
    Vision(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<toml::de::Error> for LakshyaError {
    fn from(e: toml::de::Error) -> Self {
        LakshyaError::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, LakshyaError>;
