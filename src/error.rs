use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid bind address: {0}")]
    InvalidBindAddress(String),

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid domain name for {key}: {value:?}")]
    InvalidName { key: &'static str, value: String },

    #[error("max_concurrent_queries must be greater than 0")]
    InvalidConcurrency,

    #[error("Invalid signature validity: {0}")]
    InvalidSignatureValidity(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;
