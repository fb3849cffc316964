use thiserror::Error;

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("registry connection error: {0}")]
    Connection(String),

    #[error("registration error: {0}")]
    Registration(String),

    #[error("key not found: {0}")]
    NotFound(String),

    #[error("failed to decode value at key {key}: {source}")]
    Decode {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("store error: {0}")]
    Store(String),

    #[error("health endpoint error: {0}")]
    Health(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl RegistryError {
    /// True for the errors a bootstrap path must treat as fatal before registering.
    pub fn is_config(&self) -> bool {
        matches!(self, RegistryError::Config(_) | RegistryError::Connection(_))
    }
}

pub type Result<T> = std::result::Result<T, RegistryError>;
