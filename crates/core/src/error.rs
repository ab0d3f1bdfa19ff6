use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Invalid config value for {key}: {value}")]
    Config { key: String, value: String },

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}
