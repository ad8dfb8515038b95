use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config file not found: {0}")]
    ConfigNotFound(PathBuf),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config validation error: {0}")]
    ConfigValidation(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    Input(String),

    #[error("platform error: {0}")]
    Platform(String),

    #[error("pull request #{0} not found")]
    PrNotFound(u64),

    #[error("no work item linked to pull request #{0}")]
    NotLinked(u64),

    #[error("no pull requests linked to work item #{0}")]
    NoLinkedPrs(u64),

    #[error("prompt error: {0}")]
    Prompt(String),

    #[error("generation service error: {0}")]
    Generation(String),

    #[error("work item update error: {0}")]
    Update(String),
}

pub type Result<T> = std::result::Result<T, Error>;
