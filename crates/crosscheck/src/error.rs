use thiserror::Error;

/// Campaign and CLI errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("oracle error: {0}")]
    Oracle(#[from] crosscheck_oracle::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("worker pool error: {0}")]
    Pool(#[from] rayon::ThreadPoolBuildError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
