use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("invalid video reference: {0}")]
    InvalidReference(String),

    #[error("{tool} not found, please check it is installed correctly")]
    MissingDependency { tool: String },

    #[error("retried {attempts} times, pass this video: {id}")]
    RetryExhausted { id: String, attempts: u32 },

    #[error("cannot fetch video format for id {0}")]
    NoFormats(String),

    #[error("{tool} failed: {message}")]
    ToolFailed { tool: String, message: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
