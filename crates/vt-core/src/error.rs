use thiserror::Error;

/// Every way a single try-on attempt can end without a stored result.
///
/// The first four variants are the remote outcomes; they are terminal and
/// mutually exclusive. The rest are local failures around them.
#[derive(Error, Debug)]
pub enum TryOnError {
    #[error("API request error: {0}")]
    Transport(String),

    #[error("Error: {0}")]
    JobRejected(String),

    #[error("Processing failed: {0}")]
    JobFailed(String),

    #[error("Processing timed out. Check status manually with job ID: {job_id}")]
    JobTimedOut { job_id: String },

    #[error("Processing cancelled for job {job_id}")]
    Cancelled { job_id: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Image codec error: {0}")]
    Codec(#[from] image::ImageError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TryOnError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        Self::Transport(err.to_string())
    }

    /// True for the outcomes reported by the remote service rather than
    /// produced locally.
    pub fn is_remote(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::JobRejected(_) | Self::JobFailed(_) | Self::JobTimedOut { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, TryOnError>;
