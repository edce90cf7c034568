use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no listeners found for {0}")]
    NoListeners(String),

    #[error("request timed out")]
    Timeout,

    #[error("no handler for job key {0} on this worker")]
    NoHandler(String),

    #[error("all {0} attempt(s) failed: {1:?}")]
    AllFailed(usize, Vec<String>),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("internal bus error: {0}")]
    Internal(String),
}

impl canopy_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Internal(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

canopy_common::impl_context!();
