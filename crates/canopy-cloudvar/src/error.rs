use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("unknown cloud variable: {0}")]
    UnknownVar(String),

    #[error("cannot compare values of datatype {0:?}")]
    NotComparable(crate::Datatype),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl canopy_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Message(message)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

canopy_common::impl_context!();
