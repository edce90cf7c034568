use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("not found")]
    NotFound,

    #[error("incorrect password")]
    InvalidPassword,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("internal datalayer error: {0}")]
    Internal(String),
}

impl canopy_common::FromMessage for Error {
    fn from_message(message: String) -> Self {
        Self::Internal(message)
    }
}

impl From<sqlx::Error> for Error {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => Self::NotFound,
            other => Self::Internal(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

canopy_common::impl_context!();
