use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("handler already registered for key {0}")]
    DuplicateHandler(String),

    #[error(transparent)]
    Bus(#[from] canopy_pigeon::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
