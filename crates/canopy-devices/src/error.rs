use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("handshake timed out")]
    HandshakeTimeout,

    #[error("authentication failed")]
    AuthFailed,

    #[error("malformed frame: {0}")]
    InvalidFrame(String),

    #[error("device is offline")]
    DeviceOffline,

    #[error("session closed")]
    SessionClosed,

    #[error(transparent)]
    Datalayer(#[from] canopy_datalayer::Error),

    #[error(transparent)]
    Cloudvar(#[from] canopy_cloudvar::Error),

    #[error(transparent)]
    Axum(#[from] axum::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
