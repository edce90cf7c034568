use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// The fixed error taxonomy surfaced to REST clients. Every job handler
/// returns one of these rather than an ad hoc error string, so the status
/// code a client sees is determined by what went wrong, not by which
/// handler happened to hit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadInput,
    Unauthorized,
    Forbidden,
    NotFound,
    Conflict,
    Timeout,
    NoListeners,
    Internal,
}

impl ErrorKind {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorKind::BadInput => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorKind::NoListeners => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[error("{kind:?}: {msg}")]
pub struct RestError {
    pub kind: ErrorKind,
    pub msg: String,
}

impl RestError {
    pub fn new(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self { kind, msg: msg.into() }
    }

    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadInput, msg)
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, msg)
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// Encode onto the wire as the `err` string of a `PigeonResponse`.
    pub fn to_wire(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{\"kind\":\"internal\",\"msg\":\"\"}".into())
    }

    /// Decode a `PigeonResponse.err` string back into a `RestError`.
    /// Errors that didn't originate from a `RestError` (bus-level failures,
    /// garbled text) collapse to `Internal` rather than panicking.
    pub fn from_wire(s: &str) -> Self {
        serde_json::from_str(s).unwrap_or_else(|_| Self::internal(s.to_string()))
    }
}

impl From<canopy_datalayer::Error> for RestError {
    fn from(e: canopy_datalayer::Error) -> Self {
        match e {
            canopy_datalayer::Error::NotFound => RestError::not_found("not found"),
            canopy_datalayer::Error::InvalidPassword => {
                RestError::unauthorized("invalid credentials")
            },
            canopy_datalayer::Error::Validation(msg) => RestError::bad_input(msg),
            canopy_datalayer::Error::Internal(msg) => RestError::internal(msg),
        }
    }
}

impl From<canopy_cloudvar::Error> for RestError {
    fn from(e: canopy_cloudvar::Error) -> Self {
        RestError::bad_input(e.to_string())
    }
}

impl From<canopy_pigeon::Error> for RestError {
    fn from(e: canopy_pigeon::Error) -> Self {
        match e {
            canopy_pigeon::Error::Timeout => RestError::new(ErrorKind::Timeout, "bus call timed out"),
            canopy_pigeon::Error::NoListeners(key) => {
                RestError::new(ErrorKind::NoListeners, format!("no listener for '{key}'"))
            },
            other => RestError::internal(other.to_string()),
        }
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let status = self.kind.status();
        let body = json!({ "error": self.kind, "msg": self.msg });
        (status, axum::Json(body)).into_response()
    }
}
