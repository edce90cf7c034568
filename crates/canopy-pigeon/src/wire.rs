use serde::{Deserialize, Serialize};
use serde_json::Map;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

/// One request sent over the wire: the routing key and its JSON payload.
/// Each TCP connection carries exactly one request and one reply, mirroring
/// the "one RPC call per connection" shape of the original `net/rpc`-over-
/// HTTP transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PigeonRequest {
    pub key: String,
    #[serde(default)]
    pub body: Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PigeonResponse {
    #[serde(default)]
    pub body: Map<String, serde_json::Value>,
    #[serde(default)]
    pub err: Option<String>,
}

impl PigeonResponse {
    pub fn ok(body: Map<String, serde_json::Value>) -> Self {
        Self { body, err: None }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            body: Map::new(),
            err: Some(message.into()),
        }
    }
}

/// Writes a single JSON object and half-closes the write side so the peer's
/// read terminates on EOF rather than on a framing delimiter — each
/// connection carries exactly one request and one reply, so there is never
/// a second message to distinguish from the first.
pub async fn write_json<T: Serialize>(stream: &mut TcpStream, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec(value)?;
    stream.write_all(&bytes).await?;
    stream.flush().await?;
    stream.shutdown().await?;
    Ok(())
}

/// Reads until the peer half-closes its write side, then parses the
/// accumulated bytes as one JSON object.
pub async fn read_json<T: for<'de> Deserialize<'de>>(stream: &mut TcpStream) -> Result<T> {
    let mut buf = Vec::new();
    let n = stream.read_to_end(&mut buf).await?;
    if n == 0 {
        return Err(Error::Internal("connection closed before a message was read".into()));
    }
    Ok(serde_json::from_slice(&buf)?)
}
