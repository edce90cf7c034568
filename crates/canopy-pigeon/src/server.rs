use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use canopy_datalayer::Connection as Datalayer;
use serde_json::Map;
use tokio::net::{TcpListener, TcpStream};

use crate::error::{Error, Result};
use crate::wire::{read_json, write_json, PigeonRequest, PigeonResponse};

pub type HandlerFuture = Pin<Box<dyn Future<Output = PigeonResponse> + Send + 'static>>;
pub type HandlerFn = Arc<dyn Fn(Map<String, serde_json::Value>) -> HandlerFuture + Send + Sync>;
/// A handler bound to a key *prefix* rather than an exact key, for routing
/// keys that carry an identifier suffix (e.g. `device:<uuid>`) picked at
/// connection time rather than known at startup. Receives the full routing
/// key alongside the body so it can recover that suffix.
pub type PrefixHandlerFn = Arc<dyn Fn(String, Map<String, serde_json::Value>) -> HandlerFuture + Send + Sync>;

/// RPC server side of the bus: binds a TCP listener on `1888`, registers
/// itself as a worker, and dispatches each inbound connection's single
/// request to the handler registered for its routing key. Mirrors
/// `PigeonWorker.serveRPC`/`HandleRequest`, but handler registration lives
/// one layer up in `canopy-jobserver` — this type only knows about keys and
/// boxed handler closures.
pub struct PigeonServer {
    hostname: String,
    handlers: HashMap<String, HandlerFn>,
    prefix_handlers: Vec<(String, PrefixHandlerFn)>,
}

impl PigeonServer {
    pub fn new(hostname: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            handlers: HashMap::new(),
            prefix_handlers: Vec::new(),
        }
    }

    /// Register `handler` for `key`. Registering the same key twice is a
    /// caller error, reported by `Err`; `canopy-jobserver` escalates this
    /// to a panic at startup per its own contract.
    pub fn listen(&mut self, key: impl Into<String>, handler: HandlerFn) -> Result<()> {
        let key = key.into();
        if self.handlers.contains_key(&key) {
            return Err(Error::Internal(format!("handler already registered for key {key}")));
        }
        self.handlers.insert(key, handler);
        Ok(())
    }

    /// Register `handler` for every key starting with `prefix`. Listener
    /// registration in the datalayer for such keys is the caller's
    /// responsibility at the point a concrete key becomes live (e.g. a
    /// device connecting), not done here at bind time, since the full key
    /// isn't known until then.
    pub fn listen_prefix(&mut self, prefix: impl Into<String>, handler: PrefixHandlerFn) -> Result<()> {
        let prefix = prefix.into();
        if self.prefix_handlers.iter().any(|(p, _)| *p == prefix) {
            return Err(Error::Internal(format!("prefix handler already registered for {prefix}")));
        }
        self.prefix_handlers.push((prefix, handler));
        Ok(())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn registered_keys(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }

    /// Register this host as a worker and a listener for every handled key,
    /// then bind and serve forever. Bind failure is the one fatal
    /// condition; a panicking handler is caught per-connection and turned
    /// into an `Internal`-flavored response instead of taking the server
    /// down.
    pub async fn bind(self, datalayer: Arc<dyn Datalayer>, addr: &str) -> Result<()> {
        datalayer
            .register_worker(&self.hostname)
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;
        for key in self.handlers.keys() {
            datalayer
                .register_listener(&self.hostname, key)
                .await
                .map_err(|e| Error::Internal(e.to_string()))?;
        }

        let listener = TcpListener::bind(addr).await?;
        tracing::info!(addr, hostname = %self.hostname, "pigeon: server listening");

        let handlers = Arc::new(self.handlers);
        let prefix_handlers = Arc::new(self.prefix_handlers);
        loop {
            let (stream, peer) = listener.accept().await?;
            let handlers = handlers.clone();
            let prefix_handlers = prefix_handlers.clone();
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, &handlers, &prefix_handlers).await {
                    tracing::warn!(%peer, error = %e, "pigeon: connection error");
                }
            });
        }
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    handlers: &HashMap<String, HandlerFn>,
    prefix_handlers: &[(String, PrefixHandlerFn)],
) -> Result<()> {
    let request: PigeonRequest = read_json(&mut stream).await?;

    let response = if let Some(handler) = handlers.get(&request.key).cloned() {
        match tokio::spawn(handler(request.body)).await {
            Ok(response) => response,
            Err(join_error) => {
                tracing::error!(key = %request.key, error = %join_error, "pigeon: handler panicked");
                PigeonResponse::error("internal error")
            }
        }
    } else if let Some((_, handler)) = prefix_handlers.iter().find(|(prefix, _)| request.key.starts_with(prefix.as_str())) {
        let key = request.key.clone();
        let handler = handler.clone();
        match tokio::spawn(handler(key, request.body)).await {
            Ok(response) => response,
            Err(join_error) => {
                tracing::error!(key = %request.key, error = %join_error, "pigeon: handler panicked");
                PigeonResponse::error("internal error")
            }
        }
    } else {
        PigeonResponse::error(format!("no handler for job key {}", request.key))
    };

    write_json(&mut stream, &response).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_handler() -> HandlerFn {
        Arc::new(|_body| Box::pin(async { PigeonResponse::ok(Map::new()) }))
    }

    #[test]
    fn duplicate_key_registration_is_rejected() {
        let mut server = PigeonServer::new("host-a");
        server.listen("device:1", noop_handler()).unwrap();
        let err = server.listen("device:1", noop_handler()).unwrap_err();
        assert!(matches!(err, Error::Internal(_)));
    }
}
