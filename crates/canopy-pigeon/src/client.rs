use std::sync::Arc;
use std::time::Duration;

use canopy_datalayer::Connection as Datalayer;
use rand::seq::IndexedRandom;
use serde_json::Map;
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::wire::{read_json, write_json, PigeonRequest, PigeonResponse};

const DEFAULT_TIMEOUT_MS: u64 = 100;

/// Client side of the message bus: resolves listeners for a routing key via
/// the datalayer and dials the chosen worker directly, the way
/// `PigeonLauncher.send` dials `hostname:1888` over `net/rpc`.
#[derive(Clone)]
pub struct PigeonClient {
    datalayer: Arc<dyn Datalayer>,
    timeout: Duration,
}

impl PigeonClient {
    pub fn new(datalayer: Arc<dyn Datalayer>) -> Self {
        Self {
            datalayer,
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Resolve listeners for `key`, pick one uniformly at random, and
    /// deliver `payload`. Returns `NoListeners` if the registry is empty,
    /// `Timeout` if no reply arrives within the configured window.
    pub async fn launch(&self, key: &str, payload: Map<String, serde_json::Value>) -> Result<PigeonResponse> {
        let listeners = self.datalayer.get_listeners(key).await.map_err(|e| Error::Internal(e.to_string()))?;
        let hosts: Vec<&String> = listeners.iter().collect();
        let host = hosts
            .choose(&mut rand::rng())
            .ok_or_else(|| Error::NoListeners(key.to_string()))?;

        tokio::time::timeout(self.timeout, send(host, key, payload))
            .await
            .map_err(|_| Error::Timeout)?
    }

    /// Dispatch `payload` to every listener for `key`; replies are
    /// discarded, failures are logged but never propagated (matches the
    /// "dispatch to each; discard responses" contract).
    pub async fn broadcast(&self, key: &str, payload: Map<String, serde_json::Value>) -> Result<()> {
        let listeners = self.datalayer.get_listeners(key).await.map_err(|e| Error::Internal(e.to_string()))?;
        let timeout = self.timeout;
        let futures = listeners.iter().map(|host| {
            let host = host.clone();
            let key = key.to_string();
            let payload = payload.clone();
            async move {
                match tokio::time::timeout(timeout, send(&host, &key, payload)).await {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => tracing::warn!(host, key, error = %e, "pigeon: broadcast attempt failed"),
                    Err(_) => tracing::warn!(host, key, "pigeon: broadcast attempt timed out"),
                }
            }
        });
        futures::future::join_all(futures).await;
        Ok(())
    }

    /// Race `n` distinct listeners for `key`, returning the first success
    /// and dropping the rest. This is a full implementation of a verb the
    /// original server stubs out entirely (`"Not fully implemented"`); its
    /// behavior here comes only from the bus's documented contract.
    pub async fn launch_idempotent(
        &self,
        key: &str,
        n: usize,
        payload: Map<String, serde_json::Value>,
    ) -> Result<PigeonResponse> {
        let listeners = self.datalayer.get_listeners(key).await.map_err(|e| Error::Internal(e.to_string()))?;
        if listeners.is_empty() {
            return Err(Error::NoListeners(key.to_string()));
        }
        let mut hosts: Vec<String> = listeners.into_iter().collect();
        {
            use rand::seq::SliceRandom;
            hosts.shuffle(&mut rand::rng());
        }
        hosts.truncate(n.max(1).min(hosts.len()));

        let mut attempts = futures::stream::FuturesUnordered::new();
        for host in &hosts {
            let host = host.clone();
            let key = key.to_string();
            let payload = payload.clone();
            let timeout = self.timeout;
            attempts.push(async move {
                tokio::time::timeout(timeout, send(&host, &key, payload))
                    .await
                    .map_err(|_| Error::Timeout)
                    .and_then(|r| r)
                    .map_err(|e| (host, e))
            });
        }

        use futures::StreamExt;
        let mut errors = Vec::new();
        while let Some(result) = attempts.next().await {
            match result {
                Ok(response) => return Ok(response),
                Err((host, e)) => errors.push(format!("{host}: {e}")),
            }
        }
        Err(Error::AllFailed(hosts.len(), errors))
    }
}

async fn send(
    host: &str,
    key: &str,
    body: Map<String, serde_json::Value>,
) -> Result<PigeonResponse> {
    let mut stream = TcpStream::connect((host, crate::DEFAULT_PORT)).await?;
    let request = PigeonRequest {
        key: key.to_string(),
        body,
    };
    write_json(&mut stream, &request).await?;
    read_json(&mut stream).await
}
