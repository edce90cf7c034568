use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A live device session's command inbox, as seen by the rest of the
/// process. `DeviceSession` itself owns the receiving end and drains it
/// into the socket.
#[derive(Clone)]
pub struct DeviceSessionHandle {
    pub device_id: Uuid,
    outbox: mpsc::UnboundedSender<serde_json::Value>,
}

impl DeviceSessionHandle {
    pub fn enqueue(&self, payload: serde_json::Value) -> Result<()> {
        self.outbox
            .send(payload)
            .map_err(|_| Error::SessionClosed)
    }
}

/// Per-host table of live device sessions, generalizing the conn-id-keyed
/// `NodeRegistry` to device UUIDs. Mutated by the acceptor on session
/// creation, the session task on teardown, and read by the
/// `device-control` job handler — protected by one `RwLock` since reads
/// vastly outnumber writes.
#[derive(Default)]
pub struct DeviceSessionTable {
    sessions: RwLock<HashMap<Uuid, DeviceSessionHandle>>,
}

impl DeviceSessionTable {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn insert(&self, device_id: Uuid) -> (DeviceSessionHandle, mpsc::UnboundedReceiver<serde_json::Value>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = DeviceSessionHandle {
            device_id,
            outbox: tx,
        };
        self.sessions.write().await.insert(device_id, handle.clone());
        (handle, rx)
    }

    pub async fn remove(&self, device_id: Uuid) {
        self.sessions.write().await.remove(&device_id);
    }

    pub async fn get(&self, device_id: Uuid) -> Option<DeviceSessionHandle> {
        self.sessions.read().await.get(&device_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.sessions.read().await.len()
    }
}
