pub mod error;
pub mod frame;
pub mod handler;
pub mod session;
pub mod table;

pub use error::{Error, Result};
pub use frame::{NotifyFrame, ReportFrame};
pub use handler::{register as register_device_control, DEVICE_KEY_PREFIX};
pub use session::{device_control_key, handle_device_socket};
pub use table::{DeviceSessionHandle, DeviceSessionTable};

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn session_table_round_trip() {
        let table = DeviceSessionTable::new();
        let id = Uuid::new_v4();
        assert!(table.get(id).await.is_none());

        let (handle, mut rx) = table.insert(id).await;
        assert_eq!(table.count().await, 1);

        handle.enqueue(serde_json::json!({"cmd": "ping"})).unwrap();
        let received = rx.recv().await.unwrap();
        assert_eq!(received["cmd"], "ping");

        table.remove(id).await;
        assert!(table.get(id).await.is_none());
    }

    #[tokio::test]
    async fn enqueue_after_drop_fails_closed() {
        let table = DeviceSessionTable::new();
        let id = Uuid::new_v4();
        let (handle, rx) = table.insert(id).await;
        drop(rx);
        assert!(matches!(handle.enqueue(serde_json::json!({})), Err(Error::SessionClosed)));
    }

    #[test]
    fn device_control_key_is_namespaced() {
        let id = Uuid::new_v4();
        assert_eq!(device_control_key(id), format!("device:{id}"));
    }
}
