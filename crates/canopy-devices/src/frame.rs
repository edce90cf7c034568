use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Inbound device→cloud frame, one per WebSocket message.
#[derive(Debug, Clone, Deserialize)]
pub struct ReportFrame {
    pub device_id: Uuid,
    pub secret_key: String,
    #[serde(default)]
    pub sddl: Option<Value>,
    #[serde(default)]
    pub vars: Option<Map<String, Value>>,
    #[serde(default)]
    pub notify: Option<NotifyFrame>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NotifyFrame {
    #[serde(rename = "type")]
    pub notify_type: String,
    pub msg: String,
}
