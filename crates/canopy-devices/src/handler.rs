use std::sync::Arc;

use canopy_jobserver::{JobServer, PrefixHandlerFn, Request, UserCtx};
use canopy_pigeon::PigeonResponse;
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::session::device_control_key;
use crate::table::DeviceSessionTable;

/// Prefix under which every device's per-session routing key falls, e.g.
/// `device:<uuid>`. One handler answers for the whole prefix, since the
/// concrete keys are only known once a device connects.
pub const DEVICE_KEY_PREFIX: &str = "device:";

/// Register the device-control handler on `server` for the `device:` key
/// prefix, closing over the local session table so the handler only ever
/// answers for devices actually connected to this host.
pub fn register(server: &mut JobServer, sessions: Arc<DeviceSessionTable>) {
    let handler: PrefixHandlerFn = Arc::new(move |key: String, req: Request, _ctx: Arc<UserCtx>| {
        let sessions = Arc::clone(&sessions);
        Box::pin(async move { device_control(key, req, sessions).await })
    });
    server.register_prefix(DEVICE_KEY_PREFIX, handler);
}

async fn device_control(key: String, req: Request, sessions: Arc<DeviceSessionTable>) -> PigeonResponse {
    let device_id = match key
        .strip_prefix(DEVICE_KEY_PREFIX)
        .and_then(|s| Uuid::parse_str(s).ok())
    {
        Some(id) => id,
        None => return PigeonResponse::error(format!("malformed device routing key {key}")),
    };

    let payload = req
        .get("payload")
        .cloned()
        .unwrap_or(Value::Object(Map::new()));

    let Some(handle) = sessions.get(device_id).await else {
        return PigeonResponse::error("device offline");
    };

    match handle.enqueue(payload) {
        Ok(()) => {
            let mut body = Map::new();
            body.insert("result".into(), Value::String("ok".into()));
            PigeonResponse::ok(body)
        },
        Err(e) => PigeonResponse::error(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_control_key_falls_under_the_registered_prefix() {
        let id = Uuid::nil();
        assert!(device_control_key(id).starts_with(DEVICE_KEY_PREFIX));
    }
}
