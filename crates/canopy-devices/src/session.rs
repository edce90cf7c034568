use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use canopy_cloudvar::{CloudVarSample, SddlDocument};
use canopy_datalayer::{Connection, NotificationType};
use futures::{stream::StreamExt, SinkExt};
use tracing::{debug, info, warn};

use crate::frame::ReportFrame;
use crate::table::DeviceSessionTable;

const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Drive one device WebSocket connection through
/// Accepted -> Authenticated -> Active -> Closed.
pub async fn handle_device_socket(
    socket: WebSocket,
    datalayer: Arc<dyn Connection>,
    sessions: Arc<DeviceSessionTable>,
    hostname: String,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    // ── Accepted: await the first frame, which doubles as the handshake ──

    let first = match tokio::time::timeout(HANDSHAKE_TIMEOUT, ws_rx.next()).await {
        Ok(Some(Ok(Message::Text(t)))) => t,
        Ok(Some(Ok(Message::Close(_)))) | Ok(None) => {
            debug!("device ws: closed before handshake");
            return;
        },
        Ok(Some(Ok(_))) => {
            warn!("device ws: first frame was not text, rejecting");
            return;
        },
        Ok(Some(Err(e))) => {
            warn!(error = %e, "device ws: read error during handshake");
            return;
        },
        Err(_) => {
            warn!("device ws: handshake timed out");
            return;
        },
    };

    let frame: ReportFrame = match serde_json::from_str(&first) {
        Ok(f) => f,
        Err(e) => {
            warn!(error = %e, "device ws: malformed handshake frame");
            return;
        },
    };

    // ── Authenticated: verify secret key against the datalayer ──

    let device = match datalayer
        .lookup_device_verify_secret_key(frame.device_id, &frame.secret_key)
        .await
    {
        Ok(d) => d,
        Err(e) => {
            warn!(device_id = %frame.device_id, error = %e, "device ws: rejected");
            return;
        },
    };

    if let Err(e) = datalayer.update_ws_connected(device.id, true).await {
        warn!(device_id = %device.id, error = %e, "device ws: failed to mark connected");
        return;
    }
    if let Err(e) = datalayer
        .register_listener(&hostname, &device_control_key(device.id))
        .await
    {
        warn!(device_id = %device.id, error = %e, "device ws: failed to register listener");
        let _ = datalayer.update_ws_connected(device.id, false).await;
        return;
    }

    info!(device_id = %device.id, "device ws: authenticated");

    let mut sddl = device.sddl.clone();
    let (handle, mut outbox) = sessions.insert(device.id).await;

    // Spawn the outbound command pump: drains the per-device outbox into
    // the socket for as long as the session is Active.
    let write_handle = tokio::spawn(async move {
        while let Some(payload) = outbox.recv().await {
            let text = match serde_json::to_string(&payload) {
                Ok(t) => t,
                Err(e) => {
                    warn!(error = %e, "device ws: failed to encode outbound command");
                    continue;
                },
            };
            if ws_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Apply the handshake frame's own report content before entering the
    // steady-state loop, so a report piggy-backed on the handshake isn't lost.
    apply_report(&datalayer, &mut sddl, device.id, &frame).await;

    // ── Active: message loop ──

    while let Some(msg) = ws_rx.next().await {
        let text = match msg {
            Ok(Message::Text(t)) => t,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(device_id = %device.id, error = %e, "device ws: read error");
                break;
            },
        };

        let report: ReportFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(device_id = %device.id, error = %e, "device ws: malformed report frame");
                continue;
            },
        };

        apply_report(&datalayer, &mut sddl, device.id, &report).await;
    }

    // ── Closed: tear down ──

    sessions.remove(device.id).await;
    drop(handle);
    write_handle.abort();
    let _ = datalayer.update_ws_connected(device.id, false).await;

    info!(device_id = %device.id, "device ws: closed");
}

async fn apply_report(
    datalayer: &Arc<dyn Connection>,
    sddl: &mut SddlDocument,
    device_id: uuid::Uuid,
    frame: &ReportFrame,
) {
    if let Some(partial) = frame.sddl.clone() {
        if let Err(e) = datalayer.extend_sddl(device_id, partial).await {
            warn!(device_id = %device_id, error = %e, "device ws: sddl extension rejected");
        } else if let Ok(updated) = datalayer.lookup_device(device_id).await {
            *sddl = updated.sddl;
        }
    }

    if let Some(vars) = &frame.vars {
        for (name, raw) in vars {
            let vardef = match sddl.lookup(name) {
                Some(v) => v.clone(),
                None => {
                    warn!(device_id = %device_id, var = %name, "device ws: unknown variable");
                    continue;
                },
            };
            let value = match canopy_cloudvar::decode_json(&vardef, raw) {
                Ok(v) => v,
                Err(e) => {
                    warn!(device_id = %device_id, var = %name, error = %e, "device ws: undecodable value");
                    continue;
                },
            };
            let sample = CloudVarSample {
                timestamp: canopy_common::time::now_utc(),
                value,
            };
            if let Err(e) = datalayer.insert_sample(device_id, name, sample).await {
                warn!(device_id = %device_id, var = %name, error = %e, "device ws: sample insert failed");
            }
        }
    }

    if let Some(notify) = &frame.notify {
        let notify_type = parse_notify_type(&notify.notify_type);
        if let Err(e) = datalayer
            .insert_notification(device_id, notify_type, &notify.msg)
            .await
        {
            warn!(device_id = %device_id, error = %e, "device ws: notification insert failed");
        }
    }

    if let Err(e) = datalayer
        .update_last_activity_time(device_id, Some(canopy_common::time::now_utc()))
        .await
    {
        warn!(device_id = %device_id, error = %e, "device ws: activity update failed");
    }
}

fn parse_notify_type(s: &str) -> NotificationType {
    match s {
        "sms" => NotificationType::Sms,
        "email" => NotificationType::Email,
        "in_app" | "in-app" => NotificationType::InApp,
        "high" => NotificationType::HighPriority,
        "med" | "medium" => NotificationType::MedPriority,
        _ => NotificationType::LowPriority,
    }
}

/// Routing key under which a device's WebSocket host listens for inbound
/// commands, per the pigeon listener registry convention.
pub fn device_control_key(device_id: uuid::Uuid) -> String {
    format!("device:{device_id}")
}
