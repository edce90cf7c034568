use std::sync::Arc;

use canopy_config::CanopyConfig;
use canopy_datalayer::Connection;
use canopy_pigeon::PigeonClient;

use crate::mailer::Mailer;

/// Shared context handed to every job handler: configuration, an outbound
/// mailer, the datalayer connection, and a bus client so a handler can
/// itself issue a nested `Launch` (e.g. a REST handler pushing a command
/// down to the host holding a device's session). Mirrors the original job
/// router's `userCtx` map (`cfg`, `mailer`, `db-conn`) as a typed struct
/// instead of an untyped `map[string]interface{}`.
pub struct UserCtx {
    pub config: Arc<CanopyConfig>,
    pub mailer: Arc<dyn Mailer>,
    pub conn: Arc<dyn Connection>,
    pub pigeon: PigeonClient,
}

impl UserCtx {
    pub fn new(config: Arc<CanopyConfig>, mailer: Arc<dyn Mailer>, conn: Arc<dyn Connection>, pigeon: PigeonClient) -> Self {
        Self { config, mailer, conn, pigeon }
    }
}
