pub mod context;
pub mod error;
pub mod mailer;
pub mod registry;

pub use context::UserCtx;
pub use error::{Error, Result};
pub use mailer::{LoggingMailer, Mailer};
pub use registry::{HandlerFn, HandlerFuture, JobServer, PrefixHandlerFn, Request};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use canopy_config::CanopyConfig;
    use canopy_datalayer::InMemoryConnection;
    use serde_json::Map;

    use super::*;

    #[test]
    #[should_panic(expected = "already registered")]
    fn duplicate_registration_panics() {
        let conn = Arc::new(InMemoryConnection::new());
        let ctx = UserCtx::new(
            Arc::new(CanopyConfig::default()),
            Arc::new(LoggingMailer),
            conn.clone(),
            canopy_pigeon::PigeonClient::new(conn),
        );
        let mut server = JobServer::new("host-a", ctx);
        let handler: HandlerFn = Arc::new(|_req, _ctx| {
            Box::pin(async { canopy_pigeon::PigeonResponse::ok(Map::new()) })
        });
        server.register("device-control", handler.clone());
        server.register("device-control", handler);
    }
}
