use async_trait::async_trait;

/// Outbound notification collaborator. Fire-and-forget: the job server
/// never awaits delivery before replying to the caller. Kept as a shallow
/// adapter in `UserCtx` — the concrete SMTP/SMS/push integration is an
/// external collaborator out of scope here, matching the mailer referenced
/// (but not implemented in depth) by the original job router.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str);
}

#[derive(Default)]
pub struct LoggingMailer;

#[async_trait]
impl Mailer for LoggingMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) {
        tracing::info!(to, subject, body, "mailer: send (logging stub)");
    }
}
