use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use canopy_datalayer::Connection as Datalayer;
use canopy_pigeon::{PigeonResponse, PigeonServer};
use serde_json::Map;

use crate::context::UserCtx;
use crate::error::{Error, Result};

pub type Request = Map<String, serde_json::Value>;
pub type HandlerFuture = Pin<Box<dyn Future<Output = PigeonResponse> + Send + 'static>>;
pub type HandlerFn = Arc<dyn Fn(Request, Arc<UserCtx>) -> HandlerFuture + Send + Sync>;
/// A `HandlerFn` bound to a key prefix instead of an exact key; receives the
/// full matched routing key so it can recover the dynamic suffix (e.g. the
/// device id in `device:<uuid>`).
pub type PrefixHandlerFn = Arc<dyn Fn(String, Request, Arc<UserCtx>) -> HandlerFuture + Send + Sync>;

/// Binds a set of `HandlerFn`s to routing keys on top of a
/// [`canopy_pigeon::PigeonServer`], threading the shared [`UserCtx`] into
/// every call. Registration happens once at startup; re-registering a key
/// is a programming error and panics immediately rather than silently
/// overwriting the previous handler, unlike a registry meant to support
/// hot-reloading.
pub struct JobServer {
    pigeon: PigeonServer,
    ctx: Arc<UserCtx>,
}

impl JobServer {
    pub fn new(hostname: impl Into<String>, ctx: UserCtx) -> Self {
        Self {
            pigeon: PigeonServer::new(hostname),
            ctx: Arc::new(ctx),
        }
    }

    pub fn ctx(&self) -> Arc<UserCtx> {
        self.ctx.clone()
    }

    /// Register `handler` under `key`. Panics if `key` is already
    /// registered — a duplicate route is a startup-time mistake, not a
    /// runtime condition to recover from.
    pub fn register(&mut self, key: impl Into<String>, handler: HandlerFn) {
        let key = key.into();
        let ctx = self.ctx.clone();
        let wrapped: canopy_pigeon::HandlerFn = Arc::new(move |body| {
            let handler = handler.clone();
            let ctx = ctx.clone();
            Box::pin(async move { handler(body, ctx).await })
        });
        self.try_register(key, wrapped)
            .unwrap_or_else(|e| panic!("job server: {e}"));
    }

    fn try_register(&mut self, key: String, handler: canopy_pigeon::HandlerFn) -> Result<()> {
        self.pigeon
            .listen(key.clone(), handler)
            .map_err(|_| Error::DuplicateHandler(key))
    }

    /// Register `handler` for every routing key starting with `prefix`.
    /// Panics on a duplicate prefix registration, same as [`Self::register`].
    pub fn register_prefix(&mut self, prefix: impl Into<String>, handler: PrefixHandlerFn) {
        let prefix = prefix.into();
        let ctx = self.ctx.clone();
        let wrapped: canopy_pigeon::PrefixHandlerFn = Arc::new(move |key, body| {
            let handler = handler.clone();
            let ctx = ctx.clone();
            Box::pin(async move { handler(key, body, ctx).await })
        });
        self.pigeon
            .listen_prefix(prefix.clone(), wrapped)
            .unwrap_or_else(|_| panic!("job server: prefix handler already registered for {prefix}"));
    }

    pub async fn bind(self, datalayer: Arc<dyn Datalayer>, addr: &str) -> Result<()> {
        self.pigeon.bind(datalayer, addr).await.map_err(Error::from)
    }
}
