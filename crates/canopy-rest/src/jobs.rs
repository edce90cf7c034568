use std::future::Future;
use std::sync::Arc;

use canopy_jobserver::{JobServer, Request, UserCtx};
use canopy_pigeon::PigeonResponse;
use serde_json::Value;

use crate::error::RestError;
use crate::handlers;
use crate::request_info::RestRequestInfo;

fn wrap<F, Fut>(server: &mut JobServer, key: &'static str, f: F)
where
    F: Fn(Arc<UserCtx>, RestRequestInfo) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, RestError>> + Send + 'static,
{
    server.register(key, Arc::new(move |req: Request, ctx: Arc<UserCtx>| {
        let info = RestRequestInfo::from_request(&req);
        let fut = f(ctx, info);
        Box::pin(async move {
            match fut.await {
                Ok(v) => match v {
                    Value::Object(body) => PigeonResponse::ok(body),
                    other => {
                        let mut body = serde_json::Map::new();
                        body.insert("result".into(), other);
                        PigeonResponse::ok(body)
                    },
                },
                Err(e) => PigeonResponse::error(e.to_wire()),
            }
        })
    }));
}

/// Register every REST route's job handler, mirroring the original job
/// router's exhaustive `routes` table one-for-one.
pub fn register_all(server: &mut JobServer) {
    wrap(server, "api/login", handlers::login);
    wrap(server, "api/logout", handlers::logout);
    wrap(server, "api/create_account", handlers::create_account);
    wrap(server, "api/activate", handlers::activate);
    wrap(server, "api/reset_password", handlers::reset_password);
    wrap(server, "api/devices", handlers::list_devices);
    wrap(server, "GET:api/device/id", handlers::get_device);
    wrap(server, "POST:api/device/id", handlers::update_device);
    wrap(server, "DELETE:api/device/id", handlers::delete_device);
    wrap(server, "api/device/id/var", handlers::get_device_var);
    wrap(server, "api/share", handlers::share);
    wrap(server, "api/finish_share_transaction", handlers::finish_share_transaction);
    wrap(server, "GET:api/user/self", handlers::get_self);
    wrap(server, "POST:api/user/self", handlers::update_self);
    wrap(server, "DELETE:api/user/self", handlers::delete_self);
    wrap(server, "api/user/self/orgs", handlers::get_self_orgs);
    wrap(server, "api/create_org", handlers::create_org);
    wrap(server, "GET:api/org/name/members", handlers::get_org_members);
    wrap(server, "POST:api/org/name/members", handlers::add_org_member);
    wrap(server, "POST:api/org/name/add_team", handlers::add_team);
    wrap(server, "DELETE:api/org/name/team/alias", handlers::delete_team);
    wrap(server, "api/info", handlers::info);
}
