use axum::http::{header, HeaderName, HeaderValue};
use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::sensitive_headers::SetSensitiveHeadersLayer;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

const REQUEST_BODY_LIMIT: usize = 2 * 1024 * 1024;

/// CORS for a config with no explicit `allow-origin` is permissive (matches
/// the original default of accepting any origin); a configured origin
/// restricts to exactly that value.
pub fn build_cors_layer(allow_origin: &str) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if allow_origin.is_empty() {
        layer.allow_origin(Any)
    } else {
        match HeaderValue::from_str(allow_origin) {
            Ok(v) => layer.allow_origin(v),
            Err(_) => layer.allow_origin(Any),
        }
    }
}

/// Layer order (outermost -> innermost for requests): panic catcher,
/// sensitive-header marking, request-id generation, trace, CORS,
/// request-id propagation, security headers, body-size limit, compression.
pub fn apply_middleware_stack(router: Router, cors: CorsLayer) -> Router {
    let router = router
        .layer(CompressionLayer::new())
        .layer(RequestBodyLimitLayer::new(REQUEST_BODY_LIMIT))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("deny"),
        ))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    router
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(SetSensitiveHeadersLayer::new([
            header::AUTHORIZATION,
            header::COOKIE,
            header::SET_COOKIE,
        ]))
        .layer(CatchPanicLayer::new())
}
