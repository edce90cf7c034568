pub mod error;
pub mod handlers;
pub mod jobs;
pub mod request_info;
pub mod routes;
pub mod server;
pub mod session;

pub use error::{ErrorKind, RestError};
pub use request_info::RestRequestInfo;
pub use routes::{router, RestState};
pub use session::SessionStore;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_wire_round_trip() {
        let e = RestError::not_found("no such device");
        let wire = e.to_wire();
        let decoded = RestError::from_wire(&wire);
        assert_eq!(decoded.kind, ErrorKind::NotFound);
        assert_eq!(decoded.msg, "no such device");
    }

    #[test]
    fn garbled_wire_error_collapses_to_internal() {
        let decoded = RestError::from_wire("not json");
        assert_eq!(decoded.kind, ErrorKind::Internal);
    }

    #[test]
    fn request_info_round_trips_through_bus_request() {
        let mut info = RestRequestInfo::default();
        info.account_username = Some("alice".into());
        info.url_vars.insert("id".into(), "abc".into());
        info.query.insert("start".into(), "0".into());
        info.body = json!({"name": "thermostat"});

        let req = info.clone().into_request();
        let roundtrip = RestRequestInfo::from_request(&req);

        assert_eq!(roundtrip.account_username.as_deref(), Some("alice"));
        assert_eq!(roundtrip.url_var("id").unwrap(), "abc");
        assert_eq!(roundtrip.query.get("start").unwrap(), "0");
        assert_eq!(roundtrip.body_str("name").unwrap(), "thermostat");
    }

    #[tokio::test]
    async fn session_store_create_lookup_delete() {
        let store = SessionStore::new();
        let token = store.create("alice").await;
        assert_eq!(store.lookup(&token).await.as_deref(), Some("alice"));
        store.delete(&token).await;
        assert!(store.lookup(&token).await.is_none());
    }

    #[test]
    fn parse_cookie_finds_named_value_among_others() {
        let header = "other=1; canopy_session=abc123; another=2";
        assert_eq!(session::parse_cookie(header, session::SESSION_COOKIE), Some("abc123"));
        assert_eq!(session::parse_cookie(header, "missing"), None);
    }
}
