use std::collections::HashMap;
use std::sync::Arc;

use rand::distr::Alphanumeric;
use rand::Rng;
use tokio::sync::RwLock;

pub const SESSION_COOKIE: &str = "canopy_session";
const SESSION_TOKEN_LEN: usize = 32;

/// Maps opaque session tokens to the username that owns them. The original
/// keeps this in a process-global cookie store; threading it through
/// `UserCtx` instead makes the dependency explicit and testable.
#[derive(Default)]
pub struct SessionStore {
    tokens: RwLock<HashMap<String, String>>,
}

impl SessionStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn create(&self, username: &str) -> String {
        let token: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(SESSION_TOKEN_LEN)
            .map(char::from)
            .collect();
        self.tokens.write().await.insert(token.clone(), username.to_string());
        token
    }

    pub async fn lookup(&self, token: &str) -> Option<String> {
        self.tokens.read().await.get(token).cloned()
    }

    pub async fn delete(&self, token: &str) {
        self.tokens.write().await.remove(token);
    }
}

pub fn session_cookie_header(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; HttpOnly; SameSite=Strict; Path=/; Max-Age=2592000")
}

pub fn expired_cookie_header() -> String {
    format!("{SESSION_COOKIE}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0")
}

/// Parse the session token out of a raw `Cookie` header value.
pub fn parse_cookie<'a>(header: &'a str, name: &str) -> Option<&'a str> {
    header.split(';').find_map(|part| {
        let part = part.trim();
        let (k, v) = part.split_once('=')?;
        (k == name).then_some(v)
    })
}
