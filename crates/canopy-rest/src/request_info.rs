use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::error::RestError;

/// Everything a job handler needs about the originating HTTP request,
/// carried across the bus call as the request body. `Config` and `Conn`
/// travel separately via the shared `UserCtx`, since they're the same for
/// every call on a given host and don't need to cross the wire per-request.
#[derive(Debug, Clone, Default)]
pub struct RestRequestInfo {
    pub account_username: Option<String>,
    pub url_vars: HashMap<String, String>,
    pub query: HashMap<String, String>,
    pub body: Value,
}

impl RestRequestInfo {
    pub fn into_request(self) -> Map<String, Value> {
        let mut m = Map::new();
        m.insert(
            "account_username".into(),
            self.account_username.map(Value::String).unwrap_or(Value::Null),
        );
        m.insert(
            "url_vars".into(),
            Value::Object(self.url_vars.into_iter().map(|(k, v)| (k, Value::String(v))).collect()),
        );
        m.insert(
            "query".into(),
            Value::Object(self.query.into_iter().map(|(k, v)| (k, Value::String(v))).collect()),
        );
        m.insert("body".into(), self.body);
        m
    }

    pub fn from_request(req: &Map<String, Value>) -> Self {
        let account_username = req
            .get("account_username")
            .and_then(Value::as_str)
            .map(str::to_string);
        let url_vars = req
            .get("url_vars")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let query = req
            .get("query")
            .and_then(Value::as_object)
            .map(|m| {
                m.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        let body = req.get("body").cloned().unwrap_or(Value::Null);

        Self { account_username, url_vars, query, body }
    }

    pub fn url_var(&self, name: &str) -> Result<&str, RestError> {
        self.url_vars
            .get(name)
            .map(String::as_str)
            .ok_or_else(|| RestError::bad_input(format!("missing URL parameter '{name}'")))
    }

    pub fn body_field(&self, name: &str) -> Result<&Value, RestError> {
        self.body
            .get(name)
            .ok_or_else(|| RestError::bad_input(format!("missing field '{name}'")))
    }

    pub fn body_str(&self, name: &str) -> Result<&str, RestError> {
        self.body_field(name)?
            .as_str()
            .ok_or_else(|| RestError::bad_input(format!("field '{name}' must be a string")))
    }
}
