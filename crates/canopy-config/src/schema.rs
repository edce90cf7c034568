use serde::{Deserialize, Serialize};

/// Server configuration. Field names mirror the JSON / CLI-flag option
/// names exactly (`allow-anon-devices` etc.) via `serde(rename)` so a
/// config file, an environment variable, and a CLI flag all refer to the
/// same option under one name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanopyConfig {
    #[serde(rename = "allow-anon-devices")]
    pub allow_anon_devices: bool,
    #[serde(rename = "allow-origin")]
    pub allow_origin: String,
    #[serde(rename = "forward-other-hosts")]
    pub forward_other_hosts: String,
    pub hostname: String,
    #[serde(rename = "http-port")]
    pub http_port: i16,
    #[serde(rename = "js-client-path")]
    pub js_client_path: String,
    #[serde(rename = "log-file")]
    pub log_file: String,
    #[serde(rename = "web-manager-path")]
    pub web_manager_path: String,
}

impl Default for CanopyConfig {
    fn default() -> Self {
        Self {
            allow_anon_devices: false,
            allow_origin: String::new(),
            forward_other_hosts: String::new(),
            hostname: String::new(),
            http_port: 8080,
            js_client_path: String::new(),
            log_file: String::new(),
            web_manager_path: String::new(),
        }
    }
}

impl CanopyConfig {
    pub fn dump_to_string(&self) -> String {
        format!(
            "SERVER CONFIG SETTINGS:\n\
             allow-anon-devices:  {}\n\
             allow-origin:        {}\n\
             forward-other-hosts: {}\n\
             hostname:            {}\n\
             http-port:           {}\n\
             js-client-path:      {}\n\
             log-file:            {}\n\
             web-manager-path:    {}",
            self.allow_anon_devices,
            self.allow_origin,
            self.forward_other_hosts,
            self.hostname,
            self.http_port,
            self.js_client_path,
            self.log_file,
            self.web_manager_path,
        )
    }

    /// Overlay `other`'s fields that differ from a fresh default onto
    /// `self`, matching the source's field-by-field "if present, override"
    /// cascade rather than a blind struct replace.
    pub fn merge_from(&mut self, other: PartialConfig) {
        if let Some(v) = other.allow_anon_devices {
            self.allow_anon_devices = v;
        }
        if let Some(v) = other.allow_origin {
            self.allow_origin = v;
        }
        if let Some(v) = other.forward_other_hosts {
            self.forward_other_hosts = v;
        }
        if let Some(v) = other.hostname {
            self.hostname = v;
        }
        if let Some(v) = other.http_port {
            self.http_port = v;
        }
        if let Some(v) = other.js_client_path {
            self.js_client_path = v;
        }
        if let Some(v) = other.log_file {
            self.log_file = v;
        }
        if let Some(v) = other.web_manager_path {
            self.web_manager_path = v;
        }
    }
}

/// A layer of overrides: every field optional, `None` meaning "not set by
/// this layer". Used for the env-var and CLI-flag layers, which only ever
/// touch the options the caller actually set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialConfig {
    #[serde(rename = "allow-anon-devices")]
    pub allow_anon_devices: Option<bool>,
    #[serde(rename = "allow-origin")]
    pub allow_origin: Option<String>,
    #[serde(rename = "forward-other-hosts")]
    pub forward_other_hosts: Option<String>,
    pub hostname: Option<String>,
    #[serde(rename = "http-port")]
    pub http_port: Option<i16>,
    #[serde(rename = "js-client-path")]
    pub js_client_path: Option<String>,
    #[serde(rename = "log-file")]
    pub log_file: Option<String>,
    #[serde(rename = "web-manager-path")]
    pub web_manager_path: Option<String>,
}
