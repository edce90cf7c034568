use std::path::Path;

use crate::error::{Error, Result};
use crate::schema::{CanopyConfig, PartialConfig};

/// Load config the way the original server does: a system file, a
/// per-user file, an explicitly-named file, environment variables, then
/// CLI flags — each layer overriding only the options it actually sets.
/// Missing files in the first three layers are silently skipped; a file
/// named explicitly via `CANOPY_SERVER_CONFIG_FILE` must be readable.
pub fn load_config(cli: PartialConfig) -> Result<CanopyConfig> {
    let mut config = CanopyConfig::default();

    if let Some(partial) = try_load_file("/etc/canopy/server.conf")? {
        config.merge_from(partial);
    }

    if let Ok(home) = std::env::var("HOME") {
        if !home.is_empty() {
            let path = format!("{home}/.canopy/server.conf");
            if let Some(partial) = try_load_file(&path)? {
                config.merge_from(partial);
            }
        }
    }

    if let Ok(path) = std::env::var("CANOPY_SERVER_CONFIG_FILE") {
        if !path.is_empty() {
            let partial = load_config_file(&path)?;
            config.merge_from(partial);
        }
    }

    config.merge_from(load_config_env()?);
    config.merge_from(cli);

    Ok(config)
}

/// Load a config file, returning `Ok(None)` if it doesn't exist.
fn try_load_file(path: &str) -> Result<Option<PartialConfig>> {
    if !Path::new(path).exists() {
        return Ok(None);
    }
    load_config_file(path).map(Some)
}

fn load_config_file(path: &str) -> Result<PartialConfig> {
    let text = std::fs::read_to_string(path)?;
    load_config_json_string(&text)
}

pub fn load_config_json_string(text: &str) -> Result<PartialConfig> {
    serde_json::from_str(text)
        .map_err(|e| Error::Message(format!("invalid configuration file: {e}")))
}

/// Read the `CCS_*` environment variables the server recognizes.
pub fn load_config_env() -> Result<PartialConfig> {
    load_config_env_from(|key| std::env::var(key).ok())
}

/// Same cascade as [`load_config_env`], but reading each variable through
/// `get` instead of the process environment directly. This is the seam
/// tests use to exercise the overlay logic without mutating process-global
/// state.
pub fn load_config_env_from<F>(get: F) -> Result<PartialConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let mut partial = PartialConfig::default();

    if let Some(v) = get("CCS_ALLOW_ANON_DEVICES") {
        partial.allow_anon_devices = Some(parse_bool(&v, "CCS_ALLOW_ANON_DEVICES")?);
    }
    if let Some(v) = get("CCS_ALLOW_ORIGIN") {
        if !v.is_empty() {
            partial.allow_origin = Some(v);
        }
    }
    if let Some(v) = get("CCS_FORWARD_OTHER_HOSTS") {
        if !v.is_empty() {
            partial.forward_other_hosts = Some(v);
        }
    }
    if let Some(v) = get("CCS_HOSTNAME") {
        if !v.is_empty() {
            partial.hostname = Some(v);
        }
    }
    if let Some(v) = get("CCS_HTTP_PORT") {
        if !v.is_empty() {
            partial.http_port = Some(
                v.parse()
                    .map_err(|_| Error::Message(format!("invalid value for CCS_HTTP_PORT: {v}")))?,
            );
        }
    }
    if let Some(v) = get("CCS_JS_CLIENT_PATH") {
        if !v.is_empty() {
            partial.js_client_path = Some(v);
        }
    }
    if let Some(v) = get("CCS_LOG_FILE") {
        if !v.is_empty() {
            partial.log_file = Some(v);
        }
    }
    if let Some(v) = get("CCS_WEB_MANAGER_PATH") {
        if !v.is_empty() {
            partial.web_manager_path = Some(v);
        }
    }

    Ok(partial)
}

fn parse_bool(v: &str, option: &str) -> Result<bool> {
    match v {
        "1" | "true" => Ok(true),
        "0" | "false" => Ok(false),
        _ => Err(Error::Message(format!("invalid value for {option}: {v}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overlay_only_touches_set_vars() {
        let mut vars = std::collections::HashMap::new();
        vars.insert("CCS_HOSTNAME", "example.com");
        let partial = load_config_env_from(|key| vars.get(key).map(|v| v.to_string())).unwrap();
        assert_eq!(partial.hostname.as_deref(), Some("example.com"));
        assert_eq!(partial.http_port, None);
    }

    #[test]
    fn json_layer_rejects_unknown_option() {
        let err = load_config_json_string(r#"{"not-a-real-option": 1}"#).unwrap_err();
        assert!(err.to_string().contains("invalid configuration file"));
    }

    #[test]
    fn merge_overrides_only_set_fields() {
        let mut config = CanopyConfig::default();
        config.hostname = "base".into();
        let mut partial = PartialConfig::default();
        partial.http_port = Some(9090);
        config.merge_from(partial);
        assert_eq!(config.hostname, "base");
        assert_eq!(config.http_port, 9090);
    }
}
