use clap::Parser;

use crate::schema::PartialConfig;

/// CLI flags recognized by the server, overriding any file- or
/// environment-sourced setting. Unset flags leave the corresponding option
/// untouched.
#[derive(Debug, Parser)]
#[command(name = "canopy-server", version, about = "Canopy IoT cloud backend")]
pub struct Cli {
    #[arg(long = "allow-anon-devices")]
    pub allow_anon_devices: Option<bool>,

    #[arg(long = "allow-origin")]
    pub allow_origin: Option<String>,

    #[arg(long = "forward-other-hosts")]
    pub forward_other_hosts: Option<String>,

    #[arg(long = "hostname")]
    pub hostname: Option<String>,

    #[arg(long = "http-port")]
    pub http_port: Option<i16>,

    #[arg(long = "js-client-path")]
    pub js_client_path: Option<String>,

    #[arg(long = "log-file")]
    pub log_file: Option<String>,

    #[arg(long = "web-manager-path")]
    pub web_manager_path: Option<String>,
}

impl From<Cli> for PartialConfig {
    fn from(cli: Cli) -> Self {
        Self {
            allow_anon_devices: cli.allow_anon_devices,
            allow_origin: cli.allow_origin,
            forward_other_hosts: cli.forward_other_hosts,
            hostname: cli.hostname,
            http_port: cli.http_port,
            js_client_path: cli.js_client_path,
            log_file: cli.log_file,
            web_manager_path: cli.web_manager_path,
        }
    }
}
