//! Command-line surface.
//!
//! The binary doubles as a docker CLI plugin: docker invokes it with a
//! leading `ztd` argv token, which is stripped before parsing, and probes
//! it with `docker-cli-plugin-metadata`, which short-circuits everything
//! else. The two-letter flags (`-wa`, `-tc`) are accepted as long aliases
//! since short options are single-character.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

/// Pseudo-argument docker uses to probe plugin metadata.
pub const METADATA_ARG: &str = "docker-cli-plugin-metadata";

#[derive(Debug, Parser)]
#[command(
    name = "ztd",
    about = "Zero-downtime rolling updates for docker-compose services",
    version
)]
pub struct Cli {
    /// Service to update, or `up` to bring up the whole declared stack.
    #[arg(value_name = "SERVICE")]
    pub service: String,

    /// Healthcheck timeout in seconds.
    #[arg(short = 't', long = "timeout", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Seconds to wait before stopping old containers.
    #[arg(short = 'w', long = "wait", value_name = "SECONDS")]
    pub wait: Option<u64>,

    /// Extra seconds to wait after the healthcheck succeeds.
    #[arg(long = "wait-after-healthy", alias = "wa", value_name = "SECONDS")]
    pub wait_after_healthy: Option<u64>,

    /// Traefik dynamic configuration file.
    #[arg(long = "traefik-conf", alias = "tc", value_name = "FILE")]
    pub traefik_conf: Option<PathBuf>,

    /// Proxy type (traefik, nginx-proxy).
    #[arg(short = 'p', long = "proxy", value_name = "TYPE")]
    pub proxy: Option<String>,

    /// Compose configuration file (repeatable).
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    pub files: Vec<PathBuf>,

    /// Environment file (repeatable).
    #[arg(short = 'e', long = "env-file", value_name = "FILE")]
    pub env_files: Vec<PathBuf>,

    /// Do not follow logs after starting.
    #[arg(short = 'd', long = "detach")]
    pub detach: bool,
}

impl Cli {
    /// Parse process arguments, tolerating the plugin invocation shape.
    pub fn parse_args() -> Result<Self, clap::Error> {
        Self::parse_plugin_args(std::env::args_os())
    }

    fn parse_plugin_args<I>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut argv: Vec<OsString> = args.into_iter().collect();
        if argv.get(1).map(|a| a == "ztd").unwrap_or(false) {
            argv.remove(1);
        }
        Self::try_parse_from(argv)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct PluginMetadata {
    schema_version: &'static str,
    vendor: &'static str,
    version: &'static str,
    short_description: &'static str,
    #[serde(rename = "URL")]
    url: &'static str,
    experimental: bool,
}

/// Print the fixed plugin descriptor docker expects.
pub fn print_plugin_metadata() {
    let metadata = PluginMetadata {
        schema_version: "0.1.0",
        vendor: "ztd",
        version: env!("CARGO_PKG_VERSION"),
        short_description: "Zero-downtime rolling updates for docker-compose services",
        url: "",
        experimental: false,
    };
    match serde_json::to_string_pretty(&metadata) {
        Ok(json) => println!("{json}"),
        Err(e) => eprintln!("Error marshaling metadata: {e}"),
    }
}
