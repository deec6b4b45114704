use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;
use crate::error::{Error, Result};

/// Resolved tool configuration.
///
/// Layered lowest to highest: built-in defaults, `ztd.toml`, `ztd.json`,
/// `ZTD_`-prefixed environment variables, then explicit CLI flags.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Health-gate deadline in seconds.
    pub healthcheck_timeout_secs: u64,
    /// Unconditional delay before old containers are stopped.
    pub drain_delay_secs: u64,
    /// Extra settle delay after the health gate passes.
    pub settle_delay_secs: u64,
    /// Path of the published dynamic configuration document.
    pub traefik_conf: PathBuf,
    pub proxy: ProxyType,
    pub compose_files: Vec<PathBuf>,
    pub env_files: Vec<PathBuf>,
    #[serde(default)]
    pub detach: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProxyType {
    Traefik,
    NginxProxy,
}

impl FromStr for ProxyType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "traefik" => Ok(ProxyType::Traefik),
            "nginx-proxy" => Ok(ProxyType::NginxProxy),
            other => Err(Error::config(format!(
                "invalid proxy type '{other}': must be either 'traefik' or 'nginx-proxy'"
            ))),
        }
    }
}

impl ProxyType {
    /// `nginx-proxy` parses but has no implementation behind it.
    pub fn ensure_supported(self) -> Result<()> {
        match self {
            ProxyType::Traefik => Ok(()),
            ProxyType::NginxProxy => Err(Error::config(
                "proxy type 'nginx-proxy' is not supported yet",
            )),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            healthcheck_timeout_secs: 60,
            drain_delay_secs: 10,
            settle_delay_secs: 0,
            traefik_conf: PathBuf::from("traefik/dynamic_conf.yml"),
            proxy: ProxyType::Traefik,
            compose_files: Vec::new(),
            env_files: Vec::new(),
            detach: false,
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> Result<Self> {
        let mut config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file("ztd.toml"))
            .merge(Json::file("ztd.json"))
            .merge(Env::prefixed("ZTD_"))
            .extract()
            .map_err(|e| Error::config(format!("failed to load configuration: {e}")))?;

        if let Some(timeout) = cli.timeout {
            config.healthcheck_timeout_secs = timeout;
        }
        if let Some(wait) = cli.wait {
            config.drain_delay_secs = wait;
        }
        if let Some(settle) = cli.wait_after_healthy {
            config.settle_delay_secs = settle;
        }
        if let Some(ref path) = cli.traefik_conf {
            config.traefik_conf = path.clone();
        }
        if let Some(ref proxy) = cli.proxy {
            config.proxy = proxy.parse()?;
        }
        if !cli.files.is_empty() {
            config.compose_files = cli.files.clone();
        }
        if !cli.env_files.is_empty() {
            config.env_files = cli.env_files.clone();
        }
        config.detach = cli.detach;

        config.proxy.ensure_supported()?;
        Ok(config)
    }

    pub fn healthcheck_timeout(&self) -> Duration {
        Duration::from_secs(self.healthcheck_timeout_secs)
    }

    pub fn drain_delay(&self) -> Duration {
        Duration::from_secs(self.drain_delay_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.healthcheck_timeout_secs, 60);
        assert_eq!(config.drain_delay_secs, 10);
        assert_eq!(config.settle_delay_secs, 0);
        assert_eq!(config.traefik_conf, PathBuf::from("traefik/dynamic_conf.yml"));
        assert_eq!(config.proxy, ProxyType::Traefik);
    }

    #[test]
    fn proxy_type_parses() {
        assert_eq!("traefik".parse::<ProxyType>().unwrap(), ProxyType::Traefik);
        assert_eq!(
            "nginx-proxy".parse::<ProxyType>().unwrap(),
            ProxyType::NginxProxy
        );
        assert!("haproxy".parse::<ProxyType>().is_err());
    }

    #[test]
    fn nginx_proxy_is_rejected_as_unsupported() {
        assert!(ProxyType::NginxProxy.ensure_supported().is_err());
        assert!(ProxyType::Traefik.ensure_supported().is_ok());
    }
}
