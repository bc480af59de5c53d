use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;

use anyhow::{Context, Result};
use jsonwebtoken::Algorithm;
use log::*;
use r2d2::Pool;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

use infra::persistence::DocumentConnectionManager;

use crate::menu::Projection;

const ENV_PREFIX: &str = "RUSTBUCKS_";

#[derive(Deserialize, Debug)]
pub struct Config {
    pub postgres: PostgresConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub menu: MenuConfig,
}

#[derive(Deserialize, Debug, Default)]
pub struct PostgresConfig {
    pub url: String,
    #[serde(default)]
    pub pool_size: Option<u32>,
}

/// Where to find the identity provider and what its tokens must say.
#[derive(Deserialize, Debug, Clone)]
pub struct AuthConfig {
    pub domain: String,
    pub audience: String,
    /// Defaults to `https://<domain>/`.
    #[serde(default)]
    pub issuer: Option<String>,
    /// Defaults to `https://<domain>/.well-known/jwks.json`.
    #[serde(default)]
    pub jwks_uri: Option<Url>,
    #[serde(default = "default_algorithms")]
    pub algorithms: Vec<Algorithm>,
    #[serde(default)]
    pub leeway_secs: u64,
    #[serde(default = "default_key_ttl_secs")]
    pub key_ttl_secs: u64,
    #[serde(default = "default_min_refresh_secs")]
    pub min_refresh_secs: u64,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
}

#[derive(Deserialize, Debug, Clone, Copy, Default)]
pub struct MenuConfig {
    #[serde(default)]
    pub detail_projection: Projection,
}

/// Settings that may be overridden from the environment, eg:
/// `RUSTBUCKS_POSTGRES_URL=postgres://...`.
#[derive(Deserialize, Debug, Default)]
pub struct EnvOverrides {
    postgres_url: Option<String>,
    auth_domain: Option<String>,
    auth_audience: Option<String>,
    listen_addr: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "lowercase")]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Deserialize, Debug, Default)]
pub struct EnvLogger {
    #[serde(default)]
    level: Option<LogLevel>,
    #[serde(default)]
    modules: HashMap<String, LogLevel>,
    #[serde(default)]
    timestamp_nanos: bool,
}

fn default_algorithms() -> Vec<Algorithm> {
    vec![Algorithm::RS256]
}

fn default_key_ttl_secs() -> u64 {
    3600
}

fn default_min_refresh_secs() -> u64 {
    30
}

fn default_fetch_timeout_secs() -> u64 {
    5
}

pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let buf = fs::read_to_string(path).with_context(|| format!("read {:?}", path))?;
    let config = toml::from_str(&buf).with_context(|| format!("parse {:?}", path))?;
    Ok(config)
}

impl PostgresConfig {
    pub fn build(&self) -> Result<Pool<DocumentConnectionManager>> {
        debug!("Build pool (size: {:?})", self.pool_size);

        let manager = DocumentConnectionManager::from_url(&self.url)?;

        let mut builder = r2d2::Pool::builder();
        if let Some(size) = self.pool_size {
            builder = builder.max_size(size);
        }

        debug!("Pool builder: {:?}", builder);
        let pool = builder.build(manager).context("build pool")?;

        Ok(pool)
    }
}

impl AuthConfig {
    pub fn new(domain: &str, audience: &str) -> Self {
        AuthConfig {
            domain: domain.to_string(),
            audience: audience.to_string(),
            issuer: None,
            jwks_uri: None,
            algorithms: default_algorithms(),
            leeway_secs: 0,
            key_ttl_secs: default_key_ttl_secs(),
            min_refresh_secs: default_min_refresh_secs(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
        }
    }

    pub fn issuer(&self) -> String {
        self.issuer
            .clone()
            .unwrap_or_else(|| format!("https://{}/", self.domain))
    }

    pub fn jwks_uri(&self) -> Result<Url> {
        match self.jwks_uri {
            Some(ref uri) => Ok(uri.clone()),
            None => {
                let uri = format!("https://{}/.well-known/jwks.json", self.domain);
                Url::parse(&uri).with_context(|| format!("jwks uri for {:?}", self.domain))
            }
        }
    }
}

impl EnvOverrides {
    pub fn from_env() -> Result<Self> {
        let env = envy::prefixed(ENV_PREFIX)
            .from_env::<EnvOverrides>()
            .context("read environment")?;
        Ok(env)
    }

    pub fn apply(&self, config: &mut Config) {
        if let Some(ref url) = self.postgres_url {
            config.postgres.url = url.clone();
        }
        if let Some(ref domain) = self.auth_domain {
            config.auth.domain = domain.clone();
        }
        if let Some(ref audience) = self.auth_audience {
            config.auth.audience = audience.clone();
        }
    }

    pub fn listen_addr(&self) -> Result<Option<SocketAddr>> {
        self.listen_addr
            .as_ref()
            .map(|addr| {
                addr.parse::<SocketAddr>()
                    .with_context(|| format!("{}LISTEN_ADDR: {:?}", ENV_PREFIX, addr))
            })
            .transpose()
    }
}

impl LogLevel {
    fn to_filter(&self) -> log::LevelFilter {
        match *self {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl EnvLogger {
    pub fn builder(&self) -> env_logger::Builder {
        let mut b = env_logger::Builder::from_default_env();
        if let Some(level) = self.level.as_ref() {
            b.filter_level(level.to_filter());
        }

        for (module, level) in self.modules.iter() {
            b.filter_module(module, level.to_filter());
        }

        if self.timestamp_nanos {
            b.format_timestamp_nanos();
        }

        b
    }
}
