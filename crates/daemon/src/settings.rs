//! Layered configuration
//!
//! Built-in defaults, then an optional TOML file, then `CALLQ_*` environment
//! variables (`__` separates nested keys, e.g. `CALLQ_STORE__URL`).

use anyhow::{bail, Context, Result};
use callq_api_http::HttpServerConfig;
use callq_core::application::constants::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_TICK_INTERVAL};
use callq_core::application::PublisherConfig;
use callq_core::domain::QueueName;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use serde::Deserialize;
use std::time::Duration;

pub const CONFIG_PATH_ENV: &str = "CALLQ_CONFIG";
const DEFAULT_CONFIG_FILE: &str = "callq.toml";
const ENV_PREFIX: &str = "CALLQ";

#[derive(Debug, Clone)]
pub struct Settings {
    pub store: StoreSettings,
    pub server: ServerSettings,
    pub summary: SummarySettings,
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub key: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct SummarySettings {
    pub tick_interval: Duration,
    pub only_on_change: bool,
    pub channel_capacity: usize,
    /// Empty = report whatever queues currently have callers
    pub tracked_queues: Vec<QueueName>,
}

impl ServerSettings {
    pub fn http_config(&self) -> HttpServerConfig {
        HttpServerConfig {
            host: self.host.clone(),
            port: self.port,
        }
    }
}

impl SummarySettings {
    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig {
            tick_interval: self.tick_interval,
            only_on_change: self.only_on_change,
        }
    }
}

// Deserialization shapes; required keys stay optional here so the error
// can name the missing key
#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    store: RawStore,
    server: ServerSettings,
    summary: RawSummary,
}

#[derive(Debug, Default, Deserialize)]
struct RawStore {
    url: Option<String>,
    key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    tick_interval_ms: u64,
    only_on_change: bool,
    channel_capacity: usize,
    #[serde(default)]
    tracked_queues: Vec<String>,
}

/// Load settings from file + environment. Fails if the store is not configured.
pub fn load() -> Result<Settings> {
    let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());

    let config = with_defaults(Config::builder())?
        .add_source(File::with_name(&path).required(false))
        .add_source(environment())
        .build()
        .with_context(|| format!("Failed to read configuration (file: {})", path))?;

    Settings::from_config(config)
}

fn with_defaults(builder: ConfigBuilder<DefaultState>) -> Result<ConfigBuilder<DefaultState>> {
    Ok(builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 8000)?
        .set_default(
            "summary.tick_interval_ms",
            DEFAULT_TICK_INTERVAL.as_millis() as u64,
        )?
        .set_default("summary.only_on_change", false)?
        .set_default("summary.channel_capacity", DEFAULT_CHANNEL_CAPACITY as u64)?)
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .list_separator(",")
        .with_list_parse_key("summary.tracked_queues")
        .try_parsing(true)
}

impl Settings {
    pub fn from_config(config: Config) -> Result<Self> {
        let raw: RawSettings = config
            .try_deserialize()
            .context("Invalid configuration")?;

        let url = required(raw.store.url, "store.url")?;
        let key = required(raw.store.key, "store.key")?;

        if raw.summary.channel_capacity == 0 {
            bail!("summary.channel_capacity must be at least 1");
        }

        let tracked_queues = raw
            .summary
            .tracked_queues
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| {
                QueueName::parse(name)
                    .with_context(|| format!("Invalid queue in summary.tracked_queues: {:?}", name))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            store: StoreSettings {
                url: expand_sqlite_url(&url),
                key,
            },
            server: raw.server,
            summary: SummarySettings {
                tick_interval: Duration::from_millis(raw.summary.tick_interval_ms),
                only_on_change: raw.summary.only_on_change,
                channel_capacity: raw.summary.channel_capacity,
                tracked_queues,
            },
        })
    }
}

fn required(value: Option<String>, key: &str) -> Result<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => bail!(
            "Missing required configuration `{}` (set it in the config file or as CALLQ_{})",
            key,
            key.to_uppercase().replace('.', "__")
        ),
    }
}

/// Expand a leading `~` in the path part of a sqlite URL
fn expand_sqlite_url(url: &str) -> String {
    for scheme in ["sqlite://", "sqlite:"] {
        if let Some(path) = url.strip_prefix(scheme) {
            if path.starts_with('~') {
                return format!("{}{}", scheme, shellexpand::tilde(path));
            }
            break;
        }
    }
    url.to_string()
}
