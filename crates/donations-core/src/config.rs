//! Configuration resolution for the donations service.
//!
//! Implements hierarchical config resolution:
//! 1. Built-in defaults
//! 2. Global config (~/.config/donations/settings.json)
//! 3. Explicit config file (`--config`)
//! 4. Environment variables
//! 5. CLI arguments (applied by the binary, highest priority)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use serde_json::map::Entry;

use crate::error::{Error, Result};

/// Complete service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub payment: PaymentConfig,
    #[serde(default)]
    pub registry: RegistryConfig,
}

/// HTTP server and storage location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    /// `SQLite` file backing the registry. `None` leaves the registry
    /// unconfigured; donation requests then fail with a configuration error.
    pub database_path: Option<PathBuf>,
    pub log_json: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: "0.0.0.0:8080".to_string(),
            database_path: None,
            log_json: false,
        }
    }
}

/// Payee details used to build SBP transfer references.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaymentConfig {
    pub payee_phone: String,
    pub bank_name: String,
    /// Transfer link template; `{amount}` is replaced with the amount.
    pub proxy_template: String,
    /// Package label used when a request names none.
    pub default_package: String,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            payee_phone: "+79179231812".to_string(),
            bank_name: "Т-Банк".to_string(),
            proxy_template: "https://qr.nspk.ru/proxyapp?type=01&bank=100000000111&sum={amount}&cur=RUB&crc=1234".to_string(),
            default_package: "Донат".to_string(),
        }
    }
}

/// How status updates are checked before they are written.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StatusPolicy {
    /// Any status string overwrites the current one.
    #[default]
    Open,
    /// Only `pending -> confirmed | rejected` moves are accepted.
    Guarded,
}

impl FromStr for StatusPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(Self::Open),
            "guarded" => Ok(Self::Guarded),
            other => Err(Error::Config(format!("Unknown status policy: {other}"))),
        }
    }
}

/// Donation registry behaviour.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RegistryConfig {
    pub status_policy: StatusPolicy,
}

/// Load configuration with hierarchical resolution.
///
/// `config_file`, when given, must exist; the global file is optional.
pub fn load_config(config_file: Option<&Path>) -> Result<Config> {
    let mut merged = serde_json::to_value(Config::default())?;

    if let Some(global_path) = global_config_path() {
        if global_path.exists() {
            merge_values(&mut merged, load_config_file(&global_path)?);
        }
    }

    if let Some(path) = config_file {
        merge_values(&mut merged, load_config_file(path)?);
    }

    let mut config: Config = serde_json::from_value(merged)
        .map_err(|e| Error::Config(format!("Invalid configuration: {e}")))?;

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());

    Ok(config)
}

/// Get the global config file path.
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("donations").join("settings.json"))
}

fn load_config_file(path: &Path) -> Result<Value> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        Error::Config(format!("Failed to read config file {}: {}", path.display(), e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        Error::Config(format!("Failed to parse config file {}: {}", path.display(), e))
    })
}

/// Deep-merge `overlay` into `base`. Objects merge key by key, anything else
/// replaces. An explicit `null` clears an optional setting.
fn merge_values(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Object(base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                match base.entry(key) {
                    Entry::Occupied(mut slot) => merge_values(slot.get_mut(), value),
                    Entry::Vacant(slot) => {
                        slot.insert(value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

/// Apply environment overrides. `lookup` is `std::env::var` in production;
/// unparseable values leave the previous layer in place.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(path) = lookup("DONATIONS_DATABASE_PATH").or_else(|| lookup("DATABASE_PATH")) {
        if !path.is_empty() {
            config.server.database_path = Some(PathBuf::from(path));
        }
    }
    if let Some(addr) = lookup("DONATIONS_ADDR") {
        config.server.addr = addr;
    }
    if let Some(val) = lookup("DONATIONS_LOG_JSON") {
        if let Ok(b) = val.parse() {
            config.server.log_json = b;
        }
    }
    if let Some(val) = lookup("SBP_PAYEE_PHONE") {
        config.payment.payee_phone = val;
    }
    if let Some(val) = lookup("SBP_BANK_NAME") {
        config.payment.bank_name = val;
    }
    if let Some(val) = lookup("SBP_PROXY_TEMPLATE") {
        config.payment.proxy_template = val;
    }
    if let Some(val) = lookup("DONATIONS_STATUS_POLICY") {
        if let Ok(policy) = val.parse() {
            config.registry.status_policy = policy;
        }
    }
}

/// Settings given on the command line. Each `Some` replaces the resolved
/// value; `log_json` can only switch JSON logging on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub addr: Option<String>,
    pub database_path: Option<PathBuf>,
    pub status_policy: Option<StatusPolicy>,
    pub log_json: bool,
}

/// Apply the command-line layer on top of everything else.
pub fn apply_cli_overrides(config: &mut Config, cli: CliOverrides) {
    if let Some(addr) = cli.addr {
        config.server.addr = addr;
    }
    if let Some(path) = cli.database_path {
        config.server.database_path = Some(path);
    }
    if let Some(policy) = cli.status_policy {
        config.registry.status_policy = policy;
    }
    config.server.log_json |= cli.log_json;
}
