use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::str::FromStr;

use crate::ledger::{RefetchLedger, DEFAULT_MIN_REFRESH_SECS};
use crate::snapshot::SnapshotStore;

/// Path read by [`Config::load`] unless `SIGBANNER_CONFIG` overrides it.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

#[derive(Debug, Deserialize)]
pub struct Config {
    pub general: General,
    pub cache: Cache,
    pub runescape: RuneScape,
    pub banner: Banner,
    #[serde(default)]
    pub clan: Clan,
    pub observability: Observability,
    pub web: Option<Web>,
}

#[derive(Debug, Deserialize)]
pub struct General {
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Deserialize)]
pub struct Cache {
    pub refetch_dir: PathBuf,
    pub data_dir: PathBuf,
    #[serde(default = "default_min_refresh_secs")]
    pub min_refresh_secs: i64,
}

fn default_min_refresh_secs() -> i64 {
    DEFAULT_MIN_REFRESH_SECS
}

impl Cache {
    pub fn ledger(&self) -> RefetchLedger {
        RefetchLedger::new(&self.refetch_dir, self.min_refresh_secs)
    }

    pub fn store(&self) -> SnapshotStore {
        SnapshotStore::new(&self.data_dir)
    }
}

#[derive(Debug, Deserialize)]
pub struct RuneScape {
    pub hiscore_url: String,
    pub clan_hiscore_url: String,
    pub website_url: String,
    pub avatar_url: String,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_connect_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize)]
pub struct Banner {
    pub resources_dir: PathBuf,
    #[serde(default)]
    pub default_theme: usize,
}

/// Clan whose roster gates who may request a banner.
#[derive(Debug, Default, Deserialize)]
pub struct Clan {
    pub name: Option<String>,
    #[serde(default)]
    pub enforce_whitelist: bool,
}

#[derive(Debug, Deserialize)]
pub struct Observability {
    pub prometheus_port: u16,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Web {
    pub port: u16,
    pub host: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        let path =
            std::env::var("SIGBANNER_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config {path}"))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }
}

impl FromStr for Config {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_toml_str(s)
    }
}
