use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use zapctl_core::engine::{DEFAULT_API_KEY, DEFAULT_GATE_TIMEOUT};
use zapctl_core::{EngineSettings, ScanConfig};

pub const DEFAULT_CONFIG_FILE: &str = "zapctl.yaml";
pub const DEFAULT_HOST: &str = "localhost";
pub const DEFAULT_PORT: i64 = 8008;

#[derive(Debug, Default, Deserialize, Clone)]
pub struct EngineConfig {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub install_dir: Option<PathBuf>,
    pub local_launch: Option<bool>,
    pub gui: Option<bool>,
    pub api_key: Option<String>,
    pub gate_timeout_secs: Option<u64>,
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Command-line values that win over the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub host: Option<String>,
    pub port: Option<i64>,
    pub install_dir: Option<PathBuf>,
    pub api_key: Option<String>,
    pub gui: bool,
    pub target_urls: Option<String>,
}

/// Load `path`, or `./zapctl.yaml` when present. No file means all defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let p = Path::new(DEFAULT_CONFIG_FILE);
            if !p.exists() {
                return Ok(Config::default());
            }
            p.to_path_buf()
        }
    };
    let s = fs::read_to_string(&path).with_context(|| format!("reading config {}", path.display()))?;
    serde_yaml::from_str(&s).with_context(|| format!("parsing config {}", path.display()))
}

impl Config {
    pub fn apply(&mut self, o: Overrides) {
        if let Some(host) = o.host {
            self.engine.host = Some(host);
        }
        if let Some(port) = o.port {
            self.engine.port = Some(port);
        }
        if let Some(dir) = o.install_dir {
            self.engine.install_dir = Some(dir);
        }
        if let Some(key) = o.api_key {
            self.engine.api_key = Some(key);
        }
        if o.gui {
            self.engine.gui = Some(true);
        }
        if let Some(urls) = o.target_urls {
            self.scan.target_urls = Some(urls);
        }
    }

    /// Validate the engine section into the value object every crate consumes.
    pub fn engine_settings(&self) -> zapctl_core::Result<EngineSettings> {
        let e = &self.engine;
        let host = e.host.clone().unwrap_or_else(|| DEFAULT_HOST.to_string());
        let mut s = EngineSettings::new(host, e.port.unwrap_or(DEFAULT_PORT))?;
        s.api_key = e.api_key.clone().filter(|k| !k.trim().is_empty()).unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        s.install_dir = e.install_dir.clone();
        s.local_launch = e.local_launch.unwrap_or(false);
        s.gui = e.gui.unwrap_or(false);
        s.gate_timeout = e.gate_timeout_secs.map(Duration::from_secs).unwrap_or(DEFAULT_GATE_TIMEOUT);
        s.env = e.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        if s.local_launch {
            s.install_dir()?;
        }
        Ok(s)
    }
}
