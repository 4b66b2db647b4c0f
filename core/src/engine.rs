use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Result, ZapError};

pub const DEFAULT_API_KEY: &str = "ZAPROXY-PLUGIN";
pub const DEFAULT_GATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Where the engine listens and how it is started. Read-only for the whole run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    pub host: String,
    pub port: u16,
    pub api_key: String,
    /// Directory holding `zap.sh` / `zap.bat`.
    pub install_dir: Option<PathBuf>,
    /// Start the engine as a subprocess when the host is local.
    pub local_launch: bool,
    pub gui: bool,
    pub gate_timeout: Duration,
    /// Extra environment for the engine process.
    pub env: Vec<(String, String)>,
}

impl EngineSettings {
    pub fn new(host: impl Into<String>, port: i64) -> Result<Self> {
        let host = host.into();
        if host.trim().is_empty() {
            return Err(ZapError::config("engine host is missing"));
        }
        if port < 0 {
            return Err(ZapError::config("engine port is less than 0"));
        }
        let port = u16::try_from(port).map_err(|_| ZapError::config(format!("engine port {} is out of range", port)))?;
        Ok(EngineSettings {
            host,
            port,
            api_key: DEFAULT_API_KEY.to_string(),
            install_dir: None,
            local_launch: false,
            gui: false,
            gate_timeout: DEFAULT_GATE_TIMEOUT,
            env: Vec::new(),
        })
    }

    pub fn base_url(&self) -> String {
        if self.host.contains(':') && !self.host.starts_with('[') {
            format!("http://[{}]:{}", self.host, self.port)
        } else {
            format!("http://{}:{}", self.host, self.port)
        }
    }

    pub fn install_dir(&self) -> Result<&Path> {
        match self.install_dir.as_deref() {
            Some(p) if !p.as_os_str().is_empty() => Ok(p),
            _ => Err(ZapError::config("engine install directory is missing")),
        }
    }
}

/// Who crawl and scan calls run as. Chosen once, after authentication setup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanIdentity {
    Anonymous,
    AsUser { context_id: String, user_id: String },
}

/// How the run ends its use of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownMode {
    /// Launched by this process on a local interface: shut it down.
    ManagedLocal,
    /// Someone else's engine: reset the session, leave it running.
    ExternalShared,
}

impl TeardownMode {
    pub fn decide(launched_locally: bool, host_is_local: bool) -> Self {
        if launched_locally && host_is_local {
            TeardownMode::ManagedLocal
        } else {
            TeardownMode::ExternalShared
        }
    }
}
