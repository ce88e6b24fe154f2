//! Gateway configuration.
//!
//! Precedence: CLI flags override environment variables, which override the
//! JSON config file, which overrides the built-in defaults. A missing config
//! file is not an error; an invalid worker path is fatal at startup.

use anyhow::{bail, Context};
use serde::Deserialize;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

pub const DEFAULT_PORT: u16 = 17300;
const DEFAULT_SESSION_TIMEOUT_MIN: u64 = 240; // 4 hours - long enough for extended RE work
const DEFAULT_AUTO_SAVE_MIN: u64 = 5;
const DEFAULT_MAX_SESSIONS: usize = 10;
const DEFAULT_WORKER_PATH: &str = "python/worker/server.py";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub port: u16,
    pub session_timeout_minutes: u64,
    pub auto_save_interval_minutes: u64,
    pub max_concurrent_sessions: usize,
    pub database_directory: PathBuf,
    pub python_worker_path: PathBuf,
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            session_timeout_minutes: DEFAULT_SESSION_TIMEOUT_MIN,
            auto_save_interval_minutes: DEFAULT_AUTO_SAVE_MIN,
            max_concurrent_sessions: DEFAULT_MAX_SESSIONS,
            database_directory: default_db_dir(),
            python_worker_path: PathBuf::from(DEFAULT_WORKER_PATH),
            debug: false,
        }
    }
}

/// Session data directory: `$XDG_DATA_HOME/ida-mcp/sessions`, then
/// `$HOME/.local/share/ida-mcp/sessions`, then `/tmp/ida_sessions`.
pub fn default_db_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(xdg).join("ida-mcp").join("sessions");
    }
    if let Some(home) = std::env::var_os("HOME").filter(|v| !v.is_empty()) {
        return PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("ida-mcp")
            .join("sessions");
    }
    PathBuf::from("/tmp/ida_sessions")
}

impl Config {
    /// Load the config file, falling back to defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data = match std::fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e).with_context(|| format!("read config {}", path.display())),
        };
        let mut cfg: Config = serde_json::from_slice(&data)
            .with_context(|| format!("parse config {}", path.display()))?;
        cfg.ensure_defaults();
        Ok(cfg)
    }

    /// Zero/empty values from a sparse config file fall back to defaults.
    fn ensure_defaults(&mut self) {
        let d = Config::default();
        if self.port == 0 {
            self.port = d.port;
        }
        if self.session_timeout_minutes == 0 {
            self.session_timeout_minutes = d.session_timeout_minutes;
        }
        if self.auto_save_interval_minutes == 0 {
            self.auto_save_interval_minutes = d.auto_save_interval_minutes;
        }
        if self.max_concurrent_sessions == 0 {
            self.max_concurrent_sessions = d.max_concurrent_sessions;
        }
        if self.database_directory.as_os_str().is_empty() {
            self.database_directory = d.database_directory;
        }
        if self.python_worker_path.as_os_str().is_empty() {
            self.python_worker_path = d.python_worker_path;
        }
    }

    /// Apply `IDA_MCP_*` environment overrides.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("IDA_MCP_PORT") {
            if let Ok(port) = val.parse() {
                self.port = port;
            }
        }
        if let Ok(val) = std::env::var("IDA_MCP_SESSION_TIMEOUT_MIN") {
            if let Ok(mins) = val.parse() {
                self.session_timeout_minutes = mins;
            }
        }
        if let Ok(val) = std::env::var("IDA_MCP_MAX_SESSIONS") {
            if let Ok(n) = val.parse() {
                self.max_concurrent_sessions = n;
            }
        }
        if let Ok(val) = std::env::var("IDA_MCP_WORKER") {
            if !val.is_empty() {
                self.python_worker_path = PathBuf::from(val);
            }
        }
        if let Ok(val) = std::env::var("IDA_MCP_DEBUG") {
            if let Some(parsed) = parse_bool(&val) {
                self.debug = parsed;
            }
        }
    }

    /// Validate the configuration before the server starts. The worker path
    /// must point at an executable regular file.
    pub fn validate(&mut self) -> anyhow::Result<()> {
        if self.max_concurrent_sessions == 0 {
            bail!("max_concurrent_sessions must be positive");
        }
        if self.python_worker_path.as_os_str().is_empty() {
            bail!("python_worker_path is required");
        }

        let abs = std::path::absolute(&self.python_worker_path).with_context(|| {
            format!(
                "invalid python_worker_path {}",
                self.python_worker_path.display()
            )
        })?;
        self.python_worker_path = abs;

        let meta = std::fs::metadata(&self.python_worker_path).with_context(|| {
            format!(
                "python_worker_path {} not found",
                self.python_worker_path.display()
            )
        })?;
        if meta.is_dir() {
            bail!(
                "python_worker_path {} is a directory, expected a worker script",
                self.python_worker_path.display()
            );
        }
        if meta.permissions().mode() & 0o111 == 0 {
            bail!(
                "python_worker_path {} is not executable (try: chmod +x {})",
                self.python_worker_path.display(),
                self.python_worker_path.display()
            );
        }
        Ok(())
    }

    pub fn session_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.session_timeout_minutes * 60)
    }
}

/// Lenient boolean parsing for env overrides. Returns `None` for values that
/// are neither truthy nor falsy.
pub fn parse_bool(val: &str) -> Option<bool> {
    match val.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}
