//! Server configuration.
//!
//! Configuration is read from an optional YAML file named by the
//! `HEARTH_CONFIG` environment variable. Every field has a default, so a
//! partial file (or no file at all) is valid. The single positional CLI
//! argument, a port number, is applied on top.

use anyhow::Context;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Environment variable naming the YAML configuration file.
pub const CONFIG_ENV: &str = "HEARTH_CONFIG";

/// Port used when neither the config file nor the command line provide one.
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub static_files: StaticFilesConfig,
    pub logging: LoggingConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind (e.g. "0.0.0.0")
    pub host: String,
    pub port: u16,
    /// Upper bound on connections handled at the same time
    pub max_connections: usize,
    /// Time allowed for a client to send its request line and headers
    pub read_timeout_secs: u64,
    /// Longest accepted request line, in bytes
    pub max_request_line: usize,
}

/// Document root settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StaticFilesConfig {
    /// Document root; relative paths are taken from the working directory
    pub root: PathBuf,
    /// Error template file name, looked up at the top of the document root
    pub error_page: String,
}

/// Log sink settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`
    pub level: String,
    /// Append-only log file
    pub file: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            max_connections: 256,
            read_timeout_secs: 30,
            max_request_line: 8192,
        }
    }
}

impl Default for StaticFilesConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("webroot"),
            error_page: "error.html".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: PathBuf::from("hearth.log"),
        }
    }
}

impl ServerConfig {
    /// Address string handed to `TcpListener::bind`.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}

impl Config {
    /// Loads the file named by `HEARTH_CONFIG`, or the defaults if unset.
    pub fn load() -> anyhow::Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path)),
            None => Ok(Self::default()),
        }
    }

    /// Applies the command line (without the program name).
    ///
    /// Only the first argument is looked at. If it does not parse as a port
    /// it is ignored and the configured port stays in effect.
    pub fn apply_args<I>(&mut self, args: I)
    where
        I: IntoIterator<Item = String>,
    {
        if let Some(arg) = args.into_iter().next() {
            match arg.parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(
                    arg = %arg,
                    port = self.server.port,
                    "Ignoring unparseable port argument"
                ),
            }
        }
    }

    pub fn from_file(path: PathBuf) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("parsing config file {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        // An empty document deserializes to unit, not to an empty map.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}
