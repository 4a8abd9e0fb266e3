use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::error::{Error, Result};

pub const DEFAULT_CONFIG_PATH: &str = "process_booster.toml";
pub const CONFIG_PATH_ENV: &str = "PROCESS_BOOSTER_CONFIG";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub http: HttpConfig,
    pub log: LogConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub listen_url: String,
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// The activity log served by `/api/logs`.
    pub file_path: PathBuf,
    /// Diagnostic verbosity on stderr when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen_url: "http://localhost:8080/".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file_path: PathBuf::from("boost_log.txt"),
            level: "info".to_string(),
        }
    }
}

impl Config {
    /// Defaults, then the TOML file (if any), then `PROCESS_BOOSTER_*` variables.
    pub fn load() -> Result<Self> {
        let explicit = env::var(CONFIG_PATH_ENV).ok().map(PathBuf::from);
        Self::load_with(explicit.as_deref(), |key| env::var(key).ok())
    }

    pub fn load_with(
        explicit_path: Option<&Path>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_PATH))?
            }
            None => Self::default(),
        };
        config.apply_env(lookup);
        config.bind_address()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("reading config file {}: {}", path.display(), e))
        })?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("PROCESS_BOOSTER_LISTEN_URL").filter(|v| !v.is_empty()) {
            self.http.listen_url = val;
        }
        if let Some(val) = lookup("PROCESS_BOOSTER_LOG_FILE").filter(|v| !v.is_empty()) {
            self.log.file_path = PathBuf::from(val);
        }
        if let Some(val) = lookup("PROCESS_BOOSTER_LOG_LEVEL").filter(|v| !v.is_empty()) {
            self.log.level = val;
        }
    }

    /// `host:port` form of `http.listen_url`, ready for `TcpListener::bind`.
    pub fn bind_address(&self) -> Result<String> {
        let url = Url::parse(&self.http.listen_url)?;
        if url.scheme() != "http" {
            return Err(Error::Config(format!(
                "listen_url must use http, got {}",
                url.scheme()
            )));
        }
        let host = url
            .host_str()
            .ok_or_else(|| Error::Config(format!("missing host in {}", self.http.listen_url)))?;
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(format!("{host}:{port}"))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.http.request_timeout_secs.max(1))
    }
}
