//! Application configuration
//!
//! Settings come from an optional TOML file (`COACH_CONFIG`) with environment
//! variables layered on top.

pub mod client;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backend::{EchoResponder, OllamaResponder, Responder};

pub use client::ApiSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote API the client talks to
    #[serde(default)]
    pub api: ApiSettings,

    /// Development backend settings
    #[serde(default)]
    pub backend: BackendSettings,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load configuration from a TOML string
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any variable source; used by `from_env` and tests
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("COACH_CONFIG") {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };

        if let Some(host) = lookup("HOST") {
            config.backend.host = host;
        }
        if let Some(port) = lookup("PORT") {
            config.backend.port = parse_var("PORT", &port)?;
        }
        if let Some(dir) = lookup("COACH_DATA_DIR") {
            config.backend.data_dir = PathBuf::from(dir);
        }
        if let Some(token) = lookup("COACH_BACKEND_TOKEN") {
            config.backend.token = Some(token);
        }
        if let Some(url) = lookup("OLLAMA_URL") {
            config.backend.responder = ResponderKind::Ollama;
            config.backend.ollama_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            config.backend.model = model;
        }

        if let Some(url) = lookup("COACH_API_URL") {
            config.api.base_url = url;
        }
        if let Some(token) = lookup("COACH_API_TOKEN") {
            config.api.token = Some(token);
        }
        if let Some(secs) = lookup("COACH_TIMEOUT_SECS") {
            config.api.timeout_secs = Some(parse_var("COACH_TIMEOUT_SECS", &secs)?);
        }

        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("{key} has invalid value {value:?}")))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponderKind {
    #[default]
    Echo,
    Ollama,
}

/// Development backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendSettings {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory holding the SQLite database
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Bearer token required on `/api` routes
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub responder: ResponderKind,

    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    #[serde(default = "default_model")]
    pub model: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            data_dir: default_data_dir(),
            token: None,
            responder: ResponderKind::default(),
            ollama_url: default_ollama_url(),
            model: default_model(),
        }
    }
}

impl BackendSettings {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("coach-chat.db")
    }

    pub fn responder(&self) -> Arc<dyn Responder> {
        match self.responder {
            ResponderKind::Echo => Arc::new(EchoResponder),
            ResponderKind::Ollama => {
                Arc::new(OllamaResponder::new(&self.ollama_url, &self.model))
            }
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}
