//! Configuration
//!
//! Read from `<config dir>/smartchat/config.toml` when present. Every field
//! has a default, so an empty or missing file is valid.
//!
//! ```toml
//! service_url = "http://127.0.0.1:8108"
//! menu = "系統QA"
//! backend = "http"            # or "legacy"
//! # request_timeout_secs = 30 # unset: wait for the service indefinitely
//! # feedback_url = "http://127.0.0.1:8108/chatback/feedback/"
//!
//! [legacy]
//! interpreter = "/usr/bin/python3"
//! script = "/srv/smartchat/process_pdf.py"
//! index = "/srv/smartchat/PDF/1968_QA.json"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::protocol::DEFAULT_MENU;
use crate::{Result, SmartChatError};

pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8108";

/// Which back-end answers typed questions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Http,
    Legacy,
}

/// Paths for the legacy QA script
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LegacyConfig {
    pub interpreter: Option<PathBuf>,
    pub script: Option<PathBuf>,
    pub index: Option<PathBuf>,
}

/// Configuration for SmartChat
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SmartChatConfig {
    /// Base URL of the answer service (the query path is appended)
    pub service_url: String,

    /// `menu` field sent with every typed question
    pub menu: String,

    /// Asset base path of the hosting page
    pub web_root: String,

    /// Upper bound for one question. `None` waits indefinitely.
    pub request_timeout_secs: Option<u64>,

    /// Where finished feedback is posted, fire-and-forget
    pub feedback_url: Option<String>,

    pub backend: BackendKind,

    pub legacy: LegacyConfig,
}

impl Default for SmartChatConfig {
    fn default() -> Self {
        Self {
            service_url: DEFAULT_SERVICE_URL.to_string(),
            menu: DEFAULT_MENU.to_string(),
            web_root: ".".to_string(),
            request_timeout_secs: None,
            feedback_url: None,
            backend: BackendKind::Http,
            legacy: LegacyConfig::default(),
        }
    }
}

impl SmartChatConfig {
    /// Default config file location
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("smartchat").join("config.toml"))
    }

    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match Self::default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        if !path.exists() {
            if explicit {
                return Err(SmartChatError::Config(format!(
                    "config file not found: {}",
                    path.display()
                )));
            }
            debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = Self::from_toml(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| SmartChatError::Config(e.to_string()))
    }

    pub fn with_service_url(mut self, url: impl Into<String>) -> Self {
        self.service_url = url.into();
        self
    }

    pub fn with_menu(mut self, menu: impl Into<String>) -> Self {
        self.menu = menu.into();
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_request_timeout(mut self, secs: Option<u64>) -> Self {
        self.request_timeout_secs = secs;
        self
    }

    pub fn with_feedback_url(mut self, url: Option<String>) -> Self {
        self.feedback_url = url;
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }

    /// Full URL of the question endpoint
    pub fn query_url(&self) -> String {
        format!(
            "{}{}",
            self.service_url.trim_end_matches('/'),
            crate::protocol::QUERY_PATH
        )
    }
}
