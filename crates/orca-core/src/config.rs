use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{OrcaError, Result};

/// Top-level client configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub ui: UiConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Which route lists the workflow definitions. Deployments differ.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListRoute {
    #[default]
    Refresh,
    Dags,
    Pulse,
}

impl ListRoute {
    pub fn path(&self) -> &'static str {
        match self {
            ListRoute::Refresh => "/refresh",
            ListRoute::Dags => "/dags",
            ListRoute::Pulse => "/pulse",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Base URL of the engine's HTTP surface.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default)]
    pub list_route: ListRoute,
    /// Per-request timeout; enforced by the HTTP client.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            list_route: ListRoute::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UiConfig {
    /// How many of the most recent runs the run list shows.
    #[serde(default = "default_run_history")]
    pub run_history: usize,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
    /// Directory for the persisted location and the TUI log file.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for UiConfig {
    fn default() -> Self {
        Self {
            run_history: default_run_history(),
            tick_ms: default_tick_ms(),
            state_dir: default_state_dir(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_base_url() -> String { "http://127.0.0.1:8080".to_string() }
fn default_timeout_secs() -> u64 { 30 }
fn default_run_history() -> usize { 10 }
fn default_tick_ms() -> u64 { 100 }
fn default_state_dir() -> String { "~/.orca".to_string() }
fn default_log_filter() -> String { "orca=info,warn".to_string() }

impl AppConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| OrcaError::ConfigNotFound(path.display().to_string()))?;

        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(&content);

        let config: AppConfig =
            toml::from_str(&expanded).map_err(|e| OrcaError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Point at a different engine, checking the result like a loaded file.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Result<Self> {
        self.backend.base_url = url.into();
        self.validate()?;
        Ok(self)
    }

    fn validate(&self) -> Result<()> {
        if self.ui.run_history == 0 {
            return Err(OrcaError::Config("ui.run_history must be at least 1".into()));
        }
        if !self.backend.base_url.starts_with("http://")
            && !self.backend.base_url.starts_with("https://")
        {
            return Err(OrcaError::Config(format!(
                "backend.base_url must be an http(s) URL, got {}",
                self.backend.base_url
            )));
        }
        Ok(())
    }

    /// Resolve the state directory (expand ~).
    pub fn state_dir(&self) -> PathBuf {
        let dir = &self.ui.state_dir;
        if let Some(rest) = dir.strip_prefix("~/") {
            if let Some(home) = dirs_home() {
                return home.join(rest);
            }
        }
        PathBuf::from(dir)
    }

    /// File holding the last navigation token.
    pub fn location_file(&self) -> PathBuf {
        self.state_dir().join("location")
    }

    /// File the TUI writes its log to.
    pub fn log_file(&self) -> PathBuf {
        self.state_dir().join("orca.log")
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
