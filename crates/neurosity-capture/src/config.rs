//! # Configuration
//!
//! [`CaptureConfig`] holds everything about a run that is not a credential:
//! where the device gateway lives, how long to capture, and timeouts.
//! Credentials are resolved separately by
//! [`CredentialResolver`](crate::credentials::CredentialResolver).
//!
//! ## Loading Priority
//!
//! 1. Explicit struct fields (programmatic construction)
//! 2. TOML config file at an explicit path
//! 3. File named by `NEUROSITY_CAPTURE_CONFIG`
//! 4. `./neurosity-capture.toml` in the current directory
//! 5. `~/.config/neurosity-capture/neurosity-capture.toml`
//! 6. Built-in defaults
//!
//! `NEUROSITY_GATEWAY_URL` always overrides the gateway URL, even when
//! loading from a file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CaptureError, CaptureResult};

/// Default gateway WebSocket URL.
pub const DEFAULT_GATEWAY_URL: &str = "ws://localhost:8787";

/// Default capture duration in minutes.
pub const DEFAULT_DURATION_MINUTES: u64 = 30;

/// Default trailing buffer in minutes.
pub const DEFAULT_BUFFER_MINUTES: u64 = 10;

/// Default WebSocket handshake timeout in seconds.
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default RPC call timeout in seconds.
const DEFAULT_RPC_TIMEOUT_SECS: u64 = 10;

/// Env var overriding the gateway URL.
pub const GATEWAY_URL_ENV: &str = "NEUROSITY_GATEWAY_URL";

/// Env var pointing at a config file.
pub const CONFIG_PATH_ENV: &str = "NEUROSITY_CAPTURE_CONFIG";

const CONFIG_FILE_NAME: &str = "neurosity-capture.toml";

/// Run configuration.
///
/// ```
/// use neurosity_capture::config::CaptureConfig;
///
/// let config = CaptureConfig::new("ws://localhost:9000");
/// assert_eq!(config.session_window().total().as_secs(), 40 * 60);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// WebSocket URL of the device-cloud gateway.
    #[serde(default = "default_gateway_url")]
    pub gateway_url: String,

    /// Capture duration, in minutes.
    #[serde(default = "default_duration")]
    pub duration_minutes: u64,

    /// Extra minutes kept subscribed after the duration.
    #[serde(default = "default_buffer")]
    pub buffer_minutes: u64,

    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

/// Timeout settings for gateway operations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Timeout for the WebSocket handshake, in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Timeout for individual JSON-RPC calls, in seconds.
    #[serde(default = "default_rpc_timeout")]
    pub rpc_timeout_secs: u64,
}

// ─── Defaults ───────────────────────────────────────────────────────────

fn default_gateway_url() -> String {
    DEFAULT_GATEWAY_URL.to_string()
}

fn default_duration() -> u64 {
    DEFAULT_DURATION_MINUTES
}

fn default_buffer() -> u64 {
    DEFAULT_BUFFER_MINUTES
}

fn default_connect_timeout() -> u64 {
    DEFAULT_CONNECT_TIMEOUT_SECS
}

fn default_rpc_timeout() -> u64 {
    DEFAULT_RPC_TIMEOUT_SECS
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            rpc_timeout_secs: DEFAULT_RPC_TIMEOUT_SECS,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new(DEFAULT_GATEWAY_URL)
    }
}

/// Capture duration plus the trailing buffer, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionWindow {
    pub duration_minutes: u64,
    pub buffer_minutes: u64,
}

impl SessionWindow {
    pub fn new(duration_minutes: u64, buffer_minutes: u64) -> Self {
        Self {
            duration_minutes,
            buffer_minutes,
        }
    }

    /// Total subscription time, saturating on overflow.
    #[must_use]
    pub fn total(&self) -> Duration {
        let minutes = self.duration_minutes.saturating_add(self.buffer_minutes);
        Duration::from_secs(minutes.saturating_mul(60))
    }
}

// ─── CaptureConfig impl ─────────────────────────────────────────────────

impl CaptureConfig {
    /// Config for a gateway URL with all other fields defaulted.
    pub fn new(gateway_url: impl Into<String>) -> Self {
        Self {
            gateway_url: gateway_url.into(),
            duration_minutes: DEFAULT_DURATION_MINUTES,
            buffer_minutes: DEFAULT_BUFFER_MINUTES,
            timeouts: TimeoutConfig::default(),
        }
    }

    /// How long every metric stays subscribed.
    #[must_use]
    pub fn session_window(&self) -> SessionWindow {
        SessionWindow::new(self.duration_minutes, self.buffer_minutes)
    }

    /// Load config from a TOML file, with environment variable overrides.
    ///
    /// # Errors
    /// Returns [`CaptureError::ConfigError`] if the file is missing or malformed.
    #[cfg(feature = "config-toml")]
    pub fn from_file(path: impl AsRef<Path>) -> CaptureResult<Self> {
        Self::from_file_with(path.as_ref(), &|key| std::env::var(key).ok())
    }

    #[cfg(feature = "config-toml")]
    fn from_file_with(path: &Path, env: &dyn Fn(&str) -> Option<String>) -> CaptureResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| CaptureError::ConfigError {
            reason: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;
        let mut config: Self = toml::from_str(&contents)?;
        config.apply_overrides(env);
        Ok(config)
    }

    /// Discover and load config from the standard search path.
    ///
    /// Falls back to defaults plus environment overrides if no file is found.
    ///
    /// # Errors
    /// Returns [`CaptureError::ConfigError`] if a discovered file is malformed,
    /// or if an explicit path is given but config files are not supported by
    /// this build.
    pub fn discover(explicit_path: Option<&Path>) -> CaptureResult<Self> {
        Self::discover_with(explicit_path, &|key| std::env::var(key).ok())
    }

    fn discover_with(
        explicit_path: Option<&Path>,
        env: &dyn Fn(&str) -> Option<String>,
    ) -> CaptureResult<Self> {
        let candidates = config_candidates(explicit_path, env);

        #[cfg(feature = "config-toml")]
        {
            if let Some(path) = explicit_path {
                return Self::from_file_with(path, env);
            }
            if let Some(path) = candidates.into_iter().find(|p| p.exists()) {
                tracing::debug!(path = %path.display(), "Loading capture config");
                return Self::from_file_with(&path, env);
            }
        }

        #[cfg(not(feature = "config-toml"))]
        {
            if let Some(path) = explicit_path {
                return Err(CaptureError::ConfigError {
                    reason: format!(
                        "cannot read '{}': built without the `config-toml` feature",
                        path.display()
                    ),
                });
            }
            drop(candidates);
        }

        let mut config = Self::default();
        config.apply_overrides(env);
        Ok(config)
    }

    fn apply_overrides(&mut self, env: &dyn Fn(&str) -> Option<String>) {
        if let Some(url) = env(GATEWAY_URL_ENV).filter(|v| !v.is_empty()) {
            self.gateway_url = url;
        }
    }
}

// ─── Helpers ────────────────────────────────────────────────────────────

/// Implicit config file locations, in priority order.
fn config_candidates(
    explicit_path: Option<&Path>,
    env: &dyn Fn(&str) -> Option<String>,
) -> Vec<PathBuf> {
    if explicit_path.is_some() {
        return Vec::new();
    }
    let mut candidates = Vec::new();
    if let Some(path) = env(CONFIG_PATH_ENV).filter(|v| !v.is_empty()) {
        candidates.push(PathBuf::from(path));
    }
    candidates.push(PathBuf::from(CONFIG_FILE_NAME));
    if let Some(path) = dirs_config_path(env) {
        candidates.push(path);
    }
    candidates
}

/// Platform-appropriate config directory path.
fn dirs_config_path(env: &dyn Fn(&str) -> Option<String>) -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        env("APPDATA").map(|dir| PathBuf::from(dir).join("neurosity-capture").join(CONFIG_FILE_NAME))
    }
    #[cfg(not(target_os = "windows"))]
    {
        env("HOME").map(|dir| {
            PathBuf::from(dir)
                .join(".config")
                .join("neurosity-capture")
                .join(CONFIG_FILE_NAME)
        })
    }
}
