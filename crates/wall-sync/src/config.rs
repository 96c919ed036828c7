//! Effective wall configuration.
//!
//! Layering: built-in defaults → TOML file (explicit path, else
//! `WALL_CONFIG`) → environment (`IDEAS_API`, `WALL_POLL_SECS`,
//! `WALL_FPS`). Command-line flags are applied by the binary on top.

use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::Url;
use serde::{Deserialize, Serialize};
use wall_core::{BackoffPolicy, PresentationConfig};

use crate::error::{Result, SyncError};

pub const DEFAULT_API: &str = "http://127.0.0.1:8000";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WallConfig {
    pub api: ApiConfig,
    pub poll: PollConfig,
    pub push: PushConfig,
    pub display: DisplayConfig,
    pub spotlight: SpotlightConfig,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub ideas_path: String,
    pub header_path: String,
    /// WebSocket path for the push subscription.
    pub push_path: String,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API.to_string(),
            ideas_path: "/ideas".to_string(),
            header_path: "/header".to_string(),
            push_path: "/ws".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: 15_000,
            timeout_ms: 5_000,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    pub connect_timeout_ms: u64,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub backoff_jitter: f64,
}

impl Default for PushConfig {
    fn default() -> Self {
        let policy = BackoffPolicy::default();
        Self {
            connect_timeout_ms: 5_000,
            backoff_base_ms: policy.base.as_millis() as u64,
            backoff_max_ms: policy.max.as_millis() as u64,
            backoff_jitter: policy.jitter,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub width: f64,
    pub height: f64,
    pub fps: u32,
    pub margin_x: f64,
    pub margin_y: f64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        let presentation = PresentationConfig::default();
        Self {
            width: presentation.bounds.width,
            height: presentation.bounds.height,
            fps: 60,
            margin_x: presentation.bounds.margin_x,
            margin_y: presentation.bounds.margin_y,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotlightConfig {
    pub period_ms: u64,
    pub history: usize,
}

impl Default for SpotlightConfig {
    fn default() -> Self {
        Self {
            period_ms: wall_core::SPOTLIGHT_PERIOD.as_millis() as u64,
            history: wall_core::SPOTLIGHT_HISTORY,
        }
    }
}

impl WallConfig {
    /// Load from `path` (or `WALL_CONFIG`), then apply the process
    /// environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_from(path, |key| std::env::var(key).ok())
    }

    pub fn load_from<F>(path: Option<&Path>, mut lookup: F) -> Result<Self>
    where
        F: FnMut(&str) -> Option<String>,
    {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| lookup("WALL_CONFIG").map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(&path).map_err(|e| {
                    SyncError::Config(format!("failed to read {}: {e}", path.display()))
                })?;
                Self::from_toml_str(&contents).map_err(|e| {
                    SyncError::Config(format!("failed to parse {}: {e}", path.display()))
                })?
            }
            None => Self::default(),
        };
        config.apply_env_overrides_from(lookup);
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| SyncError::Config(e.to_string()))
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| SyncError::Config(format!("failed to render config: {e}")))
    }

    pub fn apply_env_overrides_from<F>(&mut self, mut lookup: F)
    where
        F: FnMut(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("IDEAS_API") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                self.api.base_url = trimmed.to_string();
            }
        }

        if let Some(raw) = lookup("WALL_POLL_SECS") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<f64>() {
                    Ok(secs) if secs.is_finite() && (secs * 1000.0).round() >= 1.0 => {
                        self.poll.interval_ms = (secs * 1000.0).round() as u64;
                    }
                    Ok(secs) => {
                        tracing::warn!("invalid WALL_POLL_SECS, ignoring: {secs} is under 1 ms");
                    }
                    Err(err) => {
                        tracing::warn!("invalid WALL_POLL_SECS, ignoring: {err}");
                    }
                }
            }
        }

        if let Some(raw) = lookup("WALL_FPS") {
            let trimmed = raw.trim();
            if !trimmed.is_empty() {
                match trimmed.parse::<u32>() {
                    Ok(fps) if fps > 0 => self.display.fps = fps,
                    Ok(_) => tracing::warn!("invalid WALL_FPS, ignoring: must be positive"),
                    Err(err) => tracing::warn!("invalid WALL_FPS, ignoring: {err}"),
                }
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.base_url()?;
        if self.poll.interval_ms == 0 {
            return Err(SyncError::Config("poll.interval_ms must be positive".into()));
        }
        if self.poll.timeout_ms == 0 || self.push.connect_timeout_ms == 0 {
            return Err(SyncError::Config("timeouts must be positive".into()));
        }
        if self.push.backoff_base_ms == 0 || self.push.backoff_base_ms > self.push.backoff_max_ms {
            return Err(SyncError::Config(format!(
                "push backoff must satisfy 0 < base ({}) <= max ({})",
                self.push.backoff_base_ms, self.push.backoff_max_ms
            )));
        }
        if !(0.0..=1.0).contains(&self.push.backoff_jitter) {
            return Err(SyncError::Config("push.backoff_jitter must be in [0, 1]".into()));
        }
        if !(1..=240).contains(&self.display.fps) {
            return Err(SyncError::Config(format!(
                "display.fps must be in 1..=240, got {}",
                self.display.fps
            )));
        }
        if self.display.width <= 0.0 || self.display.height <= 0.0 {
            return Err(SyncError::Config("display size must be positive".into()));
        }
        if self.spotlight.period_ms == 0 {
            return Err(SyncError::Config("spotlight.period_ms must be positive".into()));
        }
        if self.spotlight.history == 0 {
            return Err(SyncError::Config("spotlight.history must be at least 1".into()));
        }
        Ok(())
    }

    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(self.api.base_url.trim()).map_err(|e| {
            SyncError::Config(format!("bad api.base_url {:?}: {e}", self.api.base_url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SyncError::Config(format!(
                "api.base_url must be http(s), got {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    /// Resolve an endpoint path against the base URL, keeping any path
    /// prefix the base carries.
    pub fn endpoint(&self, path: &str) -> Result<Url> {
        let base = self.base_url()?;
        let joined = format!(
            "{}/{}",
            base.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        Url::parse(&joined).map_err(|e| SyncError::Config(format!("bad endpoint {joined}: {e}")))
    }

    pub fn ideas_url(&self) -> Result<Url> {
        self.endpoint(&self.api.ideas_path)
    }

    pub fn header_url(&self) -> Result<Url> {
        self.endpoint(&self.api.header_path)
    }

    /// Push endpoint with the base scheme mapped to `ws`/`wss`.
    pub fn push_url(&self) -> Result<Url> {
        let mut url = self.endpoint(&self.api.push_path)?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| SyncError::Config(format!("cannot use {scheme} for {url}")))?;
        Ok(url)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll.interval_ms)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll.timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.push.connect_timeout_ms)
    }

    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.display.fps.max(1)))
    }

    pub fn spotlight_period(&self) -> Duration {
        Duration::from_millis(self.spotlight.period_ms)
    }

    pub fn backoff_policy(&self) -> BackoffPolicy {
        BackoffPolicy {
            base: Duration::from_millis(self.push.backoff_base_ms),
            max: Duration::from_millis(self.push.backoff_max_ms),
            jitter: self.push.backoff_jitter,
        }
    }

    pub fn presentation_config(&self) -> PresentationConfig {
        let mut config = PresentationConfig::new(self.display.width, self.display.height);
        config.bounds.margin_x = self.display.margin_x;
        config.bounds.margin_y = self.display.margin_y;
        config
    }
}
