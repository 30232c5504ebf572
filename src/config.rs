//! Engine Configuration
//!
//! Everything the engine needs is injected here; there are no globals.
//! Defaults mirror the live game (50x40 grid, 3 second reconnect and
//! leaderboard cadence).

use std::time::Duration;
use thiserror::Error;

use crate::grid::GridBounds;
use crate::sync::mutator::{UnsentClaimPolicy, DEFAULT_MAX_UNSENT_CLAIMS};

/// Default real-time endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:8000/ws/game/";

/// Default REST base.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Default delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

/// Default leaderboard poll cadence.
pub const DEFAULT_LEADERBOARD_INTERVAL: Duration = Duration::from_secs(3);

/// Default REST request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default bound on the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default capacity of the engine event broadcast.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Configuration errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Environment variable could not be parsed.
    #[error("invalid value for {var}: {value:?}")]
    InvalidVar {
        /// Variable name.
        var: &'static str,
        /// Raw value.
        value: String,
    },

    /// Grid has a zero dimension.
    #[error("grid must be at least 1x1, got {0}")]
    EmptyGrid(GridBounds),

    /// URL has the wrong scheme.
    #[error("{field} must start with {expected}, got {url:?}")]
    BadScheme {
        /// Which setting.
        field: &'static str,
        /// Accepted schemes.
        expected: &'static str,
        /// Offending URL.
        url: String,
    },

    /// A duration that must be positive is zero.
    #[error("{0} must be greater than zero")]
    ZeroDuration(&'static str),

    /// A queue or channel capacity that must be positive is zero.
    #[error("{0} must be at least 1")]
    ZeroCapacity(&'static str),
}

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Grid dimensions agreed with the server.
    pub bounds: GridBounds,
    /// WebSocket endpoint.
    pub ws_url: String,
    /// REST base (`{base}/api/blocks/`, `{base}/api/leaderboard/`).
    pub api_base_url: String,
    /// Constant delay before every reconnect attempt.
    pub reconnect_delay: Duration,
    /// Leaderboard poll cadence.
    pub leaderboard_interval: Duration,
    /// REST request timeout.
    pub request_timeout: Duration,
    /// Longest a connection attempt may take before it counts as failed.
    pub connect_timeout: Duration,
    /// Refetch the grid after every reconnection.
    pub resync_on_reconnect: bool,
    /// Fate of claims made while disconnected.
    pub unsent_claims: UnsentClaimPolicy,
    /// How many unsent claims to remember.
    pub max_unsent_claims: usize,
    /// Capacity of the engine event broadcast.
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bounds: GridBounds::default(),
            ws_url: DEFAULT_WS_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            leaderboard_interval: DEFAULT_LEADERBOARD_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            resync_on_reconnect: true,
            unsent_claims: UnsentClaimPolicy::default(),
            max_unsent_claims: DEFAULT_MAX_UNSENT_CLAIMS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl EngineConfig {
    /// Create config from environment variables.
    ///
    /// Unset variables keep their defaults:
    /// `COLORGRID_WS_URL`, `COLORGRID_API_URL`, `COLORGRID_GRID_WIDTH`,
    /// `COLORGRID_GRID_HEIGHT`, `COLORGRID_RECONNECT_DELAY_MS`,
    /// `COLORGRID_LEADERBOARD_INTERVAL_MS`, `COLORGRID_REQUEST_TIMEOUT_MS`,
    /// `COLORGRID_CONNECT_TIMEOUT_MS`, `COLORGRID_RESYNC_ON_RECONNECT`,
    /// `COLORGRID_REPLAY_UNSENT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup("COLORGRID_WS_URL") {
            config.ws_url = url;
        }
        if let Some(url) = lookup("COLORGRID_API_URL") {
            config.api_base_url = url;
        }
        if let Some(width) = parse_var(&lookup, "COLORGRID_GRID_WIDTH")? {
            config.bounds.width = width;
        }
        if let Some(height) = parse_var(&lookup, "COLORGRID_GRID_HEIGHT")? {
            config.bounds.height = height;
        }
        if let Some(ms) = parse_var(&lookup, "COLORGRID_RECONNECT_DELAY_MS")? {
            config.reconnect_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "COLORGRID_LEADERBOARD_INTERVAL_MS")? {
            config.leaderboard_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "COLORGRID_REQUEST_TIMEOUT_MS")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var(&lookup, "COLORGRID_CONNECT_TIMEOUT_MS")? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(on) = parse_flag(&lookup, "COLORGRID_RESYNC_ON_RECONNECT")? {
            config.resync_on_reconnect = on;
        }
        if let Some(replay) = parse_flag(&lookup, "COLORGRID_REPLAY_UNSENT")? {
            config.unsent_claims = if replay {
                UnsentClaimPolicy::Replay
            } else {
                UnsentClaimPolicy::Discard
            };
        }

        Ok(config)
    }

    /// Set the grid dimensions.
    pub fn with_bounds(mut self, bounds: GridBounds) -> Self {
        self.bounds = bounds;
        self
    }

    /// Set both endpoints.
    pub fn with_endpoints(mut self, ws_url: impl Into<String>, api_base_url: impl Into<String>) -> Self {
        self.ws_url = ws_url.into();
        self.api_base_url = api_base_url.into();
        self
    }

    /// Set the reconnect delay.
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    /// Set the leaderboard cadence.
    pub fn with_leaderboard_interval(mut self, interval: Duration) -> Self {
        self.leaderboard_interval = interval;
        self
    }

    /// Set the REST request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connection handshake timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Enable or disable resync after reconnect.
    pub fn with_resync_on_reconnect(mut self, enabled: bool) -> Self {
        self.resync_on_reconnect = enabled;
        self
    }

    /// Set the unsent-claim policy.
    pub fn with_unsent_claims(mut self, policy: UnsentClaimPolicy) -> Self {
        self.unsent_claims = policy;
        self
    }

    /// Full-grid snapshot endpoint.
    pub fn blocks_url(&self) -> String {
        format!("{}/api/blocks/", self.api_base_url.trim_end_matches('/'))
    }

    /// Leaderboard endpoint.
    pub fn leaderboard_url(&self) -> String {
        format!("{}/api/leaderboard/", self.api_base_url.trim_end_matches('/'))
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bounds.width == 0 || self.bounds.height == 0 {
            return Err(ConfigError::EmptyGrid(self.bounds));
        }
        if !(self.ws_url.starts_with("ws://") || self.ws_url.starts_with("wss://")) {
            return Err(ConfigError::BadScheme {
                field: "ws_url",
                expected: "ws:// or wss://",
                url: self.ws_url.clone(),
            });
        }
        if !(self.api_base_url.starts_with("http://") || self.api_base_url.starts_with("https://")) {
            return Err(ConfigError::BadScheme {
                field: "api_base_url",
                expected: "http:// or https://",
                url: self.api_base_url.clone(),
            });
        }
        if self.reconnect_delay.is_zero() {
            return Err(ConfigError::ZeroDuration("reconnect_delay"));
        }
        if self.leaderboard_interval.is_zero() {
            return Err(ConfigError::ZeroDuration("leaderboard_interval"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("request_timeout"));
        }
        if self.connect_timeout.is_zero() {
            return Err(ConfigError::ZeroDuration("connect_timeout"));
        }
        if self.event_capacity == 0 {
            return Err(ConfigError::ZeroCapacity("event_capacity"));
        }
        Ok(())
    }
}

fn parse_var<F, T>(lookup: &F, var: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidVar { var, value }),
    }
}

fn parse_flag<F>(lookup: &F, var: &'static str) -> Result<Option<bool>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var).as_deref().map(str::trim) {
        None => Ok(None),
        Some("1") | Some("true") => Ok(Some(true)),
        Some("0") | Some("false") => Ok(Some(false)),
        Some(other) => Err(ConfigError::InvalidVar { var, value: other.to_string() }),
    }
}
