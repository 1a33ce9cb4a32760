// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

/// Deployment environment. Controls storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
#[value(rename_all = "lowercase")]
pub enum Environment {
    Local,
    Staging,
    Production,
    Testing,
}

/// Configuration for the teleop relay server.
#[derive(Debug, Clone, clap::Args)]
pub struct RelayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "0.0.0.0", env = "TELEOP_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080, env = "TELEOP_PORT")]
    pub port: u16,

    /// Port for the Prometheus scrape endpoint. 0 disables metrics serving.
    #[arg(long, default_value_t = 9100, env = "TELEOP_METRICS_PORT")]
    pub metrics_port: u16,

    /// Deployment environment; selects the storage backend.
    #[arg(long, value_enum, default_value_t = Environment::Local, env = "TELEOP_ENV")]
    pub environment: Environment,

    /// Domain used as the token issuer and WebRTC callback host.
    #[arg(long, default_value = "localhost", env = "TELEOP_DOMAIN")]
    pub domain: String,

    /// HMAC signing key for session and vehicle tokens.
    #[arg(long, env = "TELEOP_TOKEN_SIGNING_KEY")]
    pub token_signing_key: Option<String>,

    /// Reconnect grace window in seconds: how long a Relay keeps its
    /// listeners alive after an abnormal vehicle disconnect, waiting for
    /// a rebind before killing them.
    #[arg(long, default_value_t = 60, env = "TELEOP_GRACE_WINDOW_SECS")]
    pub grace_window_secs: u64,

    /// Health check interval in milliseconds, used by the reaper that
    /// prunes Offline sessions with no bound link and no listeners.
    #[arg(long, default_value_t = 30000, env = "TELEOP_HEALTH_CHECK_MS")]
    pub health_check_ms: u64,

    /// Consecutive failed health checks tolerated before the reaper
    /// prunes a session. Unused until the reaper itself is wired.
    #[arg(long, default_value_t = 3, env = "TELEOP_MAX_HEALTH_FAILURES")]
    pub max_health_failures: u32,

    /// Emit JSON-formatted log lines instead of human-readable text.
    #[arg(long, default_value_t = false, env = "TELEOP_LOG_JSON")]
    pub log_json: bool,
}

impl RelayConfig {
    pub fn grace_window(&self) -> Duration {
        Duration::from_secs(self.grace_window_secs)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_millis(self.health_check_ms)
    }

    /// The signing key to use, falling back to an insecure development
    /// default when unset. Production deployments must set
    /// `TELEOP_TOKEN_SIGNING_KEY`.
    pub fn signing_key_bytes(&self) -> Vec<u8> {
        match &self.token_signing_key {
            Some(key) => key.as_bytes().to_vec(),
            None => b"teleop-insecure-development-key".to_vec(),
        }
    }
}
