//! Server configuration.

use std::str::FromStr;
use std::time::Duration;

use gridplay_sync::TickConfig;

use crate::ConfigError;

/// Everything a server needs to know before it starts.
///
/// [`Default`] gives a server suitable for local play. Deployments usually
/// start from [`ServerConfig::from_env`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind: String,
    /// The only request path accepted for upgrades.
    pub path: String,
    /// Time between two ticks.
    pub tick_interval: Duration,
    /// Events a room may hold between two ticks.
    pub room_queue_capacity: usize,
    /// Events the server queue may hold between two ticks.
    pub server_queue_capacity: usize,
    /// Decoded messages a session may buffer before its reader waits.
    pub inbound_buffer: usize,
    /// Connections beyond this many are refused.
    pub max_connections: usize,
    /// How long a client may take to finish the WebSocket upgrade.
    pub handshake_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:4000".to_string(),
            path: "/ws".to_string(),
            tick_interval: Duration::from_millis(50),
            room_queue_capacity: 256,
            server_queue_capacity: 1024,
            inbound_buffer: 32,
            max_connections: 10_000,
            handshake_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    pub const ENV_BIND: &'static str = "GRIDPLAY_BIND";
    pub const ENV_PATH: &'static str = "GRIDPLAY_PATH";
    pub const ENV_TICK_MS: &'static str = "GRIDPLAY_TICK_MS";
    pub const ENV_MAX_CONNECTIONS: &'static str = "GRIDPLAY_MAX_CONNECTIONS";

    /// Defaults overlaid with whatever `GRIDPLAY_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`from_env`](Self::from_env), reading variables through
    /// `lookup` instead of the process environment.
    pub fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(bind) = lookup(Self::ENV_BIND) {
            config.bind = bind;
        }
        if let Some(path) = lookup(Self::ENV_PATH) {
            if !path.starts_with('/') {
                return Err(ConfigError::Invalid {
                    key: Self::ENV_PATH,
                    value: path,
                    reason: "must start with '/'".into(),
                });
            }
            config.path = path;
        }
        if let Some(ms) = positive::<u64>(&lookup, Self::ENV_TICK_MS)? {
            config.tick_interval = Duration::from_millis(ms);
        }
        if let Some(max) = positive::<usize>(&lookup, Self::ENV_MAX_CONNECTIONS)? {
            config.max_connections = max;
        }

        Ok(config)
    }

    /// The tick scheduler settings for this server.
    pub fn tick(&self) -> TickConfig {
        TickConfig::with_interval(self.tick_interval).validated()
    }
}

fn positive<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError>
where
    T: FromStr + PartialEq + Default,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let invalid = |reason: String| ConfigError::Invalid {
        key,
        value: raw.clone(),
        reason,
    };
    let value = raw.trim().parse::<T>().map_err(|e| invalid(e.to_string()))?;
    if value == T::default() {
        return Err(invalid("must be greater than zero".into()));
    }
    Ok(Some(value))
}
