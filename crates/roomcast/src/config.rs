//! Server configuration.

use std::time::Duration;

use roomcast_room::DEFAULT_ROOM_ID;

use crate::RoomcastError;

/// Default listen address.
pub const DEFAULT_ADDR: &str = "127.0.0.1:3000";

/// Default WebSocket upgrade path.
pub const DEFAULT_PATH: &str = "/lc";

/// Default liveness window.
pub const DEFAULT_KEEPALIVE: Duration = Duration::from_secs(60);

/// Environment variable overriding [`ServerConfig::bind_addr`].
pub const ENV_ADDR: &str = "ROOMCAST_ADDR";
/// Environment variable overriding [`ServerConfig::path`].
pub const ENV_PATH: &str = "ROOMCAST_PATH";
/// Environment variable overriding [`ServerConfig::keepalive`], in seconds.
pub const ENV_KEEPALIVE_SECS: &str = "ROOMCAST_KEEPALIVE_SECS";

/// Everything a [`ChatServer`](crate::ChatServer) needs to start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,
    /// The only path upgrades are accepted on.
    pub path: String,
    /// How long a connection may stay silent before it is dropped.
    pub keepalive: Duration,
    /// ID and name of the room every client lands in by default.
    pub default_room: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            path: DEFAULT_PATH.to_string(),
            keepalive: DEFAULT_KEEPALIVE,
            default_room: DEFAULT_ROOM_ID.to_string(),
        }
    }
}

impl ServerConfig {
    /// Defaults overridden by the `ROOMCAST_*` environment variables.
    pub fn from_env() -> Result<Self, RoomcastError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by whatever `lookup` returns for each
    /// `ROOMCAST_*` key. Empty values are ignored.
    ///
    /// # Errors
    /// [`RoomcastError::Config`] if the keepalive is not a positive whole
    /// number of seconds.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, RoomcastError> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Self::default();

        if let Some(addr) = get(ENV_ADDR) {
            config.bind_addr = addr;
        }
        if let Some(path) = get(ENV_PATH) {
            config.path = path;
        }
        if let Some(secs) = get(ENV_KEEPALIVE_SECS) {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                RoomcastError::Config(format!("{ENV_KEEPALIVE_SECS} must be a number, got {secs:?}"))
            })?;
            if secs == 0 {
                return Err(RoomcastError::Config(format!(
                    "{ENV_KEEPALIVE_SECS} must be greater than zero"
                )));
            }
            config.keepalive = Duration::from_secs(secs);
        }
        Ok(config)
    }
}
