//! Server configuration, with environment overrides for the binary.

use std::time::Duration;

use pighouse_game::GameConfig;
use pighouse_session::SessionConfig;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the WebSocket listener binds to.
    pub bind_addr: String,

    /// How often the maintenance task runs.
    ///
    /// Default: 60 seconds.
    pub sweep_interval_secs: u64,

    /// Rooms with no activity for this long are evicted.
    ///
    /// Default: 30 minutes.
    pub room_idle_secs: u64,

    pub game: GameConfig,
    pub session: SessionConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            sweep_interval_secs: 60,
            room_idle_secs: 30 * 60,
            game: GameConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Defaults, overridden by any of these that are set:
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `PIGHOUSE_BIND` | `bind_addr` |
    /// | `PIGHOUSE_SWEEP_INTERVAL_SECS` | `sweep_interval_secs` |
    /// | `PIGHOUSE_IDLE_TIMEOUT_SECS` | `room_idle_secs` and `session.idle_timeout_secs` |
    /// | `PIGHOUSE_RECONNECT_GRACE_SECS` | `session.reconnect_grace_secs` |
    ///
    /// Unparseable numbers are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(addr) = lookup("PIGHOUSE_BIND") {
            config.bind_addr = addr;
        }
        if let Some(secs) = parse_secs(&lookup, "PIGHOUSE_SWEEP_INTERVAL_SECS") {
            config.sweep_interval_secs = secs.max(1);
        }
        if let Some(secs) = parse_secs(&lookup, "PIGHOUSE_IDLE_TIMEOUT_SECS") {
            config.room_idle_secs = secs;
            config.session.idle_timeout_secs = secs;
        }
        if let Some(secs) = parse_secs(&lookup, "PIGHOUSE_RECONNECT_GRACE_SECS") {
            config.session.reconnect_grace_secs = secs;
        }
        config
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn room_idle(&self) -> Duration {
        Duration::from_secs(self.room_idle_secs)
    }
}

fn parse_secs(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<u64> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(secs) => Some(secs),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "ignoring invalid setting");
            None
        }
    }
}
