//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::str::FromStr;

use crate::game::constants::{BOT_COUNT, MAX_PLAYERS};

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Emit JSON log lines instead of human-readable ones
    pub log_json: bool,

    /// Human session cap
    pub max_players: usize,
    /// Bots spawned once at startup
    pub bot_count: usize,

    /// Allowed client origins for CORS; empty allows any
    pub client_origins: Vec<String>,
    /// Fixed world seed, random when unset
    pub world_seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            log_level: "info".to_string(),
            log_json: false,
            max_players: MAX_PLAYERS,
            bot_count: BOT_COUNT,
            client_origins: Vec::new(),
            world_seed: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup. Unset keys take defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // Hosted platforms provide PORT; it wins over SERVER_ADDR
        let server_addr = match (lookup("PORT"), lookup("SERVER_ADDR")) {
            (Some(port), _) => format!("0.0.0.0:{}", port.trim())
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            (None, Some(addr)) => addr.trim().parse().map_err(|_| ConfigError::InvalidAddress)?,
            (None, None) => defaults.server_addr,
        };

        let max_players: usize =
            parse_or(&lookup, "MAX_PLAYERS", defaults.max_players)?;
        if max_players == 0 {
            return Err(ConfigError::Invalid("MAX_PLAYERS"));
        }

        let client_origins = lookup("CLIENT_ORIGIN")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        let world_seed = match lookup("WORLD_SEED") {
            Some(raw) => Some(
                raw.trim()
                    .parse()
                    .map_err(|_| ConfigError::Invalid("WORLD_SEED"))?,
            ),
            None => None,
        };

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_json: lookup("LOG_FORMAT").is_some_and(|f| f.trim().eq_ignore_ascii_case("json")),
            max_players,
            bot_count: parse_or(&lookup, "BOT_COUNT", defaults.bot_count)?,
            client_origins,
            world_seed,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid server address format")]
    InvalidAddress,

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let cfg = config(&[]).unwrap();
        assert_eq!(cfg.server_addr.port(), 8080);
        assert_eq!(cfg.log_level, "info");
        assert!(!cfg.log_json);
        assert_eq!(cfg.max_players, MAX_PLAYERS);
        assert_eq!(cfg.bot_count, BOT_COUNT);
        assert!(cfg.client_origins.is_empty());
        assert!(cfg.world_seed.is_none());
    }

    #[test]
    fn test_port_wins_over_server_addr() {
        let cfg = config(&[("PORT", "9000"), ("SERVER_ADDR", "127.0.0.1:7000")]).unwrap();
        assert_eq!(cfg.server_addr.port(), 9000);

        let cfg = config(&[("SERVER_ADDR", "127.0.0.1:7000")]).unwrap();
        assert_eq!(cfg.server_addr.to_string(), "127.0.0.1:7000");
    }

    #[test]
    fn test_origins_and_seed() {
        let cfg = config(&[
            ("CLIENT_ORIGIN", "http://a.test, ,http://b.test"),
            ("WORLD_SEED", "77"),
            ("BOT_COUNT", "0"),
            ("LOG_FORMAT", "JSON"),
        ])
        .unwrap();
        assert_eq!(cfg.client_origins, vec!["http://a.test", "http://b.test"]);
        assert_eq!(cfg.world_seed, Some(77));
        assert_eq!(cfg.bot_count, 0);
        assert!(cfg.log_json);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert_eq!(config(&[("PORT", "http")]).unwrap_err(), ConfigError::InvalidAddress);
        assert_eq!(
            config(&[("MAX_PLAYERS", "0")]).unwrap_err(),
            ConfigError::Invalid("MAX_PLAYERS")
        );
        assert_eq!(
            config(&[("BOT_COUNT", "-1")]).unwrap_err(),
            ConfigError::Invalid("BOT_COUNT")
        );
        assert_eq!(
            config(&[("WORLD_SEED", "x")]).unwrap_err(),
            ConfigError::Invalid("WORLD_SEED")
        );
    }
}
