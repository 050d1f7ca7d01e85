use std::collections::HashMap;
use thiserror::Error;

/// Runtime configuration, sourced from the environment.
///
/// Battle timing values are defaults for new battles; once a battle reaches
/// MATCHED they are frozen onto its row and later config changes do not
/// affect it.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub database_path: String,
    /// Interval between streamed ticks.
    pub tick_interval_ms: u64,
    /// Pre-start countdown length in seconds.
    pub countdown_seconds: u32,
    /// Minimum gap between accepted actions per participant.
    pub action_cooldown_ms: u64,
    /// Sliding one-second action budget per participant.
    pub max_actions_per_second: u32,
    /// Number of recent tick payloads kept for reconnection.
    pub tick_window_size: usize,
    /// TTL of the cached reconnection fallback, in seconds.
    pub reconnect_ttl_secs: u64,
    /// Default starting balance when the creator does not specify one.
    pub default_starting_balance: f64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnv(String),
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

fn parse_var<T: std::str::FromStr>(
    env_map: &HashMap<String, String>,
    key: &str,
    default: &str,
    expect: &str,
) -> Result<T, ConfigError> {
    env_map
        .get(key)
        .map(|s| s.as_str())
        .unwrap_or(default)
        .parse::<T>()
        .map_err(|_| ConfigError::InvalidValue(key.to_string(), expect.to_string()))
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(std::env::vars().collect())
    }

    pub fn from_env_map(env_map: HashMap<String, String>) -> Result<Self, ConfigError> {
        let port = parse_var(&env_map, "PORT", "8080", "must be a valid u16")?;

        let database_path = env_map
            .get("DATABASE_PATH")
            .cloned()
            .ok_or_else(|| ConfigError::MissingEnv("DATABASE_PATH".to_string()))?;

        let tick_interval_ms: u64 = parse_var(
            &env_map,
            "TICK_INTERVAL_MS",
            "5000",
            "must be a valid u64",
        )?;
        if tick_interval_ms == 0 {
            return Err(ConfigError::InvalidValue(
                "TICK_INTERVAL_MS".to_string(),
                "must be greater than zero".to_string(),
            ));
        }

        let countdown_seconds = parse_var(
            &env_map,
            "COUNTDOWN_SECONDS",
            "10",
            "must be a valid u32",
        )?;

        let action_cooldown_ms = parse_var(
            &env_map,
            "ACTION_COOLDOWN_MS",
            "1000",
            "must be a valid u64",
        )?;

        let max_actions_per_second = parse_var(
            &env_map,
            "MAX_ACTIONS_PER_SECOND",
            "3",
            "must be a valid u32",
        )?;

        let tick_window_size = parse_var(
            &env_map,
            "TICK_WINDOW_SIZE",
            "5",
            "must be a valid usize",
        )?;

        let reconnect_ttl_secs = parse_var(
            &env_map,
            "RECONNECT_TTL_SECS",
            "3600",
            "must be a valid u64",
        )?;

        let default_starting_balance: f64 = parse_var(
            &env_map,
            "DEFAULT_STARTING_BALANCE",
            "10000",
            "must be a valid number",
        )?;
        if !default_starting_balance.is_finite() || default_starting_balance <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "DEFAULT_STARTING_BALANCE".to_string(),
                "must be a positive number".to_string(),
            ));
        }

        Ok(Config {
            port,
            database_path,
            tick_interval_ms,
            countdown_seconds,
            action_cooldown_ms,
            max_actions_per_second,
            tick_window_size,
            reconnect_ttl_secs,
            default_starting_balance,
        })
    }
}
