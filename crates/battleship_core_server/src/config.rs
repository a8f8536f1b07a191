use std::env;
use std::net::SocketAddr;
use std::time::Duration;

/// Process-wide configuration, loaded once at startup (§6.5) and never mutated after. A
/// missing or out-of-range required variable aborts startup rather than failing later
/// inside a handler.
#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    pub redis_url: String,
    pub database_url: String,
    pub join_match_player_limit: (u32, u32),
    pub team_count_range: (u32, u32),
    pub turn_timeout: Duration,
    pub max_missed_turns: u32,
    pub max_placement_attempts: u32,
    pub max_board_size: u8,
    pub nuclear_progress_threshold: u32,
    pub heartbeat_interval: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {value} ({reason})")]
    Invalid { name: &'static str, value: String, reason: String },
}

fn env_or(name: &'static str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn parse_u32_range(name: &'static str, value: &str, lo: u32, hi: u32) -> Result<u32, ConfigError> {
    let parsed: u32 = value
        .parse()
        .map_err(|_| ConfigError::Invalid { name, value: value.to_string(), reason: "not an integer".into() })?;
    if parsed < lo || parsed > hi {
        return Err(ConfigError::Invalid {
            name,
            value: value.to_string(),
            reason: format!("must be in {}..={}", lo, hi),
        });
    }
    Ok(parsed)
}

impl Config {
    /// Reads and validates every §6.5 variable. `dotenvy` is loaded by the caller before
    /// this runs, so a `.env` file and real environment variables are both honored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr_raw = env_or("BIND_ADDR", "0.0.0.0:8080");
        let bind_addr = bind_addr_raw
            .parse()
            .map_err(|_| ConfigError::Invalid { name: "BIND_ADDR", value: bind_addr_raw.clone(), reason: "not a socket address".into() })?;

        let redis_url = env::var("REDIS_URL").map_err(|_| ConfigError::Missing("REDIS_URL"))?;
        let database_url = env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let player_limit_max = parse_u32_range("JOIN_MATCH_PLAYER_LIMIT", &env_or("JOIN_MATCH_PLAYER_LIMIT", "6"), 2, 6)?;
        let team_count_max = parse_u32_range("TEAM_COUNT", &env_or("TEAM_COUNT", "5"), 2, 5)?;
        let turn_timeout_ms = parse_u32_range("TURN_TIMEOUT_MS", &env_or("TURN_TIMEOUT_MS", "30000"), 1000, 120_000)?;
        let max_missed_turns = parse_u32_range("MAX_MISSED_TURNS", &env_or("MAX_MISSED_TURNS", "3"), 1, 10)?;
        let max_placement_attempts = parse_u32_range("MAX_PLACEMENT_ATTEMPTS", &env_or("MAX_PLACEMENT_ATTEMPTS", "100"), 1, 10_000)?;
        let max_board_size = parse_u32_range("MAX_BOARD_SIZE", &env_or("MAX_BOARD_SIZE", "20"), 10, 20)? as u8;
        let nuclear_progress_threshold = parse_u32_range("NUCLEAR_PROGRESS_THRESHOLD", &env_or("NUCLEAR_PROGRESS_THRESHOLD", "6"), 1, 20)?;
        let heartbeat_ms = parse_u32_range("HEARTBEAT_INTERVAL_MS", &env_or("HEARTBEAT_INTERVAL_MS", "15000"), 1000, 120_000)?;

        Ok(Config {
            bind_addr,
            redis_url,
            database_url,
            join_match_player_limit: (2, player_limit_max),
            team_count_range: (2, team_count_max),
            turn_timeout: Duration::from_millis(turn_timeout_ms as u64),
            max_missed_turns,
            max_placement_attempts,
            max_board_size,
            nuclear_progress_threshold,
            heartbeat_interval: Duration::from_millis(heartbeat_ms as u64),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_turn_timeout() {
        let err = parse_u32_range("TURN_TIMEOUT_MS", "999999", 1000, 120_000).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "TURN_TIMEOUT_MS", .. }));
    }

    #[test]
    fn rejects_non_numeric_value() {
        let err = parse_u32_range("MAX_MISSED_TURNS", "three", 1, 10).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }
}
