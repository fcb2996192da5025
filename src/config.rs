//! Application-level configuration loading, including game tuning knobs.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "SECOND_GUESS_BACK_CONFIG_PATH";

const DEFAULT_ROUNDS: u32 = 10;
const MIN_PLAYERS: usize = 2;
const POINTS_DEFAULT: i64 = 10;
const POINTS_MIN: i64 = 5;
const POINTS_MAX: i64 = 20;
const SESSION_TTL_SECS: u64 = 2 * 60 * 60;
const CONNECTION_TTL_SECS: u64 = 2 * 60 * 60;
const PUSH_CONCURRENCY: usize = 16;
const PUSH_TIMEOUT_MS: u64 = 2_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    /// Rounds to play when the room configuration does not set a count.
    pub default_rounds: u32,
    /// Minimum seated players required to start a match.
    pub min_players: usize,
    /// Points granted per correct guess when the room does not configure any.
    pub points_default: i64,
    /// Lower clamp for the configurable points-per-guess.
    pub points_min: i64,
    /// Upper clamp for the configurable points-per-guess.
    pub points_max: i64,
    /// Absolute lifetime of a session document.
    pub session_ttl: Duration,
    /// Absolute lifetime of a registered connection.
    pub connection_ttl: Duration,
    /// How many fan-out pushes run concurrently.
    pub push_concurrency: usize,
    /// Upper bound on a single fan-out push.
    pub push_timeout: Duration,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to the
    /// baked-in defaults.
    pub fn load() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let config: Self = raw.into();
                    info!(path = %path.display(), "loaded configuration from file");
                    config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Resolve the points awarded per correct guess for a room, clamping the
    /// configured value into the allowed band.
    pub fn points_per_guess(&self, requested: Option<i64>) -> i64 {
        requested
            .unwrap_or(self.points_default)
            .clamp(self.points_min, self.points_max)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_rounds: DEFAULT_ROUNDS,
            min_players: MIN_PLAYERS,
            points_default: POINTS_DEFAULT,
            points_min: POINTS_MIN,
            points_max: POINTS_MAX,
            session_ttl: Duration::from_secs(SESSION_TTL_SECS),
            connection_ttl: Duration::from_secs(CONNECTION_TTL_SECS),
            push_concurrency: PUSH_CONCURRENCY,
            push_timeout: Duration::from_millis(PUSH_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    default_rounds: Option<u32>,
    min_players: Option<usize>,
    points_default: Option<i64>,
    points_min: Option<i64>,
    points_max: Option<i64>,
    session_ttl_secs: Option<u64>,
    connection_ttl_secs: Option<u64>,
    push_concurrency: Option<usize>,
    push_timeout_ms: Option<u64>,
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        let defaults = AppConfig::default();
        Self {
            default_rounds: raw.default_rounds.unwrap_or(defaults.default_rounds),
            min_players: raw.min_players.unwrap_or(defaults.min_players),
            points_default: raw.points_default.unwrap_or(defaults.points_default),
            points_min: raw.points_min.unwrap_or(defaults.points_min),
            points_max: raw.points_max.unwrap_or(defaults.points_max),
            session_ttl: raw
                .session_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.session_ttl),
            connection_ttl: raw
                .connection_ttl_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.connection_ttl),
            push_concurrency: raw.push_concurrency.unwrap_or(defaults.push_concurrency),
            push_timeout: raw
                .push_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.push_timeout),
        }
    }
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points_are_clamped_into_the_configured_band() {
        let config = AppConfig::default();
        assert_eq!(config.points_per_guess(None), 10);
        assert_eq!(config.points_per_guess(Some(15)), 15);
        assert_eq!(config.points_per_guess(Some(1)), 5);
        assert_eq!(config.points_per_guess(Some(100)), 20);
    }
}
