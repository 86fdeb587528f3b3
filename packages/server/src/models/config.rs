use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub verbose_logging: bool,
    // delay before an observer re-reads the room after a change notification
    pub observer_debounce_ms: u64,
    pub max_players: usize,
    // retries when a freshly generated room code is already taken
    pub code_attempts: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        let debug_mode = cfg!(debug_assertions) || env::var("DEBUG_MODE").is_ok();

        Self {
            verbose_logging: debug_mode,
            observer_debounce_ms: 200,
            max_players: 20,
            code_attempts: 16,
        }
    }
}

impl GameConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let verbose_logging = env::var("MAFIA_VERBOSE_LOGGING")
            .map(|v| v == "true")
            .unwrap_or(defaults.verbose_logging);
        let observer_debounce_ms = env::var("MAFIA_OBSERVER_DEBOUNCE_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(defaults.observer_debounce_ms);
        let max_players = env::var("MAFIA_MAX_PLAYERS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n >= crate::models::rule::MIN_PLAYERS)
            .unwrap_or(defaults.max_players);
        let code_attempts = env::var("MAFIA_CODE_ATTEMPTS")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.code_attempts);

        Self {
            verbose_logging,
            observer_debounce_ms,
            max_players,
            code_attempts,
        }
    }

    pub fn observer_debounce(&self) -> Duration {
        Duration::from_millis(self.observer_debounce_ms)
    }
}
