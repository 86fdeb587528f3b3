use dotenvy::dotenv;
use std::sync::Once;

static INIT: Once = Once::new();

pub fn setup_test_env() {
    INIT.call_once(|| {
        dotenv().ok();
        // observers should react quickly under test
        if std::env::var("MAFIA_OBSERVER_DEBOUNCE_MS").is_err() {
            std::env::set_var("MAFIA_OBSERVER_DEBOUNCE_MS", "20");
        }
        if std::env::var("MAFIA_MAX_PLAYERS").is_err() {
            std::env::set_var("MAFIA_MAX_PLAYERS", "20");
        }
        let _ = env_logger::builder().is_test(true).try_init();
    });
}
