use std::time::Duration;

use crate::Transport;

/// All process configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Oracle
    pub oracle_api_key: String,
    pub oracle_model: String,
    pub oracle_base_url: String,
    pub oracle_timeout: Duration,

    // Transport
    pub transport: Transport,
    pub port: u16,
    pub api_token: String,

    // File bridge
    pub bridge_input_path: String,
    pub bridge_output_path: String,
    pub bridge_poll_interval: Duration,

    // Database
    pub database_url: String,

    // Versioned strategy/guardrail ruleset
    pub ruleset_path: String,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let transport = match optional_env("TRANSPORT")
            .unwrap_or_else(|| "http".to_string())
            .to_lowercase()
            .as_str()
        {
            "http" => Transport::Http,
            "file" => Transport::File,
            other => panic!("ERROR: TRANSPORT must be 'http' or 'file', got: '{other}'"),
        };

        let oracle_api_key = optional_env("ORACLE_API_KEY")
            .or_else(|| optional_env("GEMINI_API_KEY"))
            .unwrap_or_else(|| {
                panic!("Required environment variable 'ORACLE_API_KEY' is not set. Check your .env file.")
            });

        Config {
            oracle_api_key,
            oracle_model: optional_env("ORACLE_MODEL")
                .unwrap_or_else(|| "gemini-2.5-flash".to_string()),
            oracle_base_url: optional_env("ORACLE_BASE_URL").unwrap_or_else(|| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            oracle_timeout: Duration::from_secs(
                optional_env("ORACLE_TIMEOUT_SECS")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(30),
            ),
            transport,
            port: optional_env("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
            api_token: required_env("API_TOKEN"),
            bridge_input_path: optional_env("BRIDGE_INPUT_PATH")
                .unwrap_or_else(|| "bridge/market.json".to_string()),
            bridge_output_path: optional_env("BRIDGE_OUTPUT_PATH")
                .unwrap_or_else(|| "bridge/command.json".to_string()),
            bridge_poll_interval: poll_interval(optional_env("BRIDGE_POLL_MS").as_deref()),
            database_url: optional_env("DATABASE_URL")
                .unwrap_or_else(|| "sqlite://aegis.db?mode=rwc".to_string()),
            ruleset_path: optional_env("RULESET_PATH")
                .unwrap_or_else(|| "config/ruleset.toml".to_string()),
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// `BRIDGE_POLL_MS`, defaulting to one second. Panics on zero.
fn poll_interval(raw: Option<&str>) -> Duration {
    let ms = raw.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(1000);
    if ms == 0 {
        panic!("ERROR: BRIDGE_POLL_MS must be greater than 0");
    }
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_defaults_to_one_second() {
        assert_eq!(poll_interval(None), Duration::from_secs(1));
        assert_eq!(poll_interval(Some("250")), Duration::from_millis(250));
    }

    #[test]
    #[should_panic(expected = "BRIDGE_POLL_MS must be greater than 0")]
    fn zero_poll_interval_is_rejected() {
        poll_interval(Some("0"));
    }
}
