use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::client::backoff::{Backoff, ExponentialBackoff, FixedBackoff};
use crate::client::consts::*;

/// What `send` does with a message while the connection is not open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPolicy {
    /// Queue up to `capacity` messages, evicting the oldest when full, and
    /// flush them in order once the connection opens.
    Buffer { capacity: usize },
    /// Fail the send with `NotConnected`.
    Reject,
}

impl Default for SendPolicy {
    fn default() -> Self {
        SendPolicy::Buffer {
            capacity: DEFAULT_SEND_BUFFER,
        }
    }
}

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable {0}: {1}")]
    InvalidValue(String, String),
}

pub struct Config {
    url: String,
    auth_token: Option<SecretString>,
    max_attempts: u32,
    backoff: Arc<dyn Backoff>,
    send_policy: SendPolicy,
    capacity: usize,
}

pub struct ConfigBuilder {
    config: Config,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Config> for ConfigBuilder {
    fn from(config: Config) -> Self {
        Self { config }
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_url(mut self, url: &str) -> Self {
        self.config.url = url.to_string();
        self
    }

    pub fn with_auth_token(mut self, token: &str) -> Self {
        self.config.auth_token = Some(SecretString::from(token.to_string()));
        self
    }

    /// Retries allowed after a failure before the connection is declared
    /// failed. 0 means the first failure is final.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.config.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: impl Backoff + 'static) -> Self {
        self.config.backoff = Arc::new(backoff);
        self
    }

    pub fn with_send_policy(mut self, send_policy: SendPolicy) -> Self {
        self.config.send_policy = send_policy;
        self
    }

    /// Capacity of the notice channel and of each subscription queue.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.config.capacity = capacity.max(1);
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Sets the default values.
    pub fn new() -> Self {
        Self {
            url: BASE_URL.to_string(),
            auth_token: None,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: Arc::new(FixedBackoff::default()),
            send_policy: SendPolicy::default(),
            capacity: DEFAULT_CAPACITY,
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    /// Loads configuration from environment variables, after reading a
    /// `.env` file if one exists. Every variable is optional:
    ///
    /// *   `GESTURE_BACKEND_URL`: websocket endpoint of the translation backend.
    /// *   `GESTURE_AUTH_TOKEN`: sent as a bearer token when set.
    /// *   `GESTURE_MAX_ATTEMPTS`: retries before giving up. Defaults to 3.
    /// *   `GESTURE_BACKOFF`: "fixed" (default) or "exponential".
    /// *   `GESTURE_RETRY_DELAY_MS`: fixed delay, or exponential base. Defaults to 2000.
    /// *   `GESTURE_RETRY_MAX_DELAY_MS`: exponential ceiling. Defaults to 30000.
    /// *   `GESTURE_SEND_BUFFER`: outbox size while disconnected; 0 rejects sends instead.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_vars(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = Config::builder();

        if let Some(url) = var(BACKEND_URL_VAR) {
            builder = builder.with_url(&url);
        }
        if let Some(token) = var(AUTH_TOKEN_VAR) {
            builder = builder.with_auth_token(&token);
        }
        if let Some(max_attempts) = parse_var::<u32, _>(&var, MAX_ATTEMPTS_VAR)? {
            builder = builder.with_max_attempts(max_attempts);
        }

        let delay = parse_var::<u64, _>(&var, RETRY_DELAY_MS_VAR)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_DELAY);
        let max_delay = parse_var::<u64, _>(&var, RETRY_MAX_DELAY_MS_VAR)?
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_MAX_DELAY);
        let strategy = var(BACKOFF_VAR).unwrap_or_else(|| "fixed".to_string());
        builder = match strategy.to_lowercase().as_str() {
            "fixed" => builder.with_backoff(FixedBackoff::new(delay)),
            "exponential" => {
                builder.with_backoff(ExponentialBackoff::new(delay, max_delay).with_jitter())
            }
            other => {
                return Err(ConfigError::InvalidValue(
                    BACKOFF_VAR.to_string(),
                    format!("'{}' is not one of fixed, exponential", other),
                ))
            }
        };

        if let Some(capacity) = parse_var::<usize, _>(&var, SEND_BUFFER_VAR)? {
            builder = builder.with_send_policy(match capacity {
                0 => SendPolicy::Reject,
                capacity => SendPolicy::Buffer { capacity },
            });
        }

        Ok(builder.build())
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn auth_token(&self) -> Option<&SecretString> {
        self.auth_token.as_ref()
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn backoff(&self) -> &Arc<dyn Backoff> {
        &self.backoff
    }

    pub fn send_policy(&self) -> SendPolicy {
        self.send_policy
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

fn parse_var<T, F>(var: &F, name: &str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_vars(vars(&[])).unwrap();
        assert_eq!(config.url(), BASE_URL);
        assert!(config.auth_token().is_none());
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.backoff().delay(0), Duration::from_secs(2));
        assert_eq!(config.backoff().delay(5), Duration::from_secs(2));
        assert_eq!(
            config.send_policy(),
            SendPolicy::Buffer {
                capacity: DEFAULT_SEND_BUFFER
            }
        );
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_vars(vars(&[
            (BACKEND_URL_VAR, "wss://translate.example.com/ws"),
            (MAX_ATTEMPTS_VAR, "5"),
            (BACKOFF_VAR, "Exponential"),
            (RETRY_DELAY_MS_VAR, "100"),
            (RETRY_MAX_DELAY_MS_VAR, "1000"),
            (SEND_BUFFER_VAR, "0"),
        ]))
        .unwrap();
        assert_eq!(config.url(), "wss://translate.example.com/ws");
        assert_eq!(config.max_attempts(), 5);
        assert!(config.backoff().delay(10) <= Duration::from_secs(1));
        assert!(config.backoff().delay(10) >= Duration::from_millis(500));
        assert_eq!(config.send_policy(), SendPolicy::Reject);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            Config::from_vars(vars(&[(MAX_ATTEMPTS_VAR, "three")])),
            Err(ConfigError::InvalidValue(name, _)) if name == MAX_ATTEMPTS_VAR
        ));
        assert!(matches!(
            Config::from_vars(vars(&[(BACKOFF_VAR, "linear")])),
            Err(ConfigError::InvalidValue(name, _)) if name == BACKOFF_VAR
        ));
    }
}
