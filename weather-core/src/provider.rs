use crate::{
    Config,
    error::WeatherError,
    model::{Coordinates, WeatherQuery, WeatherSnapshot},
    provider::weatherapi::WeatherApiProvider,
};
use async_trait::async_trait;
use std::{fmt::Debug, future::Future, sync::Arc, time::Duration};

pub mod weatherapi;

/// Remote source of weather snapshots. Every call is independent.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_by_coordinates(
        &self,
        coordinates: Coordinates,
    ) -> Result<WeatherSnapshot, WeatherError>;

    async fn fetch_by_name(&self, name: &str) -> Result<WeatherSnapshot, WeatherError>;

    async fn fetch(&self, query: &WeatherQuery) -> Result<WeatherSnapshot, WeatherError> {
        match query {
            WeatherQuery::Coordinates(c) => self.fetch_by_coordinates(*c).await,
            WeatherQuery::Name(name) => self.fetch_by_name(name).await,
        }
    }
}

pub const DEFAULT_RETRY_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY_MS: u64 = 1000;

/// Fixed-delay retry: `attempts` tries in total, `delay` between them.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RETRY_ATTEMPTS,
            delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    pub fn is_retryable(error: &WeatherError) -> bool {
        match error {
            WeatherError::Transport(_) => true,
            WeatherError::Status { status, .. } => *status >= 500 || *status == 429,
            WeatherError::MissingApiKey | WeatherError::Decode(_) => false,
        }
    }

    pub async fn run<T, F, Fut>(&self, mut operation: F) -> Result<T, WeatherError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, WeatherError>>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 1 {
                        tracing::info!("Weather request succeeded on attempt {attempt}");
                    }
                    return Ok(value);
                }
                Err(err) if attempt < attempts && Self::is_retryable(&err) => {
                    tracing::warn!(
                        "Weather request failed (attempt {attempt} of {attempts}), retrying in {:?}: {err}",
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

/// Construct the WeatherAPI.com provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherProvider>> {
    let api_key = config.api_key.as_deref().ok_or_else(|| {
        anyhow::anyhow!(
            "No API key configured.\n\
             Hint: run `weather configure` and enter your WeatherAPI.com key."
        )
    })?;

    Ok(Arc::new(WeatherApiProvider::new(
        api_key.to_owned(),
        config.base_url.clone(),
        config.forecast_days,
        config.retry_policy(),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn provider_from_config_errors_when_missing_api_key() {
        let cfg = Config::default();
        let err = provider_from_config(&cfg).unwrap_err();
        assert!(err.to_string().contains("No API key configured"));
    }

    #[test]
    fn provider_from_config_works_when_configured() {
        let mut cfg = Config::default();
        cfg.api_key = Some("KEY".into());
        assert!(provider_from_config(&cfg).is_ok());
    }

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(RetryPolicy::is_retryable(&WeatherError::Transport("reset".into())));
        assert!(RetryPolicy::is_retryable(&WeatherError::Status { status: 502, body: String::new() }));
        assert!(RetryPolicy::is_retryable(&WeatherError::Status { status: 429, body: String::new() }));
        assert!(!RetryPolicy::is_retryable(&WeatherError::Status { status: 400, body: String::new() }));
        assert!(!RetryPolicy::is_retryable(&WeatherError::Decode("eof".into())));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_success() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_secs(1));

        let result = policy
            .run(move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 { Err(WeatherError::Transport("timeout".into())) } else { Ok(n) }
            })
            .await;

        assert_eq!(result, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(2, Duration::from_secs(1));

        let result: Result<(), _> = policy
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WeatherError::Transport("refused".into()))
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn does_not_retry_client_errors() {
        let calls = &AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO);

        let result: Result<(), _> = policy
            .run(move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(WeatherError::Status { status: 401, body: "bad key".into() })
            })
            .await;

        assert!(matches!(result, Err(WeatherError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
