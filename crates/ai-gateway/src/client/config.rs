use super::consts;
use rand::Rng;
use secrecy::SecretString;
use std::time::Duration;

/// Exponential backoff with jitter: `min(max_delay, base_delay * 2^attempt) + jitter`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: consts::MAX_RETRIES,
            base_delay: Duration::from_millis(consts::RETRY_BASE_DELAY_MS),
            max_delay: Duration::from_millis(consts::RETRY_MAX_DELAY_MS),
            max_jitter: Duration::from_millis(consts::RETRY_MAX_JITTER_MS),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt + 1`, without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(2u32.saturating_pow(attempt))
            .min(self.max_delay)
    }

    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter_ms = self.max_jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            0
        } else {
            rng.random_range(0..jitter_ms)
        };
        self.backoff(attempt) + Duration::from_millis(jitter)
    }
}

pub struct Config {
    base_url: String,
    model: String,
    auth_token: Option<SecretString>,
    retry: RetryPolicy,
}

pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.config.model = model.to_string();
        self
    }

    pub fn with_auth_token(mut self, token: Option<&str>) -> Self {
        self.config.auth_token = token.map(|t| SecretString::from(t.to_string()));
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    // Sets the default values.
    pub fn new() -> Self {
        Self {
            base_url: consts::BASE_URL.to_string(),
            model: consts::DEFAULT_MODEL.to_string(),
            // A missing token is allowed: the proxy decides whether it needs one.
            auth_token: std::env::var(consts::AUTH_TOKEN)
                .ok()
                .filter(|t| !t.is_empty())
                .map(SecretString::from),
            retry: RetryPolicy::default(),
        }
    }

    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn auth_token(&self) -> Option<&SecretString> {
        self.auth_token.as_ref()
    }

    pub fn retry(&self) -> &RetryPolicy {
        &self.retry
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}
