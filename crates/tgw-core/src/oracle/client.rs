use std::{sync::Arc, time::Duration};

use tokio::sync::Semaphore;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::{
    errors::Error,
    oracle::port::{Oracle, OracleRequest},
    Result,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClassifierConfig {
    /// Maximum oracle calls in flight across every analysis sharing the client.
    pub max_concurrency: usize,
    /// Total attempts per call, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub base_backoff: Duration,
    /// Wall-clock limit for a single oracle call.
    pub call_timeout: Duration,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            max_attempts: 3,
            base_backoff: Duration::from_secs(1),
            call_timeout: Duration::from_secs(60),
        }
    }
}

/// Bounded-concurrency, retrying wrapper around one oracle call.
///
/// A single instance is shared (behind `Arc`) by every analysis in the process, so the
/// semaphore caps outstanding calls globally rather than per chat. A permit is held only
/// while the oracle call runs; backoff sleeps do not occupy a slot.
pub struct ClassifierClient {
    oracle: Arc<dyn Oracle>,
    model: String,
    cfg: ClassifierConfig,
    limiter: Semaphore,
}

impl ClassifierClient {
    pub fn new(oracle: Arc<dyn Oracle>, model: impl Into<String>, cfg: ClassifierConfig) -> Self {
        Self {
            oracle,
            model: model.into(),
            limiter: Semaphore::new(cfg.max_concurrency.max(1)),
            cfg,
        }
    }

    pub fn config(&self) -> ClassifierConfig {
        self.cfg
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Run one classification, retrying throttled or transient failures with
    /// exponential backoff.
    ///
    /// Fails with the oracle's own error when it is not retryable, or with
    /// [`Error::RetriesExhausted`] once `max_attempts` calls have been throttled.
    pub async fn classify(&self, prompt: &str, temperature: f32, max_tokens: u32) -> Result<String> {
        let max_attempts = self.cfg.max_attempts.max(1);
        let mut backoff = self.cfg.base_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            let req = OracleRequest {
                model: self.model.clone(),
                prompt: prompt.to_string(),
                temperature,
                max_tokens,
            };

            match self.call_once(req).await {
                Ok(text) => {
                    if attempt > 1 {
                        debug!(attempt, "oracle call succeeded after retry");
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    if attempt >= max_attempts {
                        warn!(attempts = attempt, error = %e, "oracle retries exhausted");
                        return Err(Error::RetriesExhausted {
                            attempts: attempt,
                            last: e.to_string(),
                        });
                    }
                    warn!(attempt, error = %e, "oracle call throttled, retrying in {:?}", backoff);
                    sleep(backoff).await;
                    backoff = backoff.saturating_mul(2);
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn call_once(&self, req: OracleRequest) -> Result<String> {
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| Error::Oracle("classifier limiter closed".to_string()))?;

        match timeout(self.cfg.call_timeout, self.oracle.complete(req)).await {
            Ok(res) => res,
            Err(_) => Err(Error::Timeout(self.cfg.call_timeout)),
        }
    }
}
