//! Test doubles shared by the pipeline unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::{
    oracle::port::{Oracle, OracleRequest},
    Result,
};

type Responder = Box<dyn Fn(&OracleRequest, usize) -> Result<String> + Send + Sync>;

/// Scripted oracle: answers through a closure that sees the request and the
/// zero-based call index, and records concurrency while a call is pending.
pub(crate) struct FakeOracle {
    respond: Responder,
    delay: Duration,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl FakeOracle {
    pub(crate) fn new(
        respond: impl Fn(&OracleRequest, usize) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Oracle for FakeOracle {
    async fn complete(&self, req: OracleRequest) -> Result<String> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(req.prompt.clone());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let out = (self.respond)(&req, idx);
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        out
    }
}

/// Answer a sentiment batch prompt with one block per month it lists.
pub(crate) fn answer_every_month(prompt: &str, primary: &str, confidence: f64) -> String {
    prompt
        .lines()
        .filter_map(|l| l.strip_prefix("=== "))
        .filter_map(|l| l.strip_suffix(" ==="))
        .map(|month| {
            format!(
                "month: {month}\nprimary: {primary}\nsecondary: cozy\nconfidence: {confidence}\nvibe_summary: vibes in {month}\n"
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
