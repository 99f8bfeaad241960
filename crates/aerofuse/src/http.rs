//! Blocking HTTP client with a global timeout and bounded exponential-backoff retry.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timeout and retry settings shared by the remote services.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Global per-request timeout in seconds.
    pub timeout_s: u64,
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on every further retry.
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout_s: 30,
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, retry: u32) -> Duration {
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(1u64 << retry.min(16)))
    }

    /// Run `attempt` until it succeeds or the retry budget is spent.
    pub fn run<T, E: std::fmt::Display>(
        &self,
        what: &str,
        mut attempt: impl FnMut() -> std::result::Result<T, E>,
    ) -> Result<T> {
        let mut retry = 0u32;
        loop {
            match attempt() {
                Ok(v) => return Ok(v),
                Err(e) if retry < self.max_retries => {
                    let delay = self.backoff(retry);
                    tracing::warn!(
                        service = what,
                        attempt = retry + 1,
                        delay_ms = delay.as_millis() as u64,
                        "request failed: {e}; retrying"
                    );
                    std::thread::sleep(delay);
                    retry += 1;
                }
                Err(e) => {
                    return Err(Error::Service(format!(
                        "{what}: {e} (after {} attempts)",
                        retry + 1
                    )))
                }
            }
        }
    }
}

/// Thin wrapper over a shared `ureq` agent.
#[derive(Debug, Clone)]
pub struct HttpClient {
    agent: ureq::Agent,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(retry: RetryPolicy) -> Self {
        let agent: ureq::Agent = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(retry.timeout_s)))
            .build()
            .into();
        Self { agent, retry }
    }

    /// GET with query parameters; the body is returned as text.
    pub fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        self.retry.run(url, || {
            let mut resp = self.request(url, query).call()?;
            resp.body_mut().read_to_string()
        })
    }

    /// GET with query parameters; the body is decoded as JSON.
    pub fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        self.retry.run(url, || {
            let mut resp = self.request(url, query).call()?;
            resp.body_mut().read_json::<T>()
        })
    }

    /// GET with query parameters; the raw body bytes are returned.
    pub fn get_bytes(&self, url: &str, query: &[(&str, String)], limit: u64) -> Result<Vec<u8>> {
        self.retry.run(url, || {
            let mut resp = self.request(url, query).call()?;
            resp.body_mut().with_config().limit(limit).read_to_vec()
        })
    }

    fn request(&self, url: &str, query: &[(&str, String)]) -> ureq::RequestBuilder<ureq::typestate::WithoutBody> {
        query
            .iter()
            .fold(self.agent.get(url), |req, (k, v)| req.query(*k, v))
    }
}
