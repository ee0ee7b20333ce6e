//! Provider wrapper with retries and circuit breaking.

use super::LlmProvider;
use crate::config::LlmConfig;
use crate::{Error, Result};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Resilience configuration for text-generation calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmResilienceConfig {
    /// Maximum number of retries for retryable failures.
    pub max_retries: u32,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: u64,
    /// Consecutive failures before opening the circuit.
    pub breaker_failure_threshold: u32,
    /// How long to keep the circuit open before half-open.
    pub breaker_reset_timeout_ms: u64,
    /// Maximum trial calls while half-open.
    pub breaker_half_open_max_calls: u32,
}

impl Default for LlmResilienceConfig {
    fn default() -> Self {
        Self {
            max_retries: 1,
            retry_backoff_ms: 250,
            breaker_failure_threshold: 3,
            breaker_reset_timeout_ms: 30_000,
            breaker_half_open_max_calls: 1,
        }
    }
}

impl LlmResilienceConfig {
    /// Loads resilience configuration from config settings.
    #[must_use]
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut settings = Self::default();
        if let Some(max_retries) = config.max_retries {
            settings.max_retries = max_retries;
        }
        if let Some(retry_backoff_ms) = config.retry_backoff_ms {
            settings.retry_backoff_ms = retry_backoff_ms;
        }
        if let Some(threshold) = config.breaker_failure_threshold {
            settings.breaker_failure_threshold = threshold.max(1);
        }
        if let Some(reset_ms) = config.breaker_reset_ms {
            settings.breaker_reset_timeout_ms = reset_ms;
        }
        settings
    }
}

/// Circuit breaker state machine.
#[derive(Debug)]
enum BreakerState {
    Closed { failures: u32 },
    Open { opened_at: Instant },
    HalfOpen { attempts: u32 },
}

#[derive(Debug)]
struct CircuitBreaker {
    state: BreakerState,
    failure_threshold: u32,
    reset_timeout: Duration,
    half_open_max_calls: u32,
}

impl CircuitBreaker {
    fn new(config: &LlmResilienceConfig) -> Self {
        Self {
            state: BreakerState::Closed { failures: 0 },
            failure_threshold: config.breaker_failure_threshold.max(1),
            reset_timeout: Duration::from_millis(config.breaker_reset_timeout_ms),
            half_open_max_calls: config.breaker_half_open_max_calls.max(1),
        }
    }

    fn allow(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { .. } => true,
            BreakerState::Open { opened_at } => {
                if opened_at.elapsed() >= self.reset_timeout {
                    self.state = BreakerState::HalfOpen { attempts: 1 };
                    true
                } else {
                    false
                }
            },
            BreakerState::HalfOpen { ref mut attempts } => {
                if *attempts >= self.half_open_max_calls {
                    false
                } else {
                    *attempts += 1;
                    true
                }
            },
        }
    }

    const fn on_success(&mut self) {
        self.state = BreakerState::Closed { failures: 0 };
    }

    /// Records a failure. Returns `true` if the circuit just opened.
    fn on_failure(&mut self) -> bool {
        match self.state {
            BreakerState::Closed { ref mut failures } => {
                *failures += 1;
                if *failures >= self.failure_threshold {
                    self.state = BreakerState::Open {
                        opened_at: Instant::now(),
                    };
                    return true;
                }
            },
            BreakerState::HalfOpen { .. } => {
                self.state = BreakerState::Open {
                    opened_at: Instant::now(),
                };
                return true;
            },
            BreakerState::Open { .. } => {},
        }
        false
    }

    const fn state_value(&self) -> u8 {
        match self.state {
            BreakerState::Closed { .. } => 0,
            BreakerState::Open { .. } => 1,
            BreakerState::HalfOpen { .. } => 2,
        }
    }
}

/// Provider wrapper with retry and circuit breaker.
///
/// Retries only errors flagged retryable ([`Error::is_retryable`]). Every
/// failed attempt counts towards the breaker; while it is open calls fail
/// immediately without reaching the inner provider.
pub struct ResilientLlmProvider<P: LlmProvider> {
    inner: P,
    config: LlmResilienceConfig,
    breaker: Mutex<CircuitBreaker>,
}

impl<P: LlmProvider> ResilientLlmProvider<P> {
    /// Creates a new resilient provider wrapper.
    #[must_use]
    pub fn new(inner: P, config: LlmResilienceConfig) -> Self {
        let breaker = CircuitBreaker::new(&config);
        Self {
            inner,
            config,
            breaker: Mutex::new(breaker),
        }
    }

    /// Returns the wrapped provider.
    pub const fn inner(&self) -> &P {
        &self.inner
    }

    fn breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn execute<F>(&self, operation: &'static str, mut call: F) -> Result<String>
    where
        F: FnMut() -> Result<String>,
    {
        let provider = self.inner.name();
        let span = tracing::info_span!(
            "llm.request",
            provider = provider,
            operation = operation,
            status = tracing::field::Empty
        );
        let _enter = span.enter();

        let mut breaker = self.breaker();
        if !breaker.allow() {
            let state = breaker.state_value();
            drop(breaker);
            record_breaker_state(provider, state);
            span.record("status", "circuit_open");
            metrics::counter!(
                "llm_requests_total",
                "provider" => provider,
                "operation" => operation,
                "status" => "circuit_open"
            )
            .increment(1);
            return Err(Error::Upstream {
                provider: provider.to_string(),
                cause: "circuit breaker open".to_string(),
                retryable: false,
            });
        }
        drop(breaker);

        let max_attempts = self.config.max_retries.saturating_add(1);
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let result = call();
            let elapsed = started.elapsed();

            match result {
                Ok(text) => {
                    record_request(provider, operation, elapsed, "success");
                    let mut breaker = self.breaker();
                    breaker.on_success();
                    let state = breaker.state_value();
                    drop(breaker);
                    record_breaker_state(provider, state);
                    span.record("status", "success");
                    return Ok(text);
                },
                Err(err) => {
                    record_request(provider, operation, elapsed, "error");
                    let mut breaker = self.breaker();
                    let tripped = breaker.on_failure();
                    let state = breaker.state_value();
                    drop(breaker);
                    record_breaker_state(provider, state);
                    if tripped {
                        metrics::counter!("llm_circuit_breaker_trips_total", "provider" => provider)
                            .increment(1);
                        tracing::warn!(provider, operation, "LLM circuit breaker opened");
                    }

                    // an open breaker stops the retry loop as well
                    if !err.is_retryable() || attempt >= max_attempts || tripped {
                        span.record("status", "error");
                        return Err(err);
                    }

                    metrics::counter!(
                        "llm_retries_total",
                        "provider" => provider,
                        "operation" => operation
                    )
                    .increment(1);
                    tracing::warn!(
                        provider,
                        operation,
                        attempt,
                        elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
                        error = %err,
                        "Retrying LLM call"
                    );
                    if self.config.retry_backoff_ms > 0 {
                        std::thread::sleep(Duration::from_millis(self.config.retry_backoff_ms));
                    }
                },
            }
        }
    }
}

fn record_request(provider: &'static str, operation: &'static str, elapsed: Duration, status: &'static str) {
    metrics::counter!(
        "llm_requests_total",
        "provider" => provider,
        "operation" => operation,
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "llm_request_duration_ms",
        "provider" => provider,
        "operation" => operation,
        "status" => status
    )
    .record(elapsed.as_secs_f64() * 1000.0);
}

fn record_breaker_state(provider: &'static str, state: u8) {
    metrics::gauge!("llm_circuit_breaker_state", "provider" => provider).set(f64::from(state));
}

impl<P: LlmProvider> LlmProvider for ResilientLlmProvider<P> {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    fn complete(&self, prompt: &str) -> Result<String> {
        self.execute("complete", || self.inner.complete(prompt))
    }

    fn complete_with_system(&self, system: &str, user: &str) -> Result<String> {
        self.execute("complete_with_system", || {
            self.inner.complete_with_system(system, user)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays scripted results and counts calls.
    struct Scripted {
        results: Mutex<VecDeque<Result<String>>>,
        calls: AtomicUsize,
    }

    impl Scripted {
        fn new(results: Vec<Result<String>>) -> Self {
            Self {
                results: Mutex::new(results.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl LlmProvider for Scripted {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok("default".to_string()))
        }
    }

    fn upstream(retryable: bool) -> Result<String> {
        Err(Error::Upstream {
            provider: "scripted".to_string(),
            cause: "boom".to_string(),
            retryable,
        })
    }

    fn config(max_retries: u32, threshold: u32) -> LlmResilienceConfig {
        LlmResilienceConfig {
            max_retries,
            retry_backoff_ms: 0,
            breaker_failure_threshold: threshold,
            breaker_reset_timeout_ms: 60_000,
            breaker_half_open_max_calls: 1,
        }
    }

    #[test]
    fn test_retries_retryable_error() {
        let provider = ResilientLlmProvider::new(
            Scripted::new(vec![upstream(true), Ok("ok".to_string())]),
            config(1, 5),
        );

        assert_eq!(provider.complete("q").unwrap(), "ok");
        assert_eq!(provider.inner().calls(), 2);
    }

    #[test]
    fn test_does_not_retry_permanent_error() {
        let provider = ResilientLlmProvider::new(
            Scripted::new(vec![upstream(false), Ok("ok".to_string())]),
            config(3, 5),
        );

        assert!(provider.complete("q").is_err());
        assert_eq!(provider.inner().calls(), 1);
    }

    #[test]
    fn test_gives_up_after_max_retries() {
        let provider = ResilientLlmProvider::new(
            Scripted::new(vec![upstream(true), upstream(true), upstream(true)]),
            config(1, 10),
        );

        assert!(provider.complete("q").unwrap_err().is_retryable());
        assert_eq!(provider.inner().calls(), 2);
    }

    #[test]
    fn test_breaker_opens_and_rejects() {
        let provider = ResilientLlmProvider::new(
            Scripted::new(vec![upstream(false), upstream(false)]),
            config(0, 2),
        );

        assert!(provider.complete("q").is_err());
        assert!(provider.complete("q").is_err());
        let rejected = provider.complete("q").unwrap_err();

        assert!(rejected.to_string().contains("circuit breaker open"));
        assert_eq!(provider.inner().calls(), 2);
    }

    #[test]
    fn test_breaker_half_opens_after_reset() {
        let mut settings = config(0, 1);
        settings.breaker_reset_timeout_ms = 0;
        let provider = ResilientLlmProvider::new(
            Scripted::new(vec![upstream(false), Ok("recovered".to_string())]),
            settings,
        );

        assert!(provider.complete("q").is_err());
        assert_eq!(provider.complete("q").unwrap(), "recovered");
    }
}
