//! Per-key circuit breaker guarding the Remote Model Client.
//!
//! Three states: closed (normal), open (reject immediately), half-open
//! (let one probe through to decide whether to close again). Unlike
//! the retry policy, the breaker's state is shared across calls for
//! the same key so a model that is down stays rejected instead of
//! being retried into the ground by every concurrent caller.

use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use dashmap::DashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => State::Open,
            2 => State::HalfOpen,
            _ => State::Closed,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,
    /// How long the circuit stays open before allowing a half-open probe.
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self { failure_threshold: 5, reset_timeout: Duration::from_secs(30) }
    }
}

struct Breaker {
    state: AtomicU8,
    failure_count: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
}

impl Breaker {
    fn new() -> Self {
        Self { state: AtomicU8::new(0), failure_count: AtomicU32::new(0), opened_at: Mutex::new(None) }
    }
}

/// A registry of independent breakers keyed by, e.g., model id.
pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    breakers: DashMap<String, Breaker>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self { config, breakers: DashMap::new() }
    }

    /// Returns `true` if a call for `key` is allowed to proceed. An
    /// open circuit past its reset timeout transitions to half-open
    /// and allows exactly the call that observes the transition.
    pub fn allow(&self, key: &str) -> bool {
        let entry = self.breakers.entry(key.to_string()).or_insert_with(Breaker::new);
        match State::from_u8(entry.state.load(Ordering::SeqCst)) {
            State::Closed | State::HalfOpen => true,
            State::Open => {
                let elapsed = entry.opened_at.lock().unwrap().map(|t| t.elapsed());
                match elapsed {
                    Some(e) if e >= self.config.reset_timeout => {
                        entry.state.store(2, Ordering::SeqCst);
                        true
                    }
                    _ => false,
                }
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        if let Some(entry) = self.breakers.get(key) {
            entry.failure_count.store(0, Ordering::SeqCst);
            entry.state.store(0, Ordering::SeqCst);
        }
    }

    pub fn record_failure(&self, key: &str) {
        let entry = self.breakers.entry(key.to_string()).or_insert_with(Breaker::new);
        let failures = entry.failure_count.fetch_add(1, Ordering::SeqCst) + 1;
        if State::from_u8(entry.state.load(Ordering::SeqCst)) == State::HalfOpen || failures >= self.config.failure_threshold {
            entry.state.store(1, Ordering::SeqCst);
            *entry.opened_at.lock().unwrap() = Some(Instant::now());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry(threshold: u32, reset: Duration) -> CircuitBreakerRegistry {
        CircuitBreakerRegistry::new(CircuitBreakerConfig { failure_threshold: threshold, reset_timeout: reset })
    }

    #[test]
    fn allows_calls_while_closed() {
        let reg = registry(3, Duration::from_secs(1));
        assert!(reg.allow("m1"));
        reg.record_failure("m1");
        assert!(reg.allow("m1"));
    }

    #[test]
    fn opens_after_threshold_failures() {
        let reg = registry(2, Duration::from_secs(60));
        reg.record_failure("m1");
        reg.record_failure("m1");
        assert!(!reg.allow("m1"));
    }

    #[test]
    fn success_resets_failure_count() {
        let reg = registry(2, Duration::from_secs(60));
        reg.record_failure("m1");
        reg.record_success("m1");
        reg.record_failure("m1");
        assert!(reg.allow("m1"));
    }

    #[test]
    fn independent_keys_do_not_interfere() {
        let reg = registry(1, Duration::from_secs(60));
        reg.record_failure("m1");
        assert!(!reg.allow("m1"));
        assert!(reg.allow("m2"));
    }

    #[test]
    fn half_open_failure_reopens_immediately() {
        let reg = registry(1, Duration::from_millis(20));
        reg.record_failure("m1");
        assert!(!reg.allow("m1"));
        std::thread::sleep(Duration::from_millis(30));
        assert!(reg.allow("m1"));
        reg.record_failure("m1");
        assert!(!reg.allow("m1"));
    }
}
