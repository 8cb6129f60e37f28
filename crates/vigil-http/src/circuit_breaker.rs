//! Per-host-key circuit breaker (spec §4.1). States: closed, open,
//! half-open. Opens after `failure_threshold` consecutive failures, stays
//! open for `reset_timeout`, then allows one probe (half-open); success
//! closes it, failure re-opens it.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vigil_core::model::CircuitState;

struct HostBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    /// True once a half-open probe has been dispatched and not yet resolved,
    /// so concurrent callers don't all attempt to be "the" probe.
    probe_in_flight: bool,
}

impl HostBreaker {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            probe_in_flight: false,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub reset_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout: Duration::from_secs(60),
        }
    }
}

/// What the caller is permitted to do before dispatching a request.
pub enum Admission {
    Allowed,
    AllowedAsProbe,
    Rejected,
}

pub struct CircuitBreakerRegistry {
    config: CircuitBreakerConfig,
    hosts: DashMap<String, Arc<Mutex<HostBreaker>>>,
}

impl CircuitBreakerRegistry {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            hosts: DashMap::new(),
        }
    }

    fn entry(&self, host_key: &str) -> Arc<Mutex<HostBreaker>> {
        self.hosts
            .entry(host_key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(HostBreaker::new())))
            .clone()
    }

    /// Checks whether a call to `host_key` may proceed right now.
    pub fn admit(&self, host_key: &str) -> Admission {
        let breaker = self.entry(host_key);
        let mut b = breaker.lock();
        match b.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::HalfOpen => {
                if b.probe_in_flight {
                    Admission::Rejected
                } else {
                    b.probe_in_flight = true;
                    Admission::AllowedAsProbe
                }
            }
            CircuitState::Open => {
                let elapsed = b.opened_at.map(|t| t.elapsed()).unwrap_or_default();
                if elapsed >= self.config.reset_timeout {
                    b.state = CircuitState::HalfOpen;
                    b.probe_in_flight = true;
                    Admission::AllowedAsProbe
                } else {
                    Admission::Rejected
                }
            }
        }
    }

    pub fn on_success(&self, host_key: &str) {
        let breaker = self.entry(host_key);
        let mut b = breaker.lock();
        b.consecutive_failures = 0;
        b.probe_in_flight = false;
        b.state = CircuitState::Closed;
        b.opened_at = None;
    }

    pub fn on_failure(&self, host_key: &str) {
        let breaker = self.entry(host_key);
        let mut b = breaker.lock();
        b.probe_in_flight = false;
        match b.state {
            CircuitState::HalfOpen => {
                b.state = CircuitState::Open;
                b.opened_at = Some(Instant::now());
                b.consecutive_failures = self.config.failure_threshold;
            }
            CircuitState::Closed => {
                b.consecutive_failures += 1;
                if b.consecutive_failures >= self.config.failure_threshold {
                    b.state = CircuitState::Open;
                    b.opened_at = Some(Instant::now());
                }
            }
            CircuitState::Open => {
                b.opened_at = Some(Instant::now());
            }
        }
    }

    pub fn state(&self, host_key: &str) -> CircuitState {
        self.entry(host_key).lock().state
    }

    /// Force-reset a host's breaker to closed (admin endpoint, spec §6.1).
    pub fn reset(&self, host_key: &str) {
        if let Some(entry) = self.hosts.get(host_key) {
            let mut b = entry.lock();
            b.state = CircuitState::Closed;
            b.consecutive_failures = 0;
            b.opened_at = None;
            b.probe_in_flight = false;
        }
    }

    pub fn snapshot(&self) -> Vec<(String, CircuitState)> {
        self.hosts
            .iter()
            .map(|kv| (kv.key().clone(), kv.value().lock().state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opens_after_failure_threshold_consecutive_failures() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 3,
            reset_timeout: Duration::from_secs(60),
        });
        for _ in 0..2 {
            assert!(matches!(reg.admit("host"), Admission::Allowed));
            reg.on_failure("host");
        }
        assert_eq!(reg.state("host"), CircuitState::Closed);
        assert!(matches!(reg.admit("host"), Admission::Allowed));
        reg.on_failure("host");
        assert_eq!(reg.state("host"), CircuitState::Open);
        assert!(matches!(reg.admit("host"), Admission::Rejected));
    }

    #[test]
    fn half_open_probe_then_close_on_success() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(10),
        });
        reg.admit("host");
        reg.on_failure("host");
        assert_eq!(reg.state("host"), CircuitState::Open);
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(reg.admit("host"), Admission::AllowedAsProbe));
        reg.on_success("host");
        assert_eq!(reg.state("host"), CircuitState::Closed);
    }

    #[test]
    fn half_open_probe_failure_reopens() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_millis(10),
        });
        reg.admit("host");
        reg.on_failure("host");
        std::thread::sleep(Duration::from_millis(20));
        assert!(matches!(reg.admit("host"), Admission::AllowedAsProbe));
        reg.on_failure("host");
        assert_eq!(reg.state("host"), CircuitState::Open);
    }

    #[test]
    fn reset_forces_closed() {
        let reg = CircuitBreakerRegistry::new(CircuitBreakerConfig {
            failure_threshold: 1,
            reset_timeout: Duration::from_secs(60),
        });
        reg.admit("host");
        reg.on_failure("host");
        assert_eq!(reg.state("host"), CircuitState::Open);
        reg.reset("host");
        assert_eq!(reg.state("host"), CircuitState::Closed);
    }
}
