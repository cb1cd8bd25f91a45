use std::time::{Duration, Instant};

use crate::config::BreakerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

/// Per-specialty circuit breaker. Consecutive kills of one specialty open
/// the circuit; spawns then fail fast until the cooldown elapses, after
/// which exactly one trial worker is admitted. The owning supervisor drives
/// it under the pool lock, so no interior synchronization is needed.
pub struct CircuitBreaker {
    config: BreakerConfig,
    state: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            state: BreakerState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }

    pub fn state(&self) -> BreakerState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// Ask to admit a spawn. `Err` carries how long until the next trial
    /// would be allowed.
    pub fn try_acquire(&mut self, now: Instant) -> Result<(), Duration> {
        match self.state {
            BreakerState::Closed => Ok(()),
            BreakerState::Open => {
                let elapsed = self
                    .opened_at
                    .map(|opened| now.duration_since(opened))
                    .unwrap_or_default();
                if elapsed >= self.config.cooldown {
                    self.state = BreakerState::HalfOpen;
                    self.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(self.config.cooldown - elapsed)
                }
            }
            BreakerState::HalfOpen => {
                if self.trial_in_flight {
                    Err(self.config.cooldown)
                } else {
                    self.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.trial_in_flight = false;
        self.opened_at = None;
        self.state = BreakerState::Closed;
    }

    pub fn record_failure(&mut self, now: Instant) {
        match self.state {
            BreakerState::Closed => {
                self.consecutive_failures += 1;
                if self.consecutive_failures >= self.config.failure_threshold {
                    self.open(now);
                }
            }
            // A failed trial, or a failure racing the open, restarts the
            // cooldown from scratch.
            BreakerState::HalfOpen | BreakerState::Open => {
                self.consecutive_failures += 1;
                self.open(now);
            }
        }
    }

    fn open(&mut self, now: Instant) {
        self.state = BreakerState::Open;
        self.opened_at = Some(now);
        self.trial_in_flight = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_breaker() -> CircuitBreaker {
        CircuitBreaker::new(BreakerConfig {
            failure_threshold: 3,
            cooldown: Duration::from_secs(60),
        })
    }

    #[test]
    fn test_opens_after_threshold_failures() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();

        breaker.record_failure(t0);
        breaker.record_failure(t0);
        assert_eq!(breaker.state(), BreakerState::Closed);

        breaker.record_failure(t0);
        assert_eq!(breaker.state(), BreakerState::Open);
    }

    #[test]
    fn test_open_breaker_fails_fast_with_remaining_cooldown() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(t0);
        }

        let remaining = breaker
            .try_acquire(t0 + Duration::from_secs(20))
            .unwrap_err();
        assert_eq!(remaining, Duration::from_secs(40));
    }

    #[test]
    fn test_half_open_admits_exactly_one_trial() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(t0);
        }

        let after_cooldown = t0 + Duration::from_secs(61);
        assert!(breaker.try_acquire(after_cooldown).is_ok());
        assert_eq!(breaker.state(), BreakerState::HalfOpen);

        // Second concurrent spawn is rejected while the trial runs.
        assert!(breaker.try_acquire(after_cooldown).is_err());
    }

    #[test]
    fn test_trial_success_closes() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(t0);
        }
        breaker.try_acquire(t0 + Duration::from_secs(61)).unwrap();

        breaker.record_success();
        assert_eq!(breaker.state(), BreakerState::Closed);
        assert_eq!(breaker.consecutive_failures(), 0);
        assert!(breaker.try_acquire(t0 + Duration::from_secs(62)).is_ok());
    }

    #[test]
    fn test_trial_failure_reopens_with_fresh_cooldown() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();
        for _ in 0..3 {
            breaker.record_failure(t0);
        }
        let trial_at = t0 + Duration::from_secs(61);
        breaker.try_acquire(trial_at).unwrap();

        breaker.record_failure(trial_at);
        assert_eq!(breaker.state(), BreakerState::Open);

        // Cooldown restarts from the trial failure, not the original open.
        let remaining = breaker
            .try_acquire(trial_at + Duration::from_secs(30))
            .unwrap_err();
        assert_eq!(remaining, Duration::from_secs(30));
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let mut breaker = create_test_breaker();
        let t0 = Instant::now();

        breaker.record_failure(t0);
        breaker.record_failure(t0);
        breaker.record_success();
        breaker.record_failure(t0);
        breaker.record_failure(t0);

        assert_eq!(breaker.state(), BreakerState::Closed);
    }
}
