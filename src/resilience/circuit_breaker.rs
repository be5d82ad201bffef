use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::core::config::ResilienceConfig;
use crate::core::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Circuit {
    state: CircuitState,
    consecutive_failures: u32,
    opened_at: Option<Instant>,
    trial_in_flight: bool,
}

impl Circuit {
    fn new() -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            trial_in_flight: false,
        }
    }
}

/// Keyed circuit breakers.
///
/// * `Closed`: calls pass; failures count up, a success resets the count.
/// * `Open`: entered at `threshold` consecutive failures; calls fail fast
///   with [`GenerationError::CircuitOpen`] until `cooldown` has elapsed.
/// * `HalfOpen`: the first call after cooldown is let through as a trial
///   call and every other call is rejected until it finishes. Success closes
///   the circuit; failure reopens it with a fresh `opened_at`.
///
/// Only keys with recent failures are tracked; a success forgets the key.
#[derive(Debug)]
pub struct CircuitBreaker {
    threshold: u32,
    cooldown: Duration,
    circuits: Mutex<HashMap<String, Circuit>>,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            threshold: threshold.max(1),
            cooldown,
            circuits: Mutex::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ResilienceConfig) -> Self {
        Self::new(
            config.failure_threshold,
            Duration::from_millis(config.cooldown_ms),
        )
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Circuit>> {
        self.circuits.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask permission to call through `key`.
    pub fn try_acquire(&self, key: &str) -> Result<(), GenerationError> {
        let mut circuits = self.lock();
        let Some(circuit) = circuits.get_mut(key) else {
            return Ok(());
        };
        let rejected = || GenerationError::CircuitOpen {
            key: key.to_string(),
        };

        match circuit.state {
            CircuitState::Closed => Ok(()),
            CircuitState::Open => {
                let cooled = circuit
                    .opened_at
                    .map(|at| Instant::now() >= at + self.cooldown)
                    .unwrap_or(true);
                if cooled {
                    info!("circuit '{}' half-open, letting one trial call through", key);
                    circuit.state = CircuitState::HalfOpen;
                    circuit.trial_in_flight = true;
                    Ok(())
                } else {
                    Err(rejected())
                }
            }
            CircuitState::HalfOpen => {
                if circuit.trial_in_flight {
                    Err(rejected())
                } else {
                    circuit.trial_in_flight = true;
                    Ok(())
                }
            }
        }
    }

    pub fn record_success(&self, key: &str) {
        let forgotten = self.lock().remove(key);
        if forgotten.is_some_and(|c| c.state != CircuitState::Closed) {
            info!("circuit '{}' closed", key);
        }
    }

    pub fn record_failure(&self, key: &str) {
        let mut circuits = self.lock();
        let circuit = circuits.entry(key.to_string()).or_insert_with(Circuit::new);
        circuit.consecutive_failures = circuit.consecutive_failures.saturating_add(1);
        circuit.trial_in_flight = false;

        let reopen = match circuit.state {
            CircuitState::HalfOpen => true,
            CircuitState::Closed => circuit.consecutive_failures >= self.threshold,
            CircuitState::Open => false,
        };
        if reopen {
            warn!(
                "circuit '{}' opened after {} consecutive failures",
                key, circuit.consecutive_failures
            );
            circuit.state = CircuitState::Open;
            circuit.opened_at = Some(Instant::now());
        }
    }

    /// A trial call that never reported back (its future was dropped) frees the
    /// half-open slot for the next caller.
    fn abandon(&self, key: &str) {
        if let Some(circuit) = self.lock().get_mut(key) {
            circuit.trial_in_flight = false;
        }
    }

    pub fn state(&self, key: &str) -> CircuitState {
        self.lock()
            .get(key)
            .map(|c| c.state)
            .unwrap_or(CircuitState::Closed)
    }

    pub fn consecutive_failures(&self, key: &str) -> u32 {
        self.lock()
            .get(key)
            .map(|c| c.consecutive_failures)
            .unwrap_or(0)
    }

    /// Number of keys currently holding failure state.
    pub fn tracked_keys(&self) -> usize {
        self.lock().len()
    }

    /// Run `fut` under the breaker for `key`, recording its outcome.
    pub async fn call<Fut, T>(&self, key: &str, fut: Fut) -> Result<T, GenerationError>
    where
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        self.try_acquire(key)?;
        let mut guard = CallGuard {
            breaker: self,
            key,
            armed: true,
        };
        let result = fut.await;
        guard.armed = false;

        match &result {
            Ok(_) => self.record_success(key),
            Err(_) => self.record_failure(key),
        }
        result
    }
}

struct CallGuard<'a> {
    breaker: &'a CircuitBreaker,
    key: &'a str,
    armed: bool,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breaker.abandon(self.key);
        }
    }
}
