//! Retry state machine
//!
//! ```text
//! Pending → Executing → Success
//!              │
//!              ├→ RetryableFailure → (sleep) → Executing
//!              └→ TerminalFailure
//! ```
//!
//! The budget is `max_retries` retries after the first attempt. The delay
//! before retry `n` is `min(max_delay, base × 2^(n-1))` with equal jitter:
//! half of it is fixed and half is random. A server `Retry-After` raises
//! the delay, still capped at `max_delay`.

use crate::client::error::{FailureKind, TransportError};
use async_trait::async_trait;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

/// Retry budget and backoff bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500), Duration::from_secs(30))
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay: max_delay.max(base_delay),
        }
    }

    /// Upper bound of the delay before retry `retry` (1-based)
    pub fn backoff_ceiling(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(31);
        self.base_delay
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Jittered delay before retry `retry`, honoring a server hint
    pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> Duration {
        let ceiling = self.backoff_ceiling(retry);
        let fixed = ceiling / 2;
        let spread = (ceiling - fixed).as_millis() as u64;
        let jitter = if spread == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=spread)
        };
        let delay = fixed + Duration::from_millis(jitter);

        match retry_after {
            Some(hint) => delay.max(hint).min(self.max_delay),
            None => delay,
        }
    }
}

/// Where an operation is in its retry lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Pending,
    Executing { attempt: u32 },
    RetryableFailure { attempt: u32, delay: Duration },
    Success { attempts: u32 },
    TerminalFailure { attempts: u32, kind: FailureKind },
}

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Retry(Duration),
    Stop(FailureKind),
}

/// Tracks one operation's attempts against a policy
#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: RetryPolicy,
    state: RetryState,
    attempts: u32,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Pending,
            attempts: 0,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Enter `Executing`; returns the 1-based attempt number
    pub fn begin_attempt(&mut self) -> u32 {
        self.attempts += 1;
        self.state = RetryState::Executing {
            attempt: self.attempts,
        };
        self.attempts
    }

    pub fn succeed(&mut self) {
        self.state = RetryState::Success {
            attempts: self.attempts,
        };
    }

    /// Classify a failure and move to the next state
    pub fn fail(&mut self, error: &TransportError) -> Decision {
        let kind = if !error.is_retryable() {
            Some(FailureKind::Terminal)
        } else if self.attempts > self.policy.max_retries {
            Some(FailureKind::BudgetExhausted)
        } else {
            None
        };

        match kind {
            Some(kind) => {
                self.state = RetryState::TerminalFailure {
                    attempts: self.attempts,
                    kind,
                };
                Decision::Stop(kind)
            }
            None => {
                let delay = self.policy.delay_for(self.attempts, error.retry_after());
                self.state = RetryState::RetryableFailure {
                    attempt: self.attempts,
                    delay,
                };
                Decision::Retry(delay)
            }
        }
    }
}

/// Suspends between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// An operation that stopped without succeeding
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    pub error: TransportError,
    pub attempts: u32,
    pub kind: FailureKind,
}

/// Drive `operation` through the retry machine
///
/// Returns the value and the number of attempts it took.
pub async fn run_with_retry<T, F, Fut>(
    policy: RetryPolicy,
    sleeper: &dyn Sleeper,
    op_id: Uuid,
    mut operation: F,
) -> Result<(T, u32), RetryFailure>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, TransportError>>,
{
    let mut machine = RetryMachine::new(policy);

    loop {
        let attempt = machine.begin_attempt();
        match operation(attempt).await {
            Ok(value) => {
                machine.succeed();
                return Ok((value, machine.attempts()));
            }
            Err(error) => match machine.fail(&error) {
                Decision::Retry(delay) => {
                    tracing::warn!(
                        op_id = %op_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %error,
                        "Transient failure, retrying"
                    );
                    sleeper.sleep(delay).await;
                }
                Decision::Stop(kind) => {
                    tracing::error!(
                        op_id = %op_id,
                        attempts = machine.attempts(),
                        kind = %kind,
                        error = %error,
                        "Giving up"
                    );
                    return Err(RetryFailure {
                        error,
                        attempts: machine.attempts(),
                        kind,
                    });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::testing::RecordingSleeper;

    fn policy(max_retries: u32) -> RetryPolicy {
        RetryPolicy::new(max_retries, Duration::from_millis(100), Duration::from_secs(1))
    }

    #[test]
    fn test_backoff_ceiling_doubles_and_caps() {
        let p = policy(10);
        assert_eq!(p.backoff_ceiling(1), Duration::from_millis(100));
        assert_eq!(p.backoff_ceiling(2), Duration::from_millis(200));
        assert_eq!(p.backoff_ceiling(4), Duration::from_millis(800));
        assert_eq!(p.backoff_ceiling(5), Duration::from_secs(1));
        assert_eq!(p.backoff_ceiling(60), Duration::from_secs(1));
    }

    #[test]
    fn test_equal_jitter_bounds() {
        let p = policy(10);
        for retry in 1..=6 {
            let ceiling = p.backoff_ceiling(retry);
            for _ in 0..50 {
                let d = p.delay_for(retry, None);
                assert!(d >= ceiling / 2 && d <= ceiling, "{d:?} outside {ceiling:?}");
            }
        }
    }

    #[test]
    fn test_retry_after_raises_but_stays_capped() {
        let p = policy(10);
        assert_eq!(
            p.delay_for(1, Some(Duration::from_millis(700))),
            Duration::from_millis(700)
        );
        assert_eq!(p.delay_for(1, Some(Duration::from_secs(60))), Duration::from_secs(1));
    }

    #[test]
    fn test_machine_transitions() {
        let mut m = RetryMachine::new(policy(1));
        assert_eq!(m.state(), RetryState::Pending);

        assert_eq!(m.begin_attempt(), 1);
        assert_eq!(m.state(), RetryState::Executing { attempt: 1 });
        assert!(matches!(m.fail(&TransportError::Timeout), Decision::Retry(_)));
        assert!(matches!(m.state(), RetryState::RetryableFailure { attempt: 1, .. }));

        assert_eq!(m.begin_attempt(), 2);
        assert_eq!(
            m.fail(&TransportError::Timeout),
            Decision::Stop(FailureKind::BudgetExhausted)
        );
        assert_eq!(
            m.state(),
            RetryState::TerminalFailure {
                attempts: 2,
                kind: FailureKind::BudgetExhausted
            }
        );

        let mut m = RetryMachine::new(policy(5));
        m.begin_attempt();
        assert_eq!(m.fail(&TransportError::Closed), Decision::Stop(FailureKind::Terminal));
    }

    #[tokio::test]
    async fn test_attempts_never_exceed_budget() {
        for max_retries in 0..4 {
            let sleeper = RecordingSleeper::default();
            let mut calls = 0u32;
            let result: Result<((), u32), _> =
                run_with_retry(policy(max_retries), &sleeper, Uuid::new_v4(), |_| {
                    calls += 1;
                    async { Err(TransportError::Server { status: 503, message: "busy".into() }) }
                })
                .await;

            let failure = result.unwrap_err();
            assert_eq!(failure.kind, FailureKind::BudgetExhausted);
            assert_eq!(failure.attempts, max_retries + 1);
            assert_eq!(calls, max_retries + 1);
            assert_eq!(sleeper.delays.lock().unwrap().len(), max_retries as usize);
        }
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let sleeper = RecordingSleeper::default();
        let result = run_with_retry(policy(3), &sleeper, Uuid::new_v4(), |attempt| async move {
            if attempt < 3 {
                Err(TransportError::Connect("refused".into()))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result, Ok(("done", 3)));
        let delays = sleeper.delays.lock().unwrap();
        assert_eq!(delays.len(), 2);
        assert!(delays[0] >= Duration::from_millis(50) && delays[0] <= Duration::from_millis(100));
        assert!(delays[1] >= Duration::from_millis(100) && delays[1] <= Duration::from_millis(200));
    }
}
