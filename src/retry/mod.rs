//! Bounded reachability polling.
//!
//! [`RetryPolicy`] is a value object: it stores the ceiling, interval and
//! backoff, and hands out a fresh attempt counter and start instant on
//! every [`RetryPolicy::wait`] call. Time is read through [`Clock`] and
//! slept through [`Sleeper`] so tests can drive the loop without real
//! delays.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::debug;


/// Default ceiling for a reachability wait.
pub const DEFAULT_CEILING: Duration = Duration::from_secs(120);
/// Default pause between reachability attempts.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Future returned by [`Sleeper::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Source of monotonic time.
pub trait Clock: Send + Sync {
    /// Current instant.
    fn now(&self) -> Instant;
}

/// Suspends the current task.
pub trait Sleeper: Send + Sync {
    /// Sleeps for `duration`.
    fn sleep(&self, duration: Duration) -> SleepFuture<'_>;
}

/// [`Clock`] backed by [`Instant::now`].
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// [`Sleeper`] backed by [`tokio::time::sleep`].
#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> SleepFuture<'_> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// How the pause between attempts evolves.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum Backoff {
    /// Always pause for the base interval.
    #[default]
    Fixed,
    /// Multiply the pause by `factor` after every failed attempt, never
    /// exceeding `max_interval`.
    Exponential {
        /// Growth factor applied per attempt. Values below 1 act as 1.
        factor: u32,
        /// Upper bound for a single pause.
        max_interval: Duration,
    },
}

/// Terminal state of a reachability wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitOutcome {
    /// The probe reported the target reachable.
    Success {
        /// Probe invocations, including the successful one.
        attempts: u32,
    },
    /// The ceiling elapsed before the probe succeeded.
    TimedOut {
        /// Probe invocations made.
        attempts: u32,
        /// Time spent waiting.
        elapsed: Duration,
    },
    /// The cancellation token fired before the probe succeeded.
    Cancelled {
        /// Probe invocations that completed.
        attempts: u32,
    },
}

impl WaitOutcome {
    /// Number of completed probe invocations.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        match *self {
            Self::Success { attempts }
            | Self::TimedOut { attempts, .. }
            | Self::Cancelled { attempts } => attempts,
        }
    }
}

/// Per-call polling state. Never outlives a single wait.
struct PollState {
    attempts: u32,
    started: Instant,
}

/// Bounded polling configuration with injectable time.
#[derive(Clone)]
pub struct RetryPolicy {
    ceiling: Duration,
    interval: Duration,
    backoff: Backoff,
    clock: Arc<dyn Clock>,
    sleeper: Arc<dyn Sleeper>,
}

impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("ceiling", &self.ceiling)
            .field("interval", &self.interval)
            .field("backoff", &self.backoff)
            .finish_non_exhaustive()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_CEILING, DEFAULT_INTERVAL)
    }
}

impl RetryPolicy {
    /// Creates a fixed-interval policy using real time.
    #[must_use]
    pub fn new(ceiling: Duration, interval: Duration) -> Self {
        Self {
            ceiling,
            interval,
            backoff: Backoff::Fixed,
            clock: Arc::new(SystemClock),
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Replaces the backoff strategy.
    #[must_use]
    pub const fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Replaces the clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replaces the sleeper.
    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Maximum time spent waiting.
    #[must_use]
    pub const fn ceiling(&self) -> Duration {
        self.ceiling
    }

    /// Base pause between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    /// Configured backoff strategy.
    #[must_use]
    pub const fn backoff(&self) -> Backoff {
        self.backoff
    }

    /// Pause after `failed_attempts` unsuccessful probes (1-based).
    #[must_use]
    pub fn delay_after(&self, failed_attempts: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential {
                factor,
                max_interval,
            } => {
                let exponent = failed_attempts.saturating_sub(1);
                let multiplier = factor.max(1).checked_pow(exponent).unwrap_or(u32::MAX);
                self.interval
                    .checked_mul(multiplier)
                    .map_or(max_interval, |delay| delay.min(max_interval))
            }
        }
    }

    /// Polls `probe` until it reports `true`, the ceiling elapses, or
    /// `cancel` fires.
    ///
    /// Cancellation is observed before each attempt, while a probe is in
    /// flight, and during every pause. A probe still running when the
    /// ceiling elapses is dropped and counted as an attempt. The final pause
    /// is shortened so the wait never sleeps past the ceiling.
    ///
    /// # Errors
    ///
    /// Returns the probe's error unchanged; probe errors end the wait.
    pub async fn wait<F, Fut, E>(
        &self,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<WaitOutcome, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<bool, E>>,
    {
        let mut state = PollState {
            attempts: 0,
            started: self.clock.now(),
        };

        loop {
            if cancel.is_cancelled() {
                return Ok(WaitOutcome::Cancelled {
                    attempts: state.attempts,
                });
            }

            let budget = self
                .ceiling
                .saturating_sub(self.clock.now().saturating_duration_since(state.started));
            let reachable = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(WaitOutcome::Cancelled { attempts: state.attempts });
                }
                result = probe() => result?,
                () = self.sleeper.sleep(budget) => {
                    let attempts = state.attempts.saturating_add(1);
                    debug!(attempt = attempts, "probe abandoned at ceiling");
                    return Ok(WaitOutcome::TimedOut {
                        attempts,
                        elapsed: self.clock.now().saturating_duration_since(state.started),
                    });
                }
            };
            state.attempts = state.attempts.saturating_add(1);

            if reachable {
                return Ok(WaitOutcome::Success {
                    attempts: state.attempts,
                });
            }

            let elapsed = self.clock.now().saturating_duration_since(state.started);
            if elapsed >= self.ceiling {
                return Ok(WaitOutcome::TimedOut {
                    attempts: state.attempts,
                    elapsed,
                });
            }

            let remaining = self.ceiling.saturating_sub(elapsed);
            let pause = self.delay_after(state.attempts).min(remaining);
            debug!(
                attempt = state.attempts,
                pause = ?pause,
                "target not reachable yet"
            );

            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Ok(WaitOutcome::Cancelled { attempts: state.attempts });
                }
                () = self.sleeper.sleep(pause) => {}
            }
        }
    }
}
