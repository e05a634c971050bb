//! Bounded retry with an injectable sleep.

use std::fmt::Display;
use std::time::Duration;

use fchroot_common::constants::{UNMOUNT_ATTEMPTS, UNMOUNT_RETRY_DELAY};

/// Source of blocking pauses between attempts.
pub trait Sleeper: Send + Sync {
    /// Blocks the calling thread for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Sleeper backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// How many times to try an operation and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one.
    pub attempts: u32,
    /// Pause between two consecutive attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt count and delay.
    #[must_use]
    pub const fn new(attempts: u32, delay: Duration) -> Self {
        Self { attempts, delay }
    }

    /// Policy applied to each unmount target.
    #[must_use]
    pub const fn unmount() -> Self {
        Self::new(UNMOUNT_ATTEMPTS, UNMOUNT_RETRY_DELAY)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::unmount()
    }
}

/// Runs `operation` until it succeeds or the policy's attempts run out.
///
/// The closure receives the 1-based attempt number. The sleeper is called
/// only between attempts, never after the last one. A policy with zero
/// attempts still runs the operation once.
///
/// # Errors
///
/// Returns the error of the final attempt when every attempt fails.
pub fn retry<T, E, S, F>(policy: &RetryPolicy, sleeper: &S, mut operation: F) -> Result<T, E>
where
    E: Display,
    S: Sleeper + ?Sized,
    F: FnMut(u32) -> Result<T, E>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match operation(attempt) {
            Ok(value) => return Ok(value),
            Err(e) if attempt < attempts => {
                tracing::debug!(
                    attempt,
                    error = %e,
                    delay_ms = policy.delay.as_millis(),
                    "attempt failed, retrying"
                );
                sleeper.sleep(policy.delay);
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
