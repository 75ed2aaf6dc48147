//! Retry policy for datagram requests.
//!
//! Only timeouts are retried; decode, security, and protocol failures
//! surface immediately. Stream transports skip retries entirely.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Retry policy applied by a session on timeout.
///
/// # Examples
///
/// ```rust
/// use rsnmp::session::Retry;
/// use std::time::Duration;
///
/// // Send once, fail on first timeout.
/// let retry = Retry::none();
///
/// // Fixed delay between retries.
/// let retry = Retry::fixed(3, Duration::from_millis(200));
///
/// // Exponential backoff with jitter.
/// let retry = Retry::exponential(5)
///     .max_delay(Duration::from_secs(5))
///     .jitter(0.25)
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct Retry {
    /// Retry attempts after the initial send (0 = send once).
    pub max_attempts: u32,
    /// Delay strategy between attempts.
    pub backoff: Backoff,
}

/// Delay strategy between retry attempts.
#[derive(Clone, Debug, Default)]
pub enum Backoff {
    /// Resend immediately.
    #[default]
    None,

    /// The same delay before every retry.
    Fixed { delay: Duration },

    /// Delay doubles after each attempt, capped at `max`.
    ///
    /// `jitter` randomizes each delay within ±`jitter` of its nominal
    /// value so that many sessions timing out together do not retry in
    /// lockstep.
    Exponential {
        initial: Duration,
        max: Duration,
        jitter: f64,
    },
}

impl Default for Retry {
    /// Three immediate retries.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::None,
        }
    }
}

impl Retry {
    /// Send once; a timeout is final.
    pub fn none() -> Self {
        Self {
            max_attempts: 0,
            backoff: Backoff::None,
        }
    }

    /// Retry up to `attempts` times with a fixed delay.
    pub fn fixed(attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: attempts,
            backoff: Backoff::Fixed { delay },
        }
    }

    /// Start building an exponential backoff policy.
    pub fn exponential(attempts: u32) -> RetryBuilder {
        RetryBuilder {
            max_attempts: attempts,
            ..Default::default()
        }
    }

    /// Delay to apply before retry number `attempt` (zero-based).
    pub fn compute_delay(&self, attempt: u32) -> Duration {
        match &self.backoff {
            Backoff::None => Duration::ZERO,
            Backoff::Fixed { delay } => *delay,
            Backoff::Exponential {
                initial,
                max,
                jitter,
            } => {
                let multiplier = 1u32.checked_shl(attempt.min(31)).unwrap_or(u32::MAX);
                let capped = initial.saturating_mul(multiplier).min(*max);
                Duration::from_secs_f64(capped.as_secs_f64() * jitter_factor(*jitter))
            }
        }
    }
}

/// Builder returned by [`Retry::exponential`].
pub struct RetryBuilder {
    max_attempts: u32,
    initial: Duration,
    max: Duration,
    jitter: f64,
}

impl Default for RetryBuilder {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial: Duration::from_secs(1),
            max: Duration::from_secs(5),
            jitter: 0.25,
        }
    }
}

impl RetryBuilder {
    /// Delay before the first retry (default 1s).
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial = delay;
        self
    }

    /// Upper bound on the delay (default 5s).
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max = delay;
        self
    }

    /// Jitter factor, clamped to `[0.0, 1.0]` (default 0.25).
    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    pub fn build(self) -> Retry {
        Retry {
            max_attempts: self.max_attempts,
            backoff: Backoff::Exponential {
                initial: self.initial,
                max: self.max,
                jitter: self.jitter,
            },
        }
    }
}

impl From<RetryBuilder> for Retry {
    fn from(builder: RetryBuilder) -> Self {
        builder.build()
    }
}

static JITTER_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Factor in `[1-jitter, 1+jitter]` from a multiplicative hash of an
/// atomic counter (Knuth). Desynchronizing retries does not need a
/// real RNG.
fn jitter_factor(jitter: f64) -> f64 {
    if jitter <= 0.0 {
        return 1.0;
    }
    let counter = JITTER_COUNTER.fetch_add(1, Ordering::Relaxed);
    let hash = counter.wrapping_mul(0x5851f42d4c957f2d);
    let random = (hash >> 11) as f64 / ((1u64 << 53) as f64);
    1.0 + (random - 0.5) * 2.0 * jitter
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let retry = Retry::default();
        assert_eq!(retry.max_attempts, 3);
        assert!(matches!(retry.backoff, Backoff::None));
        assert_eq!(retry.compute_delay(0), Duration::ZERO);

        assert_eq!(Retry::none().max_attempts, 0);
    }

    #[test]
    fn fixed_delay_is_constant() {
        let retry = Retry::fixed(3, Duration::from_millis(100));
        assert_eq!(retry.compute_delay(0), Duration::from_millis(100));
        assert_eq!(retry.compute_delay(7), Duration::from_millis(100));
    }

    #[test]
    fn exponential_doubles_then_caps() {
        let retry = Retry::exponential(10)
            .initial_delay(Duration::from_millis(100))
            .max_delay(Duration::from_millis(500))
            .jitter(0.0)
            .build();

        assert_eq!(retry.compute_delay(0), Duration::from_millis(100));
        assert_eq!(retry.compute_delay(1), Duration::from_millis(200));
        assert_eq!(retry.compute_delay(2), Duration::from_millis(400));
        assert_eq!(retry.compute_delay(3), Duration::from_millis(500));
        assert_eq!(retry.compute_delay(30), Duration::from_millis(500));
    }

    #[test]
    fn jitter_stays_in_range() {
        let retry = Retry::exponential(3)
            .initial_delay(Duration::from_millis(100))
            .jitter(0.25)
            .build();
        for _ in 0..50 {
            let millis = retry.compute_delay(0).as_millis();
            assert!((75..=125).contains(&millis), "delay was {millis}ms");
        }
    }

    #[test]
    fn jitter_is_clamped() {
        let retry = Retry::exponential(1).jitter(4.0).build();
        match retry.backoff {
            Backoff::Exponential { jitter, .. } => assert_eq!(jitter, 1.0),
            _ => panic!("expected Exponential"),
        }
        assert_eq!(jitter_factor(0.0), 1.0);
    }
}
