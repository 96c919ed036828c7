//! Reconnection state machine for the push subscription.
//!
//! `Disconnected → Connecting → Connected → (drop) Backoff → Connecting → …`
//!
//! Delays grow exponentially from `base`, capped at `max`, with jitter.
//! Below the cap the jittered sequence never decreases. At the cap each
//! delay is drawn from `[max·(1 − jitter), max]`, so walls that lost the
//! same collaborator do not retry in lockstep. A successful connection
//! resets the schedule. Retries are unbounded.

use std::fmt;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::SmallRng;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BackoffPolicy {
    pub base: Duration,
    pub max: Duration,
    /// Spread as a fraction of the nominal delay: below the cap the delay
    /// grows by up to `jitter`, at the cap it shrinks by up to `jitter`.
    pub jitter: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
            jitter: 0.2,
        }
    }
}

#[derive(Debug)]
pub struct Backoff {
    policy: BackoffPolicy,
    current: Duration,
    last: Duration,
}

impl Backoff {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            current: policy.base,
            last: Duration::ZERO,
        }
    }

    pub fn next_delay(&mut self, rng: &mut impl Rng) -> Duration {
        let nominal = self.current;
        let next = self.current.checked_mul(2).unwrap_or(self.policy.max);
        self.current = next.min(self.policy.max);

        let spread = self.policy.jitter.clamp(0.0, 1.0) * rng.random::<f64>();
        let delay = if nominal >= self.policy.max {
            self.policy.max.mul_f64(1.0 - spread)
        } else {
            nominal
                .mul_f64(1.0 + spread)
                .min(self.policy.max)
                .max(self.last)
        };
        self.last = delay;
        delay
    }

    pub fn reset(&mut self) {
        self.current = self.policy.base;
        self.last = Duration::ZERO;
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConnectionStatus::Disconnected => "disconnected",
            ConnectionStatus::Connecting => "connecting",
            ConnectionStatus::Connected => "connected",
            ConnectionStatus::Backoff => "backoff",
        };
        f.write_str(s)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConnectionState {
    pub status: ConnectionStatus,
    pub retry_count: u32,
    pub next_retry_at: Option<Instant>,
}

/// Drives [`ConnectionState`] transitions and the backoff schedule.
#[derive(Debug)]
pub struct Reconnector {
    state: ConnectionState,
    backoff: Backoff,
    rng: SmallRng,
}

impl Reconnector {
    pub fn new(policy: BackoffPolicy, rng: SmallRng) -> Self {
        Self {
            state: ConnectionState::default(),
            backoff: Backoff::new(policy),
            rng,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether a connection attempt may start now.
    pub fn retry_due(&self, now: Instant) -> bool {
        match self.state.status {
            ConnectionStatus::Disconnected => true,
            ConnectionStatus::Backoff => self.state.next_retry_at.is_none_or(|t| now >= t),
            ConnectionStatus::Connecting | ConnectionStatus::Connected => false,
        }
    }

    pub fn connecting(&mut self) -> ConnectionState {
        self.state.status = ConnectionStatus::Connecting;
        self.state.next_retry_at = None;
        self.state
    }

    pub fn connected(&mut self) -> ConnectionState {
        self.state.status = ConnectionStatus::Connected;
        self.state.retry_count = 0;
        self.state.next_retry_at = None;
        self.backoff.reset();
        self.state
    }

    /// Connection failed or dropped: schedule the next attempt.
    /// Returns the delay to wait.
    pub fn lost(&mut self, now: Instant) -> Duration {
        let delay = self.backoff.next_delay(&mut self.rng);
        self.state.status = ConnectionStatus::Backoff;
        self.state.retry_count = self.state.retry_count.saturating_add(1);
        self.state.next_retry_at = Some(now + delay);
        delay
    }

    pub fn disconnected(&mut self) -> ConnectionState {
        self.state.status = ConnectionStatus::Disconnected;
        self.state.next_retry_at = None;
        self.state
    }
}
