use std::collections::VecDeque;
use std::f64::consts::PI;
use std::time::{Duration, Instant};

use rand::Rng;
use rand::rngs::SmallRng;

use crate::constants::SPOT_SCALE_MAX;
use crate::idea::IdeaId;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpotlightState {
    pub current: Option<IdeaId>,
    pub since: Option<Instant>,
    /// Most recent selections, oldest first.
    pub history: VecDeque<IdeaId>,
}

/// Picks one live actor for emphasis every `period`.
///
/// Uniform among live actors minus the last K picks, where
/// K = min(live − 1, history_cap). `history_cap` is at least 1 so the
/// current pick never repeats while another live actor exists. With a
/// single live actor repeats are unavoidable and allowed.
pub struct SpotlightScheduler {
    period: Duration,
    history_cap: usize,
    state: SpotlightState,
    next_at: Option<Instant>,
    rng: SmallRng,
}

impl SpotlightScheduler {
    pub fn new(period: Duration, history_cap: usize, rng: SmallRng) -> Self {
        Self {
            period,
            history_cap: history_cap.max(1),
            state: SpotlightState::default(),
            next_at: None,
            rng,
        }
    }

    pub fn current(&self) -> Option<IdeaId> {
        self.state.current
    }

    pub fn state(&self) -> &SpotlightState {
        &self.state
    }

    /// Advance the scheduler. `live` must list only non-retiring actors.
    /// Returns the new pick when a selection happened.
    pub fn tick(&mut self, now: Instant, live: &[IdeaId]) -> Option<IdeaId> {
        if let Some(current) = self.state.current
            && !live.contains(&current)
        {
            self.clear();
            self.next_at = Some(now);
        }

        if live.is_empty() {
            self.clear();
            return None;
        }

        if self.next_at.is_some_and(|t| now < t) {
            return None;
        }
        self.next_at = Some(now + self.period);
        self.select(now, live)
    }

    /// Pick immediately, regardless of the period.
    pub fn select(&mut self, now: Instant, live: &[IdeaId]) -> Option<IdeaId> {
        if live.is_empty() {
            self.clear();
            return None;
        }

        let k = (live.len() - 1).min(self.history_cap);
        let excluded: Vec<IdeaId> = self.state.history.iter().rev().take(k).copied().collect();
        let candidates: Vec<IdeaId> = live
            .iter()
            .copied()
            .filter(|id| !excluded.contains(id))
            .collect();
        let pool = if candidates.is_empty() { live } else { &candidates[..] };
        let pick = pool[self.rng.random_range(0..pool.len())];

        self.state.current = Some(pick);
        self.state.since = Some(now);
        self.state.history.push_back(pick);
        while self.state.history.len() > self.history_cap {
            self.state.history.pop_front();
        }
        Some(pick)
    }

    /// Emphasis scale for the spotlighted actor: eases 1 → max → 1 over
    /// one period.
    pub fn emphasis(&self, now: Instant) -> f64 {
        let Some(since) = self.state.since else {
            return 1.0;
        };
        if self.state.current.is_none() || self.period.is_zero() {
            return 1.0;
        }
        let phase = (now.saturating_duration_since(since).as_secs_f64()
            / self.period.as_secs_f64())
        .clamp(0.0, 1.0);
        1.0 + (SPOT_SCALE_MAX - 1.0) * (PI * phase).sin()
    }

    fn clear(&mut self) {
        self.state.current = None;
        self.state.since = None;
    }
}
