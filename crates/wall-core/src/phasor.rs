use std::f64::consts::TAU;

use crate::constants::EPSILON;

/// Periodic bob phase on the unit circle, always in [0, 2π).
#[derive(Clone, Copy, Debug, Default)]
pub struct BobPhase {
    pub theta: f64,
}

impl BobPhase {
    /// Create a phase with the given angle, normalized to [0, 2π).
    pub fn new(theta: f64) -> Self {
        Self {
            theta: theta.rem_euclid(TAU),
        }
    }

    /// Advance by `rate` rad/s over `dt` seconds, wrapping.
    pub fn advance(self, rate: f64, dt: f64) -> Self {
        Self::new(self.theta + rate * dt)
    }

    /// Vertical displacement for this phase at the given amplitude.
    pub fn offset(self, amplitude: f64) -> f64 {
        self.theta.sin() * amplitude
    }
}

impl PartialEq for BobPhase {
    fn eq(&self, other: &Self) -> bool {
        (self.theta - other.theta).abs() < EPSILON
    }
}
