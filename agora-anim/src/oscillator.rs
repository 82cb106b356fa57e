//! Sinusoidal motion primitive shared by every animated parameter

use agora_core::Oscillation;
use std::f64::consts::TAU;
use std::time::Duration;

/// `amplitude * sin(2π * elapsed_ms / cycle_ms)`.
///
/// Pure and restartable: identical inputs always give identical output.
/// A non-positive or non-finite cycle means "no oscillation" and yields 0.
pub fn oscillate(amplitude: f64, cycle_ms: f64, elapsed_ms: f64) -> f64 {
    if !cycle_ms.is_finite() || cycle_ms <= 0.0 {
        return 0.0;
    }
    if !amplitude.is_finite() || !elapsed_ms.is_finite() {
        return 0.0;
    }
    // Reduce to one period first so large timestamps keep their precision
    let phase = elapsed_ms.rem_euclid(cycle_ms) / cycle_ms;
    amplitude * (TAU * phase).sin()
}

/// An [`Oscillation`] evaluated against elapsed time
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Oscillator {
    pub amplitude: f64,
    pub cycle_ms: f64,
}

impl Oscillator {
    pub fn new(amplitude: f64, cycle_ms: f64) -> Self {
        Self { amplitude, cycle_ms }
    }

    pub fn value_at(&self, elapsed: Duration) -> f64 {
        oscillate(self.amplitude, self.cycle_ms, elapsed.as_secs_f64() * 1000.0)
    }
}

impl From<&Oscillation> for Oscillator {
    fn from(osc: &Oscillation) -> Self {
        Self::new(osc.amplitude, osc.cycle_ms)
    }
}
