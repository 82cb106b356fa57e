//! Eyelid curve

use agora_core::BlinkConfig;
use std::f64::consts::PI;

/// True while `elapsed_ms` falls inside a blink window
pub fn is_blinking(blink: &BlinkConfig, elapsed_ms: f64) -> bool {
    if !blink.cycle_ms.is_finite() || blink.cycle_ms <= 0.0 || blink.duration_ms <= 0.0 {
        return false;
    }
    if !elapsed_ms.is_finite() {
        return false;
    }
    elapsed_ms.rem_euclid(blink.cycle_ms) < blink.duration_ms
}

/// Eyelid openness in 0..1 (1 = open).
///
/// Inside the blink window the lid follows half a sine: it closes, bottoms out
/// at the middle of the window and reopens, so consecutive frames never jump.
pub fn eyelid_openness(blink: &BlinkConfig, elapsed_ms: f64) -> f64 {
    if !is_blinking(blink, elapsed_ms) {
        return 1.0;
    }
    let progress = elapsed_ms.rem_euclid(blink.cycle_ms) / blink.duration_ms;
    (1.0 - (PI * progress).sin()).clamp(0.0, 1.0)
}
