//! Loudness envelope of a speech clip, sampled at a fixed window

use std::time::Duration;

/// Normalized (0-1) loudness per fixed-length window of a clip
#[derive(Debug, Clone, PartialEq)]
pub struct AmplitudeEnvelope {
    window: Duration,
    levels: Vec<f32>,
}

impl AmplitudeEnvelope {
    /// Build from raw per-window levels; values are normalized to the loudest window
    pub fn from_levels(window: Duration, levels: Vec<f32>) -> Self {
        let peak = levels
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(0.0f32, f32::max);
        let levels = if peak > 0.0 {
            levels
                .into_iter()
                .map(|v| if v.is_finite() { (v / peak).clamp(0.0, 1.0) } else { 0.0 })
                .collect()
        } else {
            vec![0.0; levels.len()]
        };
        Self { window, levels }
    }

    /// Level at `elapsed` into the clip; 0 past the end
    pub fn level_at(&self, elapsed: Duration) -> f32 {
        if self.window.is_zero() {
            return 0.0;
        }
        let index = (elapsed.as_secs_f64() / self.window.as_secs_f64()) as usize;
        self.levels.get(index).copied().unwrap_or(0.0)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// True when the clip never rises above silence
    pub fn is_silent(&self) -> bool {
        self.levels.iter().all(|v| *v <= 0.0)
    }
}
