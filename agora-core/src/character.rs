//! Character configuration: how a character is placed on the canvas and how it moves

use serde::{Deserialize, Serialize};

/// 2D value used for anchors, positions and scales
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Rendering placement for one character on the shared canvas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Model pivot used for positioning (fractions of the model size)
    pub anchor: Vec2,

    /// Position as fractions of the canvas width/height (0-1, may overshoot)
    pub position: Vec2,

    /// Model scale
    pub scale: Vec2,

    /// Model parameter driven for lip sync
    pub mouth_param: String,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            anchor: Vec2::new(0.5, 1.0),
            position: Vec2::new(0.5, 1.0),
            scale: Vec2::new(1.0, 1.0),
            mouth_param: "ParamMouthOpenY".to_string(),
        }
    }
}

/// One sinusoidal motion channel
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Oscillation {
    /// Peak deflection in the parameter's natural unit
    pub amplitude: f64,

    /// Full cycle length in milliseconds; larger is slower
    pub cycle_ms: f64,
}

impl Oscillation {
    pub const fn new(amplitude: f64, cycle_ms: f64) -> Self {
        Self { amplitude, cycle_ms }
    }
}

/// Eye blink timing
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BlinkConfig {
    /// Time between blink starts
    pub cycle_ms: f64,

    /// How long the eyes stay shut within each cycle
    pub duration_ms: f64,
}

impl BlinkConfig {
    pub const fn new(cycle_ms: f64, duration_ms: f64) -> Self {
        Self { cycle_ms, duration_ms }
    }
}

/// Per-axis oscillations of one body part
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AxisOscillations {
    pub x: Option<Oscillation>,
    pub y: Option<Oscillation>,
    pub z: Option<Oscillation>,
}

impl AxisOscillations {
    /// Configured axes in x, y, z order
    pub fn iter(&self) -> impl Iterator<Item = (char, &Oscillation)> {
        [('x', &self.x), ('y', &self.y), ('z', &self.z)]
            .into_iter()
            .filter_map(|(axis, osc)| osc.as_ref().map(|o| (axis, o)))
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_none() && self.y.is_none() && self.z.is_none()
    }
}

/// Motion profile for one animation mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeProfile {
    pub blinking: BlinkConfig,

    #[serde(default)]
    pub head: AxisOscillations,

    #[serde(default)]
    pub body: AxisOscillations,
}

/// Speaking and idle profiles of a character
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub speaking: ModeProfile,
    pub idle: ModeProfile,
}

/// A character known to the stage. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,

    #[serde(default)]
    pub render: RenderConfig,

    /// Personal motion profile; the shared defaults apply when absent
    #[serde(default)]
    pub animation: Option<AnimationConfig>,
}

impl Character {
    pub fn new(id: impl Into<String>, render: RenderConfig) -> Self {
        Self {
            id: id.into(),
            render,
            animation: None,
        }
    }

    pub fn with_animation(mut self, animation: AnimationConfig) -> Self {
        self.animation = Some(animation);
        self
    }

    /// Validate character configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.id.is_empty() {
            return Err("Character id cannot be empty".to_string());
        }
        if self.id.len() > 128 {
            return Err("Character id too long (max 128 chars)".to_string());
        }
        if self.id.chars().any(|c| c.is_control() || c.is_whitespace()) {
            return Err(format!("Character id '{}' contains invalid characters", self.id));
        }
        if self.render.mouth_param.is_empty() {
            return Err(format!("Character '{}' has an empty mouth parameter", self.id));
        }

        let render_values = [
            self.render.anchor.x,
            self.render.anchor.y,
            self.render.position.x,
            self.render.position.y,
            self.render.scale.x,
            self.render.scale.y,
        ];
        if render_values.iter().any(|v| !v.is_finite()) {
            return Err(format!("Character '{}' has non-finite render values", self.id));
        }

        if let Some(ref animation) = self.animation {
            for (mode, profile) in [("speaking", &animation.speaking), ("idle", &animation.idle)] {
                validate_profile(profile)
                    .map_err(|e| format!("Character '{}' {} profile: {}", self.id, mode, e))?;
            }
        }

        Ok(())
    }
}

fn validate_profile(profile: &ModeProfile) -> Result<(), String> {
    if !profile.blinking.cycle_ms.is_finite() || !profile.blinking.duration_ms.is_finite() {
        return Err("blink timing must be finite".to_string());
    }
    if profile.blinking.duration_ms < 0.0 {
        return Err("blink duration cannot be negative".to_string());
    }
    // Non-positive cycles are tolerated and simply do not oscillate
    for (_, osc) in profile.head.iter().chain(profile.body.iter()) {
        if !osc.amplitude.is_finite() || !osc.cycle_ms.is_finite() {
            return Err("oscillation values must be finite".to_string());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_iteration_order() {
        let axes = AxisOscillations {
            x: None,
            y: Some(Oscillation::new(1.0, 100.0)),
            z: Some(Oscillation::new(2.0, 200.0)),
        };
        let seen: Vec<char> = axes.iter().map(|(axis, _)| axis).collect();
        assert_eq!(seen, vec!['y', 'z']);
    }

    #[test]
    fn test_character_validation() {
        let character = Character::new("aria", RenderConfig::default());
        assert!(character.validate().is_ok());

        let empty = Character::new("", RenderConfig::default());
        assert!(empty.validate().is_err());

        let mut bad_mouth = Character::new("sera", RenderConfig::default());
        bad_mouth.render.mouth_param.clear();
        assert!(bad_mouth.validate().is_err());
    }

    #[test]
    fn test_profile_deserializes_without_head() {
        let json = r#"{
            "blinking": { "cycle_ms": 4000, "duration_ms": 100 },
            "body": { "z": { "amplitude": 3, "cycle_ms": 8000 } }
        }"#;
        let profile: ModeProfile = serde_json::from_str(json).unwrap();
        assert!(profile.head.is_empty());
        assert_eq!(profile.body.z, Some(Oscillation::new(3.0, 8000.0)));
    }
}
