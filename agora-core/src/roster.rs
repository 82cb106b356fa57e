//! Character roster: lookup by id, built-in cast and shared default profiles

use crate::character::{
    AnimationConfig, AxisOscillations, BlinkConfig, Character, ModeProfile, Oscillation,
    RenderConfig, Vec2,
};
use crate::error::{Error, Result};
use std::collections::BTreeMap;
use tracing::debug;

/// Default profile for a speaking character without a personal config
pub fn default_speaking_profile() -> ModeProfile {
    ModeProfile {
        blinking: BlinkConfig::new(4000.0, 100.0),
        head: AxisOscillations {
            x: Some(Oscillation::new(10.0, 5000.0)),
            y: Some(Oscillation::new(8.0, 4500.0)),
            z: None,
        },
        body: AxisOscillations {
            z: Some(Oscillation::new(8.0, 7000.0)),
            ..Default::default()
        },
    }
}

/// Default profile for an idle character without a personal config
pub fn default_idle_profile() -> ModeProfile {
    ModeProfile {
        blinking: BlinkConfig::new(4500.0, 100.0),
        head: AxisOscillations::default(),
        body: AxisOscillations {
            z: Some(Oscillation::new(2.0, 9000.0)),
            ..Default::default()
        },
    }
}

pub fn default_animation() -> AnimationConfig {
    AnimationConfig {
        speaking: default_speaking_profile(),
        idle: default_idle_profile(),
    }
}

/// Characters known to the stage, keyed by id
#[derive(Debug, Clone, Default)]
pub struct Roster {
    characters: BTreeMap<String, Character>,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock debate cast: aria, sera and eidon
    pub fn builtin() -> Self {
        let mut roster = Self::new();
        roster.insert(aria());
        roster.insert(sera());
        roster.insert(eidon());
        roster
    }

    /// Add or replace a character
    pub fn insert(&mut self, character: Character) -> Option<Character> {
        debug!(character = %character.id, "registering character");
        self.characters.insert(character.id.clone(), character)
    }

    pub fn get(&self, id: &str) -> Option<&Character> {
        self.characters.get(id)
    }

    pub fn require(&self, id: &str) -> Result<&Character> {
        self.get(id).ok_or_else(|| Error::UnknownCharacter(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.characters.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.characters.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Character> {
        self.characters.values()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }

    /// Animation profile of a character, falling back to the shared defaults
    /// when the character has none or is not registered.
    pub fn animation_for(&self, id: &str) -> AnimationConfig {
        self.get(id)
            .and_then(|c| c.animation.clone())
            .unwrap_or_else(default_animation)
    }

    /// Validate every registered character
    pub fn validate(&self) -> std::result::Result<(), String> {
        for character in self.characters.values() {
            character.validate()?;
        }
        Ok(())
    }
}

impl FromIterator<Character> for Roster {
    fn from_iter<I: IntoIterator<Item = Character>>(iter: I) -> Self {
        let mut roster = Self::new();
        for character in iter {
            roster.insert(character);
        }
        roster
    }
}

fn aria() -> Character {
    Character::new(
        "aria",
        RenderConfig {
            anchor: Vec2::new(0.86, 0.39),
            position: Vec2::new(0.4, 1.2),
            scale: Vec2::new(0.54, 0.64),
            mouth_param: "ParamMouthOpenY".to_string(),
        },
    )
    .with_animation(AnimationConfig {
        speaking: ModeProfile {
            blinking: BlinkConfig::new(3500.0, 120.0),
            head: AxisOscillations {
                x: Some(Oscillation::new(20.0, 2800.0)),
                y: Some(Oscillation::new(12.0, 3200.0)),
                z: None,
            },
            body: AxisOscillations {
                z: Some(Oscillation::new(15.0, 4500.0)),
                ..Default::default()
            },
        },
        idle: ModeProfile {
            blinking: BlinkConfig::new(4000.0, 100.0),
            head: AxisOscillations::default(),
            body: AxisOscillations {
                z: Some(Oscillation::new(3.0, 8000.0)),
                ..Default::default()
            },
        },
    })
}

fn sera() -> Character {
    Character::new(
        "sera",
        RenderConfig {
            anchor: Vec2::new(0.55, 0.39),
            position: Vec2::new(0.5, 0.9),
            scale: Vec2::new(0.2, 0.26),
            mouth_param: "ParamMouthForm".to_string(),
        },
    )
    .with_animation(AnimationConfig {
        speaking: ModeProfile {
            blinking: BlinkConfig::new(5000.0, 50.0),
            head: AxisOscillations {
                x: Some(Oscillation::new(4.0, 6000.0)),
                y: Some(Oscillation::new(4.0, 5500.0)),
                z: None,
            },
            body: AxisOscillations {
                x: Some(Oscillation::new(3.0, 3000.0)),
                y: Some(Oscillation::new(1.0, 8000.0)),
                z: Some(Oscillation::new(3.0, 8000.0)),
            },
        },
        idle: ModeProfile {
            blinking: BlinkConfig::new(5500.0, 100.0),
            head: AxisOscillations::default(),
            body: AxisOscillations {
                z: Some(Oscillation::new(1.5, 10000.0)),
                ..Default::default()
            },
        },
    })
}

fn eidon() -> Character {
    Character::new(
        "eidon",
        RenderConfig {
            anchor: Vec2::new(0.15, 0.75),
            position: Vec2::new(0.75, 0.78),
            scale: Vec2::new(0.05, 0.06),
            mouth_param: "ParamMouthOpen".to_string(),
        },
    )
    .with_animation(AnimationConfig {
        speaking: ModeProfile {
            blinking: BlinkConfig::new(2800.0, 100.0),
            head: AxisOscillations {
                x: Some(Oscillation::new(12.0, 4000.0)),
                y: Some(Oscillation::new(15.0, 2500.0)),
                z: None,
            },
            body: AxisOscillations {
                x: Some(Oscillation::new(10.0, 3000.0)),
                y: Some(Oscillation::new(10.0, 8000.0)),
                z: Some(Oscillation::new(10.0, 6000.0)),
            },
        },
        idle: ModeProfile {
            blinking: BlinkConfig::new(3200.0, 90.0),
            head: AxisOscillations::default(),
            body: AxisOscillations {
                z: Some(Oscillation::new(4.0, 6000.0)),
                ..Default::default()
            },
        },
    })
}
