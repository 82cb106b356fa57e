//! Per-character animation state machine
//!
//! A character is either idle or speaking. Speaking always carries a deadline;
//! once it passes, the character settles back to idle on the next observation.
//! Mode changes cross-fade over [`BLEND_DURATION`] so sway and mouth never snap.

use crate::blink::eyelid_openness;
use crate::mouth::MouthSource;
use crate::oscillator::Oscillator;
use agora_core::params::{body_param, head_param, PARAM_EYE_L_OPEN, PARAM_EYE_R_OPEN};
use agora_core::{AnimationConfig, Character, ModeProfile, ParameterSnapshot, Roster};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

/// Cross-fade length between idle and speaking motion
pub const BLEND_DURATION: Duration = Duration::from_millis(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationMode {
    Idle,
    Speaking,
}

/// Pose a blend fades out of
#[derive(Debug, Clone)]
enum FromPose {
    /// The previous mode keeps animating underneath the fade
    Live {
        mode: AnimationMode,
        anchor: Instant,
        mouth: MouthSource,
    },
    /// Values frozen when a new blend interrupted one still running
    Frozen(BTreeMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Transition {
    from: FromPose,
    at: Instant,
}

/// Animation state of one character
#[derive(Debug, Clone)]
pub struct CharacterAnimationState {
    character_id: String,
    mouth_param: String,
    animation: AnimationConfig,
    mode: AnimationMode,
    mode_entered_at: Instant,
    blink_anchor: Instant,
    speaking_until: Option<Instant>,
    mouth: MouthSource,
    transition: Option<Transition>,
}

impl CharacterAnimationState {
    /// Create an idle state for `character` using the given motion profile
    pub fn new(character: &Character, animation: AnimationConfig, now: Instant) -> Self {
        Self {
            character_id: character.id.clone(),
            mouth_param: character.render.mouth_param.clone(),
            animation,
            mode: AnimationMode::Idle,
            mode_entered_at: now,
            blink_anchor: now,
            speaking_until: None,
            mouth: MouthSource::Synthetic,
            transition: None,
        }
    }

    /// Create an idle state for a registered character, using the shared
    /// default profiles when it has no personal animation config
    pub fn from_roster(roster: &Roster, id: &str, now: Instant) -> agora_core::Result<Self> {
        let character = roster.require(id)?;
        Ok(Self::new(character, roster.animation_for(id), now))
    }

    pub fn character_id(&self) -> &str {
        &self.character_id
    }

    pub fn mouth_param(&self) -> &str {
        &self.mouth_param
    }

    /// Mode as observed at `now`; an expired speaking deadline reads as idle
    pub fn mode(&self, now: Instant) -> AnimationMode {
        match (self.mode, self.speaking_until) {
            (AnimationMode::Speaking, Some(until)) if now >= until => AnimationMode::Idle,
            (mode, _) => mode,
        }
    }

    pub fn is_speaking(&self, now: Instant) -> bool {
        self.mode(now) == AnimationMode::Speaking
    }

    pub fn mode_entered_at(&self) -> Instant {
        self.mode_entered_at
    }

    /// Time left before the speaking deadline
    pub fn speaking_remaining(&self, now: Instant) -> Option<Duration> {
        match self.mode(now) {
            AnimationMode::Speaking => self.speaking_until.map(|u| u.saturating_duration_since(now)),
            AnimationMode::Idle => None,
        }
    }

    /// Start speaking for `duration`; replaces any speech in progress
    pub fn enter_speaking(&mut self, duration: Duration, mouth: MouthSource, now: Instant) {
        self.settle(now);
        self.begin_transition(now);
        self.mode = AnimationMode::Speaking;
        self.mode_entered_at = now;
        self.speaking_until = Some(now + duration);
        self.mouth = mouth;
        debug!(
            character = %self.character_id,
            duration_ms = duration.as_millis() as u64,
            "enter speaking"
        );
    }

    /// Return to idle. Returns false when already idle, in which case the
    /// idle phase keeps running untouched.
    pub fn enter_idle(&mut self, now: Instant) -> bool {
        self.settle(now);
        if self.mode == AnimationMode::Idle {
            return false;
        }
        self.begin_transition(now);
        self.mode = AnimationMode::Idle;
        self.mode_entered_at = now;
        self.speaking_until = None;
        self.mouth = MouthSource::Synthetic;
        debug!(character = %self.character_id, "enter idle");
        true
    }

    /// Restart the current mode's motion and blink phase from `now`
    pub fn reset_phase(&mut self, now: Instant) {
        self.settle(now);
        self.mode_entered_at = now;
        self.blink_anchor = now;
        self.transition = None;
    }

    /// Parameter values for one frame
    pub fn snapshot(&mut self, now: Instant) -> ParameterSnapshot {
        self.settle(now);

        let mut snapshot = ParameterSnapshot::new();

        let blink_elapsed = millis(now.saturating_duration_since(self.blink_anchor));
        let openness = eyelid_openness(&self.profile(self.mode).blinking, blink_elapsed);
        snapshot.set(PARAM_EYE_L_OPEN, openness);
        snapshot.set(PARAM_EYE_R_OPEN, openness);

        for (name, value) in self.blended_motion(now) {
            snapshot.set(name, value);
        }
        snapshot
    }

    /// Current mode's motion, faded in from the transition pose while a blend runs
    fn blended_motion(&self, now: Instant) -> BTreeMap<String, f64> {
        let mut motion = self.motion(self.mode, self.mode_entered_at, &self.mouth, now);

        let transition = match self.transition {
            Some(ref transition) => transition,
            None => return motion,
        };
        let since = now.saturating_duration_since(transition.at);
        if since >= BLEND_DURATION {
            return motion;
        }

        let weight = smoothstep(since.as_secs_f64() / BLEND_DURATION.as_secs_f64());
        let live;
        let previous = match transition.from {
            FromPose::Live {
                mode,
                anchor,
                ref mouth,
            } => {
                live = self.motion(mode, anchor, mouth, now);
                &live
            }
            FromPose::Frozen(ref pose) => pose,
        };
        for (name, value) in motion.iter_mut() {
            let from = previous.get(name).copied().unwrap_or(0.0);
            *value = from + (*value - from) * weight;
        }
        motion
    }

    fn profile(&self, mode: AnimationMode) -> &ModeProfile {
        match mode {
            AnimationMode::Idle => &self.animation.idle,
            AnimationMode::Speaking => &self.animation.speaking,
        }
    }

    /// Apply an expired speaking deadline
    fn settle(&mut self, now: Instant) {
        if let (AnimationMode::Speaking, Some(until)) = (self.mode, self.speaking_until) {
            if now >= until {
                self.transition = Some(Transition {
                    from: FromPose::Live {
                        mode: AnimationMode::Speaking,
                        anchor: self.mode_entered_at,
                        mouth: self.mouth.clone(),
                    },
                    at: until,
                });
                self.mode = AnimationMode::Idle;
                self.mode_entered_at = until;
                self.speaking_until = None;
                self.mouth = MouthSource::Synthetic;
                debug!(character = %self.character_id, "speaking deadline reached");
            }
        }
    }

    /// Start a blend out of the pose shown at `now`. Interrupting a running
    /// blend freezes its current values instead of jumping back to the raw mode.
    fn begin_transition(&mut self, now: Instant) {
        let blending = self
            .transition
            .as_ref()
            .map(|t| now.saturating_duration_since(t.at) < BLEND_DURATION)
            .unwrap_or(false);
        let from = if blending {
            FromPose::Frozen(self.blended_motion(now))
        } else {
            FromPose::Live {
                mode: self.mode,
                anchor: self.mode_entered_at,
                mouth: self.mouth.clone(),
            }
        };
        self.transition = Some(Transition { from, at: now });
    }

    /// Sway and mouth values for `mode` measured from `anchor`. Every parameter
    /// either profile can drive is present so idle frames also reset speaking axes.
    fn motion(
        &self,
        mode: AnimationMode,
        anchor: Instant,
        mouth: &MouthSource,
        now: Instant,
    ) -> BTreeMap<String, f64> {
        let mut values = BTreeMap::new();
        for profile in [&self.animation.idle, &self.animation.speaking] {
            for (axis, _) in profile.head.iter() {
                if let Some(name) = head_param(axis) {
                    values.insert(name.to_string(), 0.0);
                }
            }
            for (axis, _) in profile.body.iter() {
                if let Some(name) = body_param(axis) {
                    values.insert(name.to_string(), 0.0);
                }
            }
        }

        let elapsed = now.saturating_duration_since(anchor);
        let profile = self.profile(mode);
        for (axis, osc) in profile.head.iter() {
            if let Some(name) = head_param(axis) {
                values.insert(name.to_string(), Oscillator::from(osc).value_at(elapsed));
            }
        }
        for (axis, osc) in profile.body.iter() {
            if let Some(name) = body_param(axis) {
                values.insert(name.to_string(), Oscillator::from(osc).value_at(elapsed));
            }
        }

        let mouth_level = match mode {
            AnimationMode::Speaking => mouth.level_at(elapsed),
            AnimationMode::Idle => 0.0,
        };
        values.insert(self.mouth_param.clone(), mouth_level);
        values
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn smoothstep(t: f64) -> f64 {
    let t = t.clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
