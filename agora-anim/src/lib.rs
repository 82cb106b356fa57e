//! agora-anim: per-character animation for the Agora stage
//!
//! Computes pose, blink and mouth parameters for idle and speaking characters:
//! - Pure sinusoidal oscillators for head/body sway
//! - Eased eyelid blinks on a per-mode cycle
//! - Lip sync from an audio envelope, or a synthetic flap when none exists
//! - Idle/speaking state machine with short cross-fades between modes

pub mod oscillator;
pub mod blink;
pub mod mouth;
pub mod state;

pub use oscillator::{oscillate, Oscillator};
pub use blink::eyelid_openness;
pub use mouth::MouthSource;
pub use state::{AnimationMode, CharacterAnimationState, BLEND_DURATION};
