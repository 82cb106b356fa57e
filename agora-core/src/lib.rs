//! agora-core: shared character model for the Agora stage
//!
//! Holds everything the animation, speech and session crates agree on:
//! - Character render/animation configuration and the built-in roster
//! - Per-frame parameter snapshots handed to the renderer
//! - Audio amplitude envelopes used for lip sync
//! - The core error type the other crates map into

pub mod error;
pub mod character;
pub mod roster;
pub mod params;
pub mod envelope;
pub mod renderer;

pub use error::{Error, Result};
pub use character::{
    AnimationConfig, AxisOscillations, BlinkConfig, Character, ModeProfile, Oscillation,
    RenderConfig, Vec2,
};
pub use roster::Roster;
pub use params::ParameterSnapshot;
pub use envelope::AmplitudeEnvelope;
pub use renderer::{Renderer, TracingRenderer};
