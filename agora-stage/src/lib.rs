//! agora-stage: the stage that performs a live debate
//!
//! Wires the session, speech and animation crates together:
//! - `AgentOrchestrator` turns session commands into speech and motion
//! - `FrameDriver` pushes per-frame parameters to the renderer
//! - `StageConfig` loads everything from JSON, TOML or YAML

pub mod error;
pub mod config;
pub mod orchestrator;
pub mod frame;

pub use error::StageError;
pub use config::StageConfig;
pub use orchestrator::{AgentOrchestrator, StageEvent, TurnOutcome};
pub use frame::FrameDriver;
