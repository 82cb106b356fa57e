//! Frame loop feeding parameter snapshots to the renderer

use crate::config::{frame_interval, StageConfig};
use crate::orchestrator::AgentOrchestrator;
use agora_core::Renderer;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

pub struct FrameDriver {
    orchestrator: AgentOrchestrator,
    renderer: Arc<dyn Renderer>,
    interval: Duration,
}

impl FrameDriver {
    pub fn new(orchestrator: AgentOrchestrator, renderer: Arc<dyn Renderer>, frame_rate: u32) -> Self {
        Self {
            orchestrator,
            renderer,
            interval: frame_interval(frame_rate),
        }
    }

    /// Driver ticking at the configured frame rate
    pub fn from_config(orchestrator: AgentOrchestrator, renderer: Arc<dyn Renderer>, config: &StageConfig) -> Self {
        Self {
            orchestrator,
            renderer,
            interval: config.frame_interval(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Snapshot every character once and hand the results to the renderer
    pub fn render_frame(&self) -> usize {
        let snapshots = self.orchestrator.snapshots();
        for (character_id, snapshot) in &snapshots {
            self.renderer.apply_parameters(character_id, snapshot);
        }
        snapshots.len()
    }

    /// Tick until `shutdown` flips to true (or its sender goes away).
    /// Returns the number of frames rendered.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut frames: u64 = 0;

        info!(interval_ms = self.interval.as_secs_f64() * 1000.0, "frame loop started");
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.render_frame();
                    frames += 1;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!(frames, "frame loop stopped");
        frames
    }

    pub fn spawn(self, shutdown: watch::Receiver<bool>) -> JoinHandle<u64> {
        tokio::spawn(self.run(shutdown))
    }
}
