//! Renderer capability consumed once per frame per character

use crate::params::ParameterSnapshot;
use tracing::trace;

/// Paints a character model from named parameter values.
/// Mapping names to mesh deformation is entirely up to the implementation.
pub trait Renderer: Send + Sync {
    fn apply_parameters(&self, character_id: &str, snapshot: &ParameterSnapshot);
}

/// Renderer that only logs snapshots; used when no model is attached
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn apply_parameters(&self, character_id: &str, snapshot: &ParameterSnapshot) {
        trace!(character = character_id, params = ?snapshot, "apply parameters");
    }
}
