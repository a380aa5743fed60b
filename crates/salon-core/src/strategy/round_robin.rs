//! Fixed-rotation selection

use super::{Selection, SelectionContext, SelectionStrategy};
use crate::error::{Error, Result};
use crate::events::SnapshotSink;
use crate::rooms::AgentDef;
use crate::snapshot::TurnSnapshotBuilder;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_util::sync::CancellationToken;

/// Rotates over a fixed agent list, wrapping on each call.
///
/// The cursor lives for as long as the strategy table that owns this
/// instance, so rotation order persists across cycles.
pub struct RoundRobinSelection {
    agents: Vec<AgentDef>,
    cursor: AtomicUsize,
}

impl RoundRobinSelection {
    /// Rotation over the given roster, starting at the first agent
    #[must_use]
    pub fn new(agents: Vec<AgentDef>) -> Self {
        Self {
            agents,
            cursor: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SelectionStrategy for RoundRobinSelection {
    fn name(&self) -> &str {
        "round-robin"
    }

    async fn select(
        &self,
        _ctx: SelectionContext<'_>,
        _builder: &mut TurnSnapshotBuilder,
        _sink: &SnapshotSink,
        _cancel: &CancellationToken,
    ) -> Result<Selection> {
        if self.agents.is_empty() {
            return Err(Error::Selection(
                "round-robin selection over an empty agent list".to_string(),
            ));
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % self.agents.len();
        Ok(Selection::Agent(self.agents[index].clone()))
    }
}
