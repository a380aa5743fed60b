//! Room-handoff context transfer
//!
//! When selection resolves to another room, the matched choice may carry
//! a transfer rule that computes the context handed to the target room.

use crate::error::Result;
use crate::events::SnapshotSink;
use crate::history::History;
use crate::preset::{self, PresetTable};
use crate::rooms::NextChoice;
use crate::snapshot::{Phase, TurnSnapshotBuilder};
use crate::strategy::pipeline;
use salon_llm::{CompletionRequest, InferenceProvider, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Fixed context carried when the skip preset short-circuits the transfer
pub const SKIP_CONTEXT_MARKER: &str = "[skipped]";

/// Compute the context carried into the target room.
///
/// Resolution order: no transfer rule yields an empty context; a matching
/// skip preset yields [`SKIP_CONTEXT_MARKER`] with no inference call;
/// otherwise the filter+decision pipeline runs under the transfer hint
/// and the raw visible decision text becomes the context.
pub(crate) async fn compute_context(
    provider: &dyn InferenceProvider,
    presets: &PresetTable,
    choice: &NextChoice,
    agent_names: &[String],
    history: &History,
    builder: &mut TurnSnapshotBuilder,
    sink: &SnapshotSink,
    cancel: &CancellationToken,
) -> Result<String> {
    let Some(transfer) = &choice.transfer else {
        return Ok(String::new());
    };

    if let Some(skip) = &transfer.skip_preset {
        let target = vec![choice.name.clone()];
        if preset::matches_any(presets, skip, &target) {
            debug!(room = %choice.name, "Skip preset matched, carrying marker context");
            return Ok(SKIP_CONTEXT_MARKER.to_string());
        }
    }

    if transfer.instruction.trim().is_empty() {
        return Ok(String::new());
    }

    let filtered = pipeline::filter_history(
        provider,
        presets,
        &transfer.filter_instruction,
        &transfer.preconditions,
        agent_names,
        history,
        Phase::Transfer,
        builder,
        sink,
        cancel,
    )
    .await?;

    let conversation = filtered.unwrap_or_else(|| history.render());
    builder.hint_prompt(Phase::Transfer, transfer.instruction.clone());
    let request = CompletionRequest::new(provider.default_model())
        .with_message(Message::system(&transfer.instruction))
        .with_message(Message::user(conversation));
    pipeline::stream_into_hint(provider, request, Phase::Transfer, builder, sink, cancel).await
}
