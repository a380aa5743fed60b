//! Shared plumbing for inference-backed strategy steps
//!
//! Both the selection decision and the handoff context transfer run the
//! same two-step shape: an optional preset-gated history filter, then a
//! streamed inference call whose chunks are surfaced as hint snapshots.

use crate::error::{Error, Result};
use crate::events::SnapshotSink;
use crate::history::History;
use crate::preset::{self, PresetTable};
use crate::snapshot::{Phase, TurnSnapshotBuilder};
use salon_llm::{split_thinking, CompletionRequest, InferenceProvider, Message};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Stream a completion into a phase hint, emitting a snapshot per chunk.
///
/// When the full text carries a thinking block, it is split off into the
/// hint's rationale and the hint content is replaced with the visible
/// remainder before the final snapshot. Returns the visible text.
pub(crate) async fn stream_into_hint(
    provider: &dyn InferenceProvider,
    request: CompletionRequest,
    phase: Phase,
    builder: &mut TurnSnapshotBuilder,
    sink: &SnapshotSink,
    cancel: &CancellationToken,
) -> Result<String> {
    let mut rx = tokio::select! {
        () = cancel.cancelled() => return Err(Error::Cancelled),
        rx = provider.complete_stream(request) => rx?,
    };

    let mut accumulated = String::new();
    loop {
        let chunk = tokio::select! {
            () = cancel.cancelled() => return Err(Error::Cancelled),
            chunk = rx.recv() => chunk,
        };
        let Some(chunk) = chunk else { break };
        let chunk = chunk?;
        if !chunk.delta.is_empty() {
            accumulated.push_str(&chunk.delta);
            builder.hint_append(phase, &chunk.delta);
            sink.snapshot(builder.snapshot()).await?;
        }
        if chunk.done {
            break;
        }
    }

    let (thinking, visible) = split_thinking(&accumulated);
    if let Some(thinking) = thinking {
        builder.hint_thinking(phase, thinking);
    }
    builder.hint_content(phase, visible.clone());
    sink.snapshot(builder.snapshot()).await?;
    Ok(visible)
}

/// Run the preset-gated history filter step.
///
/// Skipped (returns `None`) when there is no filter instruction, or when
/// preconditions are present and none of them affirms any current agent
/// name. Otherwise the filtered history text is produced by a streamed
/// inference call surfaced through the given phase hint.
pub(crate) async fn filter_history(
    provider: &dyn InferenceProvider,
    presets: &PresetTable,
    filter_instruction: &str,
    preconditions: &[String],
    agent_names: &[String],
    history: &History,
    phase: Phase,
    builder: &mut TurnSnapshotBuilder,
    sink: &SnapshotSink,
    cancel: &CancellationToken,
) -> Result<Option<String>> {
    if filter_instruction.trim().is_empty() {
        return Ok(None);
    }
    if !preconditions.is_empty()
        && !preconditions
            .iter()
            .any(|p| preset::matches_any(presets, p, agent_names))
    {
        debug!(phase = phase.as_str(), "History filter gated off by preconditions");
        return Ok(None);
    }

    let request = CompletionRequest::new(provider.default_model())
        .with_message(Message::system(filter_instruction))
        .with_message(Message::user(history.render()));
    let filtered = stream_into_hint(provider, request, phase, builder, sink, cancel).await?;
    Ok(Some(filtered))
}
