//! Rule-driven selection pipeline
//!
//! Filter the history, ask the inference service for a decision, then
//! resolve the chosen name against agents and configured next-choices.

use super::pipeline;
use super::{Selection, SelectionContext, SelectionStrategy};
use crate::error::{Error, Result};
use crate::events::SnapshotSink;
use crate::preset::PresetTable;
use crate::rooms::SelectionRuleConfig;
use crate::snapshot::{Phase, TurnSnapshotBuilder};
use crate::transfer;
use async_trait::async_trait;
use salon_llm::{extract_decision, CompletionRequest, InferenceProvider, Message};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Inference-backed selection configured by a rule
pub struct RuleBasedSelection {
    config: SelectionRuleConfig,
    provider: Arc<dyn InferenceProvider>,
    presets: Arc<PresetTable>,
}

impl RuleBasedSelection {
    /// Build from a rule's configuration
    #[must_use]
    pub fn new(
        config: SelectionRuleConfig,
        provider: Arc<dyn InferenceProvider>,
        presets: Arc<PresetTable>,
    ) -> Self {
        Self {
            config,
            provider,
            presets,
        }
    }

    fn decision_prompt(&self, candidates: &[String], conversation: &str) -> String {
        let mut prompt = String::new();
        prompt.push_str(&self.config.instruction);
        prompt.push_str("\n\nConversation so far:\n");
        prompt.push_str(conversation);
        prompt.push_str("\n\nCandidates (the first is the default): ");
        prompt.push_str(&candidates.join(", "));
        prompt.push_str(
            "\n\nAnswer with a JSON object of exactly two string fields: \
             {\"reason\": \"...\", \"next\": \"<one candidate name>\"}",
        );
        prompt
    }
}

#[async_trait]
impl SelectionStrategy for RuleBasedSelection {
    fn name(&self) -> &str {
        "rule"
    }

    async fn select(
        &self,
        ctx: SelectionContext<'_>,
        builder: &mut TurnSnapshotBuilder,
        sink: &SnapshotSink,
        cancel: &CancellationToken,
    ) -> Result<Selection> {
        let agent_names: Vec<String> = ctx.agents.iter().map(|a| a.name.clone()).collect();

        // Nothing to choose between: end the turn rather than asking the
        // model to pick from an empty candidate list.
        if ctx.agents.is_empty() && self.config.choices.is_empty() {
            debug!("No agents or choices configured, stopping the cycle");
            return Ok(Selection::Stop);
        }

        // Unique candidate: no inference call, but still surface the hint.
        if ctx.agents.len() == 1 && self.config.choices.is_empty() {
            let agent = ctx.agents[0].clone();
            builder
                .hint_content(Phase::Selection, agent.name.clone())
                .hint_thinking(Phase::Selection, "only one agent");
            sink.snapshot(builder.snapshot()).await?;
            return Ok(Selection::Agent(agent));
        }

        let filtered = pipeline::filter_history(
            self.provider.as_ref(),
            &self.presets,
            &self.config.filter_instruction,
            &self.config.preconditions,
            &agent_names,
            ctx.history,
            Phase::Selection,
            builder,
            sink,
            cancel,
        )
        .await?;
        let conversation = filtered.unwrap_or_else(|| ctx.history.render());

        let mut candidates = agent_names.clone();
        candidates.extend(self.config.choices.iter().map(|c| c.name.clone()));
        let prompt = self.decision_prompt(&candidates, &conversation);
        builder.hint_prompt(Phase::Selection, prompt.clone());

        let request = CompletionRequest::new(self.provider.default_model())
            .with_message(Message::system(prompt));
        let visible = pipeline::stream_into_hint(
            self.provider.as_ref(),
            request,
            Phase::Selection,
            builder,
            sink,
            cancel,
        )
        .await?;

        let decision = extract_decision(&visible)?;
        builder.hint_thinking(Phase::Selection, decision.reason.clone());
        debug!(next = %decision.next, reason = %decision.reason, "Selection decided");

        if let Some(agent) = ctx.agents.iter().find(|a| a.name.eq_ignore_ascii_case(&decision.next))
        {
            return Ok(Selection::Agent(agent.clone()));
        }

        if let Some(choice) = self
            .config
            .choices
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(&decision.next))
        {
            let context = transfer::compute_context(
                self.provider.as_ref(),
                &self.presets,
                choice,
                &agent_names,
                ctx.history,
                builder,
                sink,
                cancel,
            )
            .await?;
            builder.room_change(choice.name.clone(), context.clone());
            sink.snapshot(builder.snapshot()).await?;
            return Ok(Selection::Handoff {
                room: choice.name.clone(),
                context,
            });
        }

        warn!(next = %decision.next, "Decision named neither an agent nor a choice");
        Err(Error::Selection(format!(
            "decision '{}' matches neither an agent nor a configured choice",
            decision.next
        )))
    }
}
