use serde::{Serialize, Serializer};

use crate::{Error, ResearchService, Result};
use orch_domain::{
	LlmCallEvent, LlmProvider, LlmResultUpdate, Research, ResearchStatus, ResearchUpdate,
	RetryAction, retry,
};

/// Successful reconciliation. Serializes as `{ ok: true, action, retriedProviders?, message }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryOutcome {
	pub action: RetryAction,
	pub retried_providers: Vec<LlmProvider>,
	pub message: String,
}
impl RetryOutcome {
	fn retrying(providers: Vec<LlmProvider>) -> Self {
		let message = retry::retry_message(providers.len());

		Self { action: RetryAction::RetryingLlms, retried_providers: providers, message }
	}

	fn finished(action: RetryAction, message: &str) -> Self {
		Self { action, retried_providers: Vec::new(), message: message.to_string() }
	}
}
impl Serialize for RetryOutcome {
	fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		#[derive(Serialize)]
		#[serde(rename_all = "camelCase")]
		struct Wire<'a> {
			ok: bool,
			action: RetryAction,
			#[serde(skip_serializing_if = "Option::is_none")]
			retried_providers: Option<&'a [LlmProvider]>,
			message: &'a str,
		}

		let retried_providers = (self.action == RetryAction::RetryingLlms)
			.then_some(self.retried_providers.as_slice());

		Wire { ok: true, action: self.action, retried_providers, message: &self.message }
			.serialize(serializer)
	}
}

impl ResearchService {
	/// Drives a failed research record toward completion: re-dispatch failed providers, re-run
	/// synthesis, or mark the record completed.
	pub async fn retry(&self, research_id: &str) -> Result<RetryOutcome> {
		let research = match self.ports.repository.find_by_id(research_id).await {
			Ok(Some(research)) => research,
			Ok(None) => return Err(Error::NotFound),
			Err(err) => {
				tracing::warn!(research_id, error = %err, "Failed to load research for retry.");

				return Err(Error::NotFound);
			},
		};

		if research.status != ResearchStatus::Failed {
			return Err(Error::InvalidState { status: research.status });
		}

		let analysis = retry::analyze(&research);

		if !analysis.failed_llms.is_empty() {
			self.redispatch(&research, &analysis.failed_llms).await;

			return Ok(RetryOutcome::retrying(analysis.failed_llms));
		}
		if analysis.successful_llms.is_empty() {
			return Err(Error::NoSuccessfulResults);
		}
		if analysis.needs_synthesis(research.skips_synthesis()) {
			return match self.ports.synthesis.run_synthesis(research_id).await {
				Ok(()) => {
					tracing::info!(research_id, action = "synthesis_completed", "Research synthesized.");

					Ok(RetryOutcome::finished(
						RetryAction::SynthesisCompleted,
						"Synthesis completed successfully",
					))
				},
				Err(err) => Err(Error::Synthesis { message: err.to_string() }),
			};
		}

		let update = ResearchUpdate::finalize(self.ports.clock.now(), research.started_at);

		self.ports
			.repository
			.update(research_id, &update)
			.await
			.map_err(|err| Error::Storage { message: err.message })?;

		let outcome = if research.skips_synthesis() {
			RetryOutcome::finished(
				RetryAction::SynthesisSkipped,
				"Research completed (synthesis skipped)",
			)
		} else {
			RetryOutcome::finished(RetryAction::AlreadyCompleted, "Research was already completed")
		};

		tracing::info!(research_id, action = outcome.action.as_str(), "Research finalized.");

		Ok(outcome)
	}

	// Every reset lands before the first publish.
	async fn redispatch(&self, research: &Research, failed: &[LlmProvider]) {
		let research_id = research.id.as_str();
		let repository = &self.ports.repository;

		if let Err(err) =
			repository.update(research_id, &ResearchUpdate::status(ResearchStatus::Retrying)).await
		{
			tracing::warn!(research_id, error = %err, "Failed to mark research as retrying.");
		}

		let reset = LlmResultUpdate::reset_pending();

		for provider in failed {
			if let Err(err) = repository.update_llm_result(research_id, *provider, &reset).await {
				tracing::warn!(
					research_id,
					provider = provider.as_str(),
					error = %err,
					"Failed to reset LLM result."
				);
			}
		}

		for provider in failed {
			let event = LlmCallEvent {
				research_id: research.id.clone(),
				user_id: research.user_id.clone(),
				provider: *provider,
				prompt: research.prompt.clone(),
			};
			let Err(err) = self.ports.publisher.publish_llm_call(&event).await else {
				tracing::info!(research_id, provider = provider.as_str(), "Retry event published.");

				continue;
			};

			tracing::warn!(
				research_id,
				provider = provider.as_str(),
				code = err.code.as_deref(),
				error = %err,
				"Failed to publish retry event."
			);

			let update = LlmResultUpdate::publish_failed(&err.message);

			if let Err(err) = repository.update_llm_result(research_id, *provider, &update).await {
				tracing::warn!(
					research_id,
					provider = provider.as_str(),
					error = %err,
					"Failed to record publish failure."
				);
			}
		}
	}
}
