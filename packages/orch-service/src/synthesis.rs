use std::sync::Arc;

use crate::{
	BoxFuture, Clock, ResearchRepository, SynthesisError, SynthesisInput, SynthesisRunner,
	Synthesizer,
};
use orch_domain::{LlmStatus, Research, ResearchUpdate};

/// Combines completed provider outputs into one report and records the outcome on the research.
pub struct SynthesisService {
	repository: Arc<dyn ResearchRepository>,
	synthesizer: Arc<dyn Synthesizer>,
	clock: Arc<dyn Clock>,
}
impl SynthesisService {
	pub fn new(
		repository: Arc<dyn ResearchRepository>,
		synthesizer: Arc<dyn Synthesizer>,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self { repository, synthesizer, clock }
	}

	pub async fn run(&self, research_id: &str) -> Result<(), SynthesisError> {
		let research = match self.repository.find_by_id(research_id).await {
			Ok(Some(research)) => research,
			Ok(None) => return Err(SynthesisError::new("Research not found")),
			Err(err) => {
				tracing::warn!(research_id, error = %err, "Failed to load research for synthesis.");

				return Err(SynthesisError::new("Research not found"));
			},
		};
		let inputs = synthesis_inputs(&research);

		if inputs.is_empty() {
			return Err(SynthesisError::new("No completed LLM results to synthesize"));
		}

		match self.synthesizer.synthesize(&research.prompt, &inputs).await {
			Ok(synthesized) => {
				let update = ResearchUpdate::synthesis_succeeded(
					synthesized,
					self.clock.now(),
					research.started_at,
				);

				self.repository.update(research_id, &update).await.map_err(|err| {
					SynthesisError::new(format!("Failed to save synthesis result: {err}"))
				})?;

				tracing::info!(research_id, inputs = inputs.len(), "Synthesis stored.");

				Ok(())
			},
			Err(err) => {
				let message = err.to_string();

				tracing::warn!(research_id, error = %message, "Synthesis failed.");

				let update = ResearchUpdate::synthesis_failed(message.clone());

				if let Err(err) = self.repository.update(research_id, &update).await {
					tracing::warn!(research_id, error = %err, "Failed to record synthesis error.");
				}

				Err(SynthesisError::new(message))
			},
		}
	}
}
impl SynthesisRunner for SynthesisService {
	fn run_synthesis<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<(), SynthesisError>> {
		Box::pin(self.run(research_id))
	}
}

/// Completed entries in `llm_results` order.
pub fn synthesis_inputs(research: &Research) -> Vec<SynthesisInput> {
	research
		.llm_results
		.iter()
		.filter(|entry| entry.status == LlmStatus::Completed)
		.filter_map(|entry| {
			entry.result.as_ref().map(|content| SynthesisInput {
				provider: entry.provider,
				model: entry.model.clone(),
				content: content.clone(),
			})
		})
		.collect()
}
