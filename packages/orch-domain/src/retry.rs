use serde::{Deserialize, Serialize};

use crate::{LlmProvider, LlmStatus, Research};

/// Which reconciliation step a retry performed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryAction {
	RetryingLlms,
	SynthesisCompleted,
	AlreadyCompleted,
	SynthesisSkipped,
}
impl RetryAction {
	pub const fn as_str(self) -> &'static str {
		match self {
			Self::RetryingLlms => "retrying_llms",
			Self::SynthesisCompleted => "synthesis_completed",
			Self::AlreadyCompleted => "already_completed",
			Self::SynthesisSkipped => "synthesis_skipped",
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryAnalysis {
	pub failed_llms: Vec<LlmProvider>,
	pub successful_llms: Vec<LlmProvider>,
	pub has_synthesis_result: bool,
	pub has_synthesis_error: bool,
}
impl RetryAnalysis {
	pub fn needs_synthesis(&self, skip_synthesis: bool) -> bool {
		!skip_synthesis && (!self.has_synthesis_result || self.has_synthesis_error)
	}
}

/// Splits provider results into failed and completed, keeping the order of `llm_results`.
/// Pending entries are still in flight and land in neither list.
pub fn analyze(research: &Research) -> RetryAnalysis {
	let mut failed_llms = Vec::new();
	let mut successful_llms = Vec::new();

	for entry in &research.llm_results {
		match entry.status {
			LlmStatus::Failed => failed_llms.push(entry.provider),
			LlmStatus::Completed => successful_llms.push(entry.provider),
			LlmStatus::Pending => {},
		}
	}

	RetryAnalysis {
		failed_llms,
		successful_llms,
		has_synthesis_result: research.synthesized_result.is_some(),
		has_synthesis_error: research.synthesis_error.is_some(),
	}
}

pub fn retry_message(count: usize) -> String {
	let noun = if count == 1 { "provider" } else { "providers" };

	format!("Retrying {count} failed LLM {noun}")
}
