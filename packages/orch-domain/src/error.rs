use crate::{LlmProvider, LlmStatus, ResearchStatus};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown {kind}: {value}.")]
pub struct ParseEnumError {
	pub kind: &'static str,
	pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvariantError {
	#[error("Cannot move research from {from} to {to}.")]
	IllegalTransition { from: ResearchStatus, to: ResearchStatus },
	#[error("Completed research must not carry a synthesis error.")]
	CompletedWithSynthesisError,
	#[error("Research has no LLM result for provider {provider}.")]
	UnknownProvider { provider: LlmProvider },
	#[error("Research has more than one LLM result for provider {provider}.")]
	DuplicateProvider { provider: LlmProvider },
	#[error("LLM result for {provider} is inconsistent with status {status}.")]
	InconsistentLlmResult { provider: LlmProvider, status: LlmStatus },
}
