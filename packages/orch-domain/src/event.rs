use serde::{Deserialize, Serialize};

use crate::LlmProvider;

/// Dispatch request for a single provider call, consumed by the LLM worker queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "llm.call", rename_all = "camelCase")]
pub struct LlmCallEvent {
	pub research_id: String,
	pub user_id: String,
	pub provider: LlmProvider,
	pub prompt: String,
}
