use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::Result;
use orch_domain::{LlmProvider, LlmResult, Research};

#[derive(Debug, sqlx::FromRow)]
pub struct ResearchRow {
	pub research_id: String,
	pub user_id: String,
	pub title: String,
	pub prompt: String,
	pub status: String,
	pub selected_llms: Vec<String>,
	pub synthesis_llm: String,
	pub synthesized_result: Option<String>,
	pub synthesis_error: Option<String>,
	pub skip_synthesis: Option<bool>,
	pub started_at: OffsetDateTime,
	pub completed_at: Option<OffsetDateTime>,
	pub total_duration_ms: Option<i64>,
}
impl ResearchRow {
	pub fn into_research(self, results: Vec<LlmResultRow>) -> Result<Research> {
		let selected_llms = self
			.selected_llms
			.iter()
			.map(|provider| provider.parse::<LlmProvider>())
			.collect::<Result<Vec<_>, _>>()?;
		let llm_results =
			results.into_iter().map(LlmResultRow::into_llm_result).collect::<Result<Vec<_>>>()?;

		Ok(Research {
			id: self.research_id,
			user_id: self.user_id,
			title: self.title,
			prompt: self.prompt,
			status: self.status.parse()?,
			selected_llms,
			synthesis_llm: self.synthesis_llm.parse()?,
			llm_results,
			synthesized_result: self.synthesized_result,
			synthesis_error: self.synthesis_error,
			skip_synthesis: self.skip_synthesis,
			started_at: self.started_at,
			completed_at: self.completed_at,
			total_duration_ms: self.total_duration_ms,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct LlmResultRow {
	pub research_id: String,
	pub provider: String,
	pub position: i32,
	pub model: String,
	pub status: String,
	pub result: Option<String>,
	pub error: Option<String>,
	pub started_at: Option<OffsetDateTime>,
	pub completed_at: Option<OffsetDateTime>,
	pub duration_ms: Option<i64>,
}
impl LlmResultRow {
	pub fn into_llm_result(self) -> Result<LlmResult> {
		Ok(LlmResult {
			provider: self.provider.parse()?,
			model: self.model,
			status: self.status.parse()?,
			result: self.result,
			error: self.error,
			started_at: self.started_at,
			completed_at: self.completed_at,
			duration_ms: self.duration_ms,
		})
	}
}

#[derive(Debug, sqlx::FromRow)]
pub struct LlmCallOutboxEntry {
	pub outbox_id: Uuid,
	pub research_id: String,
	pub provider: String,
	pub payload: Value,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
