use sqlx::PgConnection;

use crate::{
	Error, Result,
	db::Db,
	models::{LlmResultRow, ResearchRow},
};
use orch_domain::{LlmProvider, LlmResult, LlmResultUpdate, Research, ResearchUpdate};

const SELECT_RESEARCH: &str = "\
SELECT
	research_id,
	user_id,
	title,
	prompt,
	status,
	selected_llms,
	synthesis_llm,
	synthesized_result,
	synthesis_error,
	skip_synthesis,
	started_at,
	completed_at,
	total_duration_ms
FROM research
WHERE research_id = $1";
const SELECT_LLM_RESULTS: &str = "\
SELECT
	research_id,
	provider,
	position,
	model,
	status,
	result,
	error,
	started_at,
	completed_at,
	duration_ms
FROM research_llm_results
WHERE research_id = $1
ORDER BY position";

pub async fn insert_research(db: &Db, research: &Research) -> Result<()> {
	research.validate()?;

	let mut tx = db.pool.begin().await?;
	let selected_llms =
		research.selected_llms.iter().map(|provider| provider.to_string()).collect::<Vec<_>>();

	sqlx::query(
		"\
INSERT INTO research (
	research_id,
	user_id,
	title,
	prompt,
	status,
	selected_llms,
	synthesis_llm,
	synthesized_result,
	synthesis_error,
	skip_synthesis,
	started_at,
	completed_at,
	total_duration_ms
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)",
	)
	.bind(research.id.as_str())
	.bind(research.user_id.as_str())
	.bind(research.title.as_str())
	.bind(research.prompt.as_str())
	.bind(research.status.as_str())
	.bind(selected_llms)
	.bind(research.synthesis_llm.as_str())
	.bind(research.synthesized_result.as_deref())
	.bind(research.synthesis_error.as_deref())
	.bind(research.skip_synthesis)
	.bind(research.started_at)
	.bind(research.completed_at)
	.bind(research.total_duration_ms)
	.execute(&mut *tx)
	.await?;

	for (position, entry) in research.llm_results.iter().enumerate() {
		let position = i32::try_from(position).map_err(|_| {
			Error::InvalidArgument("Research has too many LLM results.".to_string())
		})?;

		sqlx::query(
			"\
INSERT INTO research_llm_results (
	research_id,
	provider,
	position,
	model,
	status,
	result,
	error,
	started_at,
	completed_at,
	duration_ms
)
VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10)",
		)
		.bind(research.id.as_str())
		.bind(entry.provider.as_str())
		.bind(position)
		.bind(entry.model.as_str())
		.bind(entry.status.as_str())
		.bind(entry.result.as_deref())
		.bind(entry.error.as_deref())
		.bind(entry.started_at)
		.bind(entry.completed_at)
		.bind(entry.duration_ms)
		.execute(&mut *tx)
		.await?;
	}

	tx.commit().await?;

	Ok(())
}

pub async fn find_research(db: &Db, research_id: &str) -> Result<Option<Research>> {
	let mut conn = db.pool.acquire().await?;

	load_research(&mut conn, research_id, false).await
}

/// Loads the record under a row lock, applies the patch through the domain state machine, and
/// writes the result back in one transaction.
pub async fn update_research(db: &Db, research_id: &str, update: &ResearchUpdate) -> Result<()> {
	let mut tx = db.pool.begin().await?;
	let mut research = load_research(&mut tx, research_id, true)
		.await?
		.ok_or_else(|| Error::NotFound(format!("research {research_id}")))?;

	research.apply(update)?;

	sqlx::query(
		"\
UPDATE research
SET
	status = $1,
	synthesized_result = $2,
	synthesis_error = $3,
	completed_at = $4,
	total_duration_ms = $5,
	updated_at = now()
WHERE research_id = $6",
	)
	.bind(research.status.as_str())
	.bind(research.synthesized_result.as_deref())
	.bind(research.synthesis_error.as_deref())
	.bind(research.completed_at)
	.bind(research.total_duration_ms)
	.bind(research_id)
	.execute(&mut *tx)
	.await?;

	tx.commit().await?;

	Ok(())
}

pub async fn update_llm_result(
	db: &Db,
	research_id: &str,
	provider: LlmProvider,
	update: &LlmResultUpdate,
) -> Result<()> {
	let mut tx = db.pool.begin().await?;
	let mut research = load_research(&mut tx, research_id, true)
		.await?
		.ok_or_else(|| Error::NotFound(format!("research {research_id}")))?;

	research.apply_llm_result(provider, update)?;

	let Some(entry) = research.llm_result(provider) else {
		return Err(Error::NotFound(format!("LLM result {provider} for research {research_id}")));
	};

	write_llm_result(&mut tx, research_id, entry).await?;

	sqlx::query("UPDATE research SET updated_at = now() WHERE research_id = $1")
		.bind(research_id)
		.execute(&mut *tx)
		.await?;

	tx.commit().await?;

	Ok(())
}

async fn load_research(
	conn: &mut PgConnection,
	research_id: &str,
	for_update: bool,
) -> Result<Option<Research>> {
	let sql = if for_update {
		format!("{SELECT_RESEARCH}\nFOR UPDATE")
	} else {
		SELECT_RESEARCH.to_string()
	};
	let row: Option<ResearchRow> =
		sqlx::query_as(&sql).bind(research_id).fetch_optional(&mut *conn).await?;
	let Some(row) = row else {
		return Ok(None);
	};
	let results: Vec<LlmResultRow> =
		sqlx::query_as(SELECT_LLM_RESULTS).bind(research_id).fetch_all(&mut *conn).await?;

	Ok(Some(row.into_research(results)?))
}

async fn write_llm_result(
	conn: &mut PgConnection,
	research_id: &str,
	entry: &LlmResult,
) -> Result<()> {
	sqlx::query(
		"\
UPDATE research_llm_results
SET
	status = $1,
	result = $2,
	error = $3,
	started_at = $4,
	completed_at = $5,
	duration_ms = $6
WHERE research_id = $7 AND provider = $8",
	)
	.bind(entry.status.as_str())
	.bind(entry.result.as_deref())
	.bind(entry.error.as_deref())
	.bind(entry.started_at)
	.bind(entry.completed_at)
	.bind(entry.duration_ms)
	.bind(research_id)
	.bind(entry.provider.as_str())
	.execute(&mut *conn)
	.await?;

	Ok(())
}
