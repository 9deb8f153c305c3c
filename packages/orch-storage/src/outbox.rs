use uuid::Uuid;

use crate::{Result, db::Db, models::LlmCallOutboxEntry};
use orch_domain::LlmCallEvent;

/// Queues an `llm.call` event for the external dispatcher and returns the outbox row ID.
pub async fn enqueue_llm_call(db: &Db, event: &LlmCallEvent) -> Result<Uuid> {
	let outbox_id = Uuid::new_v4();
	let payload = serde_json::to_value(event)?;

	sqlx::query(
		"INSERT INTO llm_call_outbox (outbox_id, research_id, provider, payload, status) VALUES ($1,$2,$3,$4,'PENDING')",
	)
	.bind(outbox_id)
	.bind(event.research_id.as_str())
	.bind(event.provider.as_str())
	.bind(payload)
	.execute(&db.pool)
	.await?;

	Ok(outbox_id)
}

pub async fn list_pending(db: &Db, research_id: &str) -> Result<Vec<LlmCallOutboxEntry>> {
	let rows = sqlx::query_as(
		"\
SELECT
	outbox_id,
	research_id,
	provider,
	payload,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM llm_call_outbox
WHERE research_id = $1 AND status = 'PENDING'
ORDER BY created_at, outbox_id",
	)
	.bind(research_id)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
