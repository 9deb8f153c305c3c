use std::sync::Arc;

use time::OffsetDateTime;

use crate::{
	BoxFuture, Clock, LlmCallPublisher, Ports, PublishError, RepositoryError, ResearchRepository,
	ResearchService, SynthesisInput, SynthesisService, Synthesizer,
};
use orch_config::{Config, LlmProviderConfig};
use orch_domain::{LlmCallEvent, LlmProvider, LlmResultUpdate, Research, ResearchUpdate};
use orch_providers::synthesizer;
use orch_storage::{db::Db, outbox, research};

pub struct StoreResearchRepository {
	db: Arc<Db>,
}
impl StoreResearchRepository {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl ResearchRepository for StoreResearchRepository {
	fn find_by_id<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<Option<Research>, RepositoryError>> {
		Box::pin(async move { Ok(research::find_research(&self.db, research_id).await?) })
	}

	fn update<'a>(
		&'a self,
		research_id: &'a str,
		update: &'a ResearchUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>> {
		Box::pin(async move { Ok(research::update_research(&self.db, research_id, update).await?) })
	}

	fn update_llm_result<'a>(
		&'a self,
		research_id: &'a str,
		provider: LlmProvider,
		update: &'a LlmResultUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>> {
		Box::pin(async move {
			Ok(research::update_llm_result(&self.db, research_id, provider, update).await?)
		})
	}
}

/// Publishes `llm.call` events by writing them to the outbox table.
pub struct OutboxLlmCallPublisher {
	db: Arc<Db>,
}
impl OutboxLlmCallPublisher {
	pub fn new(db: Arc<Db>) -> Self {
		Self { db }
	}
}
impl LlmCallPublisher for OutboxLlmCallPublisher {
	fn publish_llm_call<'a>(
		&'a self,
		event: &'a LlmCallEvent,
	) -> BoxFuture<'a, Result<(), PublishError>> {
		Box::pin(async move {
			let outbox_id = outbox::enqueue_llm_call(&self.db, event).await.map_err(|err| {
				PublishError { code: Some("OUTBOX_WRITE_FAILED".to_string()), message: err.to_string() }
			})?;

			tracing::debug!(
				research_id = event.research_id.as_str(),
				provider = event.provider.as_str(),
				%outbox_id,
				"LLM call enqueued."
			);

			Ok(())
		})
	}
}

pub struct DefaultSynthesizer {
	cfg: LlmProviderConfig,
}
impl DefaultSynthesizer {
	pub fn new(cfg: LlmProviderConfig) -> Self {
		Self { cfg }
	}
}
impl Synthesizer for DefaultSynthesizer {
	fn synthesize<'a>(
		&'a self,
		prompt: &'a str,
		inputs: &'a [SynthesisInput],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move { Ok(synthesizer::synthesize(&self.cfg, prompt, inputs).await?) })
	}
}

pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

impl From<orch_storage::Error> for RepositoryError {
	fn from(err: orch_storage::Error) -> Self {
		Self { message: err.to_string() }
	}
}

impl Ports {
	/// Wires every port to Postgres and the configured synthesizer.
	pub fn postgres(cfg: &Config, db: Arc<Db>) -> Self {
		let repository: Arc<dyn ResearchRepository> =
			Arc::new(StoreResearchRepository::new(db.clone()));
		let clock: Arc<dyn Clock> = Arc::new(SystemClock);
		let synthesizer: Arc<dyn Synthesizer> =
			Arc::new(DefaultSynthesizer::new(cfg.providers.synthesizer.clone()));
		let synthesis = Arc::new(SynthesisService::new(repository.clone(), synthesizer, clock.clone()));

		Self { repository, publisher: Arc::new(OutboxLlmCallPublisher::new(db)), synthesis, clock }
	}
}

impl ResearchService {
	pub fn postgres(cfg: &Config, db: Db) -> Self {
		Self::new(Ports::postgres(cfg, Arc::new(db)))
	}
}
