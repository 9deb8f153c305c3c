//! In-memory port implementations for service and API tests.

use std::{
	collections::HashMap,
	sync::{Arc, Mutex, MutexGuard},
};

use time::OffsetDateTime;

use orch_domain::{LlmCallEvent, LlmProvider, LlmResultUpdate, Research, ResearchUpdate};
use orch_service::{
	BoxFuture, Clock, LlmCallPublisher, PublishError, RepositoryError, ResearchRepository,
	SynthesisError, SynthesisInput, SynthesisRunner, Synthesizer,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryWrite {
	Research { research_id: String, update: ResearchUpdate },
	LlmResult { research_id: String, provider: LlmProvider, update: LlmResultUpdate },
}

/// Research store backed by a map. Updates go through the domain state machine, so a rejected
/// transition surfaces as a `RepositoryError` the same way the Postgres adapter reports it.
#[derive(Default)]
pub struct MemoryResearchRepository {
	records: Mutex<HashMap<String, Research>>,
	writes: Mutex<Vec<RepositoryWrite>>,
	read_error: Mutex<Option<String>>,
	write_error: Mutex<Option<String>>,
}
impl MemoryResearchRepository {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_research(research: Research) -> Self {
		let repository = Self::new();

		repository.insert(research);

		repository
	}

	pub fn insert(&self, research: Research) {
		lock(&self.records).insert(research.id.clone(), research);
	}

	pub fn get(&self, research_id: &str) -> Option<Research> {
		lock(&self.records).get(research_id).cloned()
	}

	/// Every write attempt in call order, including rejected ones.
	pub fn writes(&self) -> Vec<RepositoryWrite> {
		lock(&self.writes).clone()
	}

	pub fn fail_reads(&self, message: &str) {
		*lock(&self.read_error) = Some(message.to_string());
	}

	pub fn fail_writes(&self, message: &str) {
		*lock(&self.write_error) = Some(message.to_string());
	}

	fn write_error(&self) -> Result<(), RepositoryError> {
		match lock(&self.write_error).as_ref() {
			Some(message) => Err(RepositoryError::new(message.clone())),
			None => Ok(()),
		}
	}
}
impl ResearchRepository for MemoryResearchRepository {
	fn find_by_id<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<Option<Research>, RepositoryError>> {
		Box::pin(async move {
			if let Some(message) = lock(&self.read_error).as_ref() {
				return Err(RepositoryError::new(message.clone()));
			}

			Ok(self.get(research_id))
		})
	}

	fn update<'a>(
		&'a self,
		research_id: &'a str,
		update: &'a ResearchUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>> {
		Box::pin(async move {
			lock(&self.writes).push(RepositoryWrite::Research {
				research_id: research_id.to_string(),
				update: update.clone(),
			});
			self.write_error()?;

			let mut records = lock(&self.records);
			let research = records
				.get_mut(research_id)
				.ok_or_else(|| RepositoryError::new(format!("Research {research_id} not found.")))?;

			research.apply(update).map_err(|err| RepositoryError::new(err.to_string()))
		})
	}

	fn update_llm_result<'a>(
		&'a self,
		research_id: &'a str,
		provider: LlmProvider,
		update: &'a LlmResultUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>> {
		Box::pin(async move {
			lock(&self.writes).push(RepositoryWrite::LlmResult {
				research_id: research_id.to_string(),
				provider,
				update: update.clone(),
			});
			self.write_error()?;

			let mut records = lock(&self.records);
			let research = records
				.get_mut(research_id)
				.ok_or_else(|| RepositoryError::new(format!("Research {research_id} not found.")))?;

			research
				.apply_llm_result(provider, update)
				.map_err(|err| RepositoryError::new(err.to_string()))
		})
	}
}

/// Records published events. When built with [`RecordingPublisher::observing`], it also
/// snapshots the research record at the moment of each publish.
#[derive(Default)]
pub struct RecordingPublisher {
	events: Mutex<Vec<LlmCallEvent>>,
	failures: Mutex<HashMap<LlmProvider, String>>,
	observed: Option<Arc<MemoryResearchRepository>>,
	snapshots: Mutex<Vec<Research>>,
}
impl RecordingPublisher {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn observing(repository: Arc<MemoryResearchRepository>) -> Self {
		Self { observed: Some(repository), ..Self::default() }
	}

	pub fn fail_for(&self, provider: LlmProvider, message: &str) {
		lock(&self.failures).insert(provider, message.to_string());
	}

	pub fn events(&self) -> Vec<LlmCallEvent> {
		lock(&self.events).clone()
	}

	pub fn snapshots(&self) -> Vec<Research> {
		lock(&self.snapshots).clone()
	}
}
impl LlmCallPublisher for RecordingPublisher {
	fn publish_llm_call<'a>(
		&'a self,
		event: &'a LlmCallEvent,
	) -> BoxFuture<'a, Result<(), PublishError>> {
		Box::pin(async move {
			if let Some(snapshot) =
				self.observed.as_ref().and_then(|repository| repository.get(&event.research_id))
			{
				lock(&self.snapshots).push(snapshot);
			}

			lock(&self.events).push(event.clone());

			match lock(&self.failures).get(&event.provider) {
				Some(message) => Err(PublishError::new(message.clone())),
				None => Ok(()),
			}
		})
	}
}

pub struct StubSynthesis {
	outcome: Result<(), SynthesisError>,
	calls: Mutex<Vec<String>>,
}
impl StubSynthesis {
	pub fn succeeding() -> Self {
		Self { outcome: Ok(()), calls: Mutex::new(Vec::new()) }
	}

	pub fn failing(message: Option<&str>) -> Self {
		Self {
			outcome: Err(SynthesisError { message: message.map(str::to_string) }),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn calls(&self) -> Vec<String> {
		lock(&self.calls).clone()
	}
}
impl SynthesisRunner for StubSynthesis {
	fn run_synthesis<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<(), SynthesisError>> {
		Box::pin(async move {
			lock(&self.calls).push(research_id.to_string());

			self.outcome.clone()
		})
	}
}

pub struct StubSynthesizer {
	reply: Result<String, String>,
	calls: Mutex<Vec<(String, Vec<SynthesisInput>)>>,
}
impl StubSynthesizer {
	pub fn replying(text: &str) -> Self {
		Self { reply: Ok(text.to_string()), calls: Mutex::new(Vec::new()) }
	}

	pub fn failing(message: &str) -> Self {
		Self { reply: Err(message.to_string()), calls: Mutex::new(Vec::new()) }
	}

	pub fn calls(&self) -> Vec<(String, Vec<SynthesisInput>)> {
		lock(&self.calls).clone()
	}
}
impl Synthesizer for StubSynthesizer {
	fn synthesize<'a>(
		&'a self,
		prompt: &'a str,
		inputs: &'a [SynthesisInput],
	) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(async move {
			lock(&self.calls).push((prompt.to_string(), inputs.to_vec()));

			self.reply.clone().map_err(|message| color_eyre::eyre::eyre!(message))
		})
	}
}

pub struct FixedClock(pub OffsetDateTime);
impl Clock for FixedClock {
	fn now(&self) -> OffsetDateTime {
		self.0
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}
