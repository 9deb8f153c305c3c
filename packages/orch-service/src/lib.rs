pub mod adapters;
pub mod retry;
pub mod synthesis;

mod error;

pub use adapters::{
	DefaultSynthesizer, OutboxLlmCallPublisher, StoreResearchRepository, SystemClock,
};
pub use error::{Error, Result};
pub use orch_providers::synthesizer::SynthesisInput;
pub use retry::RetryOutcome;
pub use synthesis::SynthesisService;

use std::{future::Future, pin::Pin, sync::Arc};

use time::OffsetDateTime;

use orch_domain::{LlmCallEvent, LlmProvider, LlmResultUpdate, Research, ResearchUpdate};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ResearchRepository
where
	Self: Send + Sync,
{
	fn find_by_id<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<Option<Research>, RepositoryError>>;

	fn update<'a>(
		&'a self,
		research_id: &'a str,
		update: &'a ResearchUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>>;

	fn update_llm_result<'a>(
		&'a self,
		research_id: &'a str,
		provider: LlmProvider,
		update: &'a LlmResultUpdate,
	) -> BoxFuture<'a, Result<(), RepositoryError>>;
}

pub trait LlmCallPublisher
where
	Self: Send + Sync,
{
	fn publish_llm_call<'a>(
		&'a self,
		event: &'a LlmCallEvent,
	) -> BoxFuture<'a, Result<(), PublishError>>;
}

/// Produces and persists the combined report for a research record.
pub trait SynthesisRunner
where
	Self: Send + Sync,
{
	fn run_synthesis<'a>(
		&'a self,
		research_id: &'a str,
	) -> BoxFuture<'a, Result<(), SynthesisError>>;
}

pub trait Synthesizer
where
	Self: Send + Sync,
{
	fn synthesize<'a>(
		&'a self,
		prompt: &'a str,
		inputs: &'a [SynthesisInput],
	) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait Clock
where
	Self: Send + Sync,
{
	fn now(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RepositoryError {
	pub message: String,
}
impl RepositoryError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { message: message.into() }
	}
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct PublishError {
	pub code: Option<String>,
	pub message: String,
}
impl PublishError {
	pub fn new(message: impl Into<String>) -> Self {
		Self { code: None, message: message.into() }
	}
}

/// A runner failure. The message is optional; callers fall back to "Synthesis failed".
#[derive(Debug, Clone, Default, PartialEq, Eq, thiserror::Error)]
#[error("{}", .message.as_deref().unwrap_or(SynthesisError::DEFAULT_MESSAGE))]
pub struct SynthesisError {
	pub message: Option<String>,
}
impl SynthesisError {
	pub const DEFAULT_MESSAGE: &'static str = "Synthesis failed";

	pub fn new(message: impl Into<String>) -> Self {
		Self { message: Some(message.into()) }
	}
}

#[derive(Clone)]
pub struct Ports {
	pub repository: Arc<dyn ResearchRepository>,
	pub publisher: Arc<dyn LlmCallPublisher>,
	pub synthesis: Arc<dyn SynthesisRunner>,
	pub clock: Arc<dyn Clock>,
}
impl Ports {
	pub fn new(
		repository: Arc<dyn ResearchRepository>,
		publisher: Arc<dyn LlmCallPublisher>,
		synthesis: Arc<dyn SynthesisRunner>,
	) -> Self {
		Self { repository, publisher, synthesis, clock: Arc::new(SystemClock) }
	}

	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}
}

pub struct ResearchService {
	pub ports: Ports,
}
impl ResearchService {
	pub fn new(ports: Ports) -> Self {
		Self { ports }
	}
}
