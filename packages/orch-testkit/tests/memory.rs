use orch_domain::{LlmProvider, LlmResult, LlmResultUpdate, ResearchStatus, ResearchUpdate};
use orch_service::{LlmCallPublisher, ResearchRepository};
use orch_testkit::{MemoryResearchRepository, RecordingPublisher, RepositoryWrite};

fn repository() -> MemoryResearchRepository {
	MemoryResearchRepository::with_research(orch_testkit::failed_research(
		"research-1",
		vec![LlmResult::failed(LlmProvider::Google, "gemini-2.0-flash", "Error")],
	))
}

#[tokio::test]
async fn illegal_transition_is_rejected_and_recorded() {
	let repository = repository();
	let update = ResearchUpdate::status(ResearchStatus::Processing);
	let err = repository.update("research-1", &update).await.expect_err("update must fail");

	assert!(err.message.contains("failed"), "unexpected error: {err}");
	assert_eq!(
		repository.get("research-1").map(|research| research.status),
		Some(ResearchStatus::Failed)
	);
	assert_eq!(
		repository.writes(),
		vec![RepositoryWrite::Research { research_id: "research-1".to_string(), update }]
	);
}

#[tokio::test]
async fn unknown_provider_update_is_rejected() {
	let repository = repository();
	let err = repository
		.update_llm_result("research-1", LlmProvider::Anthropic, &LlmResultUpdate::reset_pending())
		.await
		.expect_err("update must fail");

	assert!(err.message.contains("anthropic"), "unexpected error: {err}");
}

#[tokio::test]
async fn read_failures_surface_as_errors() {
	let repository = repository();

	repository.fail_reads("connection reset");

	let err = repository.find_by_id("research-1").await.expect_err("read must fail");

	assert_eq!(err.message, "connection reset");
}

#[tokio::test]
async fn publisher_fails_only_configured_providers() {
	let publisher = RecordingPublisher::new();

	publisher.fail_for(LlmProvider::Openai, "queue down");

	let mut event = orch_domain::LlmCallEvent {
		research_id: "research-1".to_string(),
		user_id: "user-1".to_string(),
		provider: LlmProvider::Google,
		prompt: "p".to_string(),
	};

	publisher.publish_llm_call(&event).await.expect("google publish must succeed");

	event.provider = LlmProvider::Openai;

	let err = publisher.publish_llm_call(&event).await.expect_err("openai publish must fail");

	assert_eq!(err.message, "queue down");
	assert_eq!(publisher.events().len(), 2);
}
