use std::sync::Arc;

use time::macros::datetime;

use orch_domain::{
	LlmProvider, LlmResult, LlmResultUpdate, LlmStatus, Patch, Research, ResearchStatus,
	ResearchUpdate, RetryAction,
};
use orch_service::{Error, Ports, ResearchService};
use orch_testkit::{
	FixedClock, MemoryResearchRepository, RecordingPublisher, RepositoryWrite, StubSynthesis,
};

struct Harness {
	repository: Arc<MemoryResearchRepository>,
	publisher: Arc<RecordingPublisher>,
	synthesis: Arc<StubSynthesis>,
	service: ResearchService,
}

fn harness(research: Research, synthesis: StubSynthesis) -> Harness {
	let repository = Arc::new(MemoryResearchRepository::with_research(research));
	let publisher = Arc::new(RecordingPublisher::observing(repository.clone()));
	let synthesis = Arc::new(synthesis);
	let ports = Ports::new(repository.clone(), publisher.clone(), synthesis.clone())
		.with_clock(Arc::new(FixedClock(datetime!(2024-01-01 12:00:00 UTC))));

	Harness { repository, publisher, synthesis, service: ResearchService::new(ports) }
}

fn google_done() -> LlmResult {
	LlmResult::completed(LlmProvider::Google, "gemini-2.0-flash", "Google Result")
}

fn openai_done() -> LlmResult {
	LlmResult::completed(LlmProvider::Openai, "o4-mini-deep-research", "OpenAI Result")
}

fn openai_failed(error: &str) -> LlmResult {
	LlmResult::failed(LlmProvider::Openai, "o4-mini-deep-research", error)
}

fn partially_failed() -> Research {
	orch_testkit::failed_research("research-1", vec![google_done(), openai_failed("Rate limit")])
}

fn stored(h: &Harness) -> Research {
	h.repository.get("research-1").expect("research must stay stored")
}

#[tokio::test]
async fn missing_research_is_not_found() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());
	let err = h.service.retry("nonexistent").await.expect_err("retry must fail");

	assert_eq!(err, Error::NotFound);
	assert_eq!(err.to_string(), "Research not found");
	assert!(h.publisher.events().is_empty());
}

#[tokio::test]
async fn repository_read_error_is_reported_as_not_found() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());

	h.repository.fail_reads("connection reset");

	let err = h.service.retry("research-1").await.expect_err("retry must fail");

	assert_eq!(err, Error::NotFound);
	assert!(h.repository.writes().is_empty());
}

#[tokio::test]
async fn non_failed_research_is_rejected_without_side_effects() {
	for status in [
		ResearchStatus::Pending,
		ResearchStatus::Processing,
		ResearchStatus::Retrying,
		ResearchStatus::Completed,
	] {
		let research = Research { status, ..partially_failed() };
		let h = harness(research.clone(), StubSynthesis::succeeding());
		let err = h.service.retry("research-1").await.expect_err("retry must fail");

		assert_eq!(err, Error::InvalidState { status });
		assert_eq!(
			err.to_string(),
			format!(
				"Cannot retry research with status: {status}. Only failed research can be retried."
			)
		);
		assert!(h.publisher.events().is_empty());
		assert!(h.repository.writes().is_empty());
		assert_eq!(stored(&h), research);
	}
}

#[tokio::test]
async fn failed_provider_is_reset_and_republished() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::RetryingLlms);
	assert_eq!(outcome.retried_providers, vec![LlmProvider::Openai]);
	assert_eq!(outcome.message, "Retrying 1 failed LLM provider");

	let research = stored(&h);
	let openai = research.llm_result(LlmProvider::Openai).expect("openai entry missing");

	assert_eq!(research.status, ResearchStatus::Retrying);
	assert_eq!(openai.status, LlmStatus::Pending);
	assert_eq!(openai.error, None);
	assert_eq!(openai.started_at, None);
	assert_eq!(openai.completed_at, None);
	assert_eq!(openai.duration_ms, None);
	assert_eq!(research.llm_result(LlmProvider::Google), Some(&google_done()));

	let events = h.publisher.events();

	assert_eq!(events.len(), 1);
	assert_eq!(events[0].research_id, "research-1");
	assert_eq!(events[0].user_id, "user-1");
	assert_eq!(events[0].provider, LlmProvider::Openai);
	assert_eq!(events[0].prompt, "What is the capital of France?");
	assert!(h.synthesis.calls().is_empty());
}

#[tokio::test]
async fn publish_failure_is_recorded_on_the_entry() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());

	h.publisher.fail_for(LlmProvider::Openai, "Failed to publish");

	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::RetryingLlms);
	assert_eq!(outcome.retried_providers, vec![LlmProvider::Openai]);

	let research = stored(&h);
	let openai = research.llm_result(LlmProvider::Openai).expect("openai entry missing");

	assert_eq!(openai.status, LlmStatus::Failed);
	assert_eq!(openai.error.as_deref(), Some("Failed to publish retry event: Failed to publish"));
}

#[tokio::test]
async fn all_failed_providers_are_retried_in_result_order() {
	let research = orch_testkit::failed_research(
		"research-1",
		vec![
			LlmResult::failed(LlmProvider::Google, "gemini-2.0-flash", "Error 1"),
			LlmResult::completed(LlmProvider::Anthropic, "claude", "Anthropic Result"),
			openai_failed("Error 2"),
		],
	);
	let h = harness(research, StubSynthesis::succeeding());

	h.publisher.fail_for(LlmProvider::Google, "queue unavailable");

	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.retried_providers, vec![LlmProvider::Google, LlmProvider::Openai]);
	assert_eq!(outcome.message, "Retrying 2 failed LLM providers");

	let providers = h.publisher.events().iter().map(|event| event.provider).collect::<Vec<_>>();

	assert_eq!(providers, vec![LlmProvider::Google, LlmProvider::Openai]);

	let research = stored(&h);

	assert_eq!(
		research.llm_result(LlmProvider::Google).and_then(|entry| entry.error.as_deref()),
		Some("Failed to publish retry event: queue unavailable")
	);
	assert_eq!(
		research.llm_result(LlmProvider::Openai).map(|entry| entry.status),
		Some(LlmStatus::Pending)
	);
}

#[tokio::test]
async fn every_reset_lands_before_the_first_publish() {
	let research = orch_testkit::failed_research(
		"research-1",
		vec![
			LlmResult::failed(LlmProvider::Google, "gemini-2.0-flash", "Error 1"),
			openai_failed("Error 2"),
		],
	);
	let h = harness(research, StubSynthesis::succeeding());

	h.service.retry("research-1").await.expect("retry failed");

	let snapshots = h.publisher.snapshots();

	assert_eq!(snapshots.len(), 2);

	for entry in &snapshots[0].llm_results {
		assert_eq!(entry.status, LlmStatus::Pending, "{} was not reset", entry.provider);
	}

	let writes = h.repository.writes();

	assert_eq!(
		writes[0],
		RepositoryWrite::Research {
			research_id: "research-1".to_string(),
			update: ResearchUpdate::status(ResearchStatus::Retrying),
		}
	);
	assert!(writes[1..].iter().all(|write| matches!(
		write,
		RepositoryWrite::LlmResult { update, .. } if *update == LlmResultUpdate::reset_pending()
	)));
}

#[tokio::test]
async fn write_failures_during_redispatch_do_not_abort() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());

	h.repository.fail_writes("store unavailable");

	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::RetryingLlms);
	assert_eq!(h.publisher.events().len(), 1);
}

#[tokio::test]
async fn pending_only_research_has_nothing_to_build_on() {
	let research = orch_testkit::failed_research(
		"research-1",
		vec![
			LlmResult::pending(LlmProvider::Google, "gemini-2.0-flash"),
			LlmResult::pending(LlmProvider::Openai, "o4-mini-deep-research"),
		],
	);
	let h = harness(research, StubSynthesis::succeeding());
	let err = h.service.retry("research-1").await.expect_err("retry must fail");

	assert_eq!(err, Error::NoSuccessfulResults);
	assert_eq!(err.to_string(), "No successful LLM results to work with. Cannot retry research.");
	assert!(h.repository.writes().is_empty());
	assert!(h.publisher.events().is_empty());
	assert!(h.synthesis.calls().is_empty());
}

#[tokio::test]
async fn missing_synthesis_is_rerun() {
	let research =
		orch_testkit::failed_research("research-1", vec![google_done(), openai_done()]);
	let h = harness(research, StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::SynthesisCompleted);
	assert_eq!(outcome.message, "Synthesis completed successfully");
	assert_eq!(h.synthesis.calls(), vec!["research-1".to_string()]);
	assert!(h.repository.writes().is_empty());
}

#[tokio::test]
async fn synthesis_error_triggers_rerun_even_with_a_result() {
	let research = Research {
		synthesized_result: Some("Old".to_string()),
		synthesis_error: Some("Timeout".to_string()),
		..orch_testkit::failed_research("research-1", vec![google_done()])
	};
	let h = harness(research, StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::SynthesisCompleted);
	assert_eq!(h.synthesis.calls().len(), 1);
}

#[tokio::test]
async fn synthesis_failure_passes_message_through() {
	let research =
		orch_testkit::failed_research("research-1", vec![google_done(), openai_done()]);
	let h = harness(research, StubSynthesis::failing(Some("Synthesizer quota exceeded")));
	let err = h.service.retry("research-1").await.expect_err("retry must fail");

	assert_eq!(err, Error::Synthesis { message: "Synthesizer quota exceeded".to_string() });
}

#[tokio::test]
async fn synthesis_failure_without_message_uses_default() {
	let research =
		orch_testkit::failed_research("research-1", vec![google_done(), openai_done()]);
	let h = harness(research, StubSynthesis::failing(None));
	let err = h.service.retry("research-1").await.expect_err("retry must fail");

	assert_eq!(err.to_string(), "Synthesis failed");
}

#[tokio::test]
async fn skipped_synthesis_is_finalized_with_duration() {
	let research = Research {
		skip_synthesis: Some(true),
		..orch_testkit::failed_research("research-1", vec![google_done()])
	};
	let h = harness(research, StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::SynthesisSkipped);
	assert_eq!(outcome.message, "Research completed (synthesis skipped)");
	assert!(h.synthesis.calls().is_empty());

	let research = stored(&h);

	assert_eq!(research.status, ResearchStatus::Completed);
	assert_eq!(research.completed_at, Some(datetime!(2024-01-01 12:00:00 UTC)));
	assert_eq!(research.total_duration_ms, Some(7_200_000));
}

#[tokio::test]
async fn existing_synthesis_is_finalized_and_stale_error_cleared() {
	let research = Research {
		synthesized_result: Some("Combined".to_string()),
		..orch_testkit::failed_research("research-1", vec![google_done(), openai_done()])
	};
	let h = harness(research, StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::AlreadyCompleted);
	assert_eq!(outcome.message, "Research was already completed");

	let writes = h.repository.writes();

	assert_eq!(writes.len(), 1);

	let RepositoryWrite::Research { update, .. } = &writes[0] else {
		panic!("Expected a research write, got {:?}.", writes[0]);
	};

	assert_eq!(update.synthesis_error, Patch::Clear);
	assert_eq!(stored(&h).synthesis_error, None);
	assert_eq!(stored(&h).synthesized_result.as_deref(), Some("Combined"));
}

#[tokio::test]
async fn skip_synthesis_drops_stale_synthesis_error() {
	let research = Research {
		skip_synthesis: Some(true),
		synthesis_error: Some("Old failure".to_string()),
		..orch_testkit::failed_research("research-1", vec![google_done()])
	};
	let h = harness(research, StubSynthesis::succeeding());
	let outcome = h.service.retry("research-1").await.expect("retry failed");

	assert_eq!(outcome.action, RetryAction::SynthesisSkipped);
	assert_eq!(stored(&h).status, ResearchStatus::Completed);
	assert_eq!(stored(&h).synthesis_error, None);
}

#[tokio::test]
async fn finalization_write_failure_is_a_storage_error() {
	let research = Research {
		skip_synthesis: Some(true),
		..orch_testkit::failed_research("research-1", vec![google_done()])
	};
	let h = harness(research, StubSynthesis::succeeding());

	h.repository.fail_writes("disk full");

	let err = h.service.retry("research-1").await.expect_err("retry must fail");

	assert_eq!(err, Error::Storage { message: "disk full".to_string() });
}

#[test]
fn outcome_serializes_with_ok_flag() {
	let h = harness(partially_failed(), StubSynthesis::succeeding());
	let rt = tokio::runtime::Runtime::new().expect("Failed to build runtime.");
	let outcome = rt.block_on(h.service.retry("research-1")).expect("retry failed");

	assert_eq!(
		serde_json::to_value(&outcome).expect("serialize failed"),
		serde_json::json!({
			"ok": true,
			"action": "retrying_llms",
			"retriedProviders": ["openai"],
			"message": "Retrying 1 failed LLM provider",
		})
	);

	let finished = Research {
		synthesized_result: Some("Combined".to_string()),
		..orch_testkit::failed_research("research-2", vec![google_done()])
	};

	h.repository.insert(finished);

	let outcome = rt.block_on(h.service.retry("research-2")).expect("retry failed");

	assert_eq!(
		serde_json::to_value(&outcome).expect("serialize failed"),
		serde_json::json!({
			"ok": true,
			"action": "already_completed",
			"message": "Research was already completed",
		})
	);
}
