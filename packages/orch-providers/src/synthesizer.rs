use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::{Error, Result};
use orch_config::LlmProviderConfig;
use orch_domain::LlmProvider;

const MAX_ATTEMPTS: usize = 3;
const DEFAULT_SYSTEM_PROMPT: &str = "\
You combine independent deep research reports on the same question into one consolidated report. \
Keep every well-supported finding, reconcile contradictions explicitly, and attribute claims to \
the provider that made them when they disagree. Answer in Markdown.";

/// One completed provider output fed into synthesis.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisInput {
	pub provider: LlmProvider,
	pub model: String,
	pub content: String,
}

pub async fn synthesize(
	cfg: &LlmProviderConfig,
	prompt: &str,
	inputs: &[SynthesisInput],
) -> Result<String> {
	if inputs.is_empty() {
		return Err(Error::InvalidConfig {
			message: "Synthesis requires at least one provider result.".to_string(),
		});
	}

	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": build_messages(cfg, prompt, inputs),
	});

	for attempt in 1..=MAX_ATTEMPTS {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_synthesis_content(&json) {
			Ok(content) => return Ok(content),
			Err(err) => {
				tracing::warn!(attempt, error = %err, "Synthesizer returned unusable content.");
			},
		}
	}

	Err(Error::InvalidResponse {
		message: format!("Synthesizer returned no content after {MAX_ATTEMPTS} attempts."),
	})
}

pub fn build_messages(
	cfg: &LlmProviderConfig,
	prompt: &str,
	inputs: &[SynthesisInput],
) -> Vec<Value> {
	let system = cfg.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT);
	let mut user = format!("Research question:\n{prompt}\n");

	for input in inputs {
		user.push_str(&format!(
			"\n## Report from {} ({})\n\n{}\n",
			input.provider,
			input.model,
			input.content.trim()
		));
	}

	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

fn parse_synthesis_content(json: &Value) -> Result<String> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Synthesizer response is missing message content.".to_string(),
		})?;

	if content.trim().is_empty() {
		return Err(Error::InvalidResponse {
			message: "Synthesizer response content is empty.".to_string(),
		});
	}

	Ok(content.trim().to_string())
}

#[cfg(test)]
mod tests {
	use serde_json::Map;

	use super::*;

	fn cfg(system_prompt: Option<&str>) -> LlmProviderConfig {
		LlmProviderConfig {
			provider_id: "p".to_string(),
			api_base: "http://localhost".to_string(),
			api_key: "key".to_string(),
			path: "/v1/chat/completions".to_string(),
			model: "m".to_string(),
			temperature: 0.2,
			timeout_ms: 1_000,
			default_headers: Map::new(),
			system_prompt: system_prompt.map(str::to_string),
		}
	}

	#[test]
	fn parses_choice_content() {
		let json = serde_json::json!({
			"choices": [
				{ "message": { "content": "  Combined report\n" } }
			]
		});

		assert_eq!(parse_synthesis_content(&json).expect("parse failed"), "Combined report");
	}

	#[test]
	fn rejects_blank_or_missing_content() {
		let blank = serde_json::json!({ "choices": [{ "message": { "content": "   " } }] });

		assert!(parse_synthesis_content(&blank).is_err());
		assert!(parse_synthesis_content(&serde_json::json!({ "choices": [] })).is_err());
	}

	#[test]
	fn messages_include_every_report() {
		let inputs = vec![
			SynthesisInput {
				provider: LlmProvider::Google,
				model: "gemini-2.0-flash".to_string(),
				content: "Google Result".to_string(),
			},
			SynthesisInput {
				provider: LlmProvider::Openai,
				model: "o4-mini-deep-research".to_string(),
				content: "OpenAI Result".to_string(),
			},
		];
		let messages = build_messages(&cfg(Some("Be brief.")), "What is Rust?", &inputs);

		assert_eq!(messages.len(), 2);
		assert_eq!(messages[0]["content"], "Be brief.");

		let user = messages[1]["content"].as_str().expect("user content must be a string");

		assert!(user.starts_with("Research question:\nWhat is Rust?\n"));
		assert!(user.contains("## Report from google (gemini-2.0-flash)\n\nGoogle Result"));
		assert!(user.contains("## Report from openai (o4-mini-deep-research)\n\nOpenAI Result"));
	}

	#[test]
	fn falls_back_to_default_system_prompt() {
		let messages = build_messages(&cfg(None), "q", &[]);

		assert_eq!(messages[0]["content"], DEFAULT_SYSTEM_PROMPT);
	}
}
