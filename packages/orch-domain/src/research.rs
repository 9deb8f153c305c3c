use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{InvariantError, LlmProvider, ParseEnumError};

/// Lifecycle of a research request.
///
/// ```text
/// pending    → processing | failed
/// processing → completed | failed
/// failed     → retrying | completed
/// retrying   → processing | completed | failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResearchStatus {
	Pending,
	Processing,
	Retrying,
	Completed,
	Failed,
}
impl ResearchStatus {
	pub const ALL: [Self; 5] =
		[Self::Pending, Self::Processing, Self::Retrying, Self::Completed, Self::Failed];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Processing => "processing",
			Self::Retrying => "retrying",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub const fn allowed_next_states(self) -> &'static [Self] {
		match self {
			Self::Pending => &[Self::Processing, Self::Failed],
			Self::Processing => &[Self::Completed, Self::Failed],
			Self::Retrying => &[Self::Processing, Self::Completed, Self::Failed],
			Self::Failed => &[Self::Retrying, Self::Completed],
			Self::Completed => &[],
		}
	}

	/// Writing the current status again is always allowed.
	pub fn can_transition_to(self, next: Self) -> bool {
		self == next || self.allowed_next_states().contains(&next)
	}

	pub const fn is_terminal(self) -> bool {
		matches!(self, Self::Completed)
	}
}
impl fmt::Display for ResearchStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for ResearchStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| ParseEnumError { kind: "research status", value: s.to_string() })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmStatus {
	Pending,
	Completed,
	Failed,
}
impl LlmStatus {
	pub const ALL: [Self; 3] = [Self::Pending, Self::Completed, Self::Failed];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}
}
impl fmt::Display for LlmStatus {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for LlmStatus {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|status| status.as_str() == s)
			.ok_or_else(|| ParseEnumError { kind: "LLM result status", value: s.to_string() })
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmResult {
	pub provider: LlmProvider,
	pub model: String,
	pub status: LlmStatus,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub result: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
	#[serde(
		default,
		with = "crate::time_serde::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub started_at: Option<OffsetDateTime>,
	#[serde(
		default,
		with = "crate::time_serde::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub duration_ms: Option<i64>,
}
impl LlmResult {
	pub fn pending(provider: LlmProvider, model: impl Into<String>) -> Self {
		Self {
			provider,
			model: model.into(),
			status: LlmStatus::Pending,
			result: None,
			error: None,
			started_at: None,
			completed_at: None,
			duration_ms: None,
		}
	}

	pub fn completed(
		provider: LlmProvider,
		model: impl Into<String>,
		result: impl Into<String>,
	) -> Self {
		Self {
			status: LlmStatus::Completed,
			result: Some(result.into()),
			..Self::pending(provider, model)
		}
	}

	pub fn failed(
		provider: LlmProvider,
		model: impl Into<String>,
		error: impl Into<String>,
	) -> Self {
		Self {
			status: LlmStatus::Failed,
			error: Some(error.into()),
			..Self::pending(provider, model)
		}
	}

	pub fn validate(&self) -> Result<(), InvariantError> {
		let consistent = match self.status {
			LlmStatus::Completed => self.result.is_some() && self.error.is_none(),
			LlmStatus::Failed => self.error.is_some() && self.result.is_none(),
			LlmStatus::Pending => self.result.is_none() && self.error.is_none(),
		};

		if consistent {
			Ok(())
		} else {
			Err(InvariantError::InconsistentLlmResult {
				provider: self.provider,
				status: self.status,
			})
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Research {
	pub id: String,
	pub user_id: String,
	pub title: String,
	pub prompt: String,
	pub status: ResearchStatus,
	pub selected_llms: Vec<LlmProvider>,
	pub synthesis_llm: LlmProvider,
	pub llm_results: Vec<LlmResult>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synthesized_result: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub synthesis_error: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub skip_synthesis: Option<bool>,
	#[serde(with = "crate::time_serde")]
	pub started_at: OffsetDateTime,
	#[serde(
		default,
		with = "crate::time_serde::option",
		skip_serializing_if = "Option::is_none"
	)]
	pub completed_at: Option<OffsetDateTime>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub total_duration_ms: Option<i64>,
}
impl Research {
	pub fn llm_result(&self, provider: LlmProvider) -> Option<&LlmResult> {
		self.llm_results.iter().find(|entry| entry.provider == provider)
	}

	pub fn skips_synthesis(&self) -> bool {
		self.skip_synthesis == Some(true)
	}

	pub fn validate(&self) -> Result<(), InvariantError> {
		for provider in &self.selected_llms {
			match self.llm_results.iter().filter(|entry| entry.provider == *provider).count() {
				0 => return Err(InvariantError::UnknownProvider { provider: *provider }),
				1 => {},
				_ => return Err(InvariantError::DuplicateProvider { provider: *provider }),
			}
		}
		for entry in &self.llm_results {
			entry.validate()?;
		}

		check_completion(self)
	}

	/// Applies a partial update. A rejected update leaves the record untouched.
	pub fn apply(&mut self, update: &ResearchUpdate) -> Result<(), InvariantError> {
		let mut next = self.clone();

		if let Some(status) = update.status {
			if !self.status.can_transition_to(status) {
				return Err(InvariantError::IllegalTransition { from: self.status, to: status });
			}

			next.status = status;
		}

		update.synthesized_result.apply_to(&mut next.synthesized_result);
		update.synthesis_error.apply_to(&mut next.synthesis_error);
		update.completed_at.apply_to(&mut next.completed_at);
		update.total_duration_ms.apply_to(&mut next.total_duration_ms);

		check_completion(&next)?;

		*self = next;

		Ok(())
	}

	pub fn apply_llm_result(
		&mut self,
		provider: LlmProvider,
		update: &LlmResultUpdate,
	) -> Result<(), InvariantError> {
		let Some(slot) = self.llm_results.iter_mut().find(|entry| entry.provider == provider)
		else {
			return Err(InvariantError::UnknownProvider { provider });
		};
		let mut next = slot.clone();

		update.apply_to(&mut next);
		next.validate()?;

		*slot = next;

		Ok(())
	}
}

/// Three-state field update: leave the field alone, overwrite it, or clear it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Patch<T> {
	Keep,
	Set(T),
	Clear,
}
impl<T: Clone> Patch<T> {
	pub fn apply_to(&self, slot: &mut Option<T>) {
		match self {
			Self::Keep => {},
			Self::Set(value) => *slot = Some(value.clone()),
			Self::Clear => *slot = None,
		}
	}
}
impl<T> Default for Patch<T> {
	fn default() -> Self {
		Self::Keep
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResearchUpdate {
	pub status: Option<ResearchStatus>,
	pub synthesized_result: Patch<String>,
	pub synthesis_error: Patch<String>,
	pub completed_at: Patch<OffsetDateTime>,
	pub total_duration_ms: Patch<i64>,
}
impl ResearchUpdate {
	pub fn status(status: ResearchStatus) -> Self {
		Self { status: Some(status), ..Default::default() }
	}

	/// Marks the record completed at `now` and drops any stale synthesis error.
	pub fn finalize(now: OffsetDateTime, started_at: OffsetDateTime) -> Self {
		Self {
			status: Some(ResearchStatus::Completed),
			synthesis_error: Patch::Clear,
			completed_at: Patch::Set(now),
			total_duration_ms: Patch::Set(duration_ms(started_at, now)),
			..Default::default()
		}
	}

	pub fn synthesis_succeeded(
		synthesized: String,
		now: OffsetDateTime,
		started_at: OffsetDateTime,
	) -> Self {
		Self { synthesized_result: Patch::Set(synthesized), ..Self::finalize(now, started_at) }
	}

	pub fn synthesis_failed(message: String) -> Self {
		Self {
			status: Some(ResearchStatus::Failed),
			synthesized_result: Patch::Clear,
			synthesis_error: Patch::Set(message),
			..Default::default()
		}
	}
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LlmResultUpdate {
	pub status: Option<LlmStatus>,
	pub result: Patch<String>,
	pub error: Patch<String>,
	pub started_at: Patch<OffsetDateTime>,
	pub completed_at: Patch<OffsetDateTime>,
	pub duration_ms: Patch<i64>,
}
impl LlmResultUpdate {
	/// Puts a failed entry back in the queue with its error and timing cleared.
	pub fn reset_pending() -> Self {
		Self {
			status: Some(LlmStatus::Pending),
			result: Patch::Keep,
			error: Patch::Clear,
			started_at: Patch::Clear,
			completed_at: Patch::Clear,
			duration_ms: Patch::Clear,
		}
	}

	pub fn publish_failed(publisher_message: &str) -> Self {
		Self {
			status: Some(LlmStatus::Failed),
			error: Patch::Set(format!("Failed to publish retry event: {publisher_message}")),
			..Default::default()
		}
	}

	pub fn apply_to(&self, entry: &mut LlmResult) {
		if let Some(status) = self.status {
			entry.status = status;
		}

		self.result.apply_to(&mut entry.result);
		self.error.apply_to(&mut entry.error);
		self.started_at.apply_to(&mut entry.started_at);
		self.completed_at.apply_to(&mut entry.completed_at);
		self.duration_ms.apply_to(&mut entry.duration_ms);
	}
}

pub fn duration_ms(start: OffsetDateTime, end: OffsetDateTime) -> i64 {
	let millis = (end - start).whole_milliseconds();

	i64::try_from(millis).unwrap_or(if millis < 0 { i64::MIN } else { i64::MAX })
}

fn check_completion(research: &Research) -> Result<(), InvariantError> {
	if research.status == ResearchStatus::Completed && research.synthesis_error.is_some() {
		return Err(InvariantError::CompletedWithSynthesisError);
	}

	Ok(())
}
