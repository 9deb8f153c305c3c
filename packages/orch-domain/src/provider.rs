use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ParseEnumError;

/// An LLM backend a research request can be fanned out to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
	Google,
	Openai,
	Anthropic,
}
impl LlmProvider {
	pub const ALL: [Self; 3] = [Self::Google, Self::Openai, Self::Anthropic];

	pub const fn as_str(self) -> &'static str {
		match self {
			Self::Google => "google",
			Self::Openai => "openai",
			Self::Anthropic => "anthropic",
		}
	}
}
impl fmt::Display for LlmProvider {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}
impl FromStr for LlmProvider {
	type Err = ParseEnumError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::ALL
			.into_iter()
			.find(|provider| provider.as_str() == s)
			.ok_or_else(|| ParseEnumError { kind: "LLM provider", value: s.to_string() })
	}
}
