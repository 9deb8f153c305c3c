use orch_domain::ResearchStatus;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
	#[error("Research not found")]
	NotFound,
	#[error("Cannot retry research with status: {status}. Only failed research can be retried.")]
	InvalidState { status: ResearchStatus },
	#[error("No successful LLM results to work with. Cannot retry research.")]
	NoSuccessfulResults,
	#[error("{message}")]
	Synthesis { message: String },
	#[error("{message}")]
	Storage { message: String },
}
impl Error {
	pub const fn code(&self) -> &'static str {
		match self {
			Self::NotFound => "NOT_FOUND",
			Self::InvalidState { .. } => "INVALID_STATE",
			Self::NoSuccessfulResults => "NO_SUCCESSFUL_RESULTS",
			Self::Synthesis { .. } => "SYNTHESIS_FAILED",
			Self::Storage { .. } => "STORAGE_ERROR",
		}
	}
}
