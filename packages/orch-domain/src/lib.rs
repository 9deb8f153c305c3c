pub mod event;
pub mod provider;
pub mod research;
pub mod retry;
pub mod time_serde;

mod error;

pub use error::{InvariantError, ParseEnumError};
pub use event::LlmCallEvent;
pub use provider::LlmProvider;
pub use research::{
	LlmResult, LlmResultUpdate, LlmStatus, Patch, Research, ResearchStatus, ResearchUpdate,
};
pub use retry::{RetryAction, RetryAnalysis};
