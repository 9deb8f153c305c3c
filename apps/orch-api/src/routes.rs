use axum::{
	Json, Router,
	extract::{Path, State},
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;

use crate::state::AppState;
use orch_service::{Error as ServiceError, RetryOutcome};

#[derive(Serialize)]
struct ErrorBody {
	ok: bool,
	error: String,
	error_code: &'static str,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: &'static str,
	message: String,
	detail: String,
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let status = match &err {
			ServiceError::NotFound => StatusCode::NOT_FOUND,
			ServiceError::InvalidState { .. } => StatusCode::CONFLICT,
			ServiceError::NoSuccessfulResults => StatusCode::UNPROCESSABLE_ENTITY,
			ServiceError::Synthesis { .. } => StatusCode::BAD_GATEWAY,
			ServiceError::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
		};
		let detail = err.to_string();
		// Storage text can carry driver internals.
		let message = match &err {
			ServiceError::Storage { .. } => "Internal error".to_string(),
			_ => detail.clone(),
		};

		Self { status, error_code: err.code(), message, detail }
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		if self.status.is_server_error() {
			tracing::error!(error_code = self.error_code, error = %self.detail, "Request failed.");
		}

		let body = ErrorBody { ok: false, error: self.message, error_code: self.error_code };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/research/{research_id}/retry", post(retry_research))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn retry_research(
	State(state): State<AppState>,
	Path(research_id): Path<String>,
) -> Result<Json<RetryOutcome>, ApiError> {
	let outcome = state.service.retry(&research_id).await?;

	Ok(Json(outcome))
}
