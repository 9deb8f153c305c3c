use std::sync::Arc;

use orch_service::ResearchService;
use orch_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<ResearchService>,
}
impl AppState {
	pub async fn new(config: orch_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema().await?;

		Ok(Self::from_service(ResearchService::postgres(&config, db)))
	}

	pub fn from_service(service: ResearchService) -> Self {
		Self { service: Arc::new(service) }
	}
}
