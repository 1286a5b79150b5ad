use std::sync::Arc;

use recall_service::RecallService;
use recall_storage::qdrant::QdrantStore;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<RecallService>,
}
impl AppState {
	pub fn new(config: recall_config::Config) -> color_eyre::Result<Self> {
		let qdrant = QdrantStore::new(&config.storage.qdrant)?;
		let service = RecallService::new(config, qdrant);

		Ok(Self::from_service(service))
	}

	pub fn from_service(service: RecallService) -> Self {
		Self { service: Arc::new(service) }
	}
}
