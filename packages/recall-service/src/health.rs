use serde::Serialize;
use tracing::warn;

use recall_storage::qdrant::CollectionStats;

use crate::{Error, RecallService, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
	Ok,
	Degraded,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComponentHealth {
	pub healthy: bool,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl ComponentHealth {
	fn from_result<T, E>(result: &std::result::Result<T, E>) -> Self
	where
		E: std::fmt::Display,
	{
		match result {
			Ok(_) => Self { healthy: true, error: None },
			Err(err) => Self { healthy: false, error: Some(err.to_string()) },
		}
	}
}

/// Reachability of the backends. The API itself is up whenever this is produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
	pub status: HealthStatus,
	pub qdrant: ComponentHealth,
	pub tickets: ComponentHealth,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub collection: Option<CollectionStats>,
}

impl RecallService {
	/// Probes the vector index and the ticket repository concurrently.
	pub async fn health(&self) -> HealthReport {
		let (collection, tickets) = futures::join!(
			self.index.collection_info(),
			self.providers.tickets.ping(&self.cfg.providers.tickets)
		);

		if let Err(err) = &collection {
			warn!(error = %err, "Vector index health check failed.");
		}
		if let Err(err) = &tickets {
			warn!(error = %err, "Ticket repository health check failed.");
		}

		let qdrant = ComponentHealth::from_result(&collection);
		let tickets = ComponentHealth::from_result(&tickets);
		let status = if qdrant.healthy && tickets.healthy {
			HealthStatus::Ok
		} else {
			HealthStatus::Degraded
		};

		HealthReport { status, qdrant, tickets, collection: collection.ok() }
	}

	pub async fn collection_info(&self) -> Result<CollectionStats> {
		self.index
			.collection_info()
			.await
			.map_err(|err| Error::Qdrant { message: err.to_string() })
	}
}
