use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::info;

use recall_domain::{
	dedup::RecordSet,
	records::{EnrichedRecord, Priority, SearchPerspective, TicketId, TicketMetadata},
};

use crate::{
	Error, RecallService, Result, assist::ensure_reachable, retriever::RetrievalFilters,
};

/// A trigger notification as posted by a Zabbix media type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ZabbixAlert {
	pub trigger_name: String,
	pub hostname: String,
	/// Disaster, High, Average, Warning, or Information.
	pub severity: String,
	pub item_value: String,
	pub event_id: i64,
	#[serde(default)]
	pub trigger_id: Option<i64>,
	/// RFC 3339.
	#[serde(default, with = "recall_domain::time_serde::option")]
	pub event_time: Option<OffsetDateTime>,
}
impl ZabbixAlert {
	/// The text embedded for the similarity lookup.
	pub fn search_text(&self) -> String {
		format!("{} on {}: {}", self.trigger_name.trim(), self.hostname.trim(), self.item_value.trim())
	}
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSearchRequest {
	pub alert_text: String,
	#[serde(default)]
	pub limit: Option<u32>,
}

/// A past ticket close to an alert, with its repository metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTicket {
	pub ticket_id: TicketId,
	pub similarity: f32,
	pub subject: String,
	pub description: String,
	pub resolution: String,
	pub status: String,
	#[serde(flatten)]
	pub metadata: TicketMetadata,
}
impl From<EnrichedRecord> for SimilarTicket {
	fn from(record: EnrichedRecord) -> Self {
		Self {
			ticket_id: record.id(),
			similarity: record.score(),
			subject: record.subject,
			description: record.description,
			resolution: record.resolution,
			status: record.status,
			metadata: record.metadata,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertResponse {
	pub alert: ZabbixAlert,
	pub similar_tickets: Vec<SimilarTicket>,
	pub count: usize,
}

impl RecallService {
	/// Past tickets similar to `alert_text`, most similar first. No LLM calls.
	pub async fn similar_tickets(&self, req: AlertSearchRequest) -> Result<Vec<SimilarTicket>> {
		let alert_text = req.alert_text.trim();

		if alert_text.is_empty() {
			return Err(Error::InvalidRequest {
				message: "alert_text must be non-empty.".to_string(),
			});
		}

		let limit = req.limit.unwrap_or(self.cfg.alerts.default_limit);
		let max_limit = self.cfg.alerts.max_limit;

		if limit == 0 || limit > max_limit {
			return Err(Error::InvalidRequest {
				message: format!("limit must be between 1 and {max_limit}."),
			});
		}

		self.lookup_similar(alert_text, limit).await
	}

	/// Matches an incoming monitoring alert against past tickets.
	pub async fn handle_alert(&self, alert: ZabbixAlert) -> Result<AlertResponse> {
		let similar_tickets =
			self.lookup_similar(&alert.search_text(), self.cfg.alerts.webhook_limit).await?;

		info!(
			event_id = alert.event_id,
			hostname = %alert.hostname,
			severity = %alert.severity,
			matches = similar_tickets.len(),
			"Alert matched against past tickets."
		);

		Ok(AlertResponse { count: similar_tickets.len(), alert, similar_tickets })
	}

	async fn lookup_similar(&self, text: &str, limit: u32) -> Result<Vec<SimilarTicket>> {
		let perspective = alert_perspective(text, limit);
		let mut records = RecordSet::new();
		let outcome = self
			.retrieve(
				std::slice::from_ref(&perspective),
				self.cfg.alerts.score_threshold,
				limit,
				&RetrievalFilters::default(),
				&mut records,
			)
			.await;

		if outcome.all_failed() {
			return Err(Error::Unavailable {
				message: "Vector search failed for the alert.".to_string(),
			});
		}

		let enrichment = ensure_reachable(self.enrich_all(records.records()).await)?;

		Ok(enrichment.records.into_iter().map(SimilarTicket::from).collect())
	}
}

fn alert_perspective(text: &str, limit: u32) -> SearchPerspective {
	SearchPerspective {
		name: "alert".to_string(),
		query: text.to_string(),
		rationale: "alert text".to_string(),
		priority: Priority::High,
		expected_count: Some(limit),
	}
}
