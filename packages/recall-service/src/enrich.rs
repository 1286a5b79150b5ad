use futures::{StreamExt, stream};
use tracing::{info, warn};

use recall_domain::records::{EnrichedRecord, RetrievedRecord};

use crate::RecallService;

#[derive(Debug, Clone, Default)]
pub struct EnrichmentOutcome {
	/// Same order as the input, minus dropped records.
	pub records: Vec<EnrichedRecord>,
	pub attempted: usize,
	pub not_found: usize,
	pub failed: usize,
	/// Failures where the repository could not be reached at all.
	pub unreachable: usize,
}
impl EnrichmentOutcome {
	pub fn dropped(&self) -> usize {
		self.not_found + self.failed
	}

	pub fn all_unreachable(&self) -> bool {
		self.attempted > 0 && self.unreachable == self.attempted
	}
}

enum Fetched {
	Found(Box<EnrichedRecord>),
	Missing,
	Failed { unreachable: bool },
}

impl RecallService {
	/// Full ticket detail for one hit, or `None` when it is missing or the fetch failed.
	pub async fn enrich(&self, record: RetrievedRecord) -> Option<EnrichedRecord> {
		match self.fetch_enriched(record).await {
			Fetched::Found(record) => Some(*record),
			Fetched::Missing | Fetched::Failed { .. } => None,
		}
	}

	/// Enriches `records` with bounded concurrency, keeping input order.
	pub async fn enrich_all(&self, records: &[RetrievedRecord]) -> EnrichmentOutcome {
		let fetched: Vec<Fetched> = stream::iter(records.iter().cloned())
			.map(|record| self.fetch_enriched(record))
			.buffered(self.max_concurrency())
			.collect()
			.await;
		let mut outcome = EnrichmentOutcome { attempted: fetched.len(), ..Default::default() };

		for item in fetched {
			match item {
				Fetched::Found(record) => outcome.records.push(*record),
				Fetched::Missing => outcome.not_found += 1,
				Fetched::Failed { unreachable } => {
					outcome.failed += 1;

					if unreachable {
						outcome.unreachable += 1;
					}
				},
			}
		}

		info!(
			attempted = outcome.attempted,
			enriched = outcome.records.len(),
			dropped = outcome.dropped(),
			"Enrichment finished."
		);

		outcome
	}

	async fn fetch_enriched(&self, record: RetrievedRecord) -> Fetched {
		let ticket_id = record.id;

		match self.providers.tickets.fetch_ticket(&self.cfg.providers.tickets, ticket_id).await {
			Ok(Some(ticket)) => Fetched::Found(Box::new(EnrichedRecord::new(record, ticket))),
			Ok(None) => {
				warn!(ticket_id, "Ticket not found; dropping record.");

				Fetched::Missing
			},
			Err(err) => {
				warn!(error = %err, ticket_id, "Ticket fetch failed; dropping record.");

				Fetched::Failed { unreachable: err.is_transport() }
			},
		}
	}
}
