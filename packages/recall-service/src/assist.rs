use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use recall_domain::{
	dedup::RecordSet,
	records::{EnrichedRecord, SearchPerspective, TicketId},
	updates,
};

use crate::{
	Error, RecallService, Result,
	enrich::EnrichmentOutcome,
	result::{Mode, PipelineResult, SearchTrace, StageCounts},
	retriever::RetrievalFilters,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistRequest {
	pub task: String,
	#[serde(default)]
	pub context: Option<String>,
}

impl RecallService {
	/// Runs the full assist pipeline for one task.
	///
	/// Only an unreachable vector index or ticket repository is an error. Every other failure
	/// degrades to a smaller result with a fallback narrative.
	pub async fn assist(&self, req: AssistRequest) -> Result<PipelineResult> {
		let task = req.task.trim();

		if task.is_empty() {
			return Err(Error::InvalidRequest { message: "task must be non-empty.".to_string() });
		}

		let context =
			req.context.as_deref().map(str::trim).filter(|context| !context.is_empty());
		let run_id = Uuid::new_v4();

		info!(%run_id, "Assist run started.");

		let perspectives = self.plan(task, context).await;
		let filters = RetrievalFilters::default();
		let limit = self.cfg.search.per_perspective_limit;
		let mut records = RecordSet::new();
		let mut threshold = self.cfg.search.score_threshold;
		let initial = self.retrieve(&perspectives, threshold, limit, &filters, &mut records).await;

		if initial.all_failed() {
			return Err(Error::Unavailable {
				message: "Vector search failed for every perspective.".to_string(),
			});
		}

		let mut failed_searches = initial.failed;
		let mut relaxed_retry = false;

		if records.is_empty() {
			relaxed_retry = true;
			threshold = self.cfg.search.relaxed_score_threshold;

			info!(%run_id, threshold, "No records at the primary threshold; retrying relaxed.");

			failed_searches +=
				self.retrieve(&perspectives, threshold, limit, &filters, &mut records).await.failed;
		}

		let retrieved_initial = records.len();
		let first_pass = ensure_reachable(self.enrich_all(records.records()).await)?;
		let mut dropped = first_pass.dropped();
		let mut enriched = first_pass.records;
		let max_queries = self.cfg.gaps.max_queries as usize;
		let gap_queries = self.identify_gaps(task, context, &enriched, max_queries).await;

		if !gap_queries.is_empty() {
			let gap_perspectives: Vec<SearchPerspective> = gap_queries
				.iter()
				.take(max_queries)
				.map(|query| SearchPerspective::gap(query))
				.collect();

			failed_searches += self
				.retrieve(&gap_perspectives, threshold, limit, &filters, &mut records)
				.await
				.failed;

			let gap_pass = self.enrich_all(records.since(retrieved_initial)).await;

			if gap_pass.unreachable > 0 {
				warn!(
					%run_id,
					unreachable = gap_pass.unreachable,
					"Ticket repository unreachable for gap records; keeping the first pass."
				);
			}

			dropped += gap_pass.dropped();

			enriched.extend(gap_pass.records);
			sync_perspectives(&mut enriched, &records);
		}

		let retrieved_after_gaps = records.len();
		let enriched_count = enriched.len();
		let ids: Vec<TicketId> = enriched.iter().map(EnrichedRecord::id).collect();
		let graph = self.analyze_relationships(&ids).await;
		let ranked = self.rank(enriched, task, context).await;
		let updates = updates::detect_updates(
			ranked.iter().map(|record| &record.record),
			&self.cfg.updates.keywords,
			self.cfg.updates.excerpt_chars as usize,
		);
		let trace = SearchTrace {
			perspectives,
			gap_queries,
			score_threshold: threshold,
			relaxed_retry,
			failed_searches,
			query_analysis: None,
			counts: StageCounts {
				retrieved_initial,
				retrieved_after_gaps,
				enriched: enriched_count,
				dropped,
				ranked: ranked.len(),
				unranked: enriched_count - ranked.len(),
				relationship_ids: ids.len().min(self.cfg.relationships.max_records as usize),
			},
		};
		let narrative = self.recommend(task, context, &ranked, &graph, &trace, &updates).await;

		info!(
			%run_id,
			records = ranked.len(),
			gap_queries = trace.gap_queries.len(),
			relaxed_retry,
			"Assist run finished."
		);

		Ok(PipelineResult {
			run_id,
			mode: Mode::Assist,
			query: task.to_string(),
			context: context.map(str::to_string),
			records: ranked,
			graph,
			updates,
			context_data: Default::default(),
			trace,
			narrative,
		})
	}
}

pub(crate) fn ensure_reachable(outcome: EnrichmentOutcome) -> Result<EnrichmentOutcome> {
	if outcome.all_unreachable() {
		return Err(Error::Unavailable {
			message: "Ticket repository is unreachable.".to_string(),
		});
	}

	Ok(outcome)
}

/// Copies perspective sets gathered by later passes onto already enriched records.
fn sync_perspectives(enriched: &mut [EnrichedRecord], records: &RecordSet) {
	for record in enriched {
		if let Some(retrieved) = records.get(record.id()) {
			record.retrieved.perspectives = retrieved.perspectives.clone();
		}
	}
}

#[cfg(test)]
mod tests {
	use recall_domain::records::{RetrievedRecord, Ticket};

	use super::*;

	#[test]
	fn later_sightings_reach_enriched_records() {
		let mut records = RecordSet::new();

		records.merge(301, 0.9, "dns");

		let mut enriched = vec![EnrichedRecord::new(RetrievedRecord::new(301, 0.9, "dns"), Ticket {
			id: 301,
			..Default::default()
		})];

		records.merge(301, 0.5, SearchPerspective::GAP_NAME);
		sync_perspectives(&mut enriched, &records);

		assert_eq!(enriched[0].retrieved.perspectives, vec![
			"dns".to_string(),
			SearchPerspective::GAP_NAME.to_string()
		]);
		assert_eq!(enriched[0].score(), 0.9);
	}

	#[test]
	fn unreachable_repository_is_unavailable() {
		let outcome = EnrichmentOutcome { attempted: 2, failed: 2, unreachable: 2, ..Default::default() };

		assert!(matches!(ensure_reachable(outcome), Err(Error::Unavailable { .. })));

		let partial = EnrichmentOutcome { attempted: 2, failed: 1, unreachable: 1, ..Default::default() };

		assert!(ensure_reachable(partial).is_ok());
	}
}
