use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;
use tracing::{info, warn};
use uuid::Uuid;

use recall_domain::{
	dedup::RecordSet,
	graph::RelationshipGraph,
	rank,
	records::{AnalyzedRecord, Priority, SearchPerspective},
};

use crate::{
	Error, RecallService, Result,
	assist::ensure_reachable,
	plugins::CMDB,
	query_analysis::QueryAnalysis,
	result::{Mode, PipelineResult, SearchTrace, StageCounts},
	retriever::RetrievalFilters,
};

const DEFAULT_LIMIT: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub limit: Option<u32>,
	#[serde(default)]
	pub include_context: Option<bool>,
}

impl RecallService {
	/// Answers a question from past tickets, ordered by similarity.
	pub async fn search(&self, req: SearchRequest) -> Result<PipelineResult> {
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let limit = req.limit.unwrap_or(DEFAULT_LIMIT);
		let max_limit = self.cfg.search.max_limit;

		if limit == 0 || limit > max_limit {
			return Err(Error::InvalidRequest {
				message: format!("limit must be between 1 and {max_limit}."),
			});
		}

		let run_id = Uuid::new_v4();

		info!(%run_id, limit, "Search run started.");

		let analysis = self.analyze_query(query, OffsetDateTime::now_utc().date()).await;
		let perspectives = vec![query_perspective(&analysis, query, limit)];
		let filters = RetrievalFilters {
			hosts: analysis.hosts.clone(),
			date_range: analysis.date_range,
		};
		let mut records = RecordSet::new();
		let mut threshold = self.cfg.search.score_threshold;
		let initial = self.retrieve(&perspectives, threshold, limit, &filters, &mut records).await;

		if initial.all_failed() {
			return Err(Error::Unavailable {
				message: "Vector search failed for the query.".to_string(),
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

		let enrichment = ensure_reachable(self.enrich_all(records.records()).await)?;
		let dropped = enrichment.dropped();
		let mut analyzed: Vec<AnalyzedRecord> =
			enrichment.records.into_iter().map(AnalyzedRecord::unscored).collect();

		rank::sort_by_similarity(&mut analyzed);

		let include_context = req.include_context.unwrap_or(true);
		let context_data = if include_context {
			self.gather_context(&analysis, &analyzed).await
		} else {
			Map::new()
		};
		let narrative = self.answer(query, &analyzed, &context_data).await;
		let trace = SearchTrace {
			perspectives,
			gap_queries: Vec::new(),
			score_threshold: threshold,
			relaxed_retry,
			failed_searches,
			query_analysis: Some(analysis),
			counts: StageCounts {
				retrieved_initial: records.len(),
				retrieved_after_gaps: records.len(),
				enriched: analyzed.len(),
				dropped,
				..Default::default()
			},
		};

		info!(%run_id, records = analyzed.len(), relaxed_retry, "Search run finished.");

		Ok(PipelineResult {
			run_id,
			mode: Mode::Search,
			query: query.to_string(),
			context: None,
			records: analyzed,
			graph: RelationshipGraph::default(),
			updates: Vec::new(),
			context_data,
			trace,
			narrative,
		})
	}

	/// Plugin data for the answer prompt. Plugin failures are logged and skipped.
	async fn gather_context(
		&self,
		analysis: &QueryAnalysis,
		records: &[AnalyzedRecord],
	) -> Map<String, Value> {
		let mut context_data = Map::new();
		let Some(cmdb) = self.plugins.get(CMDB) else {
			return context_data;
		};
		let mut hosts = analysis.hosts.clone();

		for host in records.iter().flat_map(|record| record.record.hosts.iter()) {
			if !hosts.contains(host) {
				hosts.push(host.clone());
			}
		}

		if hosts.is_empty() {
			return context_data;
		}

		match cmdb.fetch(&serde_json::json!({ "hosts": hosts })).await {
			Ok(value) => {
				context_data.insert(CMDB.to_string(), value);
			},
			Err(err) => {
				warn!(error = %err, plugin = CMDB, "Context plugin failed; answering without it.");
			},
		}

		context_data
	}
}

fn query_perspective(analysis: &QueryAnalysis, query: &str, limit: u32) -> SearchPerspective {
	SearchPerspective {
		name: "query".to_string(),
		query: analysis.search_string(query),
		rationale: "keywords from query analysis".to_string(),
		priority: Priority::High,
		expected_count: Some(limit),
	}
}
