use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use recall_domain::{
	graph::RelationshipGraph,
	records::{AnalyzedRecord, SearchPerspective},
	updates::UpdateNotice,
};

use crate::query_analysis::QueryAnalysis;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
	Assist,
	Search,
}

/// Record counts after each stage of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
	pub retrieved_initial: usize,
	pub retrieved_after_gaps: usize,
	pub enriched: usize,
	pub dropped: usize,
	pub ranked: usize,
	/// Enriched records left out of ranking by `ranking.max_scored`.
	pub unranked: usize,
	pub relationship_ids: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchTrace {
	pub perspectives: Vec<SearchPerspective>,
	pub gap_queries: Vec<String>,
	/// The threshold the records were retrieved with.
	pub score_threshold: f32,
	pub relaxed_retry: bool,
	pub failed_searches: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub query_analysis: Option<QueryAnalysis>,
	pub counts: StageCounts,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineResult {
	pub run_id: Uuid,
	pub mode: Mode,
	pub query: String,
	pub context: Option<String>,
	pub records: Vec<AnalyzedRecord>,
	pub graph: RelationshipGraph,
	pub updates: Vec<UpdateNotice>,
	/// Plugin output gathered for Q&A answers, keyed by plugin name.
	pub context_data: serde_json::Map<String, Value>,
	pub trace: SearchTrace,
	pub narrative: String,
}
