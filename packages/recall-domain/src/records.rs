//! Record types for one pipeline run.
//!
//! A hit moves through three shapes: [`RetrievedRecord`] from the vector index,
//! [`EnrichedRecord`] once the ticket repository has supplied the full ticket, and
//! [`AnalyzedRecord`] once the language model has annotated and scored it. Each later shape
//! embeds the earlier one and is only built through its constructor.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{hosts, text};

pub type TicketId = u64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
	High,
	#[default]
	Medium,
	Low,
}

/// One search angle derived from a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchPerspective {
	pub name: String,
	pub query: String,
	pub rationale: String,
	#[serde(default)]
	pub priority: Priority,
	/// Hint only; retrieval always uses the configured per-perspective limit.
	pub expected_count: Option<u32>,
}
impl SearchPerspective {
	pub const FALLBACK_RATIONALE: &'static str = "fallback";
	pub const GAP_NAME: &'static str = "gap analysis";

	/// The single perspective used when planning fails: the task itself.
	pub fn fallback(task: &str) -> Self {
		Self {
			name: "task".to_string(),
			query: task.to_string(),
			rationale: Self::FALLBACK_RATIONALE.to_string(),
			priority: Priority::High,
			expected_count: None,
		}
	}

	pub fn gap(query: &str) -> Self {
		Self {
			name: Self::GAP_NAME.to_string(),
			query: query.to_string(),
			rationale: "follow-up search from retrieved content".to_string(),
			priority: Priority::Medium,
			expected_count: None,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedRecord {
	pub id: TicketId,
	pub score: f32,
	/// Perspective names in first-seen order, without duplicates.
	pub perspectives: Vec<String>,
}
impl RetrievedRecord {
	pub fn new(id: TicketId, score: f32, perspective: &str) -> Self {
		Self { id, score, perspectives: vec![perspective.to_string()] }
	}

	pub fn add_perspective(&mut self, perspective: &str) {
		if !self.perspectives.iter().any(|name| name == perspective) {
			self.perspectives.push(perspective.to_string());
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
	pub author: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_on: Option<OffsetDateTime>,
	pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
	pub issue_id: TicketId,
	pub issue_to_id: TicketId,
	pub relation_type: String,
}
impl Relation {
	/// The end of the relation that is not `current`.
	pub fn other_end(&self, current: TicketId) -> TicketId {
		if self.issue_id == current { self.issue_to_id } else { self.issue_id }
	}
}

/// A ticket as returned by the ticket repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
	pub id: TicketId,
	pub subject: String,
	pub description: String,
	pub status: String,
	pub priority: Option<String>,
	pub tracker: Option<String>,
	pub project: Option<String>,
	pub category: Option<String>,
	pub assigned_to: Option<String>,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_on: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub updated_on: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub closed_on: Option<OffsetDateTime>,
	pub comments: Vec<Comment>,
	pub relations: Vec<Relation>,
	pub parent_id: Option<TicketId>,
}
impl Ticket {
	/// Text of the most recent comment, or empty.
	pub fn resolution(&self) -> &str {
		self.comments.last().map(|comment| comment.text.as_str()).unwrap_or("")
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketMetadata {
	pub priority: Option<String>,
	pub tracker: Option<String>,
	pub project: Option<String>,
	pub category: Option<String>,
	pub assigned_to: Option<String>,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_on: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub updated_on: Option<OffsetDateTime>,
	#[serde(default, with = "crate::time_serde::option")]
	pub closed_on: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedRecord {
	#[serde(flatten)]
	pub retrieved: RetrievedRecord,
	pub subject: String,
	pub description: String,
	pub status: String,
	pub resolution: String,
	pub comments: Vec<Comment>,
	/// Host names mentioned in the subject, description, or comments.
	pub hosts: Vec<String>,
	pub metadata: TicketMetadata,
}
impl EnrichedRecord {
	pub fn new(retrieved: RetrievedRecord, ticket: Ticket) -> Self {
		let resolution = ticket.resolution().to_string();
		let hosts = hosts::extract_hosts(
			[ticket.subject.as_str(), ticket.description.as_str()]
				.into_iter()
				.chain(ticket.comments.iter().map(|comment| comment.text.as_str())),
		);

		Self {
			retrieved,
			subject: ticket.subject,
			description: ticket.description,
			status: ticket.status,
			resolution,
			comments: ticket.comments,
			hosts,
			metadata: TicketMetadata {
				priority: ticket.priority,
				tracker: ticket.tracker,
				project: ticket.project,
				category: ticket.category,
				assigned_to: ticket.assigned_to,
				created_on: ticket.created_on,
				updated_on: ticket.updated_on,
				closed_on: ticket.closed_on,
			},
		}
	}

	pub fn id(&self) -> TicketId {
		self.retrieved.id
	}

	pub fn score(&self) -> f32 {
		self.retrieved.score
	}

	/// Short fallback text: resolution if present, otherwise the description.
	pub fn gist(&self, max_chars: usize) -> String {
		let source =
			if self.resolution.trim().is_empty() { &self.description } else { &self.resolution };

		text::excerpt(source, max_chars)
	}
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotations {
	pub summary: String,
	pub key_points: Vec<String>,
	pub cautions: Vec<String>,
	pub references: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Importance {
	pub score: u8,
	pub rationale: String,
}
impl Importance {
	pub const UNEVALUATED_RATIONALE: &'static str = "could not be evaluated";

	pub fn unevaluated(default_score: u8) -> Self {
		Self { score: default_score.min(100), rationale: Self::UNEVALUATED_RATIONALE.to_string() }
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedRecord {
	#[serde(flatten)]
	pub record: EnrichedRecord,
	#[serde(flatten)]
	pub annotations: Annotations,
	/// Absent for records that were never scored.
	pub importance: Option<Importance>,
}
impl AnalyzedRecord {
	pub fn new(record: EnrichedRecord, annotations: Annotations, importance: Importance) -> Self {
		Self { record, annotations, importance: Some(importance) }
	}

	pub fn unscored(record: EnrichedRecord) -> Self {
		Self { record, annotations: Annotations::default(), importance: None }
	}

	pub fn id(&self) -> TicketId {
		self.record.id()
	}

	pub fn importance_score(&self) -> Option<u8> {
		self.importance.as_ref().map(|importance| importance.score)
	}

	/// Stored summary, falling back to the record's resolution or description.
	pub fn summary_or_gist(&self, max_chars: usize) -> String {
		if self.annotations.summary.trim().is_empty() {
			self.record.gist(max_chars)
		} else {
			text::excerpt(&self.annotations.summary, max_chars)
		}
	}
}
