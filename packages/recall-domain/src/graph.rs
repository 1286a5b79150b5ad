use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::records::TicketId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelatedEdge {
	pub from: TicketId,
	pub to: TicketId,
	pub relation_type: String,
}

/// Links between the tickets of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipGraph {
	pub related: Vec<RelatedEdge>,
	/// child -> parent
	pub parent_of: BTreeMap<TicketId, TicketId>,
	/// source -> ids written as `#<digits>` in its comments
	pub references: BTreeMap<TicketId, BTreeSet<TicketId>>,
}
impl RelationshipGraph {
	pub fn is_empty(&self) -> bool {
		self.related.is_empty() && self.parent_of.is_empty() && self.references.is_empty()
	}
}
