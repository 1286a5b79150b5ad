use std::collections::BTreeSet;

use tracing::{info, warn};

use recall_domain::{
	graph::{RelatedEdge, RelationshipGraph},
	records::{Ticket, TicketId},
	references,
};

use crate::RecallService;

impl RecallService {
	/// Builds the relation, parent, and reference graph for the first `relationships.max_records` ids.
	///
	/// Tickets that cannot be fetched are skipped.
	pub async fn analyze_relationships(&self, ids: &[TicketId]) -> RelationshipGraph {
		let mut graph = RelationshipGraph::default();
		let max_records = self.cfg.relationships.max_records as usize;

		for &ticket_id in ids.iter().take(max_records) {
			match self.providers.tickets.fetch_ticket(&self.cfg.providers.tickets, ticket_id).await {
				Ok(Some(ticket)) => add_ticket(&mut graph, &ticket),
				Ok(None) => {
					warn!(ticket_id, "Ticket not found; skipping relationships.");
				},
				Err(err) => {
					warn!(error = %err, ticket_id, "Ticket fetch failed; skipping relationships.");
				},
			}
		}

		info!(
			related = graph.related.len(),
			parents = graph.parent_of.len(),
			referencing = graph.references.len(),
			"Relationship analysis finished."
		);

		graph
	}
}

fn add_ticket(graph: &mut RelationshipGraph, ticket: &Ticket) {
	for relation in &ticket.relations {
		graph.related.push(RelatedEdge {
			from: ticket.id,
			to: relation.other_end(ticket.id),
			relation_type: relation.relation_type.clone(),
		});
	}

	if let Some(parent_id) = ticket.parent_id {
		graph.parent_of.insert(ticket.id, parent_id);
	}

	let mut referenced = BTreeSet::new();

	for comment in &ticket.comments {
		referenced.extend(references::extract_references(&comment.text));
	}

	if !referenced.is_empty() {
		graph.references.insert(ticket.id, referenced);
	}
}
