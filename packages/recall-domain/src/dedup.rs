use std::collections::HashMap;

use crate::records::{RetrievedRecord, TicketId};

/// Per-run deduplication map over retrieved records.
///
/// Records keep insertion order. A record is scored once, at first sighting; later sightings
/// only add their perspective.
#[derive(Debug, Clone, Default)]
pub struct RecordSet {
	records: Vec<RetrievedRecord>,
	index: HashMap<TicketId, usize>,
}
impl RecordSet {
	pub fn new() -> Self {
		Self::default()
	}

	/// Returns `true` when `id` was not seen before.
	pub fn merge(&mut self, id: TicketId, score: f32, perspective: &str) -> bool {
		if let Some(&position) = self.index.get(&id) {
			self.records[position].add_perspective(perspective);

			return false;
		}

		self.index.insert(id, self.records.len());
		self.records.push(RetrievedRecord::new(id, score, perspective));

		true
	}

	pub fn get(&self, id: TicketId) -> Option<&RetrievedRecord> {
		self.index.get(&id).map(|&position| &self.records[position])
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	pub fn records(&self) -> &[RetrievedRecord] {
		&self.records
	}

	/// Records first seen at or after position `start`.
	pub fn since(&self, start: usize) -> &[RetrievedRecord] {
		self.records.get(start..).unwrap_or(&[])
	}
}
