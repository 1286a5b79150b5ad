use tracing::{info, warn};

use recall_domain::{dates::DateRange, dedup::RecordSet, records::SearchPerspective};
use recall_storage::qdrant::{VectorHit, VectorQuery};

use crate::{Error, RecallService, Result};

#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RetrievalFilters {
	/// Pushed down to the index as a keyword match.
	pub hosts: Vec<String>,
	/// Pushed down to the index as a `closed_on` range, so it applies before the limit.
	pub date_range: Option<DateRange>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RetrievalOutcome {
	pub attempted: usize,
	pub failed: usize,
	pub new_records: usize,
}
impl RetrievalOutcome {
	/// Every attempted perspective failed.
	pub fn all_failed(&self) -> bool {
		self.attempted > 0 && self.failed == self.attempted
	}
}

impl RecallService {
	/// Runs each perspective in order and merges hits into `records`.
	///
	/// Perspectives run one after another so the merge stays a single serialized section.
	/// A failing perspective is logged and contributes nothing.
	pub async fn retrieve(
		&self,
		perspectives: &[SearchPerspective],
		score_threshold: f32,
		limit: u32,
		filters: &RetrievalFilters,
		records: &mut RecordSet,
	) -> RetrievalOutcome {
		let mut outcome = RetrievalOutcome::default();

		for perspective in perspectives {
			outcome.attempted += 1;

			let hits = match self.search_perspective(perspective, score_threshold, limit, filters).await
			{
				Ok(hits) => hits,
				Err(err) => {
					warn!(
						error = %err,
						perspective = %perspective.name,
						"Perspective search failed; it contributes no records."
					);

					outcome.failed += 1;

					continue;
				},
			};

			for hit in hits {
				if records.merge(hit.id, hit.score, &perspective.name) {
					outcome.new_records += 1;
				}
			}
		}

		info!(
			attempted = outcome.attempted,
			failed = outcome.failed,
			new_records = outcome.new_records,
			total = records.len(),
			score_threshold,
			"Retrieval pass finished."
		);

		outcome
	}

	async fn search_perspective(
		&self,
		perspective: &SearchPerspective,
		score_threshold: f32,
		limit: u32,
		filters: &RetrievalFilters,
	) -> Result<Vec<VectorHit>> {
		let texts = vec![perspective.query.clone()];
		let vector = self
			.providers
			.embedding
			.embed(&self.cfg.providers.embedding, &texts)
			.await?
			.into_iter()
			.next()
			.ok_or_else(|| Error::Provider {
				message: "Embedding provider returned no vector.".to_string(),
			})?;

		if vector.len() != self.cfg.providers.embedding.dimensions as usize {
			return Err(Error::Provider {
				message: format!(
					"Embedding has {} dimensions; expected {}.",
					vector.len(),
					self.cfg.providers.embedding.dimensions
				),
			});
		}

		let query = VectorQuery {
			vector,
			limit,
			score_threshold,
			hosts: filters.hosts.clone(),
			closed_on: filters.date_range,
		};

		Ok(self.index.search(&query).await?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn all_failed_requires_an_attempt() {
		assert!(!RetrievalOutcome::default().all_failed());
		assert!(RetrievalOutcome { attempted: 2, failed: 2, new_records: 0 }.all_failed());
		assert!(!RetrievalOutcome { attempted: 2, failed: 1, new_records: 0 }.all_failed());
	}
}
