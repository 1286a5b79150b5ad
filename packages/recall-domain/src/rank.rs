use std::cmp::Ordering;

use crate::records::AnalyzedRecord;

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

/// Importance descending; unscored records sort last. Stable, so ties keep input order.
pub fn sort_by_importance(records: &mut [AnalyzedRecord]) {
	records.sort_by(|a, b| b.importance_score().cmp(&a.importance_score()));
}

/// Similarity descending. Stable, so ties keep input order.
pub fn sort_by_similarity(records: &mut [AnalyzedRecord]) {
	records.sort_by(|a, b| cmp_f32_desc(a.record.score(), b.record.score()));
}
