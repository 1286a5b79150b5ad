use std::{collections::BTreeSet, sync::LazyLock};

use regex::Regex;

use crate::records::TicketId;

static REFERENCE_RE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"#(\d+)").expect("Ticket reference regex is valid."));

/// Ticket ids written as `#<digits>` in free text.
pub fn extract_references(text: &str) -> BTreeSet<TicketId> {
	REFERENCE_RE
		.captures_iter(text)
		.filter_map(|captures| captures.get(1))
		.filter_map(|digits| digits.as_str().parse::<TicketId>().ok())
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn extracts_every_hash_reference() {
		let refs = extract_references("See #1234 and also #5678 for details");

		assert_eq!(refs, BTreeSet::from([1234, 5678]));
	}

	#[test]
	fn ignores_bare_numbers_and_overflow() {
		assert!(extract_references("ticket 1234, # 55").is_empty());
		assert!(extract_references("#99999999999999999999999").is_empty());
	}

	#[test]
	fn repeated_references_collapse() {
		assert_eq!(extract_references("#7 then #7 again"), BTreeSet::from([7]));
	}
}
