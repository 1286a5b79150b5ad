use unicode_segmentation::UnicodeSegmentation;

/// The first `max_chars` grapheme clusters of `text`, trimmed.
pub fn excerpt(text: &str, max_chars: usize) -> String {
	let trimmed = text.trim();
	let end = trimmed
		.grapheme_indices(true)
		.nth(max_chars)
		.map(|(offset, _)| offset)
		.unwrap_or(trimmed.len());

	trimmed[..end].trim_end().to_string()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn short_text_is_unchanged() {
		assert_eq!(excerpt("  hello  ", 10), "hello");
	}

	#[test]
	fn cuts_on_grapheme_boundary() {
		let text = "ab\u{0065}\u{0301}cd";

		assert_eq!(excerpt(text, 3), "ab\u{0065}\u{0301}");
	}

	#[test]
	fn zero_budget_is_empty() {
		assert_eq!(excerpt("hello", 0), "");
	}
}
