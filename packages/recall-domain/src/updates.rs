use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::{
	records::{EnrichedRecord, TicketId},
	text,
};

/// A comment that reports a change a new runbook has to reflect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateNotice {
	pub ticket_id: TicketId,
	pub comment_index: usize,
	pub author: String,
	#[serde(default, with = "crate::time_serde::option")]
	pub created_on: Option<OffsetDateTime>,
	pub keyword: String,
	pub excerpt: String,
}

/// Scans comments for update keywords. `keywords` are expected lowercased.
pub fn detect_updates<'a, I>(records: I, keywords: &[String], excerpt_chars: usize) -> Vec<UpdateNotice>
where
	I: IntoIterator<Item = &'a EnrichedRecord>,
{
	let mut notices = Vec::new();

	for record in records {
		for (comment_index, comment) in record.comments.iter().enumerate() {
			let lowered = comment.text.to_lowercase();
			let Some(keyword) = keywords.iter().find(|keyword| lowered.contains(keyword.as_str()))
			else {
				continue;
			};

			notices.push(UpdateNotice {
				ticket_id: record.id(),
				comment_index,
				author: comment.author.clone(),
				created_on: comment.created_on,
				keyword: keyword.clone(),
				excerpt: text::excerpt(&comment.text, excerpt_chars),
			});
		}
	}

	notices
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::records::{Comment, RetrievedRecord, Ticket};

	fn record(id: TicketId, comments: &[&str]) -> EnrichedRecord {
		let ticket = Ticket {
			id,
			subject: "s".to_string(),
			comments: comments
				.iter()
				.map(|text| Comment {
					author: "ops".to_string(),
					created_on: None,
					text: text.to_string(),
				})
				.collect(),
			..Default::default()
		};

		EnrichedRecord::new(RetrievedRecord::new(id, 0.8, "p"), ticket)
	}

	fn keywords() -> Vec<String> {
		vec!["updated".to_string(), "patch".to_string()]
	}

	#[test]
	fn flags_comments_with_keywords() {
		let records = [record(1, &["Investigating.", "Applied PATCH 5.2 to the kernel."])];
		let notices = detect_updates(&records, &keywords(), 200);

		assert_eq!(notices.len(), 1);
		assert_eq!(notices[0].ticket_id, 1);
		assert_eq!(notices[0].comment_index, 1);
		assert_eq!(notices[0].keyword, "patch");
	}

	#[test]
	fn excerpt_is_bounded() {
		let long = format!("updated {}", "x".repeat(400));
		let records = [record(2, &[long.as_str()])];
		let notices = detect_updates(&records, &keywords(), 200);

		assert_eq!(notices[0].excerpt.chars().count(), 200);
	}

	#[test]
	fn quiet_history_yields_nothing() {
		let records = [record(3, &["Closed as duplicate."])];

		assert!(detect_updates(&records, &keywords(), 200).is_empty());
	}
}
