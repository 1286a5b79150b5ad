use std::collections::HashSet;

use serde_json::Value;

use recall_domain::{records::EnrichedRecord, text};

pub const PLAN_SCHEMA: &str = "plan.v1";
pub const QUERY_ANALYSIS_SCHEMA: &str = "query_analysis.v1";
pub const GAPS_SCHEMA: &str = "gaps.v1";
pub const SCORE_SCHEMA: &str = "score.v1";
pub const SUMMARY_SCHEMA: &str = "summary.v1";
pub const ANSWER_PROMPT: &str = "answer.v1";
pub const ADVICE_PROMPT: &str = "advice.v1";
pub const NO_RESULTS_PROMPT: &str = "no_results.v1";

/// Words that describe the document being written rather than the incident searched for.
const META_WORDS: [&str; 9] = [
	"procedure",
	"procedures",
	"create",
	"creating",
	"creation",
	"runbook",
	"runbooks",
	"manual",
	"steps",
];

pub fn messages(system: &str, user: String) -> Vec<Value> {
	vec![
		serde_json::json!({ "role": "system", "content": system }),
		serde_json::json!({ "role": "user", "content": user }),
	]
}

pub fn schema_text(schema: &Value) -> String {
	serde_json::to_string_pretty(schema).unwrap_or_else(|_| schema.to_string())
}

pub fn context_line(context: Option<&str>) -> String {
	match context.map(str::trim).filter(|context| !context.is_empty()) {
		Some(context) => format!("Additional context:\n{context}\n"),
		None => String::new(),
	}
}

pub fn strip_meta_words(query: &str) -> String {
	query
		.split_whitespace()
		.filter(|word| {
			let bare = word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase();

			!META_WORDS.contains(&bare.as_str())
		})
		.collect::<Vec<_>>()
		.join(" ")
}

/// Trims, strips meta words, and drops blanks, case-insensitive duplicates, and `exclude`.
pub fn normalize_queries(queries: Vec<String>, exclude: &str, max: usize) -> Vec<String> {
	let mut out = Vec::new();
	let mut seen = HashSet::new();

	seen.insert(exclude.trim().to_lowercase());

	for query in queries {
		if out.len() >= max {
			break;
		}

		let cleaned = strip_meta_words(&query);

		if cleaned.is_empty() {
			continue;
		}
		if seen.insert(cleaned.to_lowercase()) {
			out.push(cleaned);
		}
	}

	out
}

/// Subject and a bounded description excerpt for one record.
pub fn record_digest(record: &EnrichedRecord, excerpt_chars: usize) -> String {
	format!(
		"#{id} {subject}\nStatus: {status}\nDescription: {description}",
		id = record.id(),
		subject = record.subject,
		status = record.status,
		description = text::excerpt(&record.description, excerpt_chars),
	)
}

/// Discussion history as `author (timestamp): text` lines, bounded to `max_chars`.
pub fn comment_transcript(record: &EnrichedRecord, max_chars: usize) -> String {
	let lines = record
		.comments
		.iter()
		.map(|comment| {
			let when = comment
				.created_on
				.map(|at| at.date().to_string())
				.unwrap_or_else(|| "undated".to_string());

			format!("{} ({when}): {}", comment.author, comment.text.trim())
		})
		.collect::<Vec<_>>()
		.join("\n");

	text::excerpt(&lines, max_chars)
}
