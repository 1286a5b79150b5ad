use serde_json::{Map, Value};
use tracing::warn;

use recall_domain::{
	graph::RelationshipGraph, rank, records::AnalyzedRecord, text, updates::UpdateNotice,
};

use crate::{
	RecallService,
	prompts::{self, ADVICE_PROMPT, ANSWER_PROMPT, NO_RESULTS_PROMPT},
	result::SearchTrace,
};

pub const NO_MATCHING_RECORDS: &str =
	"No matching tickets were found for this question. Try different keywords, a wider date range, or fewer host names.";
pub const NO_RESULTS_ADVISORY: &str = "No related tickets were found for this task. \
Possible causes: the task is new to this environment, it is described with different terms, or the \
tickets were closed without notes. Try searching for the affected system name, the error message, \
or the change type instead.";

const GIST_CHARS: usize = 200;

impl RecallService {
	/// Fact-constrained answer to a Q&A query. Never empty.
	pub async fn answer(
		&self,
		query: &str,
		records: &[AnalyzedRecord],
		context_data: &Map<String, Value>,
	) -> String {
		if records.is_empty() {
			return NO_MATCHING_RECORDS.to_string();
		}

		let messages = build_answer_messages(query, &self.prompt_records(records), context_data);

		match self.complete_text(&messages).await {
			Ok(text) => text,
			Err(err) => {
				warn!(error = %err, "Answer synthesis failed; listing the top tickets.");

				fallback_narrative(records, self.cfg.synthesis.fallback_top_n as usize)
			},
		}
	}

	/// Advisory narrative for an assist run. Never empty.
	pub async fn recommend(
		&self,
		task: &str,
		context: Option<&str>,
		ranked: &[AnalyzedRecord],
		graph: &RelationshipGraph,
		trace: &SearchTrace,
		updates: &[UpdateNotice],
	) -> String {
		if ranked.is_empty() {
			let messages = build_no_results_messages(task, context, trace);

			return match self.complete_text(&messages).await {
				Ok(text) => text,
				Err(err) => {
					warn!(error = %err, "No-results advisory failed; using the fixed text.");

					NO_RESULTS_ADVISORY.to_string()
				},
			};
		}

		let messages =
			build_advice_messages(task, context, &self.prompt_records(ranked), graph, updates);

		match self.complete_text(&messages).await {
			Ok(text) => text,
			Err(err) => {
				warn!(error = %err, "Advisory synthesis failed; listing the top tickets.");

				fallback_narrative(ranked, self.cfg.synthesis.fallback_top_n as usize)
			},
		}
	}

	fn prompt_records(&self, records: &[AnalyzedRecord]) -> String {
		records
			.iter()
			.take(self.cfg.synthesis.max_prompt_records as usize)
			.map(|record| record_block(record, self.cfg.synthesis.max_comment_chars as usize))
			.collect::<Vec<_>>()
			.join("\n\n")
	}
}

/// Numbered listing of the top `top_n` records with their summary or gist.
///
/// Records carrying an importance score are listed by importance, the rest by similarity.
pub fn fallback_narrative(records: &[AnalyzedRecord], top_n: usize) -> String {
	let mut ordered: Vec<&AnalyzedRecord> = records.iter().collect();

	if ordered.iter().all(|record| record.importance.is_none()) {
		ordered.sort_by(|a, b| rank::cmp_f32_desc(a.record.score(), b.record.score()));
	} else {
		ordered.sort_by(|a, b| b.importance_score().cmp(&a.importance_score()));
	}

	let lines = ordered
		.iter()
		.take(top_n.max(1))
		.enumerate()
		.map(|(idx, record)| {
			let gist = record.summary_or_gist(GIST_CHARS);
			let gist = if gist.is_empty() { "no details recorded".to_string() } else { gist };

			format!("{}. #{} {}: {gist}", idx + 1, record.id(), record.record.subject)
		})
		.collect::<Vec<_>>();

	if lines.is_empty() {
		return NO_RESULTS_ADVISORY.to_string();
	}

	format!("The most relevant past tickets:\n{}", lines.join("\n"))
}

fn record_block(record: &AnalyzedRecord, max_comment_chars: usize) -> String {
	let mut block = format!(
		"Ticket #{id}: {subject}\nStatus: {status}\nSimilarity: {similarity:.2}",
		id = record.id(),
		subject = record.record.subject,
		status = record.record.status,
		similarity = record.record.score(),
	);

	if let Some(importance) = &record.importance {
		block.push_str(&format!("\nImportance: {} ({})", importance.score, importance.rationale));
	}
	if !record.annotations.summary.is_empty() {
		block.push_str(&format!("\nSummary: {}", record.annotations.summary));
	}

	for (label, items) in [
		("Key points", &record.annotations.key_points),
		("Cautions", &record.annotations.cautions),
		("References", &record.annotations.references),
	] {
		if !items.is_empty() {
			block.push_str(&format!("\n{label}: {}", items.join("; ")));
		}
	}

	block.push_str(&format!(
		"\nDescription: {}\nResolution: {}",
		text::excerpt(&record.record.description, max_comment_chars / 3),
		text::excerpt(&record.record.resolution, max_comment_chars / 3),
	));

	if !record.record.hosts.is_empty() {
		block.push_str(&format!("\nHosts: {}", record.record.hosts.join(", ")));
	}

	block
}

fn build_answer_messages(
	query: &str,
	records: &str,
	context_data: &Map<String, Value>,
) -> Vec<Value> {
	let system_prompt = format!(
		"You answer questions about past IT operations work. Prompt: {ANSWER_PROMPT}. \
Use only the tickets and data supplied. Cite the ticket id as #<id> for every claim. \
Write in the past tense. When the tickets do not contain a detail, say it is not recorded. \
Only describe something as common to several tickets when each of them is cited."
	);
	let context = if context_data.is_empty() {
		String::new()
	} else {
		format!(
			"Reference data:\n{}\n",
			prompts::schema_text(&Value::Object(context_data.clone()))
		)
	};
	let user_prompt = format!("Question:\n{query}\n{context}Tickets:\n{records}");

	prompts::messages(&system_prompt, user_prompt)
}

fn build_advice_messages(
	task: &str,
	context: Option<&str>,
	records: &str,
	graph: &RelationshipGraph,
	updates: &[UpdateNotice],
) -> Vec<Value> {
	let system_prompt = format!(
		"You advise an engineer who is about to carry out an IT operations task. Prompt: {ADVICE_PROMPT}. \
Name the most relevant past tickets as #<id> with the concrete actions they record. \
List cautions with the ticket they come from. Finish with numbered next steps. \
Use only the supplied tickets."
	);
	let mut extra = String::new();

	if !graph.is_empty() {
		extra.push_str(&format!(
			"Relationships:\n{}\n",
			serde_json::to_string(graph).unwrap_or_default()
		));
	}
	if !updates.is_empty() {
		let lines = updates
			.iter()
			.map(|notice| format!("#{} ({}): {}", notice.ticket_id, notice.keyword, notice.excerpt))
			.collect::<Vec<_>>()
			.join("\n");

		extra.push_str(&format!("Recent changes to reflect:\n{lines}\n"));
	}

	let user_prompt = format!(
		"Task:\n{task}\n{context}Ranked tickets:\n{records}\n{extra}",
		context = prompts::context_line(context),
	);

	prompts::messages(&system_prompt, user_prompt)
}

fn build_no_results_messages(task: &str, context: Option<&str>, trace: &SearchTrace) -> Vec<Value> {
	let system_prompt = format!(
		"No past tickets matched an IT operations task. Prompt: {NO_RESULTS_PROMPT}. \
Explain briefly the likely causes and propose alternative search strategies. \
Do not invent ticket ids."
	);
	let searched = trace
		.perspectives
		.iter()
		.map(|perspective| format!("- {}", perspective.query))
		.chain(trace.gap_queries.iter().map(|query| format!("- {query}")))
		.collect::<Vec<_>>()
		.join("\n");
	let user_prompt = format!(
		"Task:\n{task}\n{context}Searches tried:\n{searched}",
		context = prompts::context_line(context),
	);

	prompts::messages(&system_prompt, user_prompt)
}
