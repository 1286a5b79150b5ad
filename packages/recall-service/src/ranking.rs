use futures::{StreamExt, future, stream};
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{info, warn};

use recall_domain::{
	rank,
	records::{AnalyzedRecord, Annotations, EnrichedRecord, Importance},
	text,
};

use crate::{
	Error, RecallService, Result,
	prompts::{self, SCORE_SCHEMA, SUMMARY_SCHEMA},
};

#[derive(Debug, Deserialize)]
struct ScoreResponse {
	score: Number,
	rationale: String,
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
	summary: String,
	#[serde(default)]
	key_points: Vec<String>,
	#[serde(default)]
	cautions: Vec<String>,
	#[serde(default)]
	references: Vec<String>,
}

impl RecallService {
	/// 0-100 relevance of `record` to the task. Falls back to the configured default score.
	pub async fn score(
		&self,
		record: &EnrichedRecord,
		task: &str,
		context: Option<&str>,
	) -> Importance {
		match self.score_with_llm(record, task, context).await {
			Ok(importance) => importance,
			Err(err) => {
				warn!(error = %err, ticket_id = record.id(), "Scoring failed; using default score.");

				Importance::unevaluated(self.cfg.ranking.default_score)
			},
		}
	}

	/// Summary, key points, cautions, and references for `record`.
	///
	/// On failure the summary is the subject and the lists are empty.
	pub async fn summarize(&self, record: &EnrichedRecord, task: &str) -> Annotations {
		match self.summarize_with_llm(record, task).await {
			Ok(annotations) => annotations,
			Err(err) => {
				warn!(error = %err, ticket_id = record.id(), "Summarizing failed; using the subject.");

				Annotations { summary: record.subject.clone(), ..Default::default() }
			},
		}
	}

	/// Summarizes and scores the first `ranking.max_scored` records, then sorts by importance.
	pub async fn rank(
		&self,
		records: Vec<EnrichedRecord>,
		task: &str,
		context: Option<&str>,
	) -> Vec<AnalyzedRecord> {
		let max_scored = self.cfg.ranking.max_scored as usize;
		let mut analyzed: Vec<AnalyzedRecord> = stream::iter(records.into_iter().take(max_scored))
			.map(|record| async move {
				let (annotations, importance) =
					future::join(self.summarize(&record, task), self.score(&record, task, context))
						.await;

				AnalyzedRecord::new(record, annotations, importance)
			})
			.buffered(self.max_concurrency())
			.collect()
			.await;

		rank::sort_by_importance(&mut analyzed);

		info!(ranked = analyzed.len(), "Ranking finished.");

		analyzed
	}

	async fn score_with_llm(
		&self,
		record: &EnrichedRecord,
		task: &str,
		context: Option<&str>,
	) -> Result<Importance> {
		let excerpt = text::excerpt(&record.description, self.cfg.ranking.excerpt_chars as usize);
		let messages = build_score_messages(record, task, context, &excerpt);
		let response: ScoreResponse = self.complete_json(SCORE_SCHEMA, &messages).await?;

		importance_from_response(response)
	}

	async fn summarize_with_llm(&self, record: &EnrichedRecord, task: &str) -> Result<Annotations> {
		let messages = build_summary_messages(
			record,
			task,
			self.cfg.ranking.excerpt_chars as usize,
			self.cfg.synthesis.max_comment_chars as usize,
		);
		let response: SummaryResponse = self.complete_json(SUMMARY_SCHEMA, &messages).await?;

		if response.summary.trim().is_empty() {
			return Err(Error::Provider {
				message: format!("Response does not match {SUMMARY_SCHEMA}: empty summary."),
			});
		}

		Ok(Annotations {
			summary: response.summary.trim().to_string(),
			key_points: clean_list(response.key_points),
			cautions: clean_list(response.cautions),
			references: clean_list(response.references),
		})
	}
}

fn importance_from_response(response: ScoreResponse) -> Result<Importance> {
	let score = response
		.score
		.as_u64()
		.filter(|score| *score <= 100)
		.and_then(|score| u8::try_from(score).ok())
		.ok_or_else(|| Error::Provider {
			message: format!(
				"Response does not match {SCORE_SCHEMA}: score {} is not an integer in 0-100.",
				response.score
			),
		})?;

	Ok(Importance { score, rationale: response.rationale.trim().to_string() })
}

fn clean_list(items: Vec<String>) -> Vec<String> {
	items.into_iter().map(|item| item.trim().to_string()).filter(|item| !item.is_empty()).collect()
}

fn build_score_messages(
	record: &EnrichedRecord,
	task: &str,
	context: Option<&str>,
	excerpt: &str,
) -> Vec<Value> {
	let schema = serde_json::json!({ "score": "integer 0-100", "rationale": "string" });
	let system_prompt = format!(
		"You rate how much a past ticket helps with a task. Schema: {SCORE_SCHEMA}. \
Output must be valid JSON only and must match the provided schema exactly. \
Rubric: 90-100 indispensable, 70-89 important, 50-69 useful context, 30-49 tangential, 0-29 unrelated. \
The score is an integer."
	);
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nTask:\n{task}\n{context}Ticket #{id}: {subject}\nDescription:\n{excerpt}",
		schema = prompts::schema_text(&schema),
		context = prompts::context_line(context),
		id = record.id(),
		subject = record.subject,
	);

	prompts::messages(&system_prompt, user_prompt)
}

fn build_summary_messages(
	record: &EnrichedRecord,
	task: &str,
	excerpt_chars: usize,
	max_comment_chars: usize,
) -> Vec<Value> {
	let schema = serde_json::json!({
		"summary": "string",
		"key_points": ["string"],
		"cautions": ["string"],
		"references": ["string"]
	});
	let system_prompt = format!(
		"You summarize a past IT operations ticket for an engineer working on a related task. \
Schema: {SUMMARY_SCHEMA}. Output must be valid JSON only and must match the provided schema exactly. \
key_points are the concrete actions taken. cautions are pitfalls or warnings found in the discussion. \
references are configuration values, file paths, commands, or external pointers quoted in the ticket. \
Use only what the ticket says."
	);
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nTask:\n{task}\n{digest}\nDiscussion:\n{transcript}",
		schema = prompts::schema_text(&schema),
		digest = prompts::record_digest(record, excerpt_chars),
		transcript = prompts::comment_transcript(record, max_comment_chars),
	);

	prompts::messages(&system_prompt, user_prompt)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(score: Value) -> ScoreResponse {
		serde_json::from_value(serde_json::json!({ "score": score, "rationale": " fits " }))
			.expect("Failed to build response.")
	}

	#[test]
	fn accepts_integral_scores_in_range() {
		let importance =
			importance_from_response(response(serde_json::json!(85))).expect("Expected a score.");

		assert_eq!(importance, Importance { score: 85, rationale: "fits".to_string() });
	}

	#[test]
	fn rejects_out_of_range_and_fractional_scores() {
		assert!(importance_from_response(response(serde_json::json!(101))).is_err());
		assert!(importance_from_response(response(serde_json::json!(-1))).is_err());
		assert!(importance_from_response(response(serde_json::json!(72.5))).is_err());
	}

	#[test]
	fn string_scores_do_not_match_the_schema() {
		let parsed = serde_json::from_value::<ScoreResponse>(
			serde_json::json!({ "score": "90", "rationale": "x" }),
		);

		assert!(parsed.is_err());
	}
}
