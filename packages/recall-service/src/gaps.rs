use serde::Deserialize;
use tracing::warn;

use recall_domain::{rank, records::EnrichedRecord};

use crate::{
	RecallService, Result,
	prompts::{self, GAPS_SCHEMA},
};

#[derive(Debug, Deserialize)]
struct GapsResponse {
	queries: Vec<String>,
}

impl RecallService {
	/// Proposes at most `limit` follow-up searches from retrieved content.
	///
	/// With no records this returns broadened task queries without calling the model.
	/// Model failures yield no queries.
	pub async fn identify_gaps(
		&self,
		task: &str,
		context: Option<&str>,
		records: &[EnrichedRecord],
		limit: usize,
	) -> Vec<String> {
		if limit == 0 {
			return Vec::new();
		}
		if records.is_empty() {
			return self.broadened_queries(task, limit);
		}

		match self.gaps_with_llm(task, context, records, limit).await {
			Ok(queries) => queries,
			Err(err) => {
				warn!(error = %err, "Gap analysis failed; no follow-up searches.");

				Vec::new()
			},
		}
	}

	fn broadened_queries(&self, task: &str, limit: usize) -> Vec<String> {
		let base = prompts::strip_meta_words(task);
		let base = if base.is_empty() { task.trim().to_string() } else { base };

		self.cfg
			.gaps
			.fallback_suffixes
			.iter()
			.map(|suffix| format!("{base} {}", suffix.trim()))
			.take(limit)
			.collect()
	}

	async fn gaps_with_llm(
		&self,
		task: &str,
		context: Option<&str>,
		records: &[EnrichedRecord],
		limit: usize,
	) -> Result<Vec<String>> {
		let mut sample: Vec<&EnrichedRecord> = records.iter().collect();

		sample.sort_by(|a, b| rank::cmp_f32_desc(a.score(), b.score()));
		sample.truncate(self.cfg.gaps.sample_records as usize);

		let digests = sample
			.iter()
			.map(|record| prompts::record_digest(record, self.cfg.gaps.excerpt_chars as usize))
			.collect::<Vec<_>>()
			.join("\n\n");
		let messages = build_gap_messages(task, context, &digests, limit);
		let response: GapsResponse = self.complete_json(GAPS_SCHEMA, &messages).await?;

		Ok(prompts::normalize_queries(response.queries, task, limit))
	}
}

fn build_gap_messages(
	task: &str,
	context: Option<&str>,
	digests: &str,
	limit: usize,
) -> Vec<serde_json::Value> {
	let schema = serde_json::json!({ "queries": ["string"] });
	let system_prompt = format!(
		"You review tickets already found for a task and name what is still missing. \
Schema: {GAPS_SCHEMA}. Output must be valid JSON only and must match the provided schema exactly. \
Propose short keyword searches for related system names, failure modes, prerequisites, or impact \
that appear in the ticket text but are not yet covered. \
Do not use words such as procedure, runbook, manual, or create. Do not repeat the task."
	);
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nConstraints:\n- MAX_QUERIES = {limit}\nTask:\n{task}\n{context}Retrieved tickets:\n{digests}",
		schema = prompts::schema_text(&schema),
		context = prompts::context_line(context),
	);

	prompts::messages(&system_prompt, user_prompt)
}
