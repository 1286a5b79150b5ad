use serde::Deserialize;
use tracing::warn;

use recall_domain::records::{Priority, SearchPerspective};

use crate::{
	RecallService, Result,
	prompts::{self, PLAN_SCHEMA},
};

#[derive(Debug, Deserialize)]
struct PlanResponse {
	perspectives: Vec<PlannedPerspective>,
}

#[derive(Debug, Deserialize)]
struct PlannedPerspective {
	name: String,
	query: String,
	rationale: String,
	#[serde(default)]
	priority: Priority,
	expected_count: Option<u32>,
}

impl RecallService {
	/// Decomposes `task` into search perspectives. Never empty.
	pub async fn plan(&self, task: &str, context: Option<&str>) -> Vec<SearchPerspective> {
		match self.plan_with_llm(task, context).await {
			Ok(perspectives) if !perspectives.is_empty() => perspectives,
			Ok(_) => {
				warn!("Planner returned no usable perspectives; falling back to the task.");

				vec![SearchPerspective::fallback(task)]
			},
			Err(err) => {
				warn!(error = %err, "Planning failed; falling back to the task.");

				vec![SearchPerspective::fallback(task)]
			},
		}
	}

	async fn plan_with_llm(&self, task: &str, context: Option<&str>) -> Result<Vec<SearchPerspective>> {
		let max = self.cfg.search.max_perspectives.max(1);
		let messages = build_plan_messages(task, context, max);
		let response: PlanResponse = self.complete_json(PLAN_SCHEMA, &messages).await?;

		Ok(normalize_perspectives(response.perspectives, max as usize))
	}
}

fn normalize_perspectives(planned: Vec<PlannedPerspective>, max: usize) -> Vec<SearchPerspective> {
	planned
		.into_iter()
		.filter_map(|planned| {
			let query = prompts::strip_meta_words(&planned.query);

			if query.is_empty() {
				return None;
			}

			let name = planned.name.trim();
			let name = if name.is_empty() { query.clone() } else { name.to_string() };

			Some(SearchPerspective {
				name,
				query,
				rationale: planned.rationale.trim().to_string(),
				priority: planned.priority,
				expected_count: planned.expected_count,
			})
		})
		.take(max)
		.collect()
}

fn build_plan_messages(task: &str, context: Option<&str>, max: u32) -> Vec<serde_json::Value> {
	let schema = serde_json::json!({
		"perspectives": [{
			"name": "string",
			"query": "string",
			"rationale": "string",
			"priority": "high|medium|low",
			"expected_count": "integer|null"
		}]
	});
	let system_prompt = format!(
		"You plan searches over closed IT operations tickets for a senior engineer. \
Schema: {PLAN_SCHEMA}. Output must be valid JSON only and must match the provided schema exactly. \
Split the task into 3 to {max} distinct search angles: recent occurrences, completed precedent, \
related trouble reports, configuration or reference material, and adjacent systems. \
Each query is a short keyword string suitable for semantic search. \
Do not write prose and do not use words such as procedure, runbook, manual, or create."
	);
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nConstraints:\n- MAX_PERSPECTIVES = {max}\nTask:\n{task}\n{context}",
		schema = prompts::schema_text(&schema),
		context = prompts::context_line(context),
	);

	prompts::messages(&system_prompt, user_prompt)
}
