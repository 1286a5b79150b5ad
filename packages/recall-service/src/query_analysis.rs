use serde::Deserialize;
use time::Date;
use tracing::warn;

use recall_domain::dates::{self, DateRange};

use crate::{
	RecallService,
	prompts::{self, QUERY_ANALYSIS_SCHEMA},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
	PastResolution,
	SimilarIssues,
	#[default]
	General,
}

/// Structured reading of a Q&A query.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct QueryAnalysis {
	pub keywords: Vec<String>,
	pub hosts: Vec<String>,
	pub date_expression: Option<String>,
	pub date_range: Option<DateRange>,
	pub intent: Intent,
}
impl QueryAnalysis {
	pub fn fallback(query: &str) -> Self {
		Self {
			keywords: vec![query.trim().to_string()],
			hosts: Vec::new(),
			date_expression: None,
			date_range: None,
			intent: Intent::General,
		}
	}

	/// The text to embed: keywords joined by spaces, or the query itself.
	pub fn search_string(&self, query: &str) -> String {
		let joined = self
			.keywords
			.iter()
			.map(|keyword| keyword.trim())
			.filter(|keyword| !keyword.is_empty())
			.collect::<Vec<_>>()
			.join(" ");

		if joined.is_empty() { query.trim().to_string() } else { joined }
	}
}

#[derive(Debug, Deserialize)]
struct AnalysisResponse {
	keywords: Vec<String>,
	#[serde(default)]
	hosts: Vec<String>,
	date_expression: Option<String>,
	#[serde(default)]
	intent: Intent,
}

impl RecallService {
	/// Extracts keywords, hosts, a date range, and an intent from `query`.
	pub async fn analyze_query(&self, query: &str, today: Date) -> QueryAnalysis {
		let messages = build_analysis_messages(query);

		match self.complete_json::<AnalysisResponse>(QUERY_ANALYSIS_SCHEMA, &messages).await {
			Ok(response) => analysis_from_response(response, today),
			Err(err) => {
				warn!(error = %err, "Query analysis failed; searching with the raw query.");

				QueryAnalysis::fallback(query)
			},
		}
	}
}

fn analysis_from_response(response: AnalysisResponse, today: Date) -> QueryAnalysis {
	let keywords = response
		.keywords
		.into_iter()
		.map(|keyword| keyword.trim().to_string())
		.filter(|keyword| !keyword.is_empty())
		.collect();
	let mut hosts: Vec<String> = Vec::new();

	// Only names the analysis reports; they become a hard index filter.
	for host in response.hosts.iter().map(|host| host.trim().to_lowercase()) {
		if !host.is_empty() && !hosts.contains(&host) {
			hosts.push(host);
		}
	}

	let date_expression = response
		.date_expression
		.map(|expression| expression.trim().to_string())
		.filter(|expression| !expression.is_empty());
	let date_range =
		date_expression.as_deref().and_then(|expression| dates::resolve(expression, today));

	QueryAnalysis { keywords, hosts, date_expression, date_range, intent: response.intent }
}

fn build_analysis_messages(query: &str) -> Vec<serde_json::Value> {
	let schema = serde_json::json!({
		"keywords": ["string"],
		"hosts": ["string"],
		"date_expression": "string|null",
		"intent": "past_resolution|similar_issues|general"
	});
	let system_prompt = format!(
		"You analyze questions about past IT operations tickets. Schema: {QUERY_ANALYSIS_SCHEMA}. \
Output must be valid JSON only and must match the provided schema exactly. \
keywords are the technical terms worth searching for. hosts are server or host names exactly as written. \
date_expression is a relative period such as today, yesterday, last week, this month, last month, \
last 7 days, or a YYYY-MM month, or null when the question names no period."
	);
	let user_prompt = format!(
		"Return JSON matching this exact schema:\n{schema}\nQuestion:\n{query}",
		schema = prompts::schema_text(&schema),
	);

	prompts::messages(&system_prompt, user_prompt)
}
