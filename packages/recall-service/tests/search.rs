use std::sync::Arc;

use serde_json::{Value, json};
use time::{Duration, OffsetDateTime};

use recall_service::{
	BoxFuture, Error, Plugin, PluginRegistry, RecallService, Result, SearchRequest,
	plugins::CMDB, synthesis,
};
use recall_testkit::{MemoryTickets, Reply, ScriptedIndex, ScriptedLlm, Vocabulary};

const QUESTION: &str = "How was the disk alert on web01 handled?";

struct StaticCmdb;
impl Plugin for StaticCmdb {
	fn name(&self) -> &str {
		CMDB
	}

	fn is_enabled(&self) -> bool {
		true
	}

	fn fetch<'a>(&'a self, params: &'a Value) -> BoxFuture<'a, Result<Value>> {
		let hosts = params["hosts"].clone();

		Box::pin(async move { Ok(json!({ "queried": hosts, "web01": { "role": "frontend" } })) })
	}
}

fn analysis(date_expression: Option<&str>) -> Value {
	json!({
		"keywords": ["disk", "alert"],
		"hosts": ["WEB01"],
		"date_expression": date_expression,
		"intent": "past_resolution"
	})
}

fn tickets() -> MemoryTickets {
	MemoryTickets::new()
		.with_ticket(recall_testkit::ticket(601, "Disk alert on web01", "Root volume 95%.", &[
			"Cleared old logs on web01.",
		]))
		.with_ticket(recall_testkit::ticket(602, "web01 disk usage", "Docker images.", &[
			"Pruned images, alert cleared.",
		]))
		.with_ticket(recall_testkit::ticket(603, "ext4 errors on web01", "Journal aborted.", &[
			"Ran fsck during the maintenance window.",
		]))
}

fn request(limit: Option<u32>, include_context: Option<bool>) -> SearchRequest {
	SearchRequest { query: QUESTION.to_string(), limit, include_context }
}

fn build(
	vocabulary: &Vocabulary,
	index: ScriptedIndex,
	llm: ScriptedLlm,
) -> (RecallService, Arc<ScriptedIndex>, Arc<ScriptedLlm>) {
	let index = Arc::new(index);
	let llm = Arc::new(llm);
	let service = recall_testkit::service(
		recall_testkit::test_config(),
		vocabulary,
		index.clone(),
		Arc::new(tickets()),
		llm.clone(),
	);

	(service, index, llm)
}

#[tokio::test]
async fn answers_from_records_ordered_by_similarity() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk alert", &[(601, 0.8), (602, 0.9)])
		.with_hosts(601, &["web01"])
		.with_hosts(602, &["web01"]);
	let llm = ScriptedLlm::new()
		.json("query_analysis.v1", analysis(None))
		.text("answer.v1", "#602 pruned images; #601 cleared logs.");
	let (service, index, _) = build(&vocabulary, index, llm);
	let result = service.search(request(Some(5), Some(false))).await.expect("Search failed.");
	let queries = index.queries();

	assert_eq!(result.records.iter().map(|record| record.id()).collect::<Vec<_>>(), vec![602, 601]);
	assert!(result.records.iter().all(|record| record.importance.is_none()));
	assert!(result.graph.is_empty());
	assert!(result.updates.is_empty());
	assert!(result.context_data.is_empty());
	assert_eq!(result.narrative, "#602 pruned images; #601 cleared logs.");
	assert_eq!(queries.len(), 1);
	assert_eq!(queries[0].text.as_deref(), Some("disk alert"));
	assert_eq!(queries[0].limit, 5);
	assert_eq!(queries[0].hosts, vec!["web01".to_string()]);
}

#[tokio::test]
async fn date_range_filters_on_closing_date() {
	let now = OffsetDateTime::now_utc();
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk alert", &[(601, 0.8), (602, 0.9)])
		.with_hosts(601, &["web01"])
		.with_hosts(602, &["web01"])
		.with_closed_on(601, now - Duration::days(2))
		.with_closed_on(602, now - Duration::days(40));
	let llm = ScriptedLlm::new().json("query_analysis.v1", analysis(Some("last 7 days")));
	let (service, _, _) = build(&vocabulary, index, llm);
	let result = service.search(request(None, Some(false))).await.expect("Search failed.");
	let analysis = result.trace.query_analysis.as_ref().expect("Expected a query analysis.");

	assert_eq!(result.records.iter().map(|record| record.id()).collect::<Vec<_>>(), vec![601]);
	assert!(analysis.date_range.is_some());
	assert!(result.narrative.contains("#601"));
}

#[tokio::test]
async fn date_range_applies_before_the_limit() {
	let now = OffsetDateTime::now_utc();
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk alert", &[(601, 0.95), (602, 0.9), (603, 0.85)])
		.with_hosts(601, &["web01"])
		.with_hosts(602, &["web01"])
		.with_hosts(603, &["web01"])
		.with_closed_on(601, now - Duration::days(40))
		.with_closed_on(602, now - Duration::days(40))
		.with_closed_on(603, now - Duration::days(2));
	let llm = ScriptedLlm::new().json("query_analysis.v1", analysis(Some("last 7 days")));
	let (service, index, _) = build(&vocabulary, index, llm);
	let result = service.search(request(Some(2), Some(false))).await.expect("Search failed.");
	let queries = index.queries();

	assert_eq!(result.records.iter().map(|record| record.id()).collect::<Vec<_>>(), vec![603]);
	assert_eq!(queries.len(), 1);
	assert_eq!(queries[0].limit, 2);
	assert!(queries[0].closed_on.is_some());
}

#[tokio::test]
async fn host_like_query_terms_do_not_filter_the_index() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary).with_results("ext4 corruption", &[(603, 0.8)]);
	let llm = ScriptedLlm::new().json(
		"query_analysis.v1",
		json!({
			"keywords": ["ext4", "corruption"],
			"hosts": [],
			"date_expression": null,
			"intent": "past_resolution"
		}),
	);
	let (service, index, _) = build(&vocabulary, index, llm);
	let request = SearchRequest {
		query: "How was the ext4 corruption fixed?".to_string(),
		limit: None,
		include_context: Some(false),
	};
	let result = service.search(request).await.expect("Search failed.");
	let queries = index.queries();

	assert_eq!(result.records.iter().map(|record| record.id()).collect::<Vec<_>>(), vec![603]);
	assert!(queries[0].hosts.is_empty());
	assert!(queries[0].closed_on.is_none());
}

#[tokio::test]
async fn cmdb_context_uses_query_and_record_hosts() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk alert", &[(601, 0.8)])
		.with_hosts(601, &["web01"]);
	let llm = ScriptedLlm::new().json("query_analysis.v1", analysis(None)).respond_with(
		"answer.v1",
		|messages| {
			let user = messages.get(1).and_then(|m| m["content"].as_str()).unwrap_or_default();

			Reply::Text(format!("reference data supplied: {}", user.contains("Reference data")))
		},
	);
	let (service, _, _) = build(&vocabulary, index, llm);
	let service = service.with_plugins(PluginRegistry::new(vec![Arc::new(StaticCmdb)]));
	let result = service.search(request(None, None)).await.expect("Search failed.");
	let cmdb = result.context_data.get(CMDB).expect("Expected cmdb context.");

	assert_eq!(cmdb["queried"], json!(["web01"]));
	assert_eq!(result.narrative, "reference data supplied: true");
}

#[tokio::test]
async fn no_matches_skip_the_answer_call() {
	let vocabulary = Vocabulary::new();
	let llm = ScriptedLlm::new().fail("query_analysis.v1");
	let (service, index, llm) = build(&vocabulary, ScriptedIndex::new(&vocabulary), llm);
	let result = service.search(request(None, Some(false))).await.expect("Search failed.");
	let queries = index.queries();

	assert!(result.records.is_empty());
	assert_eq!(result.narrative, synthesis::NO_MATCHING_RECORDS);
	assert_eq!(llm.calls_for("answer.v1"), 0);
	assert!(result.trace.relaxed_retry);
	assert_eq!(queries.len(), 2);
	assert_eq!(queries[0].text.as_deref(), Some(QUESTION));
	assert!(queries[0].hosts.is_empty());
}

#[tokio::test]
async fn answer_failure_lists_the_top_records() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk alert", &[(601, 0.8), (602, 0.9)])
		.with_hosts(601, &["web01"])
		.with_hosts(602, &["web01"]);
	let llm = ScriptedLlm::new().json("query_analysis.v1", analysis(None)).fail("answer.v1");
	let (service, _, _) = build(&vocabulary, index, llm);
	let result = service.search(request(None, Some(false))).await.expect("Search failed.");

	assert!(result.narrative.contains("1. #602"));
	assert!(result.narrative.contains("2. #601"));
}

#[tokio::test]
async fn limit_must_be_within_bounds() {
	let vocabulary = Vocabulary::new();
	let (service, index, _) = build(&vocabulary, ScriptedIndex::new(&vocabulary), ScriptedLlm::new());

	for limit in [0, 51] {
		let err = service
			.search(request(Some(limit), None))
			.await
			.expect_err("Expected a validation error.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	assert!(index.queries().is_empty());
}
