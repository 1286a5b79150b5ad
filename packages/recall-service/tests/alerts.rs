use std::sync::Arc;

use recall_service::{AlertSearchRequest, Error, HealthStatus, RecallService, ZabbixAlert};
use recall_testkit::{MemoryTickets, ScriptedIndex, ScriptedLlm, Vocabulary};

fn build(
	vocabulary: &Vocabulary,
	index: ScriptedIndex,
	tickets: MemoryTickets,
) -> (RecallService, Arc<ScriptedIndex>, Arc<ScriptedLlm>) {
	let index = Arc::new(index);
	let llm = Arc::new(ScriptedLlm::new());
	let service = recall_testkit::service(
		recall_testkit::test_config(),
		vocabulary,
		index.clone(),
		Arc::new(tickets),
		llm.clone(),
	);

	(service, index, llm)
}

fn tickets() -> MemoryTickets {
	MemoryTickets::new()
		.with_ticket(recall_testkit::ticket(31, "Swap exhausted on db02", "OOM killer.", &[
			"Raised vm.swappiness and added 4G swap.",
		]))
		.with_ticket(recall_testkit::ticket(32, "db02 memory alert", "Java heap.", &[
			"Lowered the heap size.",
		]))
}

fn alert() -> ZabbixAlert {
	ZabbixAlert {
		trigger_name: "Low free swap".to_string(),
		hostname: "db02".to_string(),
		severity: "Average".to_string(),
		item_value: "3%".to_string(),
		event_id: 9001,
		trigger_id: None,
		event_time: None,
	}
}

fn request(alert_text: &str, limit: Option<u32>) -> AlertSearchRequest {
	AlertSearchRequest { alert_text: alert_text.to_string(), limit }
}

#[tokio::test]
async fn similar_tickets_use_the_alert_threshold_without_llm_calls() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("swap low", &[(31, 0.92), (32, 0.75), (33, 0.5)]);
	let (service, index, llm) = build(&vocabulary, index, tickets());
	let similar =
		service.similar_tickets(request(" swap low ", None)).await.expect("Lookup failed.");
	let queries = index.queries();

	assert_eq!(similar.iter().map(|ticket| ticket.ticket_id).collect::<Vec<_>>(), vec![31, 32]);
	assert_eq!(similar[0].resolution, "Raised vm.swappiness and added 4G swap.");
	assert_eq!(queries.len(), 1);
	assert_eq!(queries[0].text.as_deref(), Some("swap low"));
	assert_eq!(queries[0].limit, 5);
	assert_eq!(queries[0].score_threshold, 0.7);
	assert!(queries[0].hosts.is_empty());
	assert!(queries[0].closed_on.is_none());
	assert!(llm.calls().is_empty());
}

#[tokio::test]
async fn alert_lookup_validates_text_and_limit() {
	let vocabulary = Vocabulary::new();
	let (service, index, _) = build(&vocabulary, ScriptedIndex::new(&vocabulary), tickets());

	for req in [request(" ", None), request("swap", Some(0)), request("swap", Some(21))] {
		let err = service.similar_tickets(req).await.expect_err("Expected a validation error.");

		assert!(matches!(err, Error::InvalidRequest { .. }));
	}

	assert!(index.queries().is_empty());
}

#[tokio::test]
async fn webhook_alert_searches_its_formatted_text() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("Low free swap on db02: 3%", &[(31, 0.9), (34, 0.85)]);
	let (service, index, _) = build(&vocabulary, index, tickets());
	let response = service.handle_alert(alert()).await.expect("Alert handling failed.");
	let queries = index.queries();

	assert_eq!(response.count, 1);
	assert_eq!(response.alert, alert());
	assert_eq!(response.similar_tickets[0].ticket_id, 31);
	assert_eq!(queries[0].limit, 5);
}

#[tokio::test]
async fn alert_lookup_fails_when_backends_are_down() {
	let vocabulary = Vocabulary::new();
	let (service, _, _) = build(&vocabulary, ScriptedIndex::new(&vocabulary).failing(), tickets());
	let err = service.handle_alert(alert()).await.expect_err("Expected an unavailable error.");

	assert!(matches!(err, Error::Unavailable { .. }));

	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary).with_results("swap", &[(31, 0.9)]);
	let (service, _, _) = build(&vocabulary, index, tickets().unreachable());
	let err =
		service.similar_tickets(request("swap", None)).await.expect_err("Expected an error.");

	assert!(matches!(err, Error::Unavailable { .. }));
}

#[tokio::test]
async fn health_is_degraded_by_any_failing_backend() {
	let vocabulary = Vocabulary::new();
	let (service, _, _) = build(&vocabulary, ScriptedIndex::new(&vocabulary), tickets());
	let report = service.health().await;

	assert_eq!(report.status, HealthStatus::Ok);
	assert!(report.collection.is_some());

	let (service, _, _) =
		build(&vocabulary, ScriptedIndex::new(&vocabulary), tickets().unreachable());
	let report = service.health().await;

	assert_eq!(report.status, HealthStatus::Degraded);
	assert!(report.qdrant.healthy);
	assert!(!report.tickets.healthy);
	assert!(report.tickets.error.is_some());
}
