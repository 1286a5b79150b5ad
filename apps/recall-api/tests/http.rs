use std::{collections::HashMap, sync::Arc};

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::{Value, json};
use tower::util::ServiceExt;

use recall_api::{routes, state::AppState};
use recall_config::{MessageTemplate, MessageTemplatePlugin};
use recall_testkit::{MemoryTickets, ScriptedIndex, ScriptedLlm, Vocabulary};

fn app_with(index: ScriptedIndex, vocabulary: &Vocabulary, tickets: MemoryTickets) -> Router {
	let mut cfg = recall_testkit::test_config();

	cfg.plugins.message_template = MessageTemplatePlugin {
		enabled: true,
		templates: HashMap::from([(
			"maintenance_notice".to_string(),
			MessageTemplate {
				subject: "Maintenance on {host}".to_string(),
				body: "{host} will restart at {time}.".to_string(),
			},
		)]),
	};

	let service = recall_testkit::service(
		cfg,
		vocabulary,
		Arc::new(index),
		Arc::new(tickets),
		Arc::new(ScriptedLlm::new()),
	);

	routes::router(AppState::from_service(service))
}

fn app() -> Router {
	let vocabulary = Vocabulary::new();

	app_with(ScriptedIndex::new(&vocabulary), &vocabulary, MemoryTickets::new())
}

async fn call(app: Router, method: &str, uri: &str, payload: Option<Value>) -> (StatusCode, Value) {
	let body = match payload {
		Some(payload) => Body::from(payload.to_string()),
		None => Body::empty(),
	};
	let response = app
		.oneshot(
			Request::builder()
				.method(method)
				.uri(uri)
				.header("content-type", "application/json")
				.body(body)
				.expect("Failed to build request."),
		)
		.await
		.expect("Failed to call the router.");
	let status = response.status();
	let bytes = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if bytes.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&bytes).expect("Failed to parse response.")
	};

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let (status, json) = call(app(), "GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["status"], "ok");
	assert_eq!(json["qdrant"]["healthy"], true);
	assert_eq!(json["tickets"]["healthy"], true);
	assert_eq!(json["collection"]["name"], "tickets");
}

#[tokio::test]
async fn health_reports_degraded_backends() {
	let vocabulary = Vocabulary::new();
	let app = app_with(
		ScriptedIndex::new(&vocabulary).failing(),
		&vocabulary,
		MemoryTickets::new().unreachable(),
	);
	let (status, json) = call(app, "GET", "/health", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["status"], "degraded");
	assert_eq!(json["qdrant"]["healthy"], false);
	assert!(json["qdrant"]["error"].as_str().is_some());
	assert_eq!(json["tickets"]["healthy"], false);
	assert!(json.get("collection").is_none());
}

#[tokio::test]
async fn collection_info_reports_point_counts() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary).with_results("disk", &[(1, 0.9), (2, 0.8)]);
	let app = app_with(index, &vocabulary, MemoryTickets::new());
	let (status, json) = call(app, "GET", "/collection/info", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["points_count"], 2);
	assert_eq!(json["status"], "Green");

	let vocabulary = Vocabulary::new();
	let app = app_with(ScriptedIndex::new(&vocabulary).failing(), &vocabulary, MemoryTickets::new());
	let (status, json) = call(app, "GET", "/collection/info", None).await;

	assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
	assert_eq!(json["error_code"], "QDRANT_ERROR");
}

#[tokio::test]
async fn zabbix_alert_returns_similar_tickets() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary)
		.with_results("disk usage over 90% on web-prod-01: 92%", &[(21, 0.88), (22, 0.6)]);
	let mut ticket =
		recall_testkit::ticket(21, "Disk full on web-prod-01", "Root volume 95%.", &[
			"Rotated nginx logs.",
		]);

	ticket.priority = Some("High".to_string());
	ticket.tracker = Some("Incident".to_string());

	let app = app_with(index, &vocabulary, MemoryTickets::new().with_ticket(ticket));
	let alert = json!({
		"trigger_name": "disk usage over 90%",
		"hostname": "web-prod-01",
		"severity": "High",
		"item_value": "92%",
		"event_id": 12345,
		"trigger_id": 67890
	});
	let (status, json) = call(app, "POST", "/webhook/zabbix", Some(alert)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["count"], 1);
	assert_eq!(json["alert"]["event_id"], 12345);
	assert_eq!(json["similar_tickets"][0]["ticket_id"], 21);
	assert_eq!(json["similar_tickets"][0]["resolution"], "Rotated nginx logs.");
	assert_eq!(json["similar_tickets"][0]["priority"], "High");
	assert_eq!(json["similar_tickets"][0]["tracker"], "Incident");
}

#[tokio::test]
async fn alert_search_validates_the_limit() {
	for limit in [0, 21] {
		let payload = json!({ "alert_text": "disk full", "limit": limit });
		let (status, json) = call(app(), "POST", "/v1/alerts/search", Some(payload)).await;

		assert_eq!(status, StatusCode::BAD_REQUEST);
		assert_eq!(json["error_code"], "INVALID_REQUEST");
	}

	let payload = json!({ "alert_text": "disk full" });
	let (status, json) = call(app(), "POST", "/v1/alerts/search", Some(payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json, json!([]));
}

#[tokio::test]
async fn assist_returns_a_pipeline_result() {
	let vocabulary = Vocabulary::new();
	let index = ScriptedIndex::new(&vocabulary).with_results("restart haproxy", &[(11, 0.9)]);
	let tickets = MemoryTickets::new().with_ticket(recall_testkit::ticket(
		11,
		"HAProxy restart",
		"Reloaded after cert renewal.",
		&["Restarted with zero downtime."],
	));
	let app = app_with(index, &vocabulary, tickets);
	let (status, json) =
		call(app, "POST", "/v1/assist", Some(json!({ "task": "restart haproxy" }))).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["mode"], "assist");
	assert_eq!(json["records"][0]["id"], 11);
	assert!(json["narrative"].as_str().is_some_and(|narrative| !narrative.is_empty()));
}

#[tokio::test]
async fn blank_task_is_a_bad_request() {
	let (status, json) = call(app(), "POST", "/v1/assist", Some(json!({ "task": " " }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn search_limit_out_of_range_is_a_bad_request() {
	let (status, json) =
		call(app(), "POST", "/v1/search", Some(json!({ "query": "disk", "limit": 500 }))).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}

#[tokio::test]
async fn unreachable_index_is_service_unavailable() {
	let vocabulary = Vocabulary::new();
	let app = app_with(ScriptedIndex::new(&vocabulary).failing(), &vocabulary, MemoryTickets::new());
	let (status, json) = call(app, "POST", "/v1/search", Some(json!({ "query": "disk" }))).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(json["error_code"], "BACKEND_UNAVAILABLE");
}

#[tokio::test]
async fn lists_enabled_plugins() {
	let (status, json) = call(app(), "GET", "/v1/plugins", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["plugins"], json!(["message_template"]));
}

#[tokio::test]
async fn lists_builtin_and_configured_templates() {
	let (status, json) = call(app(), "GET", "/v1/templates", None).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(
		json["templates"],
		json!(["internal_notification", "maintenance_notice", "vendor_escalation", "vendor_inquiry"])
	);
}

#[tokio::test]
async fn renders_templates_and_reports_unknown_ones() {
	let payload = json!({ "template": "maintenance_notice", "variables": { "host": "db01" } });
	let (status, json) = call(app(), "POST", "/v1/templates/render", Some(payload)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["subject"], "Maintenance on db01");
	assert_eq!(json["body"], "db01 will restart at {time}.");

	let (status, json) =
		call(app(), "POST", "/v1/templates/render", Some(json!({ "template": "nope" }))).await;

	assert_eq!(status, StatusCode::NOT_FOUND);
	assert_eq!(json["error_code"], "NOT_FOUND");
}
