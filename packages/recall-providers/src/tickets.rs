//! Redmine-compatible ticket repository.

use reqwest::StatusCode;
use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use recall_domain::records::{Comment, Relation, Ticket, TicketId};

use crate::Result;

const API_KEY_HEADER: &str = "x-redmine-api-key";

#[derive(Debug, Deserialize)]
struct IssueEnvelope {
	issue: Issue,
}

#[derive(Debug, Deserialize)]
struct Issue {
	id: TicketId,
	#[serde(default)]
	subject: String,
	#[serde(default)]
	description: Option<String>,
	status: Option<Named>,
	priority: Option<Named>,
	tracker: Option<Named>,
	project: Option<Named>,
	category: Option<Named>,
	assigned_to: Option<Named>,
	created_on: Option<String>,
	updated_on: Option<String>,
	closed_on: Option<String>,
	parent: Option<Parent>,
	#[serde(default)]
	journals: Vec<Journal>,
	#[serde(default)]
	relations: Vec<IssueRelation>,
}

#[derive(Debug, Deserialize)]
struct Named {
	name: String,
}

#[derive(Debug, Deserialize)]
struct Parent {
	id: TicketId,
}

#[derive(Debug, Deserialize)]
struct Journal {
	user: Option<Named>,
	notes: Option<String>,
	created_on: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IssueRelation {
	issue_id: TicketId,
	issue_to_id: TicketId,
	relation_type: String,
}

/// Confirms the API key is accepted by requesting the current user.
pub async fn ping(cfg: &recall_config::TicketBackendConfig) -> Result<()> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}/users/current.json", cfg.api_base);

	client
		.get(url)
		.headers(crate::api_key_headers(API_KEY_HEADER, &cfg.api_key, &cfg.default_headers)?)
		.send()
		.await?
		.error_for_status()?;

	Ok(())
}

/// Fetches one ticket with its journals and relations. A 404 is `Ok(None)`.
pub async fn fetch_ticket(
	cfg: &recall_config::TicketBackendConfig,
	id: TicketId,
) -> Result<Option<Ticket>> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}/issues/{id}.json", cfg.api_base);
	let res = client
		.get(url)
		.query(&[("include", "journals,relations")])
		.headers(crate::api_key_headers(API_KEY_HEADER, &cfg.api_key, &cfg.default_headers)?)
		.send()
		.await?;

	if res.status() == StatusCode::NOT_FOUND {
		return Ok(None);
	}

	let body = res.error_for_status()?.text().await?;

	parse_issue(&body).map(Some)
}

fn parse_issue(body: &str) -> Result<Ticket> {
	let IssueEnvelope { issue } = serde_json::from_str(body)?;
	let comments = issue
		.journals
		.into_iter()
		.filter_map(|journal| {
			let text = journal.notes.filter(|notes| !notes.trim().is_empty())?;

			Some(Comment {
				author: journal.user.map(|user| user.name).unwrap_or_default(),
				created_on: parse_timestamp(journal.created_on.as_deref()),
				text,
			})
		})
		.collect();
	let relations = issue
		.relations
		.into_iter()
		.map(|relation| Relation {
			issue_id: relation.issue_id,
			issue_to_id: relation.issue_to_id,
			relation_type: relation.relation_type,
		})
		.collect();

	Ok(Ticket {
		id: issue.id,
		subject: issue.subject,
		description: issue.description.unwrap_or_default(),
		status: issue.status.map(|status| status.name).unwrap_or_default(),
		priority: issue.priority.map(|named| named.name),
		tracker: issue.tracker.map(|named| named.name),
		project: issue.project.map(|named| named.name),
		category: issue.category.map(|named| named.name),
		assigned_to: issue.assigned_to.map(|named| named.name),
		created_on: parse_timestamp(issue.created_on.as_deref()),
		updated_on: parse_timestamp(issue.updated_on.as_deref()),
		closed_on: parse_timestamp(issue.closed_on.as_deref()),
		comments,
		relations,
		parent_id: issue.parent.map(|parent| parent.id),
	})
}

fn parse_timestamp(raw: Option<&str>) -> Option<OffsetDateTime> {
	raw.and_then(|value| OffsetDateTime::parse(value, &Rfc3339).ok())
}

#[cfg(test)]
mod tests {
	use super::*;

	const ISSUE: &str = r##"{
		"issue": {
			"id": 1204,
			"subject": "Disk alert on web-prod-01",
			"description": "Root volume at 95%.",
			"status": { "id": 5, "name": "Closed" },
			"priority": { "id": 2, "name": "Normal" },
			"tracker": { "id": 1, "name": "Incident" },
			"project": { "id": 3, "name": "Infra" },
			"assigned_to": { "id": 9, "name": "Sato" },
			"created_on": "2024-02-01T08:00:00Z",
			"closed_on": "2024-02-02T10:15:00Z",
			"parent": { "id": 1100 },
			"journals": [
				{ "id": 1, "user": { "id": 9, "name": "Sato" }, "notes": "Rotated logs, see #1180.", "created_on": "2024-02-01T09:00:00Z" },
				{ "id": 2, "user": { "id": 9, "name": "Sato" }, "notes": "", "created_on": "2024-02-01T09:05:00Z" },
				{ "id": 3, "user": { "id": 4, "name": "Ito" }, "notes": "Extended the volume.", "created_on": "not a timestamp" }
			],
			"relations": [
				{ "id": 77, "issue_id": 1180, "issue_to_id": 1204, "relation_type": "relates" }
			]
		}
	}"##;

	#[test]
	fn parses_issue_with_journals_and_relations() {
		let ticket = parse_issue(ISSUE).expect("parse failed");

		assert_eq!(ticket.id, 1204);
		assert_eq!(ticket.status, "Closed");
		assert_eq!(ticket.category, None);
		assert_eq!(ticket.parent_id, Some(1100));
		assert_eq!(ticket.comments.len(), 2);
		assert_eq!(ticket.comments[0].author, "Sato");
		assert!(ticket.comments[0].created_on.is_some());
		assert_eq!(ticket.comments[1].created_on, None);
		assert_eq!(ticket.resolution(), "Extended the volume.");
		assert_eq!(ticket.relations[0].other_end(1204), 1180);
		assert!(ticket.closed_on.is_some());
	}

	#[test]
	fn tolerates_minimal_issue() {
		let ticket = parse_issue(r#"{ "issue": { "id": 3, "description": null } }"#)
			.expect("parse failed");

		assert_eq!(ticket.subject, "");
		assert_eq!(ticket.description, "");
		assert!(ticket.comments.is_empty());
	}

	#[test]
	fn rejects_body_without_issue() {
		assert!(parse_issue("{}").is_err());
	}
}
