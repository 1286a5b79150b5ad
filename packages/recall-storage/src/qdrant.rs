pub const TICKET_ID_FIELD: &str = "ticket_id";
pub const CLOSED_ON_FIELD: &str = "closed_on";
pub const HOSTS_FIELD: &str = "server_names";

use std::time::Duration;

use qdrant_client::qdrant::{
	CollectionStatus, Condition, DatetimeRange, Filter, ScoredPoint, SearchPointsBuilder, Timestamp,
	Value, point_id::PointIdOptions, value::Kind,
};
use serde::Serialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use recall_domain::{dates::DateRange, records::TicketId};

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct VectorQuery {
	pub vector: Vec<f32>,
	pub limit: u32,
	pub score_threshold: f32,
	/// Restricts hits to tickets indexed with any of these host names.
	pub hosts: Vec<String>,
	/// Restricts hits to tickets closed inside this range. Points without `closed_on` never match.
	pub closed_on: Option<DateRange>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorHit {
	pub id: TicketId,
	pub score: f32,
	#[serde(with = "recall_domain::time_serde::option")]
	pub closed_on: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionStats {
	pub name: String,
	pub status: String,
	pub points_count: Option<u64>,
	pub indexed_vectors_count: Option<u64>,
	pub segments_count: u64,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
	pub vector_name: Option<String>,
}
impl QdrantStore {
	pub fn new(cfg: &recall_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url)
			.timeout(Duration::from_millis(cfg.timeout_ms))
			.build()?;

		Ok(Self {
			client,
			collection: cfg.collection.clone(),
			vector_dim: cfg.vector_dim,
			vector_name: cfg.vector_name.clone(),
		})
	}

	pub async fn search(&self, query: &VectorQuery) -> Result<Vec<VectorHit>> {
		if query.vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions; collection expects {}.",
				query.vector.len(),
				self.vector_dim
			)));
		}

		let mut builder =
			SearchPointsBuilder::new(&self.collection, query.vector.clone(), u64::from(query.limit))
				.score_threshold(query.score_threshold)
				.with_payload(true);

		let conditions = filter_conditions(query);

		if !conditions.is_empty() {
			builder = builder.filter(Filter::must(conditions));
		}
		if let Some(name) = self.vector_name.as_deref() {
			builder = builder.vector_name(name);
		}

		let response = self.client.search_points(builder).await?;

		Ok(response.result.iter().filter_map(hit_from_point).collect())
	}

	pub async fn collection_info(&self) -> Result<CollectionStats> {
		let response = self.client.collection_info(self.collection.as_str()).await?;
		let info = response.result.ok_or_else(|| {
			Error::InvalidArgument(format!("Collection {} returned no info.", self.collection))
		})?;
		let status = CollectionStatus::try_from(info.status)
			.unwrap_or(CollectionStatus::UnknownCollectionStatus)
			.as_str_name()
			.to_string();

		Ok(CollectionStats {
			name: self.collection.clone(),
			status,
			points_count: info.points_count,
			indexed_vectors_count: info.indexed_vectors_count,
			segments_count: info.segments_count,
		})
	}
}

/// Host and closing-date restrictions, pushed down so they apply before the limit.
pub fn filter_conditions(query: &VectorQuery) -> Vec<Condition> {
	let mut conditions = Vec::new();

	if !query.hosts.is_empty() {
		conditions.push(Condition::matches(HOSTS_FIELD, query.hosts.clone()));
	}
	if let Some(range) = query.closed_on.as_ref() {
		conditions.push(closed_on_condition(range));
	}

	conditions
}

/// Whole days in UTC: from the start date's midnight up to, not including, the day after the end.
fn closed_on_condition(range: &DateRange) -> Condition {
	let gte = Some(timestamp(range.start.midnight().assume_utc()));
	let lt = range.end.next_day().map(|next| timestamp(next.midnight().assume_utc()));

	Condition::datetime_range(CLOSED_ON_FIELD, DatetimeRange { lt, gt: None, gte, lte: None })
}

fn timestamp(at: OffsetDateTime) -> Timestamp {
	Timestamp { seconds: at.unix_timestamp(), nanos: at.nanosecond() as i32 }
}

/// Points without a usable ticket id are skipped.
pub fn hit_from_point(point: &ScoredPoint) -> Option<VectorHit> {
	let id = point.payload.get(TICKET_ID_FIELD).and_then(payload_ticket_id).or_else(|| {
		match point.id.as_ref().and_then(|id| id.point_id_options.as_ref()) {
			Some(PointIdOptions::Num(num)) => Some(*num),
			_ => None,
		}
	})?;
	let closed_on = point
		.payload
		.get(CLOSED_ON_FIELD)
		.and_then(payload_string)
		.and_then(|raw| OffsetDateTime::parse(raw, &Rfc3339).ok());

	Some(VectorHit { id, score: point.score, closed_on })
}

fn payload_ticket_id(value: &Value) -> Option<TicketId> {
	match value.kind.as_ref() {
		Some(Kind::IntegerValue(num)) => TicketId::try_from(*num).ok(),
		Some(Kind::StringValue(raw)) => raw.trim().parse().ok(),
		_ => None,
	}
}

fn payload_string(value: &Value) -> Option<&str> {
	match value.kind.as_ref() {
		Some(Kind::StringValue(raw)) => Some(raw.as_str()),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use std::collections::HashMap;

	use qdrant_client::qdrant::{PointId, condition::ConditionOneOf, r#match::MatchValue};
	use time::macros::date;

	use super::*;

	fn point(id: Option<PointId>, payload: HashMap<String, Value>, score: f32) -> ScoredPoint {
		ScoredPoint { id, payload, score, ..Default::default() }
	}

	#[test]
	fn reads_ticket_id_and_closed_on_from_payload() {
		let payload = HashMap::from([
			(TICKET_ID_FIELD.to_string(), Value::from(1204_i64)),
			(CLOSED_ON_FIELD.to_string(), Value::from("2024-02-02T10:15:00Z")),
		]);
		let hit = hit_from_point(&point(Some(PointId::from(9_u64)), payload, 0.82))
			.expect("Expected a hit.");

		assert_eq!(hit.id, 1204);
		assert_eq!(hit.score, 0.82);
		assert!(hit.closed_on.is_some());
	}

	#[test]
	fn falls_back_to_numeric_point_id() {
		let hit = hit_from_point(&point(Some(PointId::from(77_u64)), HashMap::new(), 0.5))
			.expect("Expected a hit.");

		assert_eq!(hit.id, 77);
		assert_eq!(hit.closed_on, None);
	}

	#[test]
	fn string_ticket_ids_are_accepted() {
		let payload = HashMap::from([(TICKET_ID_FIELD.to_string(), Value::from("42"))]);
		let hit = hit_from_point(&point(None, payload, 0.5)).expect("Expected a hit.");

		assert_eq!(hit.id, 42);
	}

	#[test]
	fn skips_points_without_ticket_identity() {
		let uuid = PointId::from("6f1c1c1e-1111-4a4a-8b8b-000000000001".to_string());

		assert!(hit_from_point(&point(Some(uuid), HashMap::new(), 0.5)).is_none());
		assert!(
			hit_from_point(&point(
				None,
				HashMap::from([(TICKET_ID_FIELD.to_string(), Value::from(-3_i64))]),
				0.5
			))
			.is_none()
		);
	}

	fn query(hosts: &[&str], closed_on: Option<DateRange>) -> VectorQuery {
		VectorQuery {
			vector: vec![0.0; 4],
			limit: 2,
			score_threshold: 0.5,
			hosts: hosts.iter().map(|host| host.to_string()).collect(),
			closed_on,
		}
	}

	fn field_condition(condition: &Condition) -> &qdrant_client::qdrant::FieldCondition {
		match condition.condition_one_of.as_ref() {
			Some(ConditionOneOf::Field(field)) => field,
			other => panic!("Expected a field condition, got {other:?}."),
		}
	}

	#[test]
	fn unfiltered_query_has_no_conditions() {
		assert!(filter_conditions(&query(&[], None)).is_empty());
	}

	#[test]
	fn hosts_become_a_keyword_match() {
		let conditions = filter_conditions(&query(&["web01", "db02"], None));
		let field = field_condition(&conditions[0]);

		assert_eq!(conditions.len(), 1);
		assert_eq!(field.key, HOSTS_FIELD);
		assert!(matches!(
			field.r#match.as_ref().and_then(|m| m.match_value.as_ref()),
			Some(MatchValue::Keywords(_))
		));
	}

	#[test]
	fn closing_date_range_covers_whole_days() {
		let range = DateRange::new(date!(2024 - 02 - 01), date!(2024 - 02 - 29));
		let conditions = filter_conditions(&query(&[], Some(range)));
		let field = field_condition(&conditions[0]);
		let datetime_range = field.datetime_range.as_ref().expect("Expected a datetime range.");
		let start = date!(2024 - 02 - 01).midnight().assume_utc().unix_timestamp();
		let end = date!(2024 - 03 - 01).midnight().assume_utc().unix_timestamp();

		assert_eq!(field.key, CLOSED_ON_FIELD);
		assert_eq!(datetime_range.gte.as_ref().map(|ts| ts.seconds), Some(start));
		assert_eq!(datetime_range.lt.as_ref().map(|ts| ts.seconds), Some(end));
		assert!(datetime_range.gt.is_none());
		assert!(datetime_range.lte.is_none());
	}
}
