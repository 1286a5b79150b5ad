//! Scripted stand-ins for the external services the pipelines call.
//!
//! [`StubEmbedding`] and [`ScriptedIndex`] share a [`Vocabulary`]: every embedded text gets a
//! slot number that is written into the first vector component, so the index can tell which
//! search string a query vector came from and answer with the hits scripted for it.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value};
use time::OffsetDateTime;

use recall_config::{
	Config, EmbeddingProviderConfig, LlmProviderConfig, Qdrant, Service, Storage,
	TicketBackendConfig,
};
use recall_domain::{
	dates::DateRange,
	records::{Comment, Ticket, TicketId},
};
use recall_providers::llm::{Completion, ResponseFormat};
use recall_service::{
	BoxFuture, EmbeddingProvider, LlmProvider, Providers, RecallService, TicketRepository,
	VectorIndex,
};
use recall_storage::qdrant::{CollectionStats, VectorHit, VectorQuery};

pub const VECTOR_DIM: u32 = 4;

/// A complete configuration with small dimensions and placeholder endpoints.
pub fn test_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		storage: Storage {
			qdrant: Qdrant {
				url: "http://127.0.0.1:6334".to_string(),
				collection: "tickets_test".to_string(),
				vector_dim: VECTOR_DIM,
				vector_name: None,
				timeout_ms: 1_000,
			},
		},
		providers: recall_config::Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			llm: LlmProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-llm".to_string(),
				temperature: 0.0,
				max_tokens: None,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			tickets: TicketBackendConfig {
				api_base: "http://127.0.0.1:9".to_string(),
				api_key: "test-key".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
		},
		search: Default::default(),
		gaps: Default::default(),
		ranking: Default::default(),
		relationships: Default::default(),
		synthesis: Default::default(),
		pipeline: Default::default(),
		updates: Default::default(),
		plugins: Default::default(),
		alerts: Default::default(),
	}
}

/// Wires the scripted stubs into a service.
pub fn service(
	cfg: Config,
	vocabulary: &Vocabulary,
	index: Arc<ScriptedIndex>,
	tickets: Arc<MemoryTickets>,
	llm: Arc<ScriptedLlm>,
) -> RecallService {
	let embedding = Arc::new(StubEmbedding::new(vocabulary.clone()));

	RecallService::with_providers(cfg, index, Providers::new(embedding, tickets, llm))
}

pub fn ticket(id: TicketId, subject: &str, description: &str, comments: &[&str]) -> Ticket {
	Ticket {
		id,
		subject: subject.to_string(),
		description: description.to_string(),
		status: "Closed".to_string(),
		comments: comments.iter().map(|text| comment("ops", text)).collect(),
		..Default::default()
	}
}

pub fn comment(author: &str, text: &str) -> Comment {
	Comment { author: author.to_string(), created_on: None, text: text.to_string() }
}

/// Texts seen by [`StubEmbedding`], in first-seen order.
#[derive(Clone, Default)]
pub struct Vocabulary {
	texts: Arc<Mutex<Vec<String>>>,
}
impl Vocabulary {
	pub fn new() -> Self {
		Self::default()
	}

	fn slot(&self, text: &str) -> usize {
		let mut texts = self.texts.lock().unwrap_or_else(|err| err.into_inner());

		match texts.iter().position(|known| known == text) {
			Some(slot) => slot,
			None => {
				texts.push(text.to_string());

				texts.len() - 1
			},
		}
	}

	fn text(&self, vector: &[f32]) -> Option<String> {
		let slot = vector.first().copied()?;

		if slot < 0.0 {
			return None;
		}

		let texts = self.texts.lock().unwrap_or_else(|err| err.into_inner());

		texts.get(slot as usize).cloned()
	}
}

pub struct StubEmbedding {
	vocabulary: Vocabulary,
	pub calls: AtomicUsize,
}
impl StubEmbedding {
	pub fn new(vocabulary: Vocabulary) -> Self {
		Self { vocabulary, calls: AtomicUsize::new(0) }
	}
}

impl EmbeddingProvider for StubEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, recall_providers::Result<Vec<Vec<f32>>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		let dim = cfg.dimensions as usize;
		let vectors = texts
			.iter()
			.map(|text| {
				let mut vector = vec![0.0; dim];

				if let Some(first) = vector.first_mut() {
					*first = self.vocabulary.slot(text) as f32;
				}

				vector
			})
			.collect();

		Box::pin(async move { Ok(vectors) })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedQuery {
	pub text: Option<String>,
	pub limit: u32,
	pub score_threshold: f32,
	pub hosts: Vec<String>,
	pub closed_on: Option<DateRange>,
}

/// Vector index answering with hits scripted per search string.
///
/// Applies the score threshold and the host and closing-date filters before the limit, the way
/// Qdrant would.
pub struct ScriptedIndex {
	vocabulary: Vocabulary,
	results: HashMap<String, Vec<(TicketId, f32)>>,
	closed_on: HashMap<TicketId, OffsetDateTime>,
	hosts: HashMap<TicketId, Vec<String>>,
	failing_queries: HashSet<String>,
	failing: bool,
	queries: Mutex<Vec<RecordedQuery>>,
}
impl ScriptedIndex {
	pub fn new(vocabulary: &Vocabulary) -> Self {
		Self {
			vocabulary: vocabulary.clone(),
			results: HashMap::new(),
			closed_on: HashMap::new(),
			hosts: HashMap::new(),
			failing_queries: HashSet::new(),
			failing: false,
			queries: Mutex::new(Vec::new()),
		}
	}

	pub fn with_results(mut self, query: &str, hits: &[(TicketId, f32)]) -> Self {
		self.results.insert(query.to_string(), hits.to_vec());

		self
	}

	pub fn with_closed_on(mut self, id: TicketId, closed_on: OffsetDateTime) -> Self {
		self.closed_on.insert(id, closed_on);

		self
	}

	pub fn with_hosts(mut self, id: TicketId, hosts: &[&str]) -> Self {
		self.hosts.insert(id, hosts.iter().map(|host| host.to_string()).collect());

		self
	}

	pub fn failing_query(mut self, query: &str) -> Self {
		self.failing_queries.insert(query.to_string());

		self
	}

	/// Every search fails.
	pub fn failing(mut self) -> Self {
		self.failing = true;

		self
	}

	pub fn queries(&self) -> Vec<RecordedQuery> {
		self.queries.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	fn answer(&self, text: Option<&str>, query: &VectorQuery) -> recall_storage::Result<Vec<VectorHit>> {
		if self.failing || text.is_some_and(|text| self.failing_queries.contains(text)) {
			return Err(recall_storage::Error::InvalidArgument(
				"Scripted search failure.".to_string(),
			));
		}

		let hits = text
			.and_then(|text| self.results.get(text))
			.map(|hits| hits.as_slice())
			.unwrap_or(&[])
			.iter()
			.filter(|(_, score)| *score >= query.score_threshold)
			.filter(|(id, _)| self.matches_hosts(*id, &query.hosts))
			.filter(|(id, _)| self.matches_closed_on(*id, query.closed_on.as_ref()))
			.take(query.limit as usize)
			.map(|(id, score)| VectorHit {
				id: *id,
				score: *score,
				closed_on: self.closed_on.get(id).copied(),
			})
			.collect();

		Ok(hits)
	}

	fn matches_hosts(&self, id: TicketId, hosts: &[String]) -> bool {
		if hosts.is_empty() {
			return true;
		}

		self.hosts.get(&id).is_some_and(|known| known.iter().any(|host| hosts.contains(host)))
	}

	fn matches_closed_on(&self, id: TicketId, range: Option<&DateRange>) -> bool {
		let Some(range) = range else {
			return true;
		};

		self.closed_on.get(&id).is_some_and(|closed_on| range.contains(*closed_on))
	}
}

impl VectorIndex for ScriptedIndex {
	fn search<'a>(
		&'a self,
		query: &'a VectorQuery,
	) -> BoxFuture<'a, recall_storage::Result<Vec<VectorHit>>> {
		let text = self.vocabulary.text(&query.vector);

		self.queries.lock().unwrap_or_else(|err| err.into_inner()).push(RecordedQuery {
			text: text.clone(),
			limit: query.limit,
			score_threshold: query.score_threshold,
			hosts: query.hosts.clone(),
			closed_on: query.closed_on,
		});

		let result = self.answer(text.as_deref(), query);

		Box::pin(async move { result })
	}

	fn collection_info(&self) -> BoxFuture<'_, recall_storage::Result<CollectionStats>> {
		let result = if self.failing {
			Err(recall_storage::Error::InvalidArgument("Scripted index is down.".to_string()))
		} else {
			let points: HashSet<TicketId> =
				self.results.values().flatten().map(|(id, _)| *id).collect();

			Ok(CollectionStats {
				name: "tickets".to_string(),
				status: "Green".to_string(),
				points_count: Some(points.len() as u64),
				indexed_vectors_count: Some(points.len() as u64),
				segments_count: 1,
			})
		};

		Box::pin(async move { result })
	}
}

/// In-memory ticket repository.
#[derive(Default)]
pub struct MemoryTickets {
	tickets: HashMap<TicketId, Ticket>,
	failing: HashSet<TicketId>,
	unreachable_ids: HashSet<TicketId>,
	unreachable: bool,
	fetches: AtomicUsize,
}
impl MemoryTickets {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_ticket(mut self, ticket: Ticket) -> Self {
		self.tickets.insert(ticket.id, ticket);

		self
	}

	/// Fetching `id` fails with a non-transport error.
	pub fn failing_id(mut self, id: TicketId) -> Self {
		self.failing.insert(id);

		self
	}

	/// Fetching `id` fails as if the connection dropped.
	pub fn unreachable_id(mut self, id: TicketId) -> Self {
		self.unreachable_ids.insert(id);

		self
	}

	/// Every fetch fails as if the repository were down.
	pub fn unreachable(mut self) -> Self {
		self.unreachable = true;

		self
	}

	pub fn fetches(&self) -> usize {
		self.fetches.load(Ordering::SeqCst)
	}
}

impl TicketRepository for MemoryTickets {
	fn fetch_ticket<'a>(
		&'a self,
		_cfg: &'a TicketBackendConfig,
		id: TicketId,
	) -> BoxFuture<'a, recall_providers::Result<Option<Ticket>>> {
		self.fetches.fetch_add(1, Ordering::SeqCst);

		let result = if self.unreachable || self.unreachable_ids.contains(&id) {
			Err(recall_providers::Error::Unreachable {
				message: "Ticket repository connection refused.".to_string(),
			})
		} else if self.failing.contains(&id) {
			Err(recall_providers::Error::InvalidResponse {
				message: format!("Scripted failure for ticket {id}."),
			})
		} else {
			Ok(self.tickets.get(&id).cloned())
		};

		Box::pin(async move { result })
	}

	fn ping<'a>(
		&'a self,
		_cfg: &'a TicketBackendConfig,
	) -> BoxFuture<'a, recall_providers::Result<()>> {
		let result = if self.unreachable {
			Err(recall_providers::Error::Unreachable {
				message: "Ticket repository connection refused.".to_string(),
			})
		} else {
			Ok(())
		};

		Box::pin(async move { result })
	}
}

type Responder = Arc<dyn Fn(&[Value]) -> Reply + Send + Sync>;

#[derive(Debug, Clone)]
pub enum Reply {
	Json(Value),
	Text(String),
	Fail,
}

/// Language model answering by marker: the first route whose marker occurs in the system
/// prompt responds. Unrouted calls fail.
#[derive(Default)]
pub struct ScriptedLlm {
	routes: Vec<(String, Responder)>,
	calls: Mutex<Vec<String>>,
}
impl ScriptedLlm {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn json(self, marker: &str, value: Value) -> Self {
		self.respond_with(marker, move |_| Reply::Json(value.clone()))
	}

	pub fn text(self, marker: &str, text: &str) -> Self {
		let text = text.to_string();

		self.respond_with(marker, move |_| Reply::Text(text.clone()))
	}

	pub fn fail(self, marker: &str) -> Self {
		self.respond_with(marker, |_| Reply::Fail)
	}

	pub fn respond_with<F>(mut self, marker: &str, responder: F) -> Self
	where
		F: Fn(&[Value]) -> Reply + Send + Sync + 'static,
	{
		self.routes.push((marker.to_string(), Arc::new(responder)));

		self
	}

	/// Markers of every call made so far, `"unrouted"` for calls no route matched.
	pub fn calls(&self) -> Vec<String> {
		self.calls.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn calls_for(&self, marker: &str) -> usize {
		self.calls().iter().filter(|call| call.as_str() == marker).count()
	}

	fn reply(&self, messages: &[Value], format: ResponseFormat) -> recall_providers::Result<Completion> {
		let system = messages
			.first()
			.and_then(|message| message.get("content"))
			.and_then(Value::as_str)
			.unwrap_or_default();
		let route = self.routes.iter().find(|(marker, _)| system.contains(marker.as_str()));
		let mut calls = self.calls.lock().unwrap_or_else(|err| err.into_inner());

		let Some((marker, responder)) = route else {
			calls.push("unrouted".to_string());

			return Err(recall_providers::Error::InvalidResponse {
				message: "No scripted response.".to_string(),
			});
		};

		calls.push(marker.clone());
		drop(calls);

		match (responder(messages), format) {
			(Reply::Json(value), ResponseFormat::Json) => Ok(Completion::Json(value)),
			(Reply::Json(value), ResponseFormat::Text) => Ok(Completion::Text(value.to_string())),
			(Reply::Text(text), ResponseFormat::Text) => Ok(Completion::Text(text)),
			(Reply::Text(text), ResponseFormat::Json) => serde_json::from_str(&text)
				.map(Completion::Json)
				.map_err(|err| recall_providers::Error::InvalidResponse {
					message: format!("Completion is not JSON: {err}"),
				}),
			(Reply::Fail, _) => Err(recall_providers::Error::InvalidResponse {
				message: format!("Scripted failure for {marker}."),
			}),
		}
	}
}

impl LlmProvider for ScriptedLlm {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		format: ResponseFormat,
	) -> BoxFuture<'a, recall_providers::Result<Completion>> {
		let result = self.reply(messages, format);

		Box::pin(async move { result })
	}
}
