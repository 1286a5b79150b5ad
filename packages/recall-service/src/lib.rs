pub mod alerts;
pub mod assist;
pub mod enrich;
pub mod gaps;
pub mod health;
pub mod planner;
pub mod plugins;
pub mod prompts;
pub mod query_analysis;
pub mod ranking;
pub mod relationships;
pub mod result;
pub mod retriever;
pub mod search;
pub mod synthesis;

mod error;

pub use alerts::{AlertResponse, AlertSearchRequest, SimilarTicket, ZabbixAlert};
pub use assist::AssistRequest;
pub use enrich::EnrichmentOutcome;
pub use error::{Error, Result};
pub use health::{ComponentHealth, HealthReport, HealthStatus};
pub use plugins::{Plugin, PluginRegistry, RenderedMessage};
pub use query_analysis::{Intent, QueryAnalysis};
pub use result::{Mode, PipelineResult, SearchTrace, StageCounts};
pub use retriever::{RetrievalFilters, RetrievalOutcome};
pub use search::SearchRequest;

pub use recall_storage::qdrant::CollectionStats;

use std::{future::Future, pin::Pin, sync::Arc};

use serde::de::DeserializeOwned;
use serde_json::Value;

use recall_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, TicketBackendConfig};
use recall_domain::records::{Ticket, TicketId};
use recall_providers::{
	embedding,
	llm::{self, Completion, ResponseFormat},
	tickets,
};
use recall_storage::qdrant::{QdrantStore, VectorHit, VectorQuery};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, recall_providers::Result<Vec<Vec<f32>>>>;
}

pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn search<'a>(&'a self, query: &'a VectorQuery)
	-> BoxFuture<'a, recall_storage::Result<Vec<VectorHit>>>;

	fn collection_info(&self) -> BoxFuture<'_, recall_storage::Result<CollectionStats>>;
}

pub trait TicketRepository
where
	Self: Send + Sync,
{
	/// `Ok(None)` when the ticket does not exist.
	fn fetch_ticket<'a>(
		&'a self,
		cfg: &'a TicketBackendConfig,
		id: TicketId,
	) -> BoxFuture<'a, recall_providers::Result<Option<Ticket>>>;

	/// Succeeds when the repository accepts the configured credentials.
	fn ping<'a>(&'a self, cfg: &'a TicketBackendConfig) -> BoxFuture<'a, recall_providers::Result<()>>;
}

pub trait LlmProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		format: ResponseFormat,
	) -> BoxFuture<'a, recall_providers::Result<Completion>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub tickets: Arc<dyn TicketRepository>,
	pub llm: Arc<dyn LlmProvider>,
}

pub struct RecallService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub providers: Providers,
	pub plugins: PluginRegistry,
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, recall_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}

impl TicketRepository for DefaultProviders {
	fn fetch_ticket<'a>(
		&'a self,
		cfg: &'a TicketBackendConfig,
		id: TicketId,
	) -> BoxFuture<'a, recall_providers::Result<Option<Ticket>>> {
		Box::pin(tickets::fetch_ticket(cfg, id))
	}

	fn ping<'a>(&'a self, cfg: &'a TicketBackendConfig) -> BoxFuture<'a, recall_providers::Result<()>> {
		Box::pin(tickets::ping(cfg))
	}
}

impl LlmProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		messages: &'a [Value],
		format: ResponseFormat,
	) -> BoxFuture<'a, recall_providers::Result<Completion>> {
		Box::pin(llm::complete(cfg, messages, format))
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		query: &'a VectorQuery,
	) -> BoxFuture<'a, recall_storage::Result<Vec<VectorHit>>> {
		Box::pin(QdrantStore::search(self, query))
	}

	fn collection_info(&self) -> BoxFuture<'_, recall_storage::Result<CollectionStats>> {
		Box::pin(QdrantStore::collection_info(self))
	}
}

impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		tickets: Arc<dyn TicketRepository>,
		llm: Arc<dyn LlmProvider>,
	) -> Self {
		Self { embedding, tickets, llm }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { embedding: provider.clone(), tickets: provider.clone(), llm: provider }
	}
}

impl RecallService {
	pub fn new(cfg: Config, qdrant: QdrantStore) -> Self {
		let plugins = PluginRegistry::from_config(&cfg.plugins);

		Self { cfg, index: Arc::new(qdrant), providers: Providers::default(), plugins }
	}

	pub fn with_providers(cfg: Config, index: Arc<dyn VectorIndex>, providers: Providers) -> Self {
		let plugins = PluginRegistry::from_config(&cfg.plugins);

		Self { cfg, index, providers, plugins }
	}

	pub fn with_plugins(mut self, plugins: PluginRegistry) -> Self {
		self.plugins = plugins;

		self
	}

	/// Runs one JSON completion and decodes it against `schema`.
	pub(crate) async fn complete_json<T>(&self, schema: &str, messages: &[Value]) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let completion = self
			.providers
			.llm
			.complete(&self.cfg.providers.llm, messages, ResponseFormat::Json)
			.await?;
		let value = completion.into_json().ok_or_else(|| Error::Provider {
			message: format!("Expected a JSON completion for {schema}."),
		})?;

		serde_json::from_value(value).map_err(|err| Error::Provider {
			message: format!("Response does not match {schema}: {err}"),
		})
	}

	/// Runs one free-text completion. Blank output is an error.
	pub(crate) async fn complete_text(&self, messages: &[Value]) -> Result<String> {
		let completion = self
			.providers
			.llm
			.complete(&self.cfg.providers.llm, messages, ResponseFormat::Text)
			.await?;
		let text = completion.into_text().unwrap_or_default();

		if text.trim().is_empty() {
			return Err(Error::Provider { message: "Completion text is empty.".to_string() });
		}

		Ok(text.trim().to_string())
	}

	pub(crate) fn max_concurrency(&self) -> usize {
		self.cfg.pipeline.max_concurrency.max(1) as usize
	}
}
