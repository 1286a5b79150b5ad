use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub search: Search,
	#[serde(default)]
	pub gaps: Gaps,
	#[serde(default)]
	pub ranking: Ranking,
	#[serde(default)]
	pub relationships: Relationships,
	#[serde(default)]
	pub synthesis: Synthesis,
	#[serde(default)]
	pub pipeline: Pipeline,
	#[serde(default)]
	pub updates: Updates,
	#[serde(default)]
	pub plugins: Plugins,
	#[serde(default)]
	pub alerts: Alerts,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
	/// Optional. Named vector to query when the collection stores several.
	pub vector_name: Option<String>,
	#[serde(default = "default_qdrant_timeout_ms")]
	pub timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub llm: LlmProviderConfig,
	pub tickets: TicketBackendConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub max_tokens: Option<u32>,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TicketBackendConfig {
	pub api_base: String,
	pub api_key: String,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Search {
	pub score_threshold: f32,
	pub relaxed_score_threshold: f32,
	pub per_perspective_limit: u32,
	pub max_perspectives: u32,
	pub max_limit: u32,
}
impl Default for Search {
	fn default() -> Self {
		Self {
			score_threshold: 0.7,
			relaxed_score_threshold: 0.0,
			per_perspective_limit: 10,
			max_perspectives: 7,
			max_limit: 50,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Gaps {
	pub max_queries: u32,
	pub sample_records: u32,
	pub excerpt_chars: u32,
	pub fallback_suffixes: Vec<String>,
}
impl Default for Gaps {
	fn default() -> Self {
		Self {
			max_queries: 3,
			sample_records: 5,
			excerpt_chars: 500,
			fallback_suffixes: vec!["configuration".to_string(), "trouble".to_string()],
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Ranking {
	pub max_scored: u32,
	pub default_score: u8,
	pub excerpt_chars: u32,
}
impl Default for Ranking {
	fn default() -> Self {
		Self { max_scored: 10, default_score: 50, excerpt_chars: 500 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Relationships {
	pub max_records: u32,
}
impl Default for Relationships {
	fn default() -> Self {
		Self { max_records: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Synthesis {
	pub fallback_top_n: u32,
	pub max_comment_chars: u32,
	pub max_prompt_records: u32,
}
impl Default for Synthesis {
	fn default() -> Self {
		Self { fallback_top_n: 3, max_comment_chars: 3_000, max_prompt_records: 10 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	pub max_concurrency: u32,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self { max_concurrency: 4 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Updates {
	pub keywords: Vec<String>,
	pub excerpt_chars: u32,
}
impl Default for Updates {
	fn default() -> Self {
		Self {
			keywords: [
				"updated",
				"changed",
				"patch",
				"applied",
				"modified",
				"fixed",
				"reflected",
				"upgraded",
			]
			.into_iter()
			.map(str::to_string)
			.collect(),
			excerpt_chars: 200,
		}
	}
}

/// Plain similarity lookups for monitoring alerts.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Alerts {
	pub score_threshold: f32,
	pub default_limit: u32,
	pub max_limit: u32,
	/// Tickets returned per webhook alert.
	pub webhook_limit: u32,
}
impl Default for Alerts {
	fn default() -> Self {
		Self { score_threshold: 0.7, default_limit: 5, max_limit: 20, webhook_limit: 5 }
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Plugins {
	pub cmdb: CmdbPlugin,
	pub message_template: MessageTemplatePlugin,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CmdbPlugin {
	pub enabled: bool,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub timeout_ms: u64,
}
impl Default for CmdbPlugin {
	fn default() -> Self {
		Self {
			enabled: false,
			api_base: String::new(),
			api_key: String::new(),
			path: "/servers".to_string(),
			timeout_ms: 5_000,
		}
	}
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MessageTemplatePlugin {
	pub enabled: bool,
	/// Map keys are template names, e.g. "vendor_escalation".
	pub templates: HashMap<String, MessageTemplate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageTemplate {
	pub subject: String,
	pub body: String,
}

fn default_qdrant_timeout_ms() -> u64 {
	5_000
}
