mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Alerts, CmdbPlugin, Config, EmbeddingProviderConfig, Gaps, LlmProviderConfig, MessageTemplate,
	MessageTemplatePlugin, Pipeline, Plugins, Providers, Qdrant, Ranking, Relationships, Search,
	Service, Storage, Synthesis, TicketBackendConfig, Updates,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	for (label, value) in [
		("storage.qdrant.timeout_ms", cfg.storage.qdrant.timeout_ms),
		("providers.embedding.timeout_ms", cfg.providers.embedding.timeout_ms),
		("providers.llm.timeout_ms", cfg.providers.llm.timeout_ms),
		("providers.tickets.timeout_ms", cfg.providers.tickets.timeout_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}
	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("llm", &cfg.providers.llm.api_key),
		("tickets", &cfg.providers.tickets.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}
	for (label, value) in [
		("search.score_threshold", cfg.search.score_threshold),
		("search.relaxed_score_threshold", cfg.search.relaxed_score_threshold),
		("alerts.score_threshold", cfg.alerts.score_threshold),
	] {
		if !value.is_finite() || !(0.0..=1.0).contains(&value) {
			return Err(Error::Validation {
				message: format!("{label} must be in the range 0.0-1.0."),
			});
		}
	}

	if cfg.search.relaxed_score_threshold > cfg.search.score_threshold {
		return Err(Error::Validation {
			message: "search.relaxed_score_threshold must not exceed search.score_threshold."
				.to_string(),
		});
	}
	if cfg.search.per_perspective_limit == 0 {
		return Err(Error::Validation {
			message: "search.per_perspective_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_perspectives == 0 {
		return Err(Error::Validation {
			message: "search.max_perspectives must be greater than zero.".to_string(),
		});
	}
	if cfg.search.max_limit == 0 {
		return Err(Error::Validation {
			message: "search.max_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.gaps.sample_records == 0 {
		return Err(Error::Validation {
			message: "gaps.sample_records must be greater than zero.".to_string(),
		});
	}
	if cfg.ranking.default_score > 100 {
		return Err(Error::Validation {
			message: "ranking.default_score must be 100 or less.".to_string(),
		});
	}
	if cfg.synthesis.fallback_top_n == 0 {
		return Err(Error::Validation {
			message: "synthesis.fallback_top_n must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_concurrency == 0 {
		return Err(Error::Validation {
			message: "pipeline.max_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.alerts.max_limit == 0 {
		return Err(Error::Validation {
			message: "alerts.max_limit must be greater than zero.".to_string(),
		});
	}
	if cfg.alerts.default_limit == 0 || cfg.alerts.default_limit > cfg.alerts.max_limit {
		return Err(Error::Validation {
			message: "alerts.default_limit must be between 1 and alerts.max_limit.".to_string(),
		});
	}
	if cfg.alerts.webhook_limit == 0 || cfg.alerts.webhook_limit > cfg.alerts.max_limit {
		return Err(Error::Validation {
			message: "alerts.webhook_limit must be between 1 and alerts.max_limit.".to_string(),
		});
	}
	if cfg.plugins.cmdb.enabled {
		if cfg.plugins.cmdb.api_base.trim().is_empty() {
			return Err(Error::Validation {
				message: "plugins.cmdb.api_base must be non-empty when enabled.".to_string(),
			});
		}
		if cfg.plugins.cmdb.timeout_ms == 0 {
			return Err(Error::Validation {
				message: "plugins.cmdb.timeout_ms must be greater than zero.".to_string(),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.storage.qdrant.vector_name.as_deref().map(|name| name.trim().is_empty()).unwrap_or(false)
	{
		cfg.storage.qdrant.vector_name = None;
	}

	for api_base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.llm.api_base,
		&mut cfg.providers.tickets.api_base,
		&mut cfg.plugins.cmdb.api_base,
	] {
		let trimmed = api_base.trim().trim_end_matches('/').to_string();

		*api_base = trimmed;
	}

	cfg.updates.keywords = cfg
		.updates
		.keywords
		.iter()
		.map(|keyword| keyword.trim().to_lowercase())
		.filter(|keyword| !keyword.is_empty())
		.collect();
	cfg.gaps.fallback_suffixes.retain(|suffix| !suffix.trim().is_empty());
}
