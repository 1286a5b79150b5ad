use std::{
	collections::HashMap,
	sync::{Arc, LazyLock},
};

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use recall_config::{MessageTemplate, Plugins};
use recall_providers::cmdb;

use crate::{BoxFuture, Error, RecallService, Result};

pub const CMDB: &str = "cmdb";
pub const MESSAGE_TEMPLATE: &str = "message_template";

static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
	Regex::new(r"\{([A-Za-z0-9_]+)\}").expect("Template placeholder regex is valid.")
});

/// Values used for placeholders the caller leaves out.
const DEFAULT_VARIABLES: &[(&str, &str)] = &[
	("server_name", "N/A"),
	("serial_number", "N/A"),
	("vendor", "N/A"),
	("maintenance_contract", "N/A"),
	("location", "N/A"),
	("issue_description", "N/A"),
	("resolution_history", "N/A"),
	("priority", "normal"),
	("inquiry_content", "N/A"),
	("similar_cases", "N/A"),
	("recommended_action", "N/A"),
	("ticket_id", "N/A"),
];

const VENDOR_ESCALATION_BODY: &str = "\
{vendor} Support,

We are escalating the following incident.

[Server]
- Server name: {server_name}
- Serial number: {serial_number}
- Maintenance contract: {maintenance_contract}
- Location: {location}

[Issue]
{issue_description}

[Actions so far]
{resolution_history}

[Priority]
{priority}

Please respond at your earliest convenience.

---
This message was generated automatically.";

const VENDOR_INQUIRY_BODY: &str = "\
{vendor} Support,

We have a question about the following server.

[Server]
- Server name: {server_name}
- Serial number: {serial_number}
- Maintenance contract: {maintenance_contract}

[Question]
{inquiry_content}

Thank you for checking.

---
This message was generated automatically.";

const INTERNAL_NOTIFICATION_BODY: &str = "\
Operations team,

An incident has occurred.

[Server]
- Server name: {server_name}
- Priority: {priority}

[Issue]
{issue_description}

[Similar cases]
{similar_cases}

[Recommended action]
{recommended_action}

See ticket #{ticket_id} for details.

---
This message was generated automatically.";

/// An auxiliary data source consulted by the pipelines or the API layer.
pub trait Plugin
where
	Self: Send + Sync,
{
	fn name(&self) -> &str;

	fn is_enabled(&self) -> bool;

	fn fetch<'a>(&'a self, params: &'a Value) -> BoxFuture<'a, Result<Value>>;
}

/// Enabled plugins by name. Built once; disabled plugins are never registered.
#[derive(Clone, Default)]
pub struct PluginRegistry {
	plugins: Vec<Arc<dyn Plugin>>,
}
impl PluginRegistry {
	pub fn new(plugins: Vec<Arc<dyn Plugin>>) -> Self {
		let mut registered: Vec<Arc<dyn Plugin>> = Vec::new();

		for plugin in plugins.into_iter().filter(|plugin| plugin.is_enabled()) {
			if registered.iter().all(|existing| existing.name() != plugin.name()) {
				registered.push(plugin);
			}
		}

		Self { plugins: registered }
	}

	pub fn from_config(cfg: &Plugins) -> Self {
		let registry = Self::new(vec![
			Arc::new(CmdbPlugin::new(cfg.cmdb.clone())),
			Arc::new(MessageTemplatePlugin::new(
				cfg.message_template.enabled,
				&cfg.message_template.templates,
			)),
		]);

		info!(plugins = ?registry.names(), "Plugin registry built.");

		registry
	}

	pub fn get(&self, name: &str) -> Option<Arc<dyn Plugin>> {
		self.plugins.iter().find(|plugin| plugin.name() == name).cloned()
	}

	pub fn is_available(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn names(&self) -> Vec<String> {
		self.plugins.iter().map(|plugin| plugin.name().to_string()).collect()
	}
}

#[derive(Debug, Deserialize)]
struct CmdbParams {
	hosts: Vec<String>,
}

/// Server inventory lookups keyed by host name.
pub struct CmdbPlugin {
	cfg: recall_config::CmdbPlugin,
}
impl CmdbPlugin {
	pub fn new(cfg: recall_config::CmdbPlugin) -> Self {
		Self { cfg }
	}
}

impl Plugin for CmdbPlugin {
	fn name(&self) -> &str {
		CMDB
	}

	fn is_enabled(&self) -> bool {
		self.cfg.enabled
	}

	fn fetch<'a>(&'a self, params: &'a Value) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let params: CmdbParams =
				serde_json::from_value(params.clone()).map_err(|err| Error::InvalidRequest {
					message: format!("cmdb params must be {{\"hosts\": [..]}}: {err}"),
				})?;

			Ok(cmdb::lookup_hosts(&self.cfg, &params.hosts).await?)
		})
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
	pub subject: String,
	pub body: String,
}

#[derive(Debug, Deserialize)]
struct TemplateParams {
	template: String,
	#[serde(default)]
	variables: HashMap<String, String>,
}

/// Renders `{placeholder}` templates: the built-in ones plus any configured.
pub struct MessageTemplatePlugin {
	enabled: bool,
	templates: HashMap<String, MessageTemplate>,
}
impl MessageTemplatePlugin {
	/// A configured template replaces a built-in one of the same name.
	pub fn new(enabled: bool, configured: &HashMap<String, MessageTemplate>) -> Self {
		Self { enabled, templates: merged_templates(configured) }
	}

	pub fn render(&self, name: &str, variables: &HashMap<String, String>) -> Result<RenderedMessage> {
		let template = self.templates.get(name).ok_or_else(|| Error::NotFound {
			message: format!("Unknown message template: {name}."),
		})?;
		let mut values: HashMap<String, String> = DEFAULT_VARIABLES
			.iter()
			.map(|(key, value)| (key.to_string(), value.to_string()))
			.collect();

		values.extend(variables.iter().map(|(key, value)| (key.clone(), value.clone())));

		Ok(RenderedMessage {
			subject: fill_placeholders(&template.subject, &values),
			body: fill_placeholders(&template.body, &values),
		})
	}

	/// Template names, sorted.
	pub fn template_names(&self) -> Vec<String> {
		let mut names = self.templates.keys().cloned().collect::<Vec<_>>();

		names.sort();

		names
	}
}

impl Plugin for MessageTemplatePlugin {
	fn name(&self) -> &str {
		MESSAGE_TEMPLATE
	}

	fn is_enabled(&self) -> bool {
		self.enabled
	}

	fn fetch<'a>(&'a self, params: &'a Value) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let params: TemplateParams =
				serde_json::from_value(params.clone()).map_err(|err| Error::InvalidRequest {
					message: format!("message_template params are invalid: {err}"),
				})?;
			let rendered = self.render(&params.template, &params.variables)?;

			serde_json::to_value(rendered)
				.map_err(|err| Error::Provider { message: err.to_string() })
		})
	}
}

/// Replaces `{name}` with its variable; unknown placeholders stay as written.
pub fn fill_placeholders(template: &str, variables: &HashMap<String, String>) -> String {
	PLACEHOLDER_RE
		.replace_all(template, |captures: &Captures<'_>| {
			captures
				.get(1)
				.and_then(|name| variables.get(name.as_str()))
				.cloned()
				.unwrap_or_else(|| captures[0].to_string())
		})
		.into_owned()
}

pub fn builtin_templates() -> HashMap<String, MessageTemplate> {
	[
		("vendor_escalation", "Incident escalation - {server_name}", VENDOR_ESCALATION_BODY),
		("vendor_inquiry", "Inquiry - {server_name}", VENDOR_INQUIRY_BODY),
		(
			"internal_notification",
			"[{priority}] Incident on {server_name}",
			INTERNAL_NOTIFICATION_BODY,
		),
	]
	.into_iter()
	.map(|(name, subject, body)| {
		(name.to_string(), MessageTemplate { subject: subject.to_string(), body: body.to_string() })
	})
	.collect()
}

fn merged_templates(
	configured: &HashMap<String, MessageTemplate>,
) -> HashMap<String, MessageTemplate> {
	let mut templates = builtin_templates();

	templates.extend(configured.iter().map(|(name, template)| (name.clone(), template.clone())));

	templates
}

impl RecallService {
	pub fn plugins(&self) -> &PluginRegistry {
		&self.plugins
	}

	/// Renders a configured message template through the `message_template` plugin.
	pub async fn render_template(
		&self,
		template: &str,
		variables: HashMap<String, String>,
	) -> Result<RenderedMessage> {
		let plugin = self.plugins.get(MESSAGE_TEMPLATE).ok_or_else(|| Error::NotFound {
			message: format!("Plugin {MESSAGE_TEMPLATE} is not enabled."),
		})?;
		let params = serde_json::json!({ "template": template, "variables": variables });
		let value = plugin.fetch(&params).await?;

		serde_json::from_value(value).map_err(|err| Error::Provider {
			message: format!("Plugin {MESSAGE_TEMPLATE} returned an unexpected shape: {err}"),
		})
	}

	/// Names accepted by `render_template`.
	pub fn list_templates(&self) -> Result<Vec<String>> {
		if !self.plugins.is_available(MESSAGE_TEMPLATE) {
			return Err(Error::NotFound {
				message: format!("Plugin {MESSAGE_TEMPLATE} is not enabled."),
			});
		}

		let plugin =
			MessageTemplatePlugin::new(true, &self.cfg.plugins.message_template.templates);

		Ok(plugin.template_names())
	}
}
