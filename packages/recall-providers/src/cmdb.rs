//! Asset inventory lookup by host name.

use serde_json::Value;

use crate::{Error, Result};

/// Returns an object keyed by host name. Hosts the inventory does not know are absent.
pub async fn lookup_hosts(cfg: &recall_config::CmdbPlugin, hosts: &[String]) -> Result<Value> {
	if hosts.is_empty() {
		return Ok(Value::Object(Default::default()));
	}

	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.get(url)
		.query(&[("names", hosts.join(","))])
		.headers(crate::auth_headers(&cfg.api_key, &Default::default())?)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	if !json.is_object() {
		return Err(Error::InvalidResponse {
			message: "Asset inventory response must be a JSON object.".to_string(),
		});
	}

	Ok(json)
}
