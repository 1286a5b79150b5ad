use serde_json::Value;

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseFormat {
	Text,
	Json,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
	Text(String),
	Json(Value),
}
impl Completion {
	pub fn into_text(self) -> Option<String> {
		match self {
			Self::Text(text) => Some(text),
			Self::Json(_) => None,
		}
	}

	pub fn into_json(self) -> Option<Value> {
		match self {
			Self::Json(value) => Some(value),
			Self::Text(_) => None,
		}
	}
}

/// One chat completion. JSON mode fails unless the content parses as JSON.
pub async fn complete(
	cfg: &recall_config::LlmProviderConfig,
	messages: &[Value],
	format: ResponseFormat,
) -> Result<Completion> {
	let client = crate::client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let mut body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
	});

	if let Some(max_tokens) = cfg.max_tokens {
		body["max_tokens"] = Value::from(max_tokens);
	}
	if format == ResponseFormat::Json {
		body["response_format"] = serde_json::json!({ "type": "json_object" });
	}

	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_completion(json, format)
}

fn parse_completion(json: Value, format: ResponseFormat) -> Result<Completion> {
	let content = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|arr| arr.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|msg| msg.get("content"))
		.and_then(|c| c.as_str())
		.ok_or_else(|| Error::InvalidResponse {
			message: "Completion response is missing message content.".to_string(),
		})?;

	match format {
		ResponseFormat::Text => Ok(Completion::Text(content.to_string())),
		ResponseFormat::Json => {
			let parsed: Value =
				serde_json::from_str(strip_code_fence(content)).map_err(|_| Error::InvalidResponse {
					message: "Completion content is not valid JSON.".to_string(),
				})?;

			Ok(Completion::Json(parsed))
		},
	}
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(inner) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let inner = inner.strip_prefix("json").unwrap_or(inner);

	inner.strip_suffix("```").unwrap_or(inner).trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	fn response(content: &str) -> Value {
		serde_json::json!({
			"choices": [
				{ "message": { "content": content } }
			]
		})
	}

	#[test]
	fn parses_choice_content_json() {
		let parsed = parse_completion(response("{\"perspectives\": []}"), ResponseFormat::Json)
			.expect("parse failed");

		assert!(parsed.into_json().and_then(|value| value.get("perspectives").cloned()).is_some());
	}

	#[test]
	fn accepts_fenced_json() {
		let parsed = parse_completion(response("```json\n{\"a\": 1}\n```"), ResponseFormat::Json)
			.expect("parse failed");

		assert_eq!(parsed, Completion::Json(serde_json::json!({ "a": 1 })));
	}

	#[test]
	fn json_mode_rejects_prose() {
		assert!(parse_completion(response("Sure, here you go."), ResponseFormat::Json).is_err());
	}

	#[test]
	fn text_mode_returns_content_verbatim() {
		let parsed =
			parse_completion(response("Ticket #12 fixed it."), ResponseFormat::Text).expect("parse failed");

		assert_eq!(parsed.into_text().as_deref(), Some("Ticket #12 fixed it."));
	}

	#[test]
	fn missing_choices_is_an_error() {
		assert!(parse_completion(serde_json::json!({}), ResponseFormat::Text).is_err());
	}
}
