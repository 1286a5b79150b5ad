use std::collections::HashMap;

use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use recall_service::{
	AlertResponse, AlertSearchRequest, AssistRequest, CollectionStats, Error as ServiceError,
	HealthReport, PipelineResult, RenderedMessage, SearchRequest, SimilarTicket, ZabbixAlert,
};

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct PluginsResponse {
	pub plugins: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct TemplatesResponse {
	pub templates: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RenderTemplateRequest {
	pub template: String,
	#[serde(default)]
	pub variables: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				ApiError::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			ServiceError::NotFound { message } =>
				ApiError::new(StatusCode::NOT_FOUND, "NOT_FOUND", message),
			ServiceError::Unavailable { message } =>
				ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "BACKEND_UNAVAILABLE", message),
			ServiceError::Provider { message } => {
				tracing::error!(error = %message, "Provider error.");

				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "PROVIDER_ERROR", message)
			},
			ServiceError::Qdrant { message } => {
				tracing::error!(error = %message, "Qdrant error.");

				ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "QDRANT_ERROR", message)
			},
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/collection/info", get(collection_info))
		.route("/webhook/zabbix", post(zabbix_webhook))
		.route("/v1/assist", post(assist))
		.route("/v1/search", post(search))
		.route("/v1/alerts/search", post(alert_search))
		.route("/v1/plugins", get(plugins))
		.route("/v1/templates", get(templates))
		.route("/v1/templates/render", post(render_template))
		.with_state(state)
}

async fn health(State(state): State<AppState>) -> Json<HealthReport> {
	Json(state.service.health().await)
}

async fn collection_info(State(state): State<AppState>) -> Result<Json<CollectionStats>, ApiError> {
	let response = state.service.collection_info().await?;

	Ok(Json(response))
}

async fn zabbix_webhook(
	State(state): State<AppState>,
	Json(payload): Json<ZabbixAlert>,
) -> Result<Json<AlertResponse>, ApiError> {
	let response = state.service.handle_alert(payload).await?;

	Ok(Json(response))
}

async fn assist(
	State(state): State<AppState>,
	Json(payload): Json<AssistRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
	let response = state.service.assist(payload).await?;

	Ok(Json(response))
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<PipelineResult>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

async fn alert_search(
	State(state): State<AppState>,
	Json(payload): Json<AlertSearchRequest>,
) -> Result<Json<Vec<SimilarTicket>>, ApiError> {
	let response = state.service.similar_tickets(payload).await?;

	Ok(Json(response))
}

async fn plugins(State(state): State<AppState>) -> Json<PluginsResponse> {
	Json(PluginsResponse { plugins: state.service.plugins().names() })
}

async fn templates(State(state): State<AppState>) -> Result<Json<TemplatesResponse>, ApiError> {
	Ok(Json(TemplatesResponse { templates: state.service.list_templates()? }))
}

async fn render_template(
	State(state): State<AppState>,
	Json(payload): Json<RenderTemplateRequest>,
) -> Result<Json<RenderedMessage>, ApiError> {
	let response = state.service.render_template(&payload.template, payload.variables).await?;

	Ok(Json(response))
}
