use actix_web::{web, Error, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ApiContext;
use crate::orchestrator::{self, OrchestratorContext};
use platform::{correlation_span, extract_correlation_id, record_counter};
use shared_types::AppConfig;
use tracing::{error, info, Instrument};

/// Simple health response used by `/health`.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub llm_provider: String,
    pub llm_model: String,
}

pub fn configure(cfg: &mut web::ServiceConfig, ctx: ApiContext) {
    let ctx_data = web::Data::new(ctx);

    cfg.app_data(ctx_data.clone())
        .route("/api/v1/chat", web::post().to(chat_v1))
        .route("/health", web::get().to(health));
}

use super::auth::verify_auth;

/// JWT-based authentication middleware.
///
/// If `ctx.jwt_auth` is `None`, authentication is disabled and all
/// requests are allowed. Otherwise, this verifies the JWT token in the
/// Authorization header. On failure, a `401 Unauthorized` response is returned.
pub async fn require_auth(req: &HttpRequest, ctx: &ApiContext) -> Result<(), HttpResponse> {
    if let Some(jwt_auth) = &ctx.jwt_auth {
        match verify_auth(req, jwt_auth).await {
            Ok(_) => Ok(()),
            Err(_) => Err(HttpResponse::Unauthorized().finish()),
        }
    } else {
        Ok(())
    }
}

#[derive(Deserialize, Debug)]
pub struct ChatRequest {
    pub user_id: String,
    pub session_id: String,
    pub message: String,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub correlation_id: Uuid,
    pub status: &'static str,
    #[serde(flatten)]
    pub response: Option<shared_types::ModelResponse>,
    pub error: Option<String>,
}

async fn chat_v1(
    req: HttpRequest,
    body: web::Json<ChatRequest>,
    ctx: web::Data<ApiContext>,
) -> Result<HttpResponse, Error> {
    let correlation_id = extract_correlation_id(body.correlation_id);
    let span = correlation_span(correlation_id, "chat_v1");

    async move {
        if let Err(resp) = require_auth(&req, ctx.get_ref()).await {
            return Ok(resp);
        }
        record_counter("http_requests_total_chat_v1", 1);

        info!(
            correlation_id = %correlation_id,
            endpoint = "/api/v1/chat",
            message_length = body.message.len(),
            "received chat request"
        );

        let orchestrator_ctx = OrchestratorContext {
            memory_service: &ctx.memory_service,
            db: &ctx.db,
            app_config: &ctx.app_config,
        };

        match orchestrator::process(&orchestrator_ctx, &body.user_id, &body.message, &body.session_id).await {
            Ok(response) => {
                info!(
                    correlation_id = %correlation_id,
                    endpoint = "/api/v1/chat",
                    status = "success",
                    "chat request succeeded"
                );
                Ok(HttpResponse::Ok().json(ChatResponse {
                    correlation_id,
                    status: "success",
                    response: Some(response),
                    error: None,
                }))
            }
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    endpoint = "/api/v1/chat",
                    status = "error",
                    error_stage = e.stage_name(),
                    error_message = %e.message(),
                    "chat request failed"
                );
                Ok(HttpResponse::Ok().json(ChatResponse {
                    correlation_id,
                    status: "error",
                    response: None,
                    error: Some(e.message().to_string()),
                }))
            }
        }
    }
    .instrument(span)
    .await
}

async fn health(req: HttpRequest, ctx: web::Data<ApiContext>) -> Result<HttpResponse, Error> {
    let correlation_id = extract_correlation_id(None);
    let span = correlation_span(correlation_id, "health");

    async move {
        if let Err(resp) = require_auth(&req, ctx.get_ref()).await {
            return Ok(resp);
        }
        record_counter("http_requests_total_health", 1);

        info!(
            correlation_id = %correlation_id,
            endpoint = "/health",
            "health check initiated"
        );

        let app_config: &AppConfig = &ctx.app_config;

        let provider = app_config.llm.default_provider.clone();
        let model = match provider.as_str() {
            "openrouter" => app_config
                .llm
                .openrouter
                .as_ref()
                .map(|c| c.model_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            "openai" => app_config
                .llm
                .openai
                .as_ref()
                .map(|c| c.model_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            "anthropic" => app_config
                .llm
                .anthropic
                .as_ref()
                .map(|c| c.model_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            "ollama" => app_config
                .llm
                .ollama
                .as_ref()
                .map(|c| c.model_name.clone())
                .unwrap_or_else(|| "unknown".to_string()),
            _ => "unknown".to_string(),
        };

        info!(
            correlation_id = %correlation_id,
            endpoint = "/health",
            llm_provider = %provider,
            llm_model = %model,
            "health check completed"
        );

        Ok(HttpResponse::Ok().json(HealthResponse {
            status: "ok",
            llm_provider: provider,
            llm_model: model,
        }))
    }
    .instrument(span)
    .await
}
