use crate::config::AppConfig;
use actix_web::{web, HttpResponse, Responder};
use serde::Serialize;
use tracing::warn;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize, ToSchema)]
pub struct HealthChecks {
    pub jwt_configured: bool,
    pub jwt_uses_default: bool,
}

/// Service banner
pub async fn index() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "MB Events API"
    }))
}

/// Public health check endpoint with dependency checks
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is degraded")
    ),
    tag = "Health"
)]
pub async fn health(config: web::Data<AppConfig>) -> impl Responder {
    let jwt_uses_default = config.uses_default_jwt_secret();

    // Warn if using default JWT secret
    if jwt_uses_default {
        warn!("Health check: Using default JWT secret - NOT SECURE FOR PRODUCTION");
    }

    let status = if jwt_uses_default { "degraded" } else { "healthy" };

    let response = HealthResponse {
        status: status.to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            jwt_configured: !config.jwt_secret.is_empty(),
            jwt_uses_default,
        },
    };

    if status == "healthy" {
        HttpResponse::Ok().json(response)
    } else {
        HttpResponse::ServiceUnavailable().json(response)
    }
}

/// Fallback for unknown routes
pub async fn not_found() -> impl Responder {
    HttpResponse::NotFound().json(serde_json::json!({
        "success": false,
        "message": "Route not found"
    }))
}
