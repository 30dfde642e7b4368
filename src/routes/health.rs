use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::time::Instant;

use crate::app_state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub storage_api: ComponentHealth,
    pub redis: ComponentHealth,
}

#[derive(Serialize)]
pub struct ComponentHealth {
    pub status: String,
    pub latency_ms: Option<u64>,
}

impl ComponentHealth {
    fn from_result<E>(result: Result<(), E>, start: Instant) -> Self {
        match result {
            Ok(()) => Self {
                status: "ok".to_string(),
                latency_ms: Some(start.elapsed().as_millis() as u64),
            },
            Err(_) => Self {
                status: "error".to_string(),
                latency_ms: None,
            },
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET /health: storage API and Redis reachability.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    // The provider descriptor is the cheapest authenticated call.
    let api_start = Instant::now();
    let api_result = state.storage.get_provider(state.provider_id).await.map(|_| ());
    if let Err(e) = &api_result {
        tracing::warn!(error = %e, "Storage API health check failed");
    }
    let api_check = ComponentHealth::from_result(api_result, api_start);

    let redis_start = Instant::now();
    let redis_result = match state.queue(None) {
        Some(queue) => queue.health_check().await.map_err(|e| e.to_string()),
        None => Err("no queue configured".to_string()),
    };
    let redis_check = ComponentHealth::from_result(redis_result, redis_start);

    let all_healthy = api_check.is_ok() && redis_check.is_ok();
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: if all_healthy {
            "ok".to_string()
        } else {
            "degraded".to_string()
        },
        version: env!("CARGO_PKG_VERSION").to_string(),
        checks: HealthChecks {
            storage_api: api_check,
            redis: redis_check,
        },
    };

    (status_code, Json(response))
}
