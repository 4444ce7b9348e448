use std::sync::Arc;

use axum::extract::State;
use axum::Json;

use crate::errors::AppError;
use crate::services::ai::router::{RouteRequest, RouteSuggestion};
use crate::state::AppState;

// POST /api/router/suggest
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Json(request): Json<RouteRequest>,
) -> Result<Json<RouteSuggestion>, AppError> {
    let suggestion = state.router.route(&request).await.map_err(|e| {
        tracing::warn!(service_type = %request.service_type, "smart router failed: {e:#}");
        AppError::Ai(e.to_string())
    })?;
    Ok(Json(suggestion))
}
