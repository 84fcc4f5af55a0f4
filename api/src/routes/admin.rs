//! Operator endpoints.

use super::ingest::ApiError;
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

/// Response for a successful reload.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReloadResponse {
    /// Version of the pipeline now serving requests.
    pub version: u64,
}

/// Creates the admin routes.
pub fn admin_routes(state: AppState) -> Router {
    Router::new()
        .route("/admin/reload", post(reload))
        .with_state(state)
}

/// Rebuilds the pipeline from its configuration file.
///
/// A configuration that fails to build is reported and the running pipeline
/// keeps serving.
async fn reload(
    State(state): State<AppState>,
) -> Result<Json<ReloadResponse>, (StatusCode, Json<ApiError>)> {
    match state.reload() {
        Ok(version) => Ok(Json(ReloadResponse { version })),
        Err(e) => {
            tracing::error!(error = %e, "Pipeline reload failed");
            Err((
                StatusCode::BAD_REQUEST,
                Json(ApiError {
                    code: StatusCode::BAD_REQUEST.as_u16(),
                    message: e.to_string(),
                }),
            ))
        }
    }
}
