use axum::extract::State;

use crate::database::models::AssetStatistics;
use crate::middleware::{ApiResponse, ApiResult};
use crate::state::AppState;

/// GET /api/v1/statistics/assets - portfolio counts and areas
pub async fn assets(State(state): State<AppState>) -> ApiResult<AssetStatistics> {
    let stats = state.assets().statistics().await?;
    Ok(ApiResponse::success(stats))
}
