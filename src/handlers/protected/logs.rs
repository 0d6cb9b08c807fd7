use axum::extract::State;

use crate::database::models::{LogFilter, LoginLog, OperationLog};
use crate::middleware::{ApiResponse, ApiResult, QueryParams};
use crate::state::AppState;
use crate::types::{Page, PageRequest};

/// GET /api/v1/logs/operations?username=&module=&from=&to=&page=&size=
pub async fn operations(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<LogFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<OperationLog>> {
    let logs = state.audit().page_operations(&filter, page).await?;
    Ok(ApiResponse::success(logs))
}

/// GET /api/v1/logs/logins?username=&from=&to=&page=&size=
pub async fn logins(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<LogFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<LoginLog>> {
    let logs = state.audit().page_logins(&filter, page).await?;
    Ok(ApiResponse::success(logs))
}
