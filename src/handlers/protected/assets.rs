//! Asset → building → floor → room endpoints. Each level lists with a
//! parent filter so a client can walk down the hierarchy.

use axum::extract::State;

use crate::database::models::*;
use crate::middleware::{ApiResponse, ApiResult, IdParam, JsonBody, QueryParams};
use crate::services::{AssetPatch, BuildingPatch, FloorPatch, RoomPatch};
use crate::state::AppState;
use crate::types::{Page, PageRequest};

// Assets

pub async fn list_assets(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<AssetFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<Asset>> {
    Ok(ApiResponse::success(state.assets().page_assets(&filter, page).await?))
}

pub async fn get_asset(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<Asset> {
    Ok(ApiResponse::success(state.assets().get_asset(id).await?))
}

pub async fn create_asset(State(state): State<AppState>, JsonBody(draft): JsonBody<AssetDraft>) -> ApiResult<Asset> {
    let asset = state.assets().create_asset(draft).await?;
    Ok(ApiResponse::created(asset))
}

pub async fn update_asset(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<AssetPatch>,
) -> ApiResult<Asset> {
    Ok(ApiResponse::success(state.assets().update_asset(id, patch).await?))
}

pub async fn delete_asset(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.assets().delete_asset(id).await?;
    Ok(ApiResponse::success(()))
}

// Buildings

pub async fn list_buildings(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<BuildingFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<Building>> {
    Ok(ApiResponse::success(state.assets().page_buildings(&filter, page).await?))
}

pub async fn get_building(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<Building> {
    Ok(ApiResponse::success(state.assets().get_building(id).await?))
}

pub async fn create_building(
    State(state): State<AppState>,
    JsonBody(draft): JsonBody<BuildingDraft>,
) -> ApiResult<Building> {
    let building = state.assets().create_building(draft).await?;
    Ok(ApiResponse::created(building))
}

pub async fn update_building(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<BuildingPatch>,
) -> ApiResult<Building> {
    Ok(ApiResponse::success(state.assets().update_building(id, patch).await?))
}

pub async fn delete_building(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.assets().delete_building(id).await?;
    Ok(ApiResponse::success(()))
}

// Floors

pub async fn list_floors(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<FloorFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<Floor>> {
    Ok(ApiResponse::success(state.assets().page_floors(&filter, page).await?))
}

pub async fn get_floor(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<Floor> {
    Ok(ApiResponse::success(state.assets().get_floor(id).await?))
}

pub async fn create_floor(State(state): State<AppState>, JsonBody(draft): JsonBody<FloorDraft>) -> ApiResult<Floor> {
    let floor = state.assets().create_floor(draft).await?;
    Ok(ApiResponse::created(floor))
}

pub async fn update_floor(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<FloorPatch>,
) -> ApiResult<Floor> {
    Ok(ApiResponse::success(state.assets().update_floor(id, patch).await?))
}

pub async fn delete_floor(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.assets().delete_floor(id).await?;
    Ok(ApiResponse::success(()))
}

// Rooms

pub async fn list_rooms(
    State(state): State<AppState>,
    QueryParams(filter): QueryParams<RoomFilter>,
    QueryParams(page): QueryParams<PageRequest>,
) -> ApiResult<Page<Room>> {
    Ok(ApiResponse::success(state.assets().page_rooms(&filter, page).await?))
}

pub async fn get_room(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<Room> {
    Ok(ApiResponse::success(state.assets().get_room(id).await?))
}

pub async fn create_room(State(state): State<AppState>, JsonBody(draft): JsonBody<RoomDraft>) -> ApiResult<Room> {
    let room = state.assets().create_room(draft).await?;
    Ok(ApiResponse::created(room))
}

pub async fn update_room(
    State(state): State<AppState>,
    IdParam(id): IdParam,
    JsonBody(patch): JsonBody<RoomPatch>,
) -> ApiResult<Room> {
    Ok(ApiResponse::success(state.assets().update_room(id, patch).await?))
}

pub async fn delete_room(State(state): State<AppState>, IdParam(id): IdParam) -> ApiResult<()> {
    state.assets().delete_room(id).await?;
    Ok(ApiResponse::success(()))
}
