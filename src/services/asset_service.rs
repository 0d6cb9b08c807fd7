//! Asset → building → floor → room hierarchy.
//!
//! Every level checks that its parent exists on write and refuses to be
//! deleted while the next level still references it.

use serde::Deserialize;
use std::sync::Arc;

use super::node_service::required;
use super::{ServiceError, ServiceResult};
use crate::database::models::*;
use crate::database::Store;
use crate::types::{nullable, Page, PageRequest};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetPatch {
    pub code: Option<String>,
    pub name: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub organization_id: Option<Option<i64>>,
    pub address: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub longitude: Option<Option<f64>>,
    #[serde(default, deserialize_with = "nullable")]
    pub latitude: Option<Option<f64>>,
    pub land_nature: Option<String>,
    pub total_area: Option<f64>,
    pub rentable_area: Option<f64>,
    pub tags: Option<Vec<String>>,
    pub description: Option<String>,
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingPatch {
    pub asset_id: Option<i64>,
    pub code: Option<String>,
    pub name: Option<String>,
    pub floor_count: Option<i32>,
    pub total_area: Option<f64>,
    pub address: Option<String>,
    pub status: Option<AssetStatus>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloorPatch {
    pub floor_number: Option<i32>,
    pub name: Option<String>,
    pub area: Option<f64>,
    pub status: Option<AssetStatus>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomPatch {
    pub room_number: Option<String>,
    pub area: Option<f64>,
    pub usage: Option<String>,
    pub status: Option<RoomStatus>,
}

#[derive(Clone)]
pub struct AssetService {
    store: Arc<dyn Store>,
}

impl AssetService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    // Assets

    pub async fn page_assets(&self, filter: &AssetFilter, page: PageRequest) -> ServiceResult<Page<Asset>> {
        let (items, total) = self.store.page_assets(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn get_asset(&self, id: i64) -> ServiceResult<Asset> {
        self.store
            .find_asset(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Asset", id))
    }

    pub async fn create_asset(&self, mut draft: AssetDraft) -> ServiceResult<Asset> {
        draft.code = required(&draft.code, "code")?;
        draft.name = required(&draft.name, "name")?;
        draft.organization_id = draft.organization_id.filter(|o| *o > 0);
        check_areas(draft.total_area, draft.rentable_area)?;
        check_coordinates(draft.longitude, draft.latitude)?;
        self.check_organization(draft.organization_id).await?;

        if self.store.find_asset_by_code(&draft.code).await?.is_some() {
            return Err(ServiceError::validation(format!("Asset code '{}' already exists", draft.code)));
        }
        if self.store.find_asset_by_name(&draft.name).await?.is_some() {
            return Err(ServiceError::validation(format!("Asset name '{}' already exists", draft.name)));
        }

        let asset = self.store.insert_asset(draft).await?;
        tracing::info!(asset_id = asset.id, code = %asset.code, "asset created");
        Ok(asset)
    }

    pub async fn update_asset(&self, id: i64, patch: AssetPatch) -> ServiceResult<Asset> {
        let mut asset = self.get_asset(id).await?;

        if let Some(code) = patch.code {
            let code = required(&code, "code")?;
            if let Some(other) = self.store.find_asset_by_code(&code).await? {
                if other.id != id {
                    return Err(ServiceError::validation(format!("Asset code '{}' already exists", code)));
                }
            }
            asset.code = code;
        }
        if let Some(name) = patch.name {
            let name = required(&name, "name")?;
            if let Some(other) = self.store.find_asset_by_name(&name).await? {
                if other.id != id {
                    return Err(ServiceError::validation(format!("Asset name '{}' already exists", name)));
                }
            }
            asset.name = name;
        }
        if let Some(organization_id) = patch.organization_id {
            let organization_id = organization_id.filter(|o| *o > 0);
            self.check_organization(organization_id).await?;
            asset.organization_id = organization_id;
        }
        if let Some(address) = patch.address {
            asset.address = address;
        }
        if let Some(longitude) = patch.longitude {
            asset.longitude = longitude;
        }
        if let Some(latitude) = patch.latitude {
            asset.latitude = latitude;
        }
        if let Some(land_nature) = patch.land_nature {
            asset.land_nature = land_nature;
        }
        if let Some(total_area) = patch.total_area {
            asset.total_area = total_area;
        }
        if let Some(rentable_area) = patch.rentable_area {
            asset.rentable_area = rentable_area;
        }
        if let Some(tags) = patch.tags {
            asset.tags = tags;
        }
        if let Some(description) = patch.description {
            asset.description = description;
        }
        if let Some(status) = patch.status {
            asset.status = status;
        }

        check_areas(asset.total_area, asset.rentable_area)?;
        check_coordinates(asset.longitude, asset.latitude)?;
        Ok(self.store.update_asset(&asset).await?)
    }

    pub async fn delete_asset(&self, id: i64) -> ServiceResult<()> {
        let asset = self.get_asset(id).await?;
        let buildings = self.store.count_buildings(id).await?;
        if buildings > 0 {
            return Err(ServiceError::in_use(format!(
                "Asset '{}' still has {} building(s)",
                asset.name, buildings
            )));
        }
        self.store.delete_asset(id).await?;
        tracing::info!(asset_id = id, "asset deleted");
        Ok(())
    }

    // Buildings

    pub async fn page_buildings(&self, filter: &BuildingFilter, page: PageRequest) -> ServiceResult<Page<Building>> {
        let (items, total) = self.store.page_buildings(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn get_building(&self, id: i64) -> ServiceResult<Building> {
        self.store
            .find_building(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Building", id))
    }

    pub async fn create_building(&self, mut draft: BuildingDraft) -> ServiceResult<Building> {
        draft.code = required(&draft.code, "code")?;
        draft.name = required(&draft.name, "name")?;
        non_negative(draft.total_area, "total_area")?;
        if draft.floor_count < 0 {
            return Err(ServiceError::validation("floor_count must not be negative"));
        }
        self.check_asset(draft.asset_id).await?;
        if self.store.find_building_by_code(&draft.code).await?.is_some() {
            return Err(ServiceError::validation(format!("Building code '{}' already exists", draft.code)));
        }

        let building = self.store.insert_building(draft).await?;
        tracing::info!(building_id = building.id, asset_id = building.asset_id, "building created");
        Ok(building)
    }

    pub async fn update_building(&self, id: i64, patch: BuildingPatch) -> ServiceResult<Building> {
        let mut building = self.get_building(id).await?;

        if let Some(asset_id) = patch.asset_id {
            self.check_asset(asset_id).await?;
            building.asset_id = asset_id;
        }
        if let Some(code) = patch.code {
            let code = required(&code, "code")?;
            if let Some(other) = self.store.find_building_by_code(&code).await? {
                if other.id != id {
                    return Err(ServiceError::validation(format!("Building code '{}' already exists", code)));
                }
            }
            building.code = code;
        }
        if let Some(name) = patch.name {
            building.name = required(&name, "name")?;
        }
        if let Some(floor_count) = patch.floor_count {
            if floor_count < 0 {
                return Err(ServiceError::validation("floor_count must not be negative"));
            }
            building.floor_count = floor_count;
        }
        if let Some(total_area) = patch.total_area {
            non_negative(total_area, "total_area")?;
            building.total_area = total_area;
        }
        if let Some(address) = patch.address {
            building.address = address;
        }
        if let Some(status) = patch.status {
            building.status = status;
        }
        if let Some(description) = patch.description {
            building.description = description;
        }

        Ok(self.store.update_building(&building).await?)
    }

    pub async fn delete_building(&self, id: i64) -> ServiceResult<()> {
        let building = self.get_building(id).await?;
        let floors = self.store.count_floors(id).await?;
        if floors > 0 {
            return Err(ServiceError::in_use(format!(
                "Building '{}' still has {} floor(s)",
                building.name, floors
            )));
        }
        self.store.delete_building(id).await?;
        tracing::info!(building_id = id, "building deleted");
        Ok(())
    }

    // Floors

    pub async fn page_floors(&self, filter: &FloorFilter, page: PageRequest) -> ServiceResult<Page<Floor>> {
        let (items, total) = self.store.page_floors(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn get_floor(&self, id: i64) -> ServiceResult<Floor> {
        self.store
            .find_floor(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Floor", id))
    }

    pub async fn create_floor(&self, mut draft: FloorDraft) -> ServiceResult<Floor> {
        non_negative(draft.area, "area")?;
        if self.store.find_building(draft.building_id).await?.is_none() {
            return Err(ServiceError::validation(format!("Building {} does not exist", draft.building_id)));
        }
        if self
            .store
            .find_floor_by_number(draft.building_id, draft.floor_number)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "Floor {} already exists in this building",
                draft.floor_number
            )));
        }
        if draft.name.trim().is_empty() {
            draft.name = format!("{}F", draft.floor_number);
        }

        Ok(self.store.insert_floor(draft).await?)
    }

    pub async fn update_floor(&self, id: i64, patch: FloorPatch) -> ServiceResult<Floor> {
        let mut floor = self.get_floor(id).await?;

        if let Some(number) = patch.floor_number {
            if let Some(other) = self.store.find_floor_by_number(floor.building_id, number).await? {
                if other.id != id {
                    return Err(ServiceError::validation(format!(
                        "Floor {} already exists in this building",
                        number
                    )));
                }
            }
            floor.floor_number = number;
        }
        if let Some(name) = patch.name {
            floor.name = required(&name, "name")?;
        }
        if let Some(area) = patch.area {
            non_negative(area, "area")?;
            floor.area = area;
        }
        if let Some(status) = patch.status {
            floor.status = status;
        }

        Ok(self.store.update_floor(&floor).await?)
    }

    pub async fn delete_floor(&self, id: i64) -> ServiceResult<()> {
        let floor = self.get_floor(id).await?;
        let rooms = self.store.count_rooms(id).await?;
        if rooms > 0 {
            return Err(ServiceError::in_use(format!(
                "Floor '{}' still has {} room(s)",
                floor.name, rooms
            )));
        }
        self.store.delete_floor(id).await?;
        Ok(())
    }

    // Rooms

    pub async fn page_rooms(&self, filter: &RoomFilter, page: PageRequest) -> ServiceResult<Page<Room>> {
        let (items, total) = self.store.page_rooms(filter, page).await?;
        Ok(Page::new(items, total, page))
    }

    pub async fn get_room(&self, id: i64) -> ServiceResult<Room> {
        self.store
            .find_room(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Room", id))
    }

    pub async fn create_room(&self, mut draft: RoomDraft) -> ServiceResult<Room> {
        draft.room_number = required(&draft.room_number, "room_number")?;
        non_negative(draft.area, "area")?;
        if self.store.find_floor(draft.floor_id).await?.is_none() {
            return Err(ServiceError::validation(format!("Floor {} does not exist", draft.floor_id)));
        }
        if self
            .store
            .find_room_by_number(draft.floor_id, &draft.room_number)
            .await?
            .is_some()
        {
            return Err(ServiceError::validation(format!(
                "Room '{}' already exists on this floor",
                draft.room_number
            )));
        }

        Ok(self.store.insert_room(draft).await?)
    }

    pub async fn update_room(&self, id: i64, patch: RoomPatch) -> ServiceResult<Room> {
        let mut room = self.get_room(id).await?;

        if let Some(number) = patch.room_number {
            let number = required(&number, "room_number")?;
            if let Some(other) = self.store.find_room_by_number(room.floor_id, &number).await? {
                if other.id != id {
                    return Err(ServiceError::validation(format!(
                        "Room '{}' already exists on this floor",
                        number
                    )));
                }
            }
            room.room_number = number;
        }
        if let Some(area) = patch.area {
            non_negative(area, "area")?;
            room.area = area;
        }
        if let Some(usage) = patch.usage {
            room.usage = usage;
        }
        if let Some(status) = patch.status {
            room.status = status;
        }

        Ok(self.store.update_room(&room).await?)
    }

    pub async fn delete_room(&self, id: i64) -> ServiceResult<()> {
        self.get_room(id).await?;
        self.store.delete_room(id).await?;
        Ok(())
    }

    pub async fn statistics(&self) -> ServiceResult<AssetStatistics> {
        Ok(self.store.asset_statistics().await?)
    }

    async fn check_asset(&self, asset_id: i64) -> ServiceResult<()> {
        if self.store.find_asset(asset_id).await?.is_none() {
            return Err(ServiceError::validation(format!("Asset {} does not exist", asset_id)));
        }
        Ok(())
    }

    async fn check_organization(&self, organization_id: Option<i64>) -> ServiceResult<()> {
        let Some(org) = organization_id else {
            return Ok(());
        };
        if self.store.find_node(NodeKind::Organization, org).await?.is_none() {
            return Err(ServiceError::validation(format!("Organization {} does not exist", org)));
        }
        Ok(())
    }
}

fn non_negative(value: f64, field: &str) -> ServiceResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(ServiceError::validation(format!("{} must be a non-negative number", field)));
    }
    Ok(())
}

fn check_areas(total: f64, rentable: f64) -> ServiceResult<()> {
    non_negative(total, "total_area")?;
    non_negative(rentable, "rentable_area")?;
    if rentable > total {
        return Err(ServiceError::validation("rentable_area cannot exceed total_area"));
    }
    Ok(())
}

fn check_coordinates(longitude: Option<f64>, latitude: Option<f64>) -> ServiceResult<()> {
    if longitude.is_some_and(|v| !(-180.0..=180.0).contains(&v)) {
        return Err(ServiceError::validation("longitude must be within [-180, 180]"));
    }
    if latitude.is_some_and(|v| !(-90.0..=90.0).contains(&v)) {
        return Err(ServiceError::validation("latitude must be within [-90, 90]"));
    }
    Ok(())
}
