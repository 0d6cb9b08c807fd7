use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::role::contains_ci;
use crate::database::DatabaseError;

/// Status of assets, buildings and floors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetStatus {
    #[default]
    Normal,
    Disabled,
}

impl AssetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetStatus::Normal => "normal",
            AssetStatus::Disabled => "disabled",
        }
    }
}

impl FromStr for AssetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "normal" => Ok(AssetStatus::Normal),
            "disabled" => Ok(AssetStatus::Disabled),
            other => Err(format!("unknown asset status '{}'", other)),
        }
    }
}

impl fmt::Display for AssetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoomStatus {
    #[default]
    Vacant,
    Occupied,
    Maintenance,
}

impl RoomStatus {
    pub const ALL: [RoomStatus; 3] = [RoomStatus::Vacant, RoomStatus::Occupied, RoomStatus::Maintenance];

    pub fn as_str(&self) -> &'static str {
        match self {
            RoomStatus::Vacant => "vacant",
            RoomStatus::Occupied => "occupied",
            RoomStatus::Maintenance => "maintenance",
        }
    }
}

impl FromStr for RoomStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vacant" => Ok(RoomStatus::Vacant),
            "occupied" => Ok(RoomStatus::Occupied),
            "maintenance" => Ok(RoomStatus::Maintenance),
            other => Err(format!("unknown room status '{}'", other)),
        }
    }
}

impl fmt::Display for RoomStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Assets

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub organization_id: Option<i64>,
    pub address: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub land_nature: String,
    pub total_area: f64,
    pub rentable_area: f64,
    pub tags: Vec<String>,
    pub description: String,
    pub status: AssetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct AssetDraft {
    pub code: String,
    pub name: String,
    pub organization_id: Option<i64>,
    pub address: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub land_nature: String,
    pub total_area: f64,
    pub rentable_area: f64,
    pub tags: Vec<String>,
    pub description: String,
    pub status: AssetStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssetFilter {
    pub name: Option<String>,
    pub organization_id: Option<i64>,
    pub status: Option<AssetStatus>,
}

impl AssetFilter {
    pub fn matches(&self, asset: &Asset) -> bool {
        contains_ci(&asset.name, self.name.as_deref())
            && self
                .organization_id
                .map_or(true, |org| asset.organization_id == Some(org))
            && self.status.map_or(true, |s| asset.status == s)
    }
}

#[derive(Debug, FromRow)]
pub struct AssetRow {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub organization_id: Option<i64>,
    pub address: String,
    pub longitude: Option<f64>,
    pub latitude: Option<f64>,
    pub land_nature: String,
    pub total_area: f64,
    pub rentable_area: f64,
    pub tags: Vec<String>,
    pub description: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<AssetRow> for Asset {
    type Error = DatabaseError;

    fn try_from(row: AssetRow) -> Result<Self, Self::Error> {
        Ok(Asset {
            id: row.id,
            code: row.code,
            name: row.name,
            organization_id: row.organization_id,
            address: row.address,
            longitude: row.longitude,
            latitude: row.latitude,
            land_nature: row.land_nature,
            total_area: row.total_area,
            rentable_area: row.rentable_area,
            tags: row.tags,
            description: row.description,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Buildings

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Building {
    pub id: i64,
    pub asset_id: i64,
    pub code: String,
    pub name: String,
    pub floor_count: i32,
    pub total_area: f64,
    pub address: String,
    pub status: AssetStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct BuildingDraft {
    pub asset_id: i64,
    pub code: String,
    pub name: String,
    pub floor_count: i32,
    pub total_area: f64,
    pub address: String,
    pub status: AssetStatus,
    pub description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuildingFilter {
    pub asset_id: Option<i64>,
    pub name: Option<String>,
}

impl BuildingFilter {
    pub fn matches(&self, building: &Building) -> bool {
        self.asset_id.map_or(true, |a| building.asset_id == a)
            && contains_ci(&building.name, self.name.as_deref())
    }
}

#[derive(Debug, FromRow)]
pub struct BuildingRow {
    pub id: i64,
    pub asset_id: i64,
    pub code: String,
    pub name: String,
    pub floor_count: i32,
    pub total_area: f64,
    pub address: String,
    pub status: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<BuildingRow> for Building {
    type Error = DatabaseError;

    fn try_from(row: BuildingRow) -> Result<Self, Self::Error> {
        Ok(Building {
            id: row.id,
            asset_id: row.asset_id,
            code: row.code,
            name: row.name,
            floor_count: row.floor_count,
            total_area: row.total_area,
            address: row.address,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            description: row.description,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Floors

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Floor {
    pub id: i64,
    pub building_id: i64,
    pub floor_number: i32,
    pub name: String,
    pub area: f64,
    pub status: AssetStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct FloorDraft {
    pub building_id: i64,
    pub floor_number: i32,
    pub name: String,
    pub area: f64,
    pub status: AssetStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FloorFilter {
    pub building_id: Option<i64>,
    pub name: Option<String>,
}

impl FloorFilter {
    pub fn matches(&self, floor: &Floor) -> bool {
        self.building_id.map_or(true, |b| floor.building_id == b)
            && contains_ci(&floor.name, self.name.as_deref())
    }
}

#[derive(Debug, FromRow)]
pub struct FloorRow {
    pub id: i64,
    pub building_id: i64,
    pub floor_number: i32,
    pub name: String,
    pub area: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<FloorRow> for Floor {
    type Error = DatabaseError;

    fn try_from(row: FloorRow) -> Result<Self, Self::Error> {
        Ok(Floor {
            id: row.id,
            building_id: row.building_id,
            floor_number: row.floor_number,
            name: row.name,
            area: row.area,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// Rooms

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: i64,
    pub floor_id: i64,
    pub room_number: String,
    pub area: f64,
    pub usage: String,
    pub status: RoomStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default)]
pub struct RoomDraft {
    pub floor_id: i64,
    pub room_number: String,
    pub area: f64,
    pub usage: String,
    pub status: RoomStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoomFilter {
    pub floor_id: Option<i64>,
    pub status: Option<RoomStatus>,
    pub room_number: Option<String>,
}

impl RoomFilter {
    pub fn matches(&self, room: &Room) -> bool {
        self.floor_id.map_or(true, |f| room.floor_id == f)
            && self.status.map_or(true, |s| room.status == s)
            && contains_ci(&room.room_number, self.room_number.as_deref())
    }
}

#[derive(Debug, FromRow)]
pub struct RoomRow {
    pub id: i64,
    pub floor_id: i64,
    pub room_number: String,
    pub area: f64,
    pub usage: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<RoomRow> for Room {
    type Error = DatabaseError;

    fn try_from(row: RoomRow) -> Result<Self, Self::Error> {
        Ok(Room {
            id: row.id,
            floor_id: row.floor_id,
            room_number: row.room_number,
            area: row.area,
            usage: row.usage,
            status: row.status.parse().map_err(DatabaseError::QueryError)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Portfolio-wide counts and areas
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssetStatistics {
    pub asset_count: i64,
    pub building_count: i64,
    pub floor_count: i64,
    pub room_count: i64,
    pub total_area: f64,
    pub rentable_area: f64,
    pub rooms_by_status: BTreeMap<String, i64>,
}
