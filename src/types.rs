/// Shared types used across the codebase

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle status shared by nodes, roles and users
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Active,
    Disabled,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "active",
            Status::Disabled => "disabled",
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Status::Active)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Status::Active),
            "disabled" | "inactive" => Ok(Status::Disabled),
            other => Err(format!("unknown status '{}'", other)),
        }
    }
}

pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const MAX_PAGE_SIZE: u32 = 100;

/// Page selection parsed from `?page=&size=` query parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct PageRequest {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_size", alias = "page_size")]
    pub size: u32,
}

fn default_page() -> u32 {
    1
}

fn default_size() -> u32 {
    DEFAULT_PAGE_SIZE
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page: 1,
            size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl PageRequest {
    pub fn new(page: u32, size: u32) -> Self {
        Self { page, size }.normalized()
    }

    /// Clamp to page >= 1 and 1 <= size <= MAX_PAGE_SIZE
    pub fn normalized(self) -> Self {
        Self {
            page: self.page.max(1),
            size: self.size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn offset(&self) -> i64 {
        let p = self.normalized();
        (p.page as i64 - 1) * p.size as i64
    }

    pub fn limit(&self) -> i64 {
        self.normalized().size as i64
    }

    /// Slice an in-memory result set the same way OFFSET/LIMIT would
    pub fn slice<T: Clone>(&self, items: &[T]) -> Vec<T> {
        let start = (self.offset() as usize).min(items.len());
        let end = (start + self.limit() as usize).min(items.len());
        items[start..end].to_vec()
    }
}

/// List response body: `{items, total, page, size}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: u32,
    pub size: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, request: PageRequest) -> Self {
        let request = request.normalized();
        Self {
            items,
            total,
            page: request.page,
            size: request.size,
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            page: self.page,
            size: self.size,
        }
    }
}

/// Deserialize a field that distinguishes "absent" from "explicit null".
///
/// Use with `#[serde(default, deserialize_with = "nullable")]` on an
/// `Option<Option<T>>`: absent → `None`, `null` → `Some(None)`,
/// value → `Some(Some(v))`.
pub fn nullable<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "nullable")]
        parent_id: Option<Option<i64>>,
        sort_order: Option<i32>,
    }

    #[test]
    fn nullable_distinguishes_absent_null_and_zero() {
        let absent: Probe = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.parent_id, None);
        assert_eq!(absent.sort_order, None);

        let null: Probe = serde_json::from_str(r#"{"parent_id": null}"#).unwrap();
        assert_eq!(null.parent_id, Some(None));

        let zero: Probe = serde_json::from_str(r#"{"parent_id": 0, "sort_order": 0}"#).unwrap();
        assert_eq!(zero.parent_id, Some(Some(0)));
        assert_eq!(zero.sort_order, Some(0));
    }

    #[test]
    fn page_request_clamps_and_offsets() {
        let p = PageRequest::new(0, 1000);
        assert_eq!(p.page, 1);
        assert_eq!(p.size, MAX_PAGE_SIZE);
        assert_eq!(PageRequest::new(3, 20).offset(), 40);
    }

    #[test]
    fn page_request_slices_like_sql() {
        let items: Vec<i32> = (1..=25).collect();
        assert_eq!(PageRequest::new(3, 10).slice(&items), vec![21, 22, 23, 24, 25]);
        assert!(PageRequest::new(4, 10).slice(&items).is_empty());
    }

    #[test]
    fn status_parses_legacy_inactive() {
        assert_eq!("inactive".parse::<Status>().unwrap(), Status::Disabled);
        assert!("bogus".parse::<Status>().is_err());
    }
}
