//! Tappable screen regions and the shared, replace-only region list.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Deserialize;

use crate::error::{Error, Result};

/// A rectangle in screen pixels that turns touches into tap events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Region {
    pub id: String,
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl Region {
    pub fn new(id: impl Into<String>, left: i32, top: i32, width: i32, height: i32) -> Self {
        Self {
            id: id.into(),
            left,
            top,
            width,
            height,
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.id.is_empty() && self.width > 0 && self.height > 0
    }

    /// Half-open containment: the right and bottom edges are outside.
    pub fn contains(&self, x: i32, y: i32) -> bool {
        let (x, y) = (x as i64, y as i64);
        let (left, top) = (self.left as i64, self.top as i64);
        x >= left && x < left + self.width as i64 && y >= top && y < top + self.height as i64
    }
}

/// First region, in list order, containing the point.
pub fn hit_test(regions: &[Region], x: i32, y: i32) -> Option<&Region> {
    regions.iter().find(|r| r.contains(x, y))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegionEntry {
    #[serde(default)]
    identifier: String,
    #[serde(default)]
    left_px: i32,
    #[serde(default)]
    top_px: i32,
    #[serde(default)]
    width_px: i32,
    #[serde(default)]
    height_px: i32,
}

/// Decode a region update payload: a JSON array of
/// `{identifier, leftPx, topPx, widthPx, heightPx}` objects.
///
/// Non-object entries and entries with an empty identifier or a non-positive
/// size are skipped. Anything else that does not decode rejects the payload.
pub fn parse_regions(json: &str) -> Result<Vec<Region>> {
    let value: serde_json::Value =
        serde_json::from_str(json).map_err(|e| Error::MalformedRegionUpdate(e.to_string()))?;
    let serde_json::Value::Array(items) = value else {
        return Err(Error::MalformedRegionUpdate(
            "top-level value is not an array".into(),
        ));
    };

    let mut regions = Vec::with_capacity(items.len());
    for item in items {
        if !item.is_object() {
            continue;
        }
        let entry: RegionEntry = serde_json::from_value(item)
            .map_err(|e| Error::MalformedRegionUpdate(e.to_string()))?;
        let region = Region::new(
            entry.identifier,
            entry.left_px,
            entry.top_px,
            entry.width_px,
            entry.height_px,
        );
        if region.is_valid() {
            regions.push(region);
        } else {
            log::debug!("[regions] dropping invalid entry {:?}", region);
        }
    }
    Ok(regions)
}

/// Region list shared between the control side and the reading thread.
///
/// Updates swap in a whole new list; readers clone the `Arc` under the lock
/// and hit-test without holding it.
#[derive(Debug)]
pub struct RegionStore {
    current: Mutex<Arc<[Region]>>,
}

impl Default for RegionStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl RegionStore {
    pub fn new(regions: Vec<Region>) -> Self {
        Self {
            current: Mutex::new(regions.into()),
        }
    }

    pub fn snapshot(&self) -> Arc<[Region]> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replace the whole list. Invalid entries are dropped.
    pub fn replace(&self, regions: Vec<Region>) -> usize {
        let regions: Arc<[Region]> = regions.into_iter().filter(Region::is_valid).collect();
        let count = regions.len();
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = regions;
        count
    }

    /// Apply a JSON region update; on error the previous list stays active.
    pub fn update_from_json(&self, json: &str) -> Result<usize> {
        match parse_regions(json) {
            Ok(regions) => {
                let count = self.replace(regions);
                log::info!("[regions] updated, count={}", count);
                Ok(count)
            }
            Err(e) => {
                log::error!("[regions] update rejected: {}", e);
                Err(e)
            }
        }
    }
}
