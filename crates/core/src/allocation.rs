//! Deterministic distribution of content items across plan days.
//!
//! The catalog is a flat, ordered list of (content, category) pairs — the
//! same content id may be listed under several categories. Selection
//! round-robins across categories for balance; day filling defers any
//! candidate that would duplicate a content id already on the current day
//! to the next day. Identical catalog ordering and parameters always
//! produce an identical mapping, so a plan's days can be regenerated
//! idempotently.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::EntityId;

// ---------------------------------------------------------------------------
// Catalog types
// ---------------------------------------------------------------------------

/// Display reference to a content category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRef {
    pub id: EntityId,
    pub name: String,
    pub icon: String,
}

/// One catalog row: a content item listed under a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub content_id: EntityId,
    pub category: CategoryRef,
}

/// A content item placed on a plan day. Immutable once placed; list order
/// within a day is presentation order only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayItem {
    pub content_id: EntityId,
    pub category_id: EntityId,
    pub category_icon: String,
    pub category_name: String,
}

impl From<&CatalogEntry> for DayItem {
    fn from(entry: &CatalogEntry) -> Self {
        DayItem {
            content_id: entry.content_id,
            category_id: entry.category.id,
            category_icon: entry.category.icon.clone(),
            category_name: entry.category.name.clone(),
        }
    }
}

/// Day-indexed schedule. Indices are contiguous from 1; trailing days may
/// hold fewer items than requested when the catalog runs short.
pub type Days = BTreeMap<u32, Vec<DayItem>>;

// ---------------------------------------------------------------------------
// Allocation
// ---------------------------------------------------------------------------

/// Distribute catalog items across `day_count` days of up to
/// `items_per_day` items each.
///
/// Categories are cycled in a fixed order — `seed_categories` first (for
/// plans generated from a behavior, its category set), then remaining
/// categories in order of first appearance in the catalog. A candidate
/// whose content id is already on the current day is deferred to the
/// front of the next day's draw. A catalog smaller than the demand leaves
/// trailing days short (possibly empty); every index in `1..=day_count`
/// is still present.
pub fn allocate(
    catalog: &[CatalogEntry],
    day_count: u32,
    items_per_day: u32,
    seed_categories: &[EntityId],
) -> Result<Days, CoreError> {
    if catalog.is_empty() {
        return Err(CoreError::EmptyCatalog);
    }
    if day_count == 0 {
        return Err(CoreError::Validation(
            "Plan day count must be positive".to_string(),
        ));
    }
    if items_per_day == 0 {
        return Err(CoreError::Validation(
            "Items per day must be positive".to_string(),
        ));
    }

    // Category cycle order: seeds first, then first appearance.
    let mut appearance: Vec<EntityId> = Vec::new();
    let mut buckets: BTreeMap<EntityId, VecDeque<&CatalogEntry>> = BTreeMap::new();
    for entry in catalog {
        if !appearance.contains(&entry.category.id) {
            appearance.push(entry.category.id);
        }
        buckets.entry(entry.category.id).or_default().push_back(entry);
    }
    let mut cycle: Vec<EntityId> = Vec::new();
    for seed in seed_categories {
        if buckets.contains_key(seed) && !cycle.contains(seed) {
            cycle.push(*seed);
        }
    }
    for id in appearance {
        if !cycle.contains(&id) {
            cycle.push(id);
        }
    }

    // Round-robin selection, exhausted categories skipped.
    let demand = day_count as usize * items_per_day as usize;
    let mut selection: VecDeque<&CatalogEntry> = VecDeque::new();
    'selecting: loop {
        let mut drew = false;
        for category in &cycle {
            if selection.len() == demand {
                break 'selecting;
            }
            if let Some(entry) = buckets.get_mut(category).and_then(|queue| queue.pop_front()) {
                selection.push_back(entry);
                drew = true;
            }
        }
        if !drew {
            break;
        }
    }

    // Fill days; duplicates within a day are deferred to the next one.
    let mut days: Days = BTreeMap::new();
    let mut carry: VecDeque<&CatalogEntry> = VecDeque::new();
    for day in 1..=day_count {
        let mut items: Vec<DayItem> = Vec::new();
        let mut deferred: VecDeque<&CatalogEntry> = VecDeque::new();
        while items.len() < items_per_day as usize {
            let Some(entry) = carry.pop_front().or_else(|| selection.pop_front()) else {
                break;
            };
            if items.iter().any(|item| item.content_id == entry.content_id) {
                deferred.push_back(entry);
            } else {
                items.push(DayItem::from(entry));
            }
        }
        deferred.append(&mut carry);
        carry = deferred;
        days.insert(day, items);
    }

    Ok(days)
}

/// Number of days holding fewer than `items_per_day` items. Short days
/// are reported by callers, not treated as failure.
pub fn short_day_count(days: &Days, items_per_day: u32) -> usize {
    days.values()
        .filter(|items| items.len() < items_per_day as usize)
        .count()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
