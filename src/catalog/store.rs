use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::item::{Event, Item};
use crate::data::Value;

/// Read-only access to the pre-existing time-series store.
///
/// Every call is a potential suspension point; the engine races them
/// against its cancellation token.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// All known items, ordered by identifier
    async fn list_items(&self) -> Result<Vec<Arc<Item>>, CatalogError>;

    /// Events with `start <= index <= end`, plus the events outside the
    /// window needed to reach the closest non-null value of every non-key
    /// member on each side, when one exists. Ordered by index.
    async fn read_window(&self, item_id: &str, start: i64, end: i64)
        -> Result<Vec<Event>, CatalogError>;
}

#[derive(Debug)]
struct ItemEntry {
    item: Arc<Item>,
    /// Sorted by index, one event per index
    events: RwLock<Vec<Event>>,
}

/// In-memory catalog of items and their raw events
pub struct InMemoryCatalog {
    items: DashMap<String, Arc<ItemEntry>>,
    /// Number of `read_window` calls served
    window_reads: AtomicU64,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self {
            items: DashMap::new(),
            window_reads: AtomicU64::new(0),
        }
    }

    /// Register a new item definition
    pub fn register_item(&self, item: Item) -> Result<Arc<Item>, CatalogError> {
        if self.items.contains_key(&item.id) {
            return Err(CatalogError::ItemExists(item.id));
        }

        let mut seen = std::collections::HashSet::new();
        for member in &item.members {
            if !seen.insert(member.name.as_str()) {
                return Err(CatalogError::DuplicateMember {
                    item: item.id.clone(),
                    member: member.name.clone(),
                });
            }
        }

        let item = Arc::new(item);
        self.items.insert(
            item.id.clone(),
            Arc::new(ItemEntry {
                item: Arc::clone(&item),
                events: RwLock::new(Vec::new()),
            }),
        );

        tracing::debug!(item_id = %item.id, members = item.members.len(), "Registered item");
        Ok(item)
    }

    pub fn get_item(&self, id: &str) -> Option<Arc<Item>> {
        self.items.get(id).map(|e| Arc::clone(&e.item))
    }

    /// Remove an item and its data. Returns whether it existed.
    pub fn remove_item(&self, id: &str) -> bool {
        self.items.remove(id).is_some()
    }

    /// Insert events, keeping them sorted by index. An event at an existing
    /// index replaces the stored one.
    pub fn insert_events(&self, item_id: &str, events: Vec<Event>) -> Result<usize, CatalogError> {
        let entry = self
            .items
            .get(item_id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| CatalogError::ItemNotFound(item_id.to_string()))?;

        let item = &entry.item;
        let (index_pos, _) = item
            .index_member()
            .ok_or_else(|| CatalogError::MissingIndex(item_id.to_string()))?;

        let mut prepared = Vec::with_capacity(events.len());
        for mut event in events {
            if event.values.len() != item.members.len() {
                return Err(CatalogError::ValueCountMismatch {
                    item: item_id.to_string(),
                    expected: item.members.len(),
                    actual: event.values.len(),
                });
            }
            event.values[index_pos] = Value::Timestamp(event.index);

            for (member, value) in item.members.iter().zip(&event.values) {
                if !member.data_type.accepts(value) {
                    return Err(CatalogError::TypeMismatch {
                        item: item_id.to_string(),
                        member: member.name.clone(),
                        expected: member.data_type.to_string(),
                        actual: value.type_name().to_string(),
                    });
                }
            }
            prepared.push(event);
        }

        let inserted = prepared.len();
        let mut stored = entry.events.write();
        for event in prepared {
            match stored.binary_search_by_key(&event.index, |e| e.index) {
                Ok(pos) => stored[pos] = event,
                Err(pos) => stored.insert(pos, event),
            }
        }

        Ok(inserted)
    }

    pub fn event_count(&self, item_id: &str) -> Option<usize> {
        self.items.get(item_id).map(|e| e.events.read().len())
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Number of window reads served so far
    pub fn window_reads(&self) -> u64 {
        self.window_reads.load(Ordering::Relaxed)
    }
}

impl Default for InMemoryCatalog {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SeriesSource for InMemoryCatalog {
    async fn list_items(&self) -> Result<Vec<Arc<Item>>, CatalogError> {
        let mut items: Vec<Arc<Item>> = self.items.iter().map(|e| Arc::clone(&e.item)).collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(items)
    }

    async fn read_window(
        &self,
        item_id: &str,
        start: i64,
        end: i64,
    ) -> Result<Vec<Event>, CatalogError> {
        self.window_reads.fetch_add(1, Ordering::Relaxed);

        let entry = self
            .items
            .get(item_id)
            .map(|e| Arc::clone(&e))
            .ok_or_else(|| CatalogError::ItemNotFound(item_id.to_string()))?;

        if end < start {
            return Ok(Vec::new());
        }

        let events = entry.events.read();
        let lo = events.partition_point(|e| e.index < start);
        let hi = events.partition_point(|e| e.index <= end);

        let values: Vec<usize> = entry
            .item
            .members
            .iter()
            .enumerate()
            .filter(|(_, m)| !m.is_key)
            .map(|(pos, _)| pos)
            .collect();

        let from = lo - boundary_len(events[..lo].iter().rev(), &values);
        let to = hi + boundary_len(events[hi..].iter(), &values);
        Ok(events[from..to].to_vec())
    }
}

/// Events to take from `side` until each member in `values` has been seen
/// non-null. At least one event when any exist.
fn boundary_len<'a>(side: impl Iterator<Item = &'a Event>, values: &[usize]) -> usize {
    let mut missing: Vec<usize> = values.to_vec();
    let mut taken = 0;
    for event in side {
        if taken > 0 && missing.is_empty() {
            break;
        }
        taken += 1;
        missing.retain(|&pos| event.values.get(pos).map_or(true, Value::is_null));
    }
    taken
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum CatalogError {
    #[error("Item '{0}' already exists")]
    ItemExists(String),

    #[error("Item '{0}' not found")]
    ItemNotFound(String),

    #[error("Item '{item}' declares member '{member}' twice")]
    DuplicateMember { item: String, member: String },

    #[error("Item '{0}' has no timestamp index and cannot store events")]
    MissingIndex(String),

    #[error("Item '{item}' expects {expected} values per event, got {actual}")]
    ValueCountMismatch {
        item: String,
        expected: usize,
        actual: usize,
    },

    #[error("Item '{item}' member '{member}' expects {expected}, got {actual}")]
    TypeMismatch {
        item: String,
        member: String,
        expected: String,
        actual: String,
    },

    #[error("Series source unavailable: {0}")]
    Unavailable(String),
}
