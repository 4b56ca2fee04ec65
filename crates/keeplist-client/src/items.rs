//! Checklist-item cache partitioned by checklist id.
//!
//! # Design
//! - Each checklist owns an independent partition with its own loading flag.
//! - Mutations apply only after the service confirms them.
//! - Updates and deletes for items missing from the cache are silent no-ops.
//! - Concurrent writes resolve last-response-wins; there is no versioning.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keeplist_api_models::{
    ChecklistId, ChecklistItem, ItemId, ItemNameRequest, ItemStatusRequest, extract_id,
    normalize_list,
};

use crate::error::{ClientError, ClientResult, require_non_empty};
use crate::http::ApiClient;
use crate::status::LoadStatus;

/// Partitioned item cache.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemsState {
    /// Items keyed by owning checklist.
    pub by_checklist: HashMap<ChecklistId, Vec<ChecklistItem>>,
    /// Per-partition loading flags.
    pub loading: HashMap<ChecklistId, bool>,
    /// Status of the most recent item request.
    pub status: LoadStatus,
    /// Message of the most recent failed request.
    pub last_error: Option<String>,
}

/// Mark a partition as loading.
pub fn begin_fetch(state: &mut ItemsState, checklist_id: ChecklistId) {
    state.loading.insert(checklist_id, true);
    state.status = LoadStatus::Loading;
    state.last_error = None;
}

/// Replace a partition and clear its loading flag.
pub fn finish_fetch(
    state: &mut ItemsState,
    checklist_id: ChecklistId,
    items: Vec<ChecklistItem>,
) {
    state.by_checklist.insert(checklist_id, items);
    state.loading.insert(checklist_id, false);
    state.status = LoadStatus::Succeeded;
}

/// Empty a partition after a failed fetch and clear its loading flag.
pub fn fail_fetch(state: &mut ItemsState, checklist_id: ChecklistId, message: String) {
    state.by_checklist.insert(checklist_id, Vec::new());
    state.loading.insert(checklist_id, false);
    record_failure(state, message);
}

/// Record a failed mutation without touching any partition.
pub fn record_failure(state: &mut ItemsState, message: String) {
    state.status = LoadStatus::Failed;
    state.last_error = Some(message);
}

/// Ensure an empty, idle partition exists. Existing partitions are kept.
pub fn initialize_partition(state: &mut ItemsState, checklist_id: ChecklistId) {
    state.by_checklist.entry(checklist_id).or_default();
    state.loading.entry(checklist_id).or_insert(false);
}

/// Drop a partition and its loading flag.
pub fn remove_partition(state: &mut ItemsState, checklist_id: ChecklistId) {
    state.by_checklist.remove(&checklist_id);
    state.loading.remove(&checklist_id);
}

/// Append an item, creating the partition when absent.
pub fn append_item(state: &mut ItemsState, checklist_id: ChecklistId, item: ChecklistItem) {
    state.by_checklist.entry(checklist_id).or_default().push(item);
    state.loading.entry(checklist_id).or_insert(false);
}

/// Set an item's completion flag. Returns whether the item was cached.
pub fn update_status(
    state: &mut ItemsState,
    checklist_id: ChecklistId,
    item_id: ItemId,
    status: bool,
) -> bool {
    let Some(item) = find_item(state, checklist_id, item_id) else {
        return false;
    };
    item.status = status;
    true
}

/// Rename an item. Returns whether the item was cached.
pub fn update_name(
    state: &mut ItemsState,
    checklist_id: ChecklistId,
    item_id: ItemId,
    name: String,
) -> bool {
    let Some(item) = find_item(state, checklist_id, item_id) else {
        return false;
    };
    item.name = name;
    true
}

/// Remove an item from its partition. Returns whether the item was cached.
pub fn remove_item(state: &mut ItemsState, checklist_id: ChecklistId, item_id: ItemId) -> bool {
    let Some(items) = state.by_checklist.get_mut(&checklist_id) else {
        return false;
    };
    let before = items.len();
    items.retain(|item| item.id != item_id);
    items.len() != before
}

fn find_item(
    state: &mut ItemsState,
    checklist_id: ChecklistId,
    item_id: ItemId,
) -> Option<&mut ChecklistItem> {
    state
        .by_checklist
        .get_mut(&checklist_id)?
        .iter_mut()
        .find(|item| item.id == item_id)
}

fn items_path(checklist_id: ChecklistId) -> String {
    format!("checklist/{checklist_id}/item")
}

fn item_path(checklist_id: ChecklistId, item_id: ItemId) -> String {
    format!("checklist/{checklist_id}/item/{item_id}")
}

fn rename_path(checklist_id: ChecklistId, item_id: ItemId) -> String {
    format!("checklist/{checklist_id}/item/rename/{item_id}")
}

/// Sole writer of the item cache.
#[derive(Debug, Clone)]
pub struct ChecklistItemStore {
    api: ApiClient,
    state: Arc<Mutex<ItemsState>>,
}

impl ChecklistItemStore {
    /// Build an empty store over the shared client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(ItemsState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ItemsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch a checklist's items and replace its partition.
    ///
    /// The partition's loading flag is set for the duration of the request.
    /// A payload without a list yields an empty partition; so does a failed
    /// request.
    ///
    /// # Errors
    ///
    /// Returns the request failure after emptying the partition.
    pub async fn fetch_by_checklist(
        &self,
        checklist_id: ChecklistId,
    ) -> ClientResult<Vec<ChecklistItem>> {
        begin_fetch(&mut self.lock(), checklist_id);
        match self.api.get(&items_path(checklist_id)).await {
            Ok(body) => {
                let items: Vec<ChecklistItem> = normalize_list(body, "checklist items");
                tracing::debug!(checklist_id, count = items.len(), "items fetched");
                finish_fetch(&mut self.lock(), checklist_id, items.clone());
                Ok(items)
            }
            Err(err) => {
                tracing::debug!(checklist_id, error = %err, "item fetch failed");
                fail_fetch(&mut self.lock(), checklist_id, err.user_message());
                Err(err)
            }
        }
    }

    /// Create an item and append it, not yet done, once confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a blank name, the request
    /// failure, or [`ClientError::Decode`] when the response carries no id.
    pub async fn create(
        &self,
        checklist_id: ChecklistId,
        name: &str,
    ) -> ClientResult<ChecklistItem> {
        let name = require_non_empty("item name", name)?;
        let path = items_path(checklist_id);
        let request = ItemNameRequest {
            item_name: name.clone(),
        };
        let body = self
            .api
            .post(&path, &request)
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        let id = extract_id(&body).ok_or_else(|| ClientError::Decode {
            path,
            detail: "response carried no item id".to_string(),
        })?;
        let item = ChecklistItem::pending(id, name);
        append_item(&mut self.lock(), checklist_id, item.clone());
        tracing::info!(checklist_id, item_id = id, "item created");
        Ok(item)
    }

    /// Set an item's completion flag once confirmed.
    ///
    /// # Errors
    ///
    /// Returns the request failure. An item missing from the cache is not
    /// an error.
    pub async fn set_status(
        &self,
        checklist_id: ChecklistId,
        item_id: ItemId,
        status: bool,
    ) -> ClientResult<()> {
        self.api
            .put(&item_path(checklist_id, item_id), &ItemStatusRequest { status })
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        if !update_status(&mut self.lock(), checklist_id, item_id, status) {
            tracing::debug!(checklist_id, item_id, "status update for uncached item ignored");
        }
        Ok(())
    }

    /// Rename an item once confirmed.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a blank name or the request
    /// failure. An item missing from the cache is not an error.
    pub async fn rename(
        &self,
        checklist_id: ChecklistId,
        item_id: ItemId,
        name: &str,
    ) -> ClientResult<()> {
        let name = require_non_empty("item name", name)?;
        let request = ItemNameRequest {
            item_name: name.clone(),
        };
        self.api
            .put(&rename_path(checklist_id, item_id), &request)
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        if !update_name(&mut self.lock(), checklist_id, item_id, name) {
            tracing::debug!(checklist_id, item_id, "rename for uncached item ignored");
        }
        Ok(())
    }

    /// Delete an item and drop it from its partition once confirmed.
    ///
    /// # Errors
    ///
    /// Returns the request failure. An item missing from the cache is not
    /// an error.
    pub async fn delete(&self, checklist_id: ChecklistId, item_id: ItemId) -> ClientResult<()> {
        self.api
            .delete(&item_path(checklist_id, item_id))
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        if !remove_item(&mut self.lock(), checklist_id, item_id) {
            tracing::debug!(checklist_id, item_id, "delete for uncached item ignored");
        }
        Ok(())
    }

    /// Ensure an empty, idle partition exists for a new checklist.
    pub fn initialize_partition(&self, checklist_id: ChecklistId) {
        initialize_partition(&mut self.lock(), checklist_id);
    }

    /// Forget a checklist's partition.
    pub fn remove_partition(&self, checklist_id: ChecklistId) {
        remove_partition(&mut self.lock(), checklist_id);
    }

    /// Copy of a partition; `None` when it was never created.
    #[must_use]
    pub fn items(&self, checklist_id: ChecklistId) -> Option<Vec<ChecklistItem>> {
        self.lock().by_checklist.get(&checklist_id).cloned()
    }

    /// Whether a partition exists, loaded or not.
    #[must_use]
    pub fn has_partition(&self, checklist_id: ChecklistId) -> bool {
        self.lock().by_checklist.contains_key(&checklist_id)
    }

    /// First `count` items of a partition.
    #[must_use]
    pub fn preview(&self, checklist_id: ChecklistId, count: usize) -> Vec<ChecklistItem> {
        self.lock()
            .by_checklist
            .get(&checklist_id)
            .map(|items| items.iter().take(count).cloned().collect())
            .unwrap_or_default()
    }

    /// Number of cached items in a partition; zero when absent.
    #[must_use]
    pub fn item_count(&self, checklist_id: ChecklistId) -> usize {
        self.lock()
            .by_checklist
            .get(&checklist_id)
            .map_or(0, Vec::len)
    }

    /// Whether a fetch for the partition is in flight.
    #[must_use]
    pub fn is_loading(&self, checklist_id: ChecklistId) -> bool {
        self.lock()
            .loading
            .get(&checklist_id)
            .copied()
            .unwrap_or(false)
    }

    /// Copy of the full cache state.
    #[must_use]
    pub fn snapshot(&self) -> ItemsState {
        self.lock().clone()
    }

    /// Status of the most recent request.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lock().status
    }

    /// Message of the most recent failed request.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Drop every partition.
    pub fn clear(&self) {
        *self.lock() = ItemsState::default();
    }
}
