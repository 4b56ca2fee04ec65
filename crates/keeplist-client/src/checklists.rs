//! Checklist cache and its remote operations.
//!
//! The cache only changes after the service confirms an operation; nothing
//! is applied speculatively.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use keeplist_api_models::{
    Checklist, ChecklistCreateRequest, ChecklistId, extract_id, normalize_list,
};

use crate::error::{ClientError, ClientResult, require_non_empty};
use crate::http::ApiClient;
use crate::status::LoadStatus;

const CHECKLISTS_PATH: &str = "checklist";

/// Cached checklists plus the status of the last fetch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChecklistState {
    /// Checklists in server order, with local creations appended.
    pub checklists: Vec<Checklist>,
    /// Status of the last list request.
    pub status: LoadStatus,
    /// Message of the last failed request.
    pub last_error: Option<String>,
}

/// Mark a fetch as started.
pub fn begin_load(state: &mut ChecklistState) {
    state.status = LoadStatus::Loading;
    state.last_error = None;
}

/// Replace the cached list with a fresh server snapshot.
pub fn set_checklists(state: &mut ChecklistState, checklists: Vec<Checklist>) {
    state.checklists = checklists;
    state.status = LoadStatus::Succeeded;
}

/// Record a failed request, leaving the cached list untouched.
pub fn record_failure(state: &mut ChecklistState, message: String) {
    state.status = LoadStatus::Failed;
    state.last_error = Some(message);
}

/// Append a confirmed checklist.
pub fn append_checklist(state: &mut ChecklistState, checklist: Checklist) {
    state.checklists.push(checklist);
}

/// Remove a checklist by id. Returns whether an entry was removed.
pub fn remove_checklist(state: &mut ChecklistState, id: ChecklistId) -> bool {
    let before = state.checklists.len();
    state.checklists.retain(|checklist| checklist.id != id);
    state.checklists.len() != before
}

/// Sole writer of the checklist cache.
#[derive(Debug, Clone)]
pub struct ChecklistStore {
    api: ApiClient,
    state: Arc<Mutex<ChecklistState>>,
}

impl ChecklistStore {
    /// Build an empty store over the shared client.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        Self {
            api,
            state: Arc::new(Mutex::new(ChecklistState::default())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChecklistState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch every checklist and replace the cache with the result.
    ///
    /// Any of the accepted list envelopes is normalised; a payload without a
    /// list yields an empty cache.
    ///
    /// # Errors
    ///
    /// Returns the request failure; the cache keeps its previous contents.
    pub async fn fetch_all(&self) -> ClientResult<Vec<Checklist>> {
        begin_load(&mut self.lock());
        match self.api.get(CHECKLISTS_PATH).await {
            Ok(body) => {
                let checklists: Vec<Checklist> = normalize_list(body, "checklists");
                tracing::debug!(count = checklists.len(), "checklists fetched");
                set_checklists(&mut self.lock(), checklists.clone());
                Ok(checklists)
            }
            Err(err) => {
                record_failure(&mut self.lock(), err.user_message());
                Err(err)
            }
        }
    }

    /// Create a checklist and append it once the service assigns an id.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for a blank name, the request
    /// failure, or [`ClientError::Decode`] when the response carries no id.
    pub async fn create(&self, name: &str) -> ClientResult<Checklist> {
        let name = require_non_empty("checklist name", name)?;
        let request = ChecklistCreateRequest { name: name.clone() };
        let body = self
            .api
            .post(CHECKLISTS_PATH, &request)
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        let id = extract_id(&body).ok_or_else(|| ClientError::Decode {
            path: CHECKLISTS_PATH.to_string(),
            detail: "response carried no checklist id".to_string(),
        })?;
        let checklist = Checklist { id, name };
        append_checklist(&mut self.lock(), checklist.clone());
        tracing::info!(checklist_id = id, name = %checklist.name, "checklist created");
        Ok(checklist)
    }

    /// Delete a checklist and drop it from the cache.
    ///
    /// # Errors
    ///
    /// Returns the request failure; the cache is left untouched.
    pub async fn delete(&self, id: ChecklistId) -> ClientResult<()> {
        self.api
            .delete(&format!("{CHECKLISTS_PATH}/{id}"))
            .await
            .inspect_err(|err| record_failure(&mut self.lock(), err.user_message()))?;
        if remove_checklist(&mut self.lock(), id) {
            tracing::info!(checklist_id = id, "checklist deleted");
        } else {
            tracing::debug!(checklist_id = id, "deleted checklist was not cached");
        }
        Ok(())
    }

    /// Copy of the cached checklists.
    #[must_use]
    pub fn checklists(&self) -> Vec<Checklist> {
        self.lock().checklists.clone()
    }

    /// Copy of the full cache state.
    #[must_use]
    pub fn snapshot(&self) -> ChecklistState {
        self.lock().clone()
    }

    /// Cached checklist with the given id.
    #[must_use]
    pub fn get(&self, id: ChecklistId) -> Option<Checklist> {
        self.lock()
            .checklists
            .iter()
            .find(|checklist| checklist.id == id)
            .cloned()
    }

    /// Status of the last request.
    #[must_use]
    pub fn status(&self) -> LoadStatus {
        self.lock().status
    }

    /// Message of the last failed request.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Drop every cached checklist.
    pub fn clear(&self) {
        *self.lock() = ChecklistState::default();
    }
}
