//! Top-level state container composing the session and the caches.

use std::sync::Arc;

use keeplist_api_models::{Checklist, ChecklistId};
use tokio::sync::broadcast;

use crate::checklists::ChecklistStore;
use crate::config::ClientConfig;
use crate::error::ClientResult;
use crate::http::ApiClient;
use crate::items::ChecklistItemStore;
use crate::session::{SessionContext, SessionStore};
use crate::signal::{SessionEvent, SessionSignal};
use crate::storage::SessionStorage;

/// Sibling stores sharing one HTTP client and one session.
#[derive(Debug, Clone)]
pub struct AppState {
    session: SessionStore,
    checklists: ChecklistStore,
    items: ChecklistItemStore,
}

impl AppState {
    /// Restore the persisted session and build every store.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be loaded or the HTTP client
    /// cannot be built.
    pub fn new(config: &ClientConfig, storage: Arc<dyn SessionStorage>) -> ClientResult<Self> {
        Self::with_signal(config, storage, SessionSignal::new())
    }

    /// Like [`Self::new`], publishing session events on `signal`.
    ///
    /// # Errors
    ///
    /// See [`Self::new`].
    pub fn with_signal(
        config: &ClientConfig,
        storage: Arc<dyn SessionStorage>,
        signal: SessionSignal,
    ) -> ClientResult<Self> {
        let context = SessionContext::restore(storage, signal)?;
        let api = ApiClient::new(config, context)?;
        Ok(Self::from_client(api))
    }

    /// Build every store over an existing client.
    #[must_use]
    pub fn from_client(api: ApiClient) -> Self {
        Self {
            session: SessionStore::new(api.clone()),
            checklists: ChecklistStore::new(api.clone()),
            items: ChecklistItemStore::new(api),
        }
    }

    /// Session store.
    #[must_use]
    pub const fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Checklist cache.
    #[must_use]
    pub const fn checklists(&self) -> &ChecklistStore {
        &self.checklists
    }

    /// Item cache.
    #[must_use]
    pub const fn items(&self) -> &ChecklistItemStore {
        &self.items
    }

    /// Subscribe to session transitions, including `401` invalidations.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.session.context().subscribe()
    }

    /// Create a checklist and give it an empty, idle item partition.
    ///
    /// # Errors
    ///
    /// See [`ChecklistStore::create`].
    pub async fn create_checklist(&self, name: &str) -> ClientResult<Checklist> {
        let checklist = self.checklists.create(name).await?;
        self.items.initialize_partition(checklist.id);
        Ok(checklist)
    }

    /// Delete a checklist and forget its item partition.
    ///
    /// # Errors
    ///
    /// See [`ChecklistStore::delete`].
    pub async fn delete_checklist(&self, id: ChecklistId) -> ClientResult<()> {
        self.checklists.delete(id).await?;
        self.items.remove_partition(id);
        Ok(())
    }

    /// Fetch items for every cached checklist whose partition is neither
    /// present nor loading. Returns the number of partitions requested.
    ///
    /// Fetches run one after another. A failed fetch is logged and leaves an
    /// empty partition behind; an authorization failure stops the sweep.
    ///
    /// # Errors
    ///
    /// Returns [`crate::ClientError::Auth`] when the session is rejected.
    pub async fn load_missing_partitions(&self) -> ClientResult<usize> {
        let pending: Vec<ChecklistId> = self
            .checklists
            .checklists()
            .into_iter()
            .map(|checklist| checklist.id)
            .filter(|id| !self.items.has_partition(*id) && !self.items.is_loading(*id))
            .collect();
        for checklist_id in &pending {
            match self.items.fetch_by_checklist(*checklist_id).await {
                Ok(_) => {}
                Err(err) if err.is_auth() => return Err(err),
                Err(err) => {
                    tracing::warn!(checklist_id, error = %err, "failed to load checklist items");
                }
            }
        }
        Ok(pending.len())
    }

    /// Log out and drop both caches.
    pub fn logout(&self) {
        self.session.logout();
        self.checklists.clear();
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::storage::MemorySessionStorage;

    fn state_for(server: &MockServer) -> AppState {
        let config = ClientConfig::new(&server.url("/api")).expect("valid URL");
        AppState::new(&config, Arc::new(MemorySessionStorage::default())).expect("state")
    }

    #[tokio::test]
    async fn create_checklist_initialises_partition() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/checklist");
            then.status(201).json_body(json!({ "id": 9 }));
        });
        let state = state_for(&server);

        let checklist = state.create_checklist("Packing").await.expect("create");
        assert_eq!(checklist.id, 9);
        assert_eq!(state.items().items(9), Some(Vec::new()));
        assert!(!state.items().is_loading(9));
    }

    #[tokio::test]
    async fn delete_checklist_drops_partition() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/checklist");
            then.status(201).json_body(json!({ "id": 9 }));
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/api/checklist/9");
            then.status(204);
        });
        let state = state_for(&server);
        state.create_checklist("Packing").await.expect("create");

        state.delete_checklist(9).await.expect("delete");
        assert!(state.checklists().get(9).is_none());
        assert!(state.items().items(9).is_none());
    }

    #[tokio::test]
    async fn load_missing_partitions_skips_known_checklists() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/checklist");
            then.status(200).json_body(json!([
                { "id": 1, "name": "Groceries" },
                { "id": 2, "name": "Chores" },
                { "id": 3, "name": "Broken" }
            ]));
        });
        let first = server.mock(|when, then| {
            when.method(GET).path("/api/checklist/1/item");
            then.status(200).json_body(json!([{ "id": 1, "name": "Eggs" }]));
        });
        let second = server.mock(|when, then| {
            when.method(GET).path("/api/checklist/2/item");
            then.status(200).json_body(json!([]));
        });
        server.mock(|when, then| {
            when.method(GET).path("/api/checklist/3/item");
            then.status(500);
        });
        let state = state_for(&server);
        state.checklists().fetch_all().await.expect("fetch");
        state.items().initialize_partition(2);

        let requested = state.load_missing_partitions().await.expect("sweep");
        assert_eq!(requested, 2);
        assert_eq!(state.items().item_count(1), 1);
        assert_eq!(state.items().items(3), Some(Vec::new()));
        first.assert();
        assert_eq!(second.calls(), 0);

        let requested = state.load_missing_partitions().await.expect("sweep");
        assert_eq!(requested, 0);
    }

    #[tokio::test]
    async fn logout_clears_session_and_caches() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200).json_body(json!({ "token": "abc" }));
        });
        server.mock(|when, then| {
            when.method(POST).path("/api/checklist");
            then.status(201).json_body(json!({ "id": 4 }));
        });
        let state = state_for(&server);
        let mut events = state.subscribe();
        state.session().login("alice", "pw").await.expect("login");
        state.create_checklist("Groceries").await.expect("create");

        state.logout();
        assert!(!state.session().is_valid());
        assert!(state.checklists().checklists().is_empty());
        assert!(state.items().items(4).is_none());
        assert!(matches!(events.try_recv(), Ok(SessionEvent::LoggedIn { .. })));
        assert_eq!(events.try_recv().ok(), Some(SessionEvent::LoggedOut));
    }
}
