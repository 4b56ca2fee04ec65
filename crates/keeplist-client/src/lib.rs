#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Client-side session handling and normalised caches for the Keeplist
//! checklist service.
//!
//! Layout:
//! - `http.rs`: authenticated request dispatch and `401` handling
//! - `session.rs`: session lifecycle, login, registration, route guard
//! - `storage.rs`: durable session persistence
//! - `signal.rs`: session notifications for the front end
//! - `checklists.rs` / `items.rs`: confirmation-gated caches
//! - `state.rs`: the container composing the stores

pub mod checklists;
pub mod config;
pub mod error;
pub mod http;
pub mod items;
pub mod session;
pub mod signal;
pub mod state;
pub mod status;
pub mod storage;

pub use checklists::{ChecklistState, ChecklistStore};
pub use config::{ClientConfig, DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS, HEADER_REQUEST_ID};
pub use error::{ClientError, ClientResult};
pub use http::ApiClient;
pub use items::{ChecklistItemStore, ItemsState};
pub use session::{AuthStatus, SESSION_TTL, Session, SessionContext, SessionStore};
pub use signal::{SessionEvent, SessionSignal};
pub use state::AppState;
pub use status::LoadStatus;
pub use storage::{FileSessionStorage, MemorySessionStorage, PersistedSession, SessionStorage};
