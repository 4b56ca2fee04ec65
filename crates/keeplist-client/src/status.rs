//! Coarse request status shared by the caches.

/// Lifecycle of the most recent load issued by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoadStatus {
    /// Nothing has been requested yet.
    #[default]
    Idle,
    /// A request is in flight.
    Loading,
    /// The last request completed successfully.
    Succeeded,
    /// The last request failed; see the store's `last_error`.
    Failed,
}

impl LoadStatus {
    /// Lowercase label used in logs and CLI output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Loading => "loading",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}
