//! Session state and the session store.
//!
//! # Design
//! - [`SessionContext`] is the single owner of the session. It is passed
//!   explicitly to the HTTP client and the stores instead of being looked up
//!   globally.
//! - An expired token is treated as absent and purged the first time it is
//!   observed.
//! - Expiry is fixed at one hour after login; the service does not supply one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Duration, Utc};
use keeplist_api_models::{LoginRequest, RegisterRequest, extract_token};
use tokio::sync::broadcast;

use crate::error::{ClientError, ClientResult, require_non_empty};
use crate::http::ApiClient;
use crate::signal::{SessionEvent, SessionSignal};
use crate::storage::{PersistedSession, SessionStorage};

/// Lifetime granted to a token after a successful login.
pub const SESSION_TTL: Duration = Duration::hours(1);

/// Authenticated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    /// Opaque bearer credential.
    pub token: String,
    /// Account name.
    pub username: String,
    /// Absolute expiry of the token.
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Whether the token is still usable at `now` (expiry inclusive).
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now <= self.expires_at
    }

    fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            token: Some(self.token.clone()),
            username: Some(self.username.clone()),
            expires_at: Some(self.expires_at),
        }
    }

    fn from_persisted(persisted: PersistedSession) -> Option<Self> {
        let token = persisted.token.filter(|token| !token.trim().is_empty())?;
        Some(Self {
            token,
            username: persisted.username.unwrap_or_default(),
            expires_at: persisted.expires_at?,
        })
    }
}

/// Coarse authentication state exposed to the front end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthStatus {
    /// No session.
    #[default]
    Anonymous,
    /// A login request is in flight.
    Authenticating,
    /// A valid session is held.
    Authenticated,
    /// The last login or registration attempt failed.
    AuthFailed,
}

#[derive(Debug, Default)]
struct SessionState {
    session: Option<Session>,
    status: AuthStatus,
    last_error: Option<String>,
}

struct SessionShared {
    state: Mutex<SessionState>,
    storage: Arc<dyn SessionStorage>,
    signal: SessionSignal,
}

/// Shared handle to the session, its durable storage, and its signal.
#[derive(Clone)]
pub struct SessionContext {
    inner: Arc<SessionShared>,
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("SessionContext")
            .field("status", &self.status())
            .field("username", &self.username())
            .finish_non_exhaustive()
    }
}

impl SessionContext {
    /// Restore the session persisted in `storage`.
    ///
    /// A persisted session that is already expired, lacks an expiry, or
    /// cannot be decoded is purged from storage and the context starts
    /// anonymous.
    ///
    /// # Errors
    ///
    /// Returns an error when the storage cannot be read or purged.
    pub fn restore(storage: Arc<dyn SessionStorage>, signal: SessionSignal) -> ClientResult<Self> {
        let persisted = match storage.load() {
            Ok(persisted) => persisted,
            Err(err @ ClientError::StorageFormat { .. }) => {
                tracing::warn!(error = %err, "discarding unreadable session record");
                storage.clear()?;
                PersistedSession::default()
            }
            Err(err) => return Err(err),
        };
        let had_record = !persisted.is_empty();
        let session = Session::from_persisted(persisted).filter(|session| {
            let valid = session.is_valid_at(Utc::now());
            if !valid {
                tracing::info!(username = %session.username, "discarding expired session");
            }
            valid
        });
        if session.is_none() && had_record {
            storage.clear()?;
        }
        let status = if session.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        };
        Ok(Self {
            inner: Arc::new(SessionShared {
                state: Mutex::new(SessionState {
                    session,
                    status,
                    last_error: None,
                }),
                storage,
                signal,
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Signal used to publish session transitions.
    #[must_use]
    pub fn signal(&self) -> &SessionSignal {
        &self.inner.signal
    }

    /// Subscribe to session transitions.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.signal.subscribe()
    }

    /// Current authentication state.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.lock().status
    }

    /// Message of the last failed login or registration.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Account name of the held session, valid or not.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.lock()
            .session
            .as_ref()
            .map(|session| session.username.clone())
    }

    /// Copy of the held session without checking expiry.
    #[must_use]
    pub fn snapshot(&self) -> Option<Session> {
        self.lock().session.clone()
    }

    /// Return the session if it is valid at `now`, purging it otherwise.
    #[must_use]
    pub fn valid_session_at(&self, now: DateTime<Utc>) -> Option<Session> {
        let mut state = self.lock();
        let session = state.session.clone()?;
        if session.is_valid_at(now) {
            return Some(session);
        }
        tracing::info!(username = %session.username, "session expired; purging token");
        state.session = None;
        state.status = AuthStatus::Anonymous;
        drop(state);
        self.clear_storage();
        None
    }

    /// Bearer token to attach to the next request, if a valid one is held.
    #[must_use]
    pub fn bearer_token(&self) -> Option<String> {
        self.valid_session_at(Utc::now())
            .map(|session| session.token)
    }

    pub(crate) fn begin_authentication(&self) {
        let mut state = self.lock();
        state.status = AuthStatus::Authenticating;
        state.last_error = None;
    }

    pub(crate) fn record_failure(&self, message: String) {
        let mut state = self.lock();
        state.status = AuthStatus::AuthFailed;
        state.last_error = Some(message);
    }

    pub(crate) fn record_success(&self) {
        let mut state = self.lock();
        state.status = if state.session.is_some() {
            AuthStatus::Authenticated
        } else {
            AuthStatus::Anonymous
        };
        state.last_error = None;
    }

    /// Install a freshly issued session and persist it.
    ///
    /// # Errors
    ///
    /// Returns an error when the session cannot be persisted; the in-memory
    /// session is left untouched in that case.
    pub fn establish(&self, session: Session) -> ClientResult<()> {
        self.inner.storage.save(&session.to_persisted())?;
        let username = session.username.clone();
        {
            let mut state = self.lock();
            state.session = Some(session);
            state.status = AuthStatus::Authenticated;
            state.last_error = None;
        }
        self.inner.signal.emit(SessionEvent::LoggedIn { username });
        Ok(())
    }

    /// Drop the session unconditionally. Returns whether one was held.
    #[must_use]
    pub fn clear(&self) -> bool {
        let had_session = {
            let mut state = self.lock();
            state.status = AuthStatus::Anonymous;
            state.last_error = None;
            state.session.take().is_some()
        };
        self.clear_storage();
        had_session
    }

    /// Drop the session only if it still holds `token`.
    ///
    /// Returns `true` for the single caller that performed the clear, so that
    /// concurrent authorization failures for the same token are reported once.
    #[must_use]
    pub fn clear_if_token(&self, token: &str) -> bool {
        {
            let mut state = self.lock();
            let holds_token = state
                .session
                .as_ref()
                .is_some_and(|session| session.token == token);
            if !holds_token {
                return false;
            }
            state.session = None;
            state.status = AuthStatus::Anonymous;
        }
        self.clear_storage();
        true
    }

    fn clear_storage(&self) {
        if let Err(err) = self.inner.storage.clear() {
            tracing::warn!(error = %err, "failed to clear persisted session");
        }
    }
}

/// Login, registration, logout, and the route-guard predicate.
#[derive(Debug, Clone)]
pub struct SessionStore {
    api: ApiClient,
    context: SessionContext,
}

impl SessionStore {
    /// Build a store over the shared client and session.
    #[must_use]
    pub fn new(api: ApiClient) -> Self {
        let context = api.session().clone();
        Self { api, context }
    }

    /// Shared session handle.
    #[must_use]
    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Authenticate against `POST /login` and start a one-hour session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for blank input,
    /// [`ClientError::Auth`] when the service rejects the credentials or the
    /// response carries no token, and [`ClientError::Network`] on transport
    /// failure.
    pub async fn login(&self, username: &str, password: &str) -> ClientResult<Session> {
        let username = require_non_empty("username", username)?;
        if password.is_empty() {
            return Err(ClientError::validation("password must not be empty"));
        }
        self.context.begin_authentication();
        match self.perform_login(username, password).await {
            Ok(session) => Ok(session),
            Err(err) => {
                self.context.record_failure(err.user_message());
                Err(err)
            }
        }
    }

    async fn perform_login(&self, username: String, password: &str) -> ClientResult<Session> {
        let request = LoginRequest {
            username: username.clone(),
            password: password.to_string(),
        };
        let response = self
            .api
            .send_credentials("login", &request)
            .await
            .map_err(|err| auth_failure(err, "Login failed"))?;
        let token = extract_token(&response)
            .ok_or_else(|| ClientError::auth("token not found in login response"))?;
        let session = Session {
            token,
            username,
            expires_at: Utc::now() + SESSION_TTL,
        };
        self.context.establish(session.clone())?;
        tracing::info!(username = %session.username, expires_at = %session.expires_at, "logged in");
        Ok(session)
    }

    /// Create an account via `POST /register`. Does not log in.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Validation`] for blank input,
    /// [`ClientError::Auth`] when the service refuses the registration, and
    /// [`ClientError::Network`] on transport failure.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> ClientResult<()> {
        let username = require_non_empty("username", username)?;
        let email = require_non_empty("email", email)?;
        if password.is_empty() {
            return Err(ClientError::validation("password must not be empty"));
        }
        let request = RegisterRequest {
            username,
            email,
            password: password.to_string(),
        };
        self.context.begin_authentication();
        match self
            .api
            .send_credentials("register", &request)
            .await
        {
            Ok(_) => {
                self.context.record_success();
                tracing::info!(username = %request.username, "registered account");
                Ok(())
            }
            Err(err) => {
                let err = auth_failure(err, "Registration failed");
                self.context.record_failure(err.user_message());
                Err(err)
            }
        }
    }

    /// Forget the session and its persisted copy.
    pub fn logout(&self) {
        let had_session = self.context.clear();
        tracing::info!(had_session, "logged out");
        self.context.signal().emit(SessionEvent::LoggedOut);
    }

    /// Route-guard predicate: a token is held and has not expired.
    ///
    /// An expired token is purged as a side effect.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// [`Self::is_valid`] evaluated at an explicit instant.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.context.valid_session_at(now).is_some()
    }

    /// Current authentication state.
    #[must_use]
    pub fn status(&self) -> AuthStatus {
        self.context.status()
    }

    /// Account name of the held session.
    #[must_use]
    pub fn username(&self) -> Option<String> {
        self.context.username()
    }

    /// Held session, if any, without an expiry check.
    #[must_use]
    pub fn session(&self) -> Option<Session> {
        self.context.snapshot()
    }

    /// Bearer token of the held session, if any.
    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.context.snapshot().map(|session| session.token)
    }

    /// Expiry of the held session, if any.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.context.snapshot().map(|session| session.expires_at)
    }

    /// Message of the last failed login or registration.
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.context.last_error()
    }
}

fn auth_failure(err: ClientError, fallback: &str) -> ClientError {
    match err {
        ClientError::Server { message, .. } if message.is_empty() => ClientError::auth(fallback),
        ClientError::Server { message, .. } => ClientError::auth(message),
        other => other,
    }
}
