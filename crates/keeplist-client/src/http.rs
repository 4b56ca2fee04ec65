//! Authenticated HTTP client for the checklist service.
//!
//! # Design
//! - One attempt per call; no retries.
//! - A bearer token is attached whenever the session holds a valid one,
//!   except on credential endpoints.
//! - A `401` clears the session that issued the request and publishes
//!   [`SessionEvent::Unauthorized`] exactly once per session.

use keeplist_api_models::ErrorMessage;
use reqwest::{Client, Method, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::session::SessionContext;
use crate::signal::SessionEvent;

/// Thin wrapper over `reqwest` that knows the base URL and the session.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    session: SessionContext,
}

impl ApiClient {
    /// Build a client from configuration and the shared session.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] when the HTTP client cannot be built.
    pub fn new(config: &ClientConfig, session: SessionContext) -> ClientResult<Self> {
        Ok(Self {
            http: config.build_http_client()?,
            base_url: config.base_url.clone(),
            session,
        })
    }

    /// Build a client around an existing `reqwest::Client`.
    #[must_use]
    pub const fn with_client(http: Client, base_url: Url, session: SessionContext) -> Self {
        Self {
            http,
            base_url,
            session,
        }
    }

    /// Shared session handle.
    #[must_use]
    pub const fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Base URL endpoint paths are resolved against.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Issue a `GET` request.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn get(&self, path: &str) -> ClientResult<Value> {
        self.send::<()>(Method::GET, path, None).await
    }

    /// Issue a `POST` request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn post<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<Value> {
        self.send(Method::POST, path, Some(body)).await
    }

    /// Issue a `PUT` request with a JSON body.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn put<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<Value> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// Issue a `DELETE` request.
    ///
    /// # Errors
    ///
    /// See [`Self::send`].
    pub async fn delete(&self, path: &str) -> ClientResult<Value> {
        self.send::<()>(Method::DELETE, path, None).await
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// Empty bodies decode to [`Value::Null`]; non-JSON bodies decode to a
    /// [`Value::String`] holding the text.
    ///
    /// # Errors
    ///
    /// - [`ClientError::Network`] when the request cannot be completed.
    /// - [`ClientError::Auth`] on `401`; the session is cleared as a side effect.
    /// - [`ClientError::Server`] on any other non-success status.
    pub async fn send<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> ClientResult<Value> {
        let token = self.session.bearer_token();
        let result = self.dispatch(method, path, token.as_deref(), body).await;
        if matches!(result, Err(ClientError::Auth(_))) {
            self.handle_unauthorized(token.as_deref(), path);
        }
        result
    }

    /// Send credentials to a login or registration endpoint.
    ///
    /// No bearer token is attached and a `401` only rejects the credentials;
    /// the current session is left untouched.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send`], without the session side effect.
    pub async fn send_credentials<B: Serialize + ?Sized + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> ClientResult<Value> {
        self.dispatch(Method::POST, path, None, Some(body)).await
    }

    async fn dispatch<B: Serialize + ?Sized + Sync>(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<&B>,
    ) -> ClientResult<Value> {
        let url = self.endpoint(path)?;
        tracing::debug!(%method, path, authenticated = token.is_some(), "dispatching request");

        let mut request = self.http.request(method.clone(), url);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::debug!(%method, path, error = %err, "request failed");
            ClientError::Network(err)
        })?;
        let status = response.status();
        let bytes = response.bytes().await?;
        tracing::debug!(%method, path, status = status.as_u16(), "response received");

        if status.is_success() {
            return Ok(decode_body(&bytes));
        }

        let message = ErrorMessage::from_body(&bytes);
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth(
                message.unwrap_or_else(|| "unauthorized".to_string()),
            ));
        }

        Err(ClientError::Server {
            status: status.as_u16(),
            message: message
                .unwrap_or_else(|| format!("request failed with status {}", status.as_u16())),
        })
    }

    fn endpoint(&self, path: &str) -> ClientResult<Url> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|err| ClientError::Config(format!("invalid endpoint path '{path}': {err}")))
    }

    fn handle_unauthorized(&self, token: Option<&str>, path: &str) {
        let Some(token) = token else {
            return;
        };
        if self.session.clear_if_token(token) {
            tracing::warn!(path, "session rejected by server; redirecting to login");
            self.session.signal().emit(SessionEvent::Unauthorized);
        }
    }
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).trim().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use httpmock::prelude::*;
    use serde_json::json;

    use crate::session::{SESSION_TTL, Session};
    use crate::signal::SessionSignal;
    use crate::storage::MemorySessionStorage;

    fn client_for(server: &MockServer) -> ApiClient {
        let session = SessionContext::restore(
            Arc::new(MemorySessionStorage::default()),
            SessionSignal::new(),
        )
        .expect("restore");
        let config = ClientConfig::new(&server.url("/api")).expect("valid URL");
        ApiClient::new(&config, session).expect("client")
    }

    fn login(client: &ApiClient, token: &str) {
        client
            .session()
            .establish(Session {
                token: token.to_string(),
                username: "alice".to_string(),
                expires_at: Utc::now() + SESSION_TTL,
            })
            .expect("establish");
    }

    #[tokio::test]
    async fn attaches_bearer_token_when_logged_in() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/checklist")
                .header("authorization", "Bearer secret-token");
            then.status(200).json_body(json!([]));
        });
        let client = client_for(&server);
        login(&client, "secret-token");

        let body = client.get("/checklist").await.expect("request succeeds");
        assert_eq!(body, json!([]));
        mock.assert();
    }

    #[tokio::test]
    async fn omits_authorization_when_anonymous() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .header_missing("authorization");
            then.status(200).json_body(json!({ "token": "t" }));
        });
        let client = client_for(&server);

        client
            .post("login", &json!({ "username": "a", "password": "b" }))
            .await
            .expect("request succeeds");
        mock.assert();
    }

    #[tokio::test]
    async fn unauthorized_clears_session_and_signals() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/checklist");
            then.status(401).json_body(json!({ "message": "token expired" }));
        });
        let client = client_for(&server);
        login(&client, "stale");
        let mut events = client.session().subscribe();

        let err = client.get("checklist").await.expect_err("401 surfaces");
        assert!(matches!(err, ClientError::Auth(ref message) if message == "token expired"));
        assert!(client.session().snapshot().is_none());
        assert_eq!(events.try_recv().ok(), Some(SessionEvent::Unauthorized));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn unauthorized_without_token_does_not_signal() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(401);
        });
        let client = client_for(&server);
        let mut events = client.session().subscribe();

        let err = client
            .post("login", &json!({ "username": "a", "password": "wrong" }))
            .await
            .expect_err("401 surfaces");
        assert!(matches!(err, ClientError::Auth(ref message) if message == "unauthorized"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn credential_rejection_keeps_current_session() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .header_missing("authorization");
            then.status(401).json_body(json!({ "message": "bad credentials" }));
        });
        let client = client_for(&server);
        login(&client, "alice-token");
        let mut events = client.session().subscribe();

        let err = client
            .send_credentials("login", &json!({ "username": "bob", "password": "wrong" }))
            .await
            .expect_err("401 surfaces");
        mock.assert();
        assert!(matches!(err, ClientError::Auth(ref message) if message == "bad credentials"));
        assert_eq!(client.session().bearer_token().as_deref(), Some("alice-token"));
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn server_errors_carry_message_or_fallback() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(DELETE).path("/api/checklist/1");
            then.status(500).json_body(json!({ "message": "database down" }));
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/api/checklist/2");
            then.status(404);
        });
        let client = client_for(&server);

        let err = client.delete("checklist/1").await.expect_err("500");
        assert!(matches!(
            err,
            ClientError::Server { status: 500, ref message } if message == "database down"
        ));
        let err = client.delete("checklist/2").await.expect_err("404");
        assert_eq!(err.user_message(), "request failed with status 404");
        assert!(matches!(err, ClientError::Server { status: 404, .. }));
    }

    #[tokio::test]
    async fn network_failures_are_typed() {
        let session = SessionContext::restore(
            Arc::new(MemorySessionStorage::default()),
            SessionSignal::new(),
        )
        .expect("restore");
        let config = ClientConfig::new("http://127.0.0.1:9/api").expect("valid URL");
        let client = ApiClient::new(&config, session).expect("client");

        let err = client.get("checklist").await.expect_err("nothing listens");
        assert!(matches!(err, ClientError::Network(_)));
    }

    #[test]
    fn decode_body_tolerates_empty_and_text() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(b"  \n"), Value::Null);
        assert_eq!(decode_body(b"{\"id\":3}"), json!({ "id": 3 }));
        assert_eq!(decode_body(b"deleted\n"), json!("deleted"));
    }
}
