//! Error types, exit codes, and the shared application context for the CLI.

use std::fmt::{self, Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use keeplist_client::{AppState, ClientConfig, ClientError, FileSessionStorage, SessionEvent};
use tokio::sync::broadcast;

use crate::cli::Cli;

const SESSION_DIR: &str = "keeplist";
const SESSION_FILE: &str = "session.json";
pub(crate) const LOGIN_HINT: &str = "run `keeplist login <username>` to sign in";

/// CLI-level error type to distinguish validation, authorization, and
/// operational failures.
#[derive(Debug)]
pub(crate) enum CliError {
    Validation(String),
    Unauthorized(String),
    Failure(anyhow::Error),
}

/// Convenience alias for functions returning a `CliError`.
pub(crate) type CliResult<T> = Result<T, CliError>;

impl CliError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub(crate) fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub(crate) fn failure(error: impl Into<anyhow::Error>) -> Self {
        Self::Failure(error.into())
    }

    pub(crate) const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Failure(_) => 3,
            Self::Unauthorized(_) => 4,
        }
    }

    pub(crate) fn display_message(&self) -> String {
        match self {
            Self::Validation(message) => message.clone(),
            Self::Unauthorized(message) => format!("{message}; {LOGIN_HINT}"),
            Self::Failure(error) => format!("{error:#}"),
        }
    }
}

impl Display for CliError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str("cli error")
    }
}

impl std::error::Error for CliError {}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Validation(message) => Self::Validation(message),
            other => Self::failure(other),
        }
    }
}

/// Application context passed to command handlers.
#[derive(Debug, Clone)]
pub(crate) struct AppContext {
    pub(crate) state: AppState,
}

impl AppContext {
    /// Restore the persisted session and build the stores from CLI flags.
    pub(crate) fn from_cli(cli: &Cli, request_id: &str) -> CliResult<Self> {
        let config = ClientConfig {
            base_url: cli.api_url.clone(),
            timeout: Duration::from_secs(cli.timeout),
            request_id: Some(request_id.to_string()),
        };
        let session_path = match &cli.session_file {
            Some(path) => path.clone(),
            None => default_session_path()?,
        };
        tracing::debug!(path = %session_path.display(), "using session file");
        let storage = Arc::new(FileSessionStorage::new(session_path));
        let state = AppState::new(&config, storage)?;
        Ok(Self { state })
    }

    /// Route guard for commands that need a live session.
    pub(crate) fn require_login(&self) -> CliResult<()> {
        if self.state.session().is_valid() {
            Ok(())
        } else {
            Err(CliError::unauthorized("not logged in"))
        }
    }
}

/// Default location of the persisted session under the user's data directory.
pub(crate) fn default_session_path() -> CliResult<PathBuf> {
    dirs::data_dir()
        .map(|dir| dir.join(SESSION_DIR).join(SESSION_FILE))
        .ok_or_else(|| {
            CliError::validation("could not determine a data directory; pass --session-file")
        })
}

/// Turn a failure into an authorization error when the service revoked the
/// session while the command ran.
pub(crate) fn classify_outcome(
    result: CliResult<()>,
    events: &mut broadcast::Receiver<SessionEvent>,
) -> CliResult<()> {
    let Err(err) = result else {
        return Ok(());
    };
    let revoked = std::iter::from_fn(|| events.try_recv().ok())
        .any(|event| event == SessionEvent::Unauthorized);
    if revoked {
        tracing::warn!(error = %err.display_message(), "session revoked by server");
        return Err(CliError::unauthorized("session expired or was revoked"));
    }
    Err(err)
}
