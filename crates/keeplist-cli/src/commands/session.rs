use std::io::{self, IsTerminal};

use anyhow::anyhow;

use crate::cli::{LoginArgs, OutputFormat, RegisterArgs};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{SessionView, render_session};

pub(crate) async fn handle_login(ctx: &AppContext, args: LoginArgs) -> CliResult<()> {
    let password = resolve_password(args.password)?;
    let session = ctx.state.session().login(&args.username, &password).await?;
    println!(
        "logged in as {} (session expires {})",
        session.username,
        session.expires_at.to_rfc3339()
    );
    Ok(())
}

pub(crate) async fn handle_register(ctx: &AppContext, args: RegisterArgs) -> CliResult<()> {
    let password = resolve_password(args.password)?;
    ctx.state
        .session()
        .register(&args.username, &args.email, &password)
        .await?;
    let username = args.username.trim();
    println!("registered {username}; run `keeplist login {username}` to sign in");
    Ok(())
}

pub(crate) fn handle_logout(ctx: &AppContext) {
    ctx.state.logout();
    println!("logged out");
}

pub(crate) fn handle_whoami(ctx: &AppContext, format: OutputFormat) -> CliResult<()> {
    let session = ctx.state.session();
    let view = if session.is_valid() {
        session.session().map(|session| SessionView {
            username: session.username,
            expires_at: session.expires_at,
        })
    } else {
        None
    };
    render_session(view.as_ref(), format)
}

fn resolve_password(provided: Option<String>) -> CliResult<String> {
    if let Some(value) = provided {
        if value.is_empty() {
            return Err(CliError::validation("password must not be empty"));
        }
        return Ok(value);
    }

    if io::stdin().is_terminal() {
        let pass = rpassword::prompt_password("Password: ").map_err(|err| {
            CliError::failure(anyhow!("failed to read password from stdin: {err}"))
        })?;
        if pass.is_empty() {
            return Err(CliError::validation("password must not be empty"));
        }
        Ok(pass)
    } else {
        Err(CliError::validation(
            "password required; supply via --password when running non-interactively",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use httpmock::prelude::*;
    use keeplist_client::{AppState, ClientConfig, FileSessionStorage};

    use crate::client::classify_outcome;
    use serde_json::json;

    fn context_for(server: &MockServer, dir: &tempfile::TempDir) -> AppContext {
        let config = ClientConfig::new(&server.url("/api")).expect("valid URL");
        let storage = Arc::new(FileSessionStorage::new(dir.path().join("session.json")));
        AppContext {
            state: AppState::new(&config, storage).expect("state"),
        }
    }

    #[test]
    fn resolve_password_prefers_flag() {
        assert_eq!(
            resolve_password(Some("pw".to_string())).expect("password"),
            "pw"
        );
        assert!(matches!(
            resolve_password(Some(String::new())),
            Err(CliError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn login_persists_session_for_later_invocations() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .json_body(json!({ "username": "alice", "password": "pw" }));
            then.status(200).json_body(json!({ "token": "tok" }));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_for(&server, &dir);

        handle_login(
            &ctx,
            LoginArgs {
                username: "alice".to_string(),
                password: Some("pw".to_string()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        mock.assert();

        let next = context_for(&server, &dir);
        assert!(next.require_login().is_ok());
        handle_logout(&next);
        assert!(context_for(&server, &dir).require_login().is_err());
        Ok(())
    }

    #[tokio::test]
    async fn failed_login_keeps_existing_session() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .json_body(json!({ "username": "alice", "password": "pw" }));
            then.status(200).json_body(json!({ "token": "alice-token" }));
        });
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/login")
                .json_body(json!({ "username": "bob", "password": "wrong" }));
            then.status(401).json_body(json!({ "message": "bad credentials" }));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_for(&server, &dir);
        handle_login(
            &ctx,
            LoginArgs {
                username: "alice".to_string(),
                password: Some("pw".to_string()),
            },
        )
        .await
        .map_err(|err| anyhow!(err.display_message()))?;
        let mut events = ctx.state.subscribe();

        let result = handle_login(
            &ctx,
            LoginArgs {
                username: "bob".to_string(),
                password: Some("wrong".to_string()),
            },
        )
        .await;
        let err = classify_outcome(result, &mut events).expect_err("login fails");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("bad credentials"));
        assert!(ctx.require_login().is_ok());
        assert_eq!(ctx.state.session().username().as_deref(), Some("alice"));
        Ok(())
    }

    #[tokio::test]
    async fn blank_username_is_rejected_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(200).json_body(json!({ "token": "tok" }));
        });
        let dir = tempfile::tempdir().expect("tempdir");
        let ctx = context_for(&server, &dir);

        let err = handle_login(
            &ctx,
            LoginArgs {
                username: "  ".to_string(),
                password: Some("pw".to_string()),
            },
        )
        .await
        .expect_err("blank username");
        assert_eq!(err.exit_code(), 2);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn login_rejection_is_a_failure() -> anyhow::Result<()> {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST).path("/api/login");
            then.status(401).json_body(json!({ "message": "bad credentials" }));
        });
        let dir = tempfile::tempdir()?;
        let ctx = context_for(&server, &dir);

        let err = handle_login(
            &ctx,
            LoginArgs {
                username: "alice".to_string(),
                password: Some("wrong".to_string()),
            },
        )
        .await
        .expect_err("login fails");
        assert_eq!(err.exit_code(), 3);
        assert!(err.display_message().contains("bad credentials"));
        Ok(())
    }
}
