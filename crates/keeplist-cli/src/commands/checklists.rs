use crate::cli::{ChecklistIdArgs, ChecklistNameArgs, OutputFormat};
use crate::client::{AppContext, CliResult};
use crate::output::{ChecklistOverview, render_checklist, render_checklists};

const PREVIEW_ITEMS: usize = 2;

pub(crate) async fn handle_checklist_list(
    ctx: &AppContext,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_login()?;
    let checklists = ctx.state.checklists().fetch_all().await?;
    let requested = ctx.state.load_missing_partitions().await?;
    tracing::debug!(checklists = checklists.len(), requested, "dashboard loaded");

    let items = ctx.state.items();
    let rows: Vec<ChecklistOverview> = checklists
        .into_iter()
        .map(|checklist| ChecklistOverview {
            item_count: items.item_count(checklist.id),
            preview: items
                .preview(checklist.id, PREVIEW_ITEMS)
                .into_iter()
                .map(|item| item.name)
                .collect(),
            id: checklist.id,
            name: checklist.name,
        })
        .collect();
    render_checklists(&rows, format)
}

pub(crate) async fn handle_checklist_create(
    ctx: &AppContext,
    args: ChecklistNameArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let ChecklistNameArgs { name } = args;
    ctx.require_login()?;
    let checklist = ctx.state.create_checklist(&name).await?;
    render_checklist(&checklist, format)
}

pub(crate) async fn handle_checklist_remove(
    ctx: &AppContext,
    args: ChecklistIdArgs,
) -> CliResult<()> {
    ctx.require_login()?;
    ctx.state.delete_checklist(args.checklist_id).await?;
    println!("deleted checklist {}", args.checklist_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::Utc;
    use httpmock::prelude::*;
    use keeplist_client::{
        AppState, ClientConfig, MemorySessionStorage, PersistedSession, SESSION_TTL,
    };
    use serde_json::json;

    use crate::client::CliError;

    fn context_with(server: &MockServer, session: PersistedSession) -> AppContext {
        let config = ClientConfig::new(&server.url("/api")).expect("valid URL");
        let storage = Arc::new(MemorySessionStorage::with_session(session));
        AppContext {
            state: AppState::new(&config, storage).expect("state"),
        }
    }

    fn logged_in(server: &MockServer) -> AppContext {
        context_with(
            server,
            PersistedSession {
                token: Some("tok".to_string()),
                username: Some("alice".to_string()),
                expires_at: Some(Utc::now() + SESSION_TTL),
            },
        )
    }

    #[tokio::test]
    async fn list_requires_login_before_any_request() {
        let server = MockServer::start_async().await;
        let mock = server.mock(|when, then| {
            when.method(GET).path("/api/checklist");
            then.status(200).json_body(json!([]));
        });
        let ctx = context_with(&server, PersistedSession::default());

        let err = handle_checklist_list(&ctx, OutputFormat::Table)
            .await
            .expect_err("guard rejects");
        assert!(matches!(err, CliError::Unauthorized(_)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn list_loads_partitions_for_dashboard() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(GET).path("/api/checklist");
            then.status(200)
                .json_body(json!({ "items": [{ "id": 1, "name": "Groceries" }] }));
        });
        let items = server.mock(|when, then| {
            when.method(GET)
                .path("/api/checklist/1/item")
                .header("authorization", "Bearer tok");
            then.status(200).json_body(json!([
                { "id": 1, "name": "Eggs" },
                { "id": 2, "name": "Milk" },
                { "id": 3, "name": "Bread" }
            ]));
        });
        let ctx = logged_in(&server);

        handle_checklist_list(&ctx, OutputFormat::Json)
            .await
            .expect("list succeeds");
        items.assert();
        assert_eq!(ctx.state.items().item_count(1), 3);
        assert_eq!(ctx.state.items().preview(1, PREVIEW_ITEMS).len(), 2);
    }

    #[tokio::test]
    async fn create_and_remove_round_through_app_state() {
        let server = MockServer::start_async().await;
        server.mock(|when, then| {
            when.method(POST)
                .path("/api/checklist")
                .json_body(json!({ "name": "Packing" }));
            then.status(201).json_body(json!({ "id": 8 }));
        });
        server.mock(|when, then| {
            when.method(DELETE).path("/api/checklist/8");
            then.status(204);
        });
        let ctx = logged_in(&server);

        handle_checklist_create(
            &ctx,
            ChecklistNameArgs {
                name: " Packing ".to_string(),
            },
            OutputFormat::Table,
        )
        .await
        .expect("create succeeds");
        assert_eq!(ctx.state.items().items(8), Some(Vec::new()));

        handle_checklist_remove(&ctx, ChecklistIdArgs { checklist_id: 8 })
            .await
            .expect("remove succeeds");
        assert!(ctx.state.checklists().get(8).is_none());
        assert!(ctx.state.items().items(8).is_none());
    }

    #[tokio::test]
    async fn create_rejects_blank_name() {
        let server = MockServer::start_async().await;
        let ctx = logged_in(&server);
        let err = handle_checklist_create(
            &ctx,
            ChecklistNameArgs {
                name: "   ".to_string(),
            },
            OutputFormat::Table,
        )
        .await
        .expect_err("blank name");
        assert_eq!(err.exit_code(), 2);
    }
}
