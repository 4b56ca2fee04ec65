use crate::cli::{ChecklistIdArgs, ItemAddArgs, ItemRefArgs, ItemRenameArgs, OutputFormat};
use crate::client::{AppContext, CliError, CliResult};
use crate::output::{done_mark, render_item, render_items};

pub(crate) async fn handle_item_list(
    ctx: &AppContext,
    args: ChecklistIdArgs,
    format: OutputFormat,
) -> CliResult<()> {
    ctx.require_login()?;
    let items = ctx
        .state
        .items()
        .fetch_by_checklist(args.checklist_id)
        .await?;
    render_items(args.checklist_id, &items, format)
}

pub(crate) async fn handle_item_add(
    ctx: &AppContext,
    args: ItemAddArgs,
    format: OutputFormat,
) -> CliResult<()> {
    let ItemAddArgs { checklist_id, name } = args;
    ctx.require_login()?;
    let item = ctx.state.items().create(checklist_id, &name).await?;
    render_item(&item, format)
}

pub(crate) async fn handle_item_set_status(
    ctx: &AppContext,
    args: ItemRefArgs,
    status: bool,
) -> CliResult<()> {
    ctx.require_login()?;
    ctx.state
        .items()
        .set_status(args.checklist_id, args.item_id, status)
        .await?;
    println!("{} item {}", done_mark(status), args.item_id);
    Ok(())
}

pub(crate) async fn handle_item_toggle(ctx: &AppContext, args: ItemRefArgs) -> CliResult<()> {
    ctx.require_login()?;
    let items = ctx
        .state
        .items()
        .fetch_by_checklist(args.checklist_id)
        .await?;
    let current = items
        .iter()
        .find(|item| item.id == args.item_id)
        .ok_or_else(|| {
            CliError::validation(format!(
                "item {} not found in checklist {}",
                args.item_id, args.checklist_id
            ))
        })?;
    let status = !current.status;
    ctx.state
        .items()
        .set_status(args.checklist_id, args.item_id, status)
        .await?;
    println!("{} item {}", done_mark(status), args.item_id);
    Ok(())
}

pub(crate) async fn handle_item_rename(ctx: &AppContext, args: ItemRenameArgs) -> CliResult<()> {
    let ItemRenameArgs {
        checklist_id,
        item_id,
        name,
    } = args;
    ctx.require_login()?;
    ctx.state
        .items()
        .rename(checklist_id, item_id, &name)
        .await?;
    println!("renamed item {item_id} to {}", name.trim());
    Ok(())
}

pub(crate) async fn handle_item_delete(ctx: &AppContext, args: ItemRefArgs) -> CliResult<()> {
    ctx.require_login()?;
    ctx.state
        .items()
        .delete(args.checklist_id, args.item_id)
        .await?;
    println!("deleted item {}", args.item_id);
    Ok(())
}
