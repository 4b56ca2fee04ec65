//! Argument parsing and command dispatch.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use keeplist_api_models::{ChecklistId, ItemId};
use keeplist_client::config::parse_base_url;
use keeplist_client::{DEFAULT_API_URL, DEFAULT_TIMEOUT_SECS};
use keeplist_telemetry::{LogFormat, LoggingConfig, init_logging};
use reqwest::Url;
use uuid::Uuid;

use crate::client::{AppContext, CliResult, classify_outcome};
use crate::commands::checklists::{
    handle_checklist_create, handle_checklist_list, handle_checklist_remove,
};
use crate::commands::items::{
    handle_item_add, handle_item_delete, handle_item_list, handle_item_rename,
    handle_item_set_status, handle_item_toggle,
};
use crate::commands::session::{handle_login, handle_logout, handle_register, handle_whoami};

const DEFAULT_CLI_LOG_LEVEL: &str = "warn";

/// Parses CLI arguments, executes the requested command, and reports the
/// outcome. Returns the process exit code.
pub async fn run() -> i32 {
    let cli = Cli::parse();
    let logging = LoggingConfig {
        level: &cli.log_level,
        format: cli
            .log_format
            .as_deref()
            .map_or_else(LogFormat::infer, LogFormat::parse_or_infer),
    };
    if let Err(err) = init_logging(&logging) {
        eprintln!("warning: logging disabled: {err}");
    }

    let request_id = Uuid::new_v4().to_string();
    tracing::debug!(command = command_label(&cli.command), %request_id, "starting command");
    let ctx = match AppContext::from_cli(&cli, &request_id) {
        Ok(ctx) => ctx,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            return err.exit_code();
        }
    };

    let mut events = ctx.state.subscribe();
    let result = dispatch(cli.command, cli.output, &ctx).await;
    match classify_outcome(result, &mut events) {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("error: {}", err.display_message());
            err.exit_code()
        }
    }
}

pub(crate) async fn dispatch(
    command: Command,
    output: OutputFormat,
    ctx: &AppContext,
) -> CliResult<()> {
    match command {
        Command::Login(args) => handle_login(ctx, args).await,
        Command::Register(args) => handle_register(ctx, args).await,
        Command::Logout => {
            handle_logout(ctx);
            Ok(())
        }
        Command::Whoami => handle_whoami(ctx, output),
        Command::Ls => handle_checklist_list(ctx, output).await,
        Command::New(args) => handle_checklist_create(ctx, args, output).await,
        Command::Rm(args) => handle_checklist_remove(ctx, args).await,
        Command::Items(args) => handle_item_list(ctx, args, output).await,
        Command::Add(args) => handle_item_add(ctx, args, output).await,
        Command::Done(args) => handle_item_set_status(ctx, args, true).await,
        Command::Undone(args) => handle_item_set_status(ctx, args, false).await,
        Command::Toggle(args) => handle_item_toggle(ctx, args).await,
        Command::Rename(args) => handle_item_rename(ctx, args).await,
        Command::Del(args) => handle_item_delete(ctx, args).await,
    }
}

#[derive(Parser)]
#[command(name = "keeplist", about = "Manage checklists on a Keeplist server")]
pub(crate) struct Cli {
    #[arg(
        long,
        global = true,
        env = "KEEPLIST_API_URL",
        value_parser = parse_base_url,
        default_value = DEFAULT_API_URL
    )]
    pub(crate) api_url: Url,
    #[arg(
        long,
        global = true,
        env = "KEEPLIST_HTTP_TIMEOUT_SECS",
        default_value_t = DEFAULT_TIMEOUT_SECS
    )]
    pub(crate) timeout: u64,
    #[arg(
        long,
        global = true,
        env = "KEEPLIST_SESSION_FILE",
        help = "Where the login session is persisted (defaults to the user data directory)"
    )]
    pub(crate) session_file: Option<PathBuf>,
    #[arg(
        long = "output",
        alias = "format",
        global = true,
        value_enum,
        default_value_t = OutputFormat::Table,
        help = "Select output format for commands that render structured data"
    )]
    pub(crate) output: OutputFormat,
    #[arg(
        long,
        global = true,
        env = "KEEPLIST_LOG",
        default_value = DEFAULT_CLI_LOG_LEVEL
    )]
    pub(crate) log_level: String,
    #[arg(long, global = true, env = "KEEPLIST_LOG_FORMAT", help = "pretty or json")]
    pub(crate) log_format: Option<String>,
    #[command(subcommand)]
    pub(crate) command: Command,
}

#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Sign in and persist the session.
    Login(LoginArgs),
    /// Create an account without signing in.
    Register(RegisterArgs),
    /// Forget the persisted session.
    Logout,
    /// Show the signed-in user.
    Whoami,
    /// List checklists with item counts and a short preview.
    Ls,
    /// Create a checklist.
    New(ChecklistNameArgs),
    /// Delete a checklist.
    Rm(ChecklistIdArgs),
    /// List the items of a checklist.
    Items(ChecklistIdArgs),
    /// Add an item to a checklist.
    Add(ItemAddArgs),
    /// Mark an item as done.
    Done(ItemRefArgs),
    /// Mark an item as not done.
    Undone(ItemRefArgs),
    /// Flip an item's completion flag.
    Toggle(ItemRefArgs),
    /// Rename an item.
    Rename(ItemRenameArgs),
    /// Delete an item.
    Del(ItemRefArgs),
}

#[derive(Args, Debug)]
pub(crate) struct LoginArgs {
    pub(crate) username: String,
    #[arg(long, env = "KEEPLIST_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct RegisterArgs {
    pub(crate) username: String,
    pub(crate) email: String,
    #[arg(long, env = "KEEPLIST_PASSWORD", hide_env_values = true)]
    pub(crate) password: Option<String>,
}

#[derive(Args, Debug)]
pub(crate) struct ChecklistNameArgs {
    #[arg(help = "Checklist name")]
    pub(crate) name: String,
}

#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct ChecklistIdArgs {
    #[arg(help = "Checklist identifier")]
    pub(crate) checklist_id: ChecklistId,
}

#[derive(Args, Debug)]
pub(crate) struct ItemAddArgs {
    #[arg(help = "Checklist identifier")]
    pub(crate) checklist_id: ChecklistId,
    #[arg(help = "Item name")]
    pub(crate) name: String,
}

#[derive(Args, Debug, Clone, Copy)]
pub(crate) struct ItemRefArgs {
    #[arg(help = "Checklist identifier")]
    pub(crate) checklist_id: ChecklistId,
    #[arg(help = "Item identifier")]
    pub(crate) item_id: ItemId,
}

#[derive(Args, Debug)]
pub(crate) struct ItemRenameArgs {
    #[arg(help = "Checklist identifier")]
    pub(crate) checklist_id: ChecklistId,
    #[arg(help = "Item identifier")]
    pub(crate) item_id: ItemId,
    #[arg(help = "New item name")]
    pub(crate) name: String,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

const fn command_label(command: &Command) -> &'static str {
    match command {
        Command::Login(_) => "login",
        Command::Register(_) => "register",
        Command::Logout => "logout",
        Command::Whoami => "whoami",
        Command::Ls => "ls",
        Command::New(_) => "new",
        Command::Rm(_) => "rm",
        Command::Items(_) => "items",
        Command::Add(_) => "add",
        Command::Done(_) => "done",
        Command::Undone(_) => "undone",
        Command::Toggle(_) => "toggle",
        Command::Rename(_) => "rename",
        Command::Del(_) => "del",
    }
}
