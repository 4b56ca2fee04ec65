//! Output renderers and formatting helpers for CLI commands.

use std::fmt::Write as _;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use keeplist_api_models::{Checklist, ChecklistId, ChecklistItem};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::client::{CliError, CliResult};

/// Dashboard row: a checklist with its item count and first few items.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub(crate) struct ChecklistOverview {
    pub(crate) id: ChecklistId,
    pub(crate) name: String,
    pub(crate) item_count: usize,
    pub(crate) preview: Vec<String>,
}

/// Signed-in identity as shown by `whoami`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct SessionView {
    pub(crate) username: String,
    pub(crate) expires_at: DateTime<Utc>,
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::failure(anyhow!("failed to format JSON: {err}")))?;
    println!("{text}");
    Ok(())
}

pub(crate) fn render_checklists(rows: &[ChecklistOverview], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(rows)?,
        OutputFormat::Table => print!("{}", checklist_table(rows)),
    }
    Ok(())
}

pub(crate) fn render_checklist(checklist: &Checklist, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(checklist)?,
        OutputFormat::Table => println!("created checklist {} ({})", checklist.id, checklist.name),
    }
    Ok(())
}

pub(crate) fn render_items(
    checklist_id: ChecklistId,
    items: &[ChecklistItem],
    format: OutputFormat,
) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(items)?,
        OutputFormat::Table => {
            if items.is_empty() {
                println!("checklist {checklist_id} has no items");
            } else {
                print!("{}", items_table(items));
            }
        }
    }
    Ok(())
}

pub(crate) fn render_item(item: &ChecklistItem, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Json => print_json(item)?,
        OutputFormat::Table => println!("added item {} ({})", item.id, item.name),
    }
    Ok(())
}

pub(crate) fn render_session(view: Option<&SessionView>, format: OutputFormat) -> CliResult<()> {
    match (format, view) {
        (OutputFormat::Json, view) => print_json(&view)?,
        (OutputFormat::Table, Some(view)) => {
            println!("username: {}", view.username);
            println!("expires: {}", view.expires_at.to_rfc3339());
        }
        (OutputFormat::Table, None) => println!("not logged in"),
    }
    Ok(())
}

pub(crate) fn checklist_table(rows: &[ChecklistOverview]) -> String {
    let mut out = format!("{:>6} {:<24} {:>5} PREVIEW\n", "ID", "NAME", "ITEMS");
    for row in rows {
        let _ = writeln!(
            out,
            "{:>6} {:<24} {:>5} {}",
            row.id,
            row.name,
            row.item_count,
            preview_label(&row.preview, row.item_count)
        );
    }
    out
}

pub(crate) fn items_table(items: &[ChecklistItem]) -> String {
    let mut out = format!("{:>6} {:<4} NAME\n", "ID", "DONE");
    for item in items {
        let _ = writeln!(out, "{:>6} {:<4} {}", item.id, done_mark(item.status), item.name);
    }
    out
}

pub(crate) fn preview_label(preview: &[String], total: usize) -> String {
    if preview.is_empty() {
        return "-".to_string();
    }
    let mut label = preview.join(", ");
    if total > preview.len() {
        let _ = write!(label, ", +{} more", total - preview.len());
    }
    label
}

pub(crate) const fn done_mark(status: bool) -> &'static str {
    if status { "[x]" } else { "[ ]" }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: ChecklistId, name: &str, count: usize, preview: &[&str]) -> ChecklistOverview {
        ChecklistOverview {
            id,
            name: name.to_string(),
            item_count: count,
            preview: preview.iter().map(|name| (*name).to_string()).collect(),
        }
    }

    #[test]
    fn preview_label_summarises_overflow() {
        let preview = vec!["Eggs".to_string(), "Milk".to_string()];
        assert_eq!(preview_label(&preview, 2), "Eggs, Milk");
        assert_eq!(preview_label(&preview, 5), "Eggs, Milk, +3 more");
        assert_eq!(preview_label(&[], 0), "-");
    }

    #[test]
    fn checklist_table_lists_each_row() {
        let table = checklist_table(&[
            row(1, "Groceries", 3, &["Eggs", "Milk"]),
            row(2, "Chores", 0, &[]),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("PREVIEW"));
        assert!(lines[1].contains("Groceries"));
        assert!(lines[1].ends_with("Eggs, Milk, +1 more"));
        assert!(lines[2].ends_with('-'));
    }

    #[test]
    fn items_table_marks_done_items() {
        let table = items_table(&[
            ChecklistItem {
                id: 1,
                name: "Eggs".to_string(),
                status: true,
            },
            ChecklistItem::pending(2, "Milk"),
        ]);
        let lines: Vec<&str> = table.lines().collect();
        assert!(lines[1].contains("[x]"));
        assert!(lines[2].contains("[ ]"));
        assert!(lines[2].ends_with("Milk"));
    }

    #[test]
    fn overview_serialises_for_json_output() {
        let value = serde_json::to_value(row(1, "Groceries", 1, &["Eggs"])).expect("serialize");
        assert_eq!(value["item_count"], 1);
        assert_eq!(value["preview"][0], "Eggs");
    }
}
