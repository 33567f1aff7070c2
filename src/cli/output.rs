//! Terminal output helpers for the CLI commands.

use comfy_table::{presets::UTF8_FULL, Cell, Color, ContentArrangement, Table};
use console::style;

use crate::domain::models::{ProgressSummary, Task, TaskStatus};

/// Render the task table for the status command.
pub fn status_table<'a>(tasks: impl Iterator<Item = &'a Task>) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Name", "Phase", "Status"]);

    for task in tasks {
        table.add_row(vec![
            Cell::new(&task.id),
            Cell::new(&task.name),
            Cell::new(task.phase_id.as_deref().unwrap_or("-")),
            status_cell(task.status),
        ]);
    }
    table
}

fn status_cell(status: TaskStatus) -> Cell {
    let cell = Cell::new(status.as_str());
    match status {
        TaskStatus::Completed => cell.fg(Color::Green),
        TaskStatus::Failed => cell.fg(Color::Red),
        TaskStatus::InProgress => cell.fg(Color::Yellow),
        TaskStatus::Pending => cell,
    }
}

/// One-line summary of the per-status counts.
pub fn format_summary(summary: &ProgressSummary) -> String {
    format!(
        "{} total | {} completed | {} failed | {} in progress | {} pending",
        summary.total,
        style(summary.completed).green(),
        style(summary.failed).red(),
        style(summary.in_progress).yellow(),
        summary.pending,
    )
}
