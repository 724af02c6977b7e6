//! Rendering of operation results.

use std::io::{self, Write};

use docsync_core::{SyncAction, SyncResult};

/// Human-readable report for a finished operation.
pub fn render(result: &SyncResult) -> String {
    let path = result.path.display();
    match result.action {
        SyncAction::Created => format!("Documentation fetched to: {path} ({} documents)", result.written),
        SyncAction::AlreadyPresent => format!(
            "Documentation already exists at: {path}\nUse --update to refresh it or --force to re-download."
        ),
        SyncAction::Updated => match result.changed {
            Some(changed) => {
                format!("Documentation updated at: {path} ({} documents, {changed} changed)", result.written)
            }
            None => format!("Documentation updated at: {path} ({} documents)", result.written),
        },
        SyncAction::Forced => format!("Documentation re-downloaded to: {path} ({} documents)", result.written),
        SyncAction::Listed => result.entries.join("\n"),
        SyncAction::Path => path.to_string(),
        SyncAction::Failed => format!("Failed at {path}: {}", result.error.as_deref().unwrap_or("unknown error")),
    }
}

/// Write a result to stdout, as text or JSON.
pub fn print(result: &SyncResult, json: bool) -> io::Result<()> {
    let mut out = io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, result)?;
        writeln!(out)
    } else {
        let text = render(result);
        if text.is_empty() {
            if result.action == SyncAction::Listed {
                eprintln!("No documents at: {}", result.path.display());
            }
            return Ok(());
        }
        writeln!(out, "{text}")
    }
}
