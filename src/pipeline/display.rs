//! Console rendering for the interactive review.

use std::fmt::Write;

use chrono::Local;

use crate::extraction::TaskRecord;
use crate::mail::Email;

const NOT_SPECIFIED: &str = "Not specified";

/// One-email summary shown before asking whether to extract.
pub fn format_email_summary(email: &Email, index: usize) -> String {
    let sender = email
        .from
        .first()
        .map(|p| p.display())
        .unwrap_or_else(|| "Unknown sender".to_string());
    let date = email
        .received_at
        .map(|at| at.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "Unknown date".to_string());
    let subject = if email.subject.is_empty() {
        "(no subject)"
    } else {
        email.subject.as_str()
    };

    format!("[{index}] From: {sender}\n    Date: {date}\n    Subject: {subject}")
}

/// Tasks extracted from email `index`.
pub fn format_tasks(tasks: &[TaskRecord], index: usize) -> String {
    if tasks.is_empty() {
        return format!("No tasks found in email [{index}]");
    }

    let mut out = format!("Extracted {} task(s) from email [{index}]:\n", tasks.len());
    for (i, task) in tasks.iter().enumerate() {
        let _ = write!(
            out,
            "\nTask {}:\n  Description: {}\n  Type: {}\n  Responsible: {}\n  Deadline: {}\n",
            i + 1,
            task.description,
            task.task_type,
            task.responsible.as_deref().unwrap_or(NOT_SPECIFIED),
            task.deadline.as_deref().unwrap_or(NOT_SPECIFIED),
        );
        if let Some(deps) = task.dependencies.as_ref().filter(|d| !d.is_empty()) {
            let _ = writeln!(out, "  Dependencies: {}", deps.join(", "));
        }
    }
    out
}
