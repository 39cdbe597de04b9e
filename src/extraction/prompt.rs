//! Prompt construction for task extraction.

use crate::extraction::task::TaskType;

/// Context about an email used to decide who is responsible for a task.
///
/// Passed to the model as-is; never validated or persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmailMetadata {
    pub sender: Option<String>,
    pub recipients: Vec<String>,
    pub cc: Vec<String>,
    pub user_email: Option<String>,
    pub subject: Option<String>,
}

impl EmailMetadata {
    fn is_empty(&self) -> bool {
        self.sender.is_none()
            && self.recipients.is_empty()
            && self.cc.is_empty()
            && self.user_email.is_none()
            && self.subject.is_none()
    }
}

/// Build the extraction system prompt.
pub fn build_system_prompt() -> String {
    let tags: Vec<&str> = TaskType::ALL.iter().map(|t| t.as_str()).collect();
    format!(
        "You are a task extraction engine. Read the email and identify every actionable item: \
         tasks, assignments, requests, reminders, and meeting requests.\n\n\
         Classify each item with exactly one task_type:\n\
         - \"meeting_scheduling\": a meeting, call, or appointment needs to be arranged or attended.\n\
         - \"reminder\": something to remember or follow up on at a point in time.\n\
         - \"to_do_item\": any other piece of work that needs to be done.\n\n\
         Respond with ONLY a JSON array. Each element is an object with these keys:\n\
         {{\"description\": \"...\", \"deadline\": \"...\" or null, \"task_type\": one of [{}], \
         \"responsible\": \"...\" or null, \"dependencies\": [\"...\"] or null}}\n\n\
         Rules:\n\
         - description is a short, clear statement of what must be done\n\
         - deadline: copy the deadline phrase from the email verbatim; null if none is given\n\
         - responsible: the name or email address of who must act; use the email context to decide; \
         null if unclear\n\
         - dependencies: prerequisites that must happen first; null if none\n\
         - If the email contains no actionable items, respond with []",
        tags.iter()
            .map(|t| format!("\"{t}\""))
            .collect::<Vec<_>>()
            .join(", ")
    )
}

/// Build the extraction user prompt from the email text and optional metadata.
pub fn build_user_prompt(email_text: &str, metadata: Option<&EmailMetadata>) -> String {
    let mut prompt = String::with_capacity(email_text.len() + 256);

    if let Some(meta) = metadata.filter(|m| !m.is_empty()) {
        prompt.push_str("Email context:\n");
        if let Some(ref sender) = meta.sender {
            prompt.push_str(&format!("From: {sender}\n"));
        }
        if !meta.recipients.is_empty() {
            prompt.push_str(&format!("To: {}\n", meta.recipients.join(", ")));
        }
        if !meta.cc.is_empty() {
            prompt.push_str(&format!("CC: {}\n", meta.cc.join(", ")));
        }
        if let Some(ref subject) = meta.subject {
            prompt.push_str(&format!("Subject: {subject}\n"));
        }
        if let Some(ref me) = meta.user_email {
            prompt.push_str(&format!("Your address: {me}\n"));
        }
        prompt.push('\n');
    }

    prompt.push_str("Email:\n");
    prompt.push_str(email_text);
    prompt
}
