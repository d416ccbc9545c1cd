use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::mail::decode::{DecodedEmail, NO_SUBJECT};

static REPLY_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(Re:|Fwd:)\s*").expect("valid regex"));

/// One resolved conversation thread for a single mailbox batch.
/// `external_thread_id` is the earliest message's Message-ID and is the
/// conversation's stable cross-sync key.
#[derive(Debug)]
pub struct Thread {
    pub key: String,
    pub external_thread_id: String,
    /// Ascending by sent-at.
    pub messages: Vec<DecodedEmail>,
}

/// Normalized subject used for grouping: one leading reply/forward
/// prefix stripped, trimmed; empty maps to the placeholder key.
pub fn thread_key(subject: &str) -> String {
    let stripped = REPLY_PREFIX.replace(subject, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        NO_SUBJECT.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Group a mailbox's decoded batch into threads. Ordering of threads
/// relative to each other carries no guarantee.
pub fn resolve_threads(emails: Vec<DecodedEmail>) -> Vec<Thread> {
    let mut groups: HashMap<String, Vec<DecodedEmail>> = HashMap::new();
    for email in emails {
        groups.entry(thread_key(&email.subject)).or_default().push(email);
    }

    groups
        .into_iter()
        .map(|(key, mut messages)| {
            messages.sort_by(|a, b| a.date.cmp(&b.date));
            let external_thread_id = messages[0].message_id.clone();
            Thread {
                key,
                external_thread_id,
                messages,
            }
        })
        .collect()
}
