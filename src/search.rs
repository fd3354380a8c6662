use std::time::Duration;

use tokio::task::JoinHandle;

use crate::category::CategoryFilter;
use crate::model::{DocumentRecord, MemberRecord};

fn member_matches(member: &MemberRecord, needle: &str) -> bool {
    member.name.to_lowercase().contains(needle)
        || member.relation.to_lowercase().contains(needle)
        || member
            .phone
            .as_deref()
            .map(|phone| phone.contains(needle))
            .unwrap_or(false)
}

fn document_matches(document: &DocumentRecord, needle: &str) -> bool {
    document.name.to_lowercase().contains(needle)
        || document.category.as_str().contains(needle)
        || document
            .description
            .as_deref()
            .map(|text| text.to_lowercase().contains(needle))
            .unwrap_or(false)
}

/// Case-insensitive substring match over name, relation, and phone.
/// A blank query returns the whole snapshot in cache order.
pub fn search_members<'a>(members: &'a [MemberRecord], query: &str) -> Vec<&'a MemberRecord> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return members.iter().collect();
    }
    members
        .iter()
        .filter(|member| member_matches(member, &needle))
        .collect()
}

/// Category filter first, then the same substring match over name,
/// category slug, and description.
pub fn search_documents<'a>(
    documents: &'a [DocumentRecord],
    query: &str,
    filter: CategoryFilter,
) -> Vec<&'a DocumentRecord> {
    let needle = query.trim().to_lowercase();
    documents
        .iter()
        .filter(|document| filter.matches(document.category))
        .filter(|document| needle.is_empty() || document_matches(document, &needle))
        .collect()
}

/// Delays keystroke-driven work until typing pauses. Each submission
/// replaces the previous one; only the last survives the delay window.
pub struct Debouncer {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: None,
        }
    }

    pub fn submit<F>(&mut self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action();
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(handle) = self.pending.take() {
            handle.abort();
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}
