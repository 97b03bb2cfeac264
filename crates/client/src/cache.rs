use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use crate::model::{CachedNotification, RemoteNotification};

/// Bounded, newest-first local mirror of a recipient's notifications.
///
/// Live pushes are applied immediately and later reconciled with what the
/// store reports. The store wins whenever the two disagree.
#[derive(Debug)]
pub struct NotificationCache {
    entries: Vec<CachedNotification>,
    unread: u64,
    capacity: usize,
    reconcile_window: chrono::Duration,
}

impl NotificationCache {
    pub fn new(capacity: usize, reconcile_window: Duration) -> Self {
        Self {
            entries: Vec::with_capacity(capacity),
            unread: 0,
            capacity: capacity.max(1),
            reconcile_window: chrono::Duration::from_std(reconcile_window)
                .unwrap_or_else(|_| chrono::Duration::seconds(30)),
        }
    }

    pub fn items(&self) -> &[CachedNotification] {
        &self.entries
    }

    pub fn unread_count(&self) -> u64 {
        self.unread
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CachedNotification> {
        self.entries.iter().find(|e| e.has_id(id))
    }

    /// Replaces everything with the store's view.
    pub fn hydrate(&mut self, unread_count: u64, page: Vec<RemoteNotification>) {
        self.entries = page
            .into_iter()
            .map(|n| CachedNotification::from_remote(n, None))
            .collect();
        self.sort_and_cap();
        self.unread = unread_count;
    }

    /// Inserts a live push at its place in the newest-first order. Returns the
    /// temporary id, or `None` when the same stored notification is already
    /// cached or the push is older than everything a full cache holds.
    pub fn apply_push(&mut self, push: RemoteNotification) -> Option<String> {
        if let Some(id) = push.id.as_deref().filter(|id| !id.is_empty()) {
            if self.entries.iter().any(|e| e.id.as_deref() == Some(id)) {
                debug!(id, "Duplicate push ignored");
                return None;
            }
        }

        let position = self
            .entries
            .iter()
            .position(|e| e.created_at <= push.created_at)
            .unwrap_or(self.entries.len());
        if position >= self.capacity {
            debug!("Push older than the cached window, dropped");
            return None;
        }

        let temp_id = nanoid::nanoid!();
        let entry = CachedNotification::from_remote(push, Some(temp_id.clone()));
        if !entry.is_read {
            self.unread += 1;
        }
        self.entries.insert(position, entry);
        self.entries.truncate(self.capacity);
        Some(temp_id)
    }

    /// Merges a fresh first page without dropping local entries the page does
    /// not mention. Temp entries are replaced by their stored counterpart,
    /// never duplicated.
    pub fn reconcile(&mut self, unread_count: u64, page: Vec<RemoteNotification>) {
        for remote in page {
            let stored = CachedNotification::from_remote(remote, None);
            let position = self
                .entries
                .iter()
                .position(|e| e.id.is_some() && e.id == stored.id)
                .or_else(|| {
                    self.entries
                        .iter()
                        .position(|e| e.id.is_none() && self.same_event(e, &stored))
                });

            match position {
                Some(i) => {
                    // Keep the temp id as an alias so handles held by the UI still resolve.
                    let alias = self.entries[i].client_temp_id.take();
                    self.entries[i] = CachedNotification {
                        client_temp_id: alias,
                        ..stored
                    };
                }
                None => self.entries.push(stored),
            }
        }
        self.sort_and_cap();
        self.unread = unread_count;
    }

    /// Optimistically flips one entry to read. Returns false if unknown or
    /// already read.
    pub fn mark_read_local(&mut self, id: &str) -> bool {
        let Some(entry) = self.entries.iter_mut().find(|e| e.has_id(id)) else {
            return false;
        };
        if entry.is_read {
            return false;
        }
        entry.is_read = true;
        entry.read_at = Some(Utc::now());
        self.unread = self.unread.saturating_sub(1);
        true
    }

    pub fn mark_all_read_local(&mut self) {
        let now = Utc::now();
        for entry in self.entries.iter_mut().filter(|e| !e.is_read) {
            entry.is_read = true;
            entry.read_at = Some(now);
        }
        self.unread = 0;
    }

    pub fn remove_local(&mut self, id: &str) -> Option<CachedNotification> {
        let index = self.entries.iter().position(|e| e.has_id(id))?;
        let removed = self.entries.remove(index);
        if !removed.is_read {
            self.unread = self.unread.saturating_sub(1);
        }
        Some(removed)
    }

    fn same_event(&self, a: &CachedNotification, b: &CachedNotification) -> bool {
        if a.recipient_id != b.recipient_id || a.kind != b.kind {
            return false;
        }
        let same_subject = match (a.order_id(), b.order_id()) {
            (Some(x), Some(y)) => x == y,
            (None, None) => a.title == b.title,
            _ => false,
        };
        same_subject && (a.created_at - b.created_at).abs() <= self.reconcile_window
    }

    fn sort_and_cap(&mut self) {
        self.entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        self.entries.truncate(self.capacity);
    }
}
