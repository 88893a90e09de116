//! # Notifications
//!
//! Workflows announce their outcome through [`NotificationSink`]. Delivery
//! is fire-and-forget: a failing sink is logged and never undoes the
//! workflow that triggered it.
//!
//! [`Inbox`] is the sink kept inside the tracker state. It backs the unread
//! badge and the "latest notifications" list of every dashboard.

use crate::{ActorId, NotificationId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Delivery failure reported by a sink.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("notification delivery failed: {0}")]
pub struct NotifyError(pub String);

/// Outbound notification channel.
pub trait NotificationSink {
    fn notify(&mut self, recipient: ActorId, message: &str, link: &str) -> Result<(), NotifyError>;
}

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: ActorId,
    pub message: String,
    pub link: String,
    pub read: bool,
}

/// In-state notification store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inbox {
    entries: BTreeMap<NotificationId, Notification>,
    next_id: u64,
}

impl Inbox {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted rows.
    #[must_use]
    pub fn from_rows(rows: Vec<Notification>, next_id: u64) -> Self {
        let mut inbox = Self {
            entries: BTreeMap::new(),
            next_id,
        };
        for n in rows {
            inbox.next_id = inbox.next_id.max(n.id.0.saturating_add(1));
            inbox.entries.insert(n.id, n);
        }
        inbox
    }

    pub fn all(&self) -> impl Iterator<Item = &Notification> {
        self.entries.values()
    }

    #[must_use]
    pub fn next_id(&self) -> u64 {
        self.next_id
    }

    /// Store a notification and return its id.
    pub fn push(&mut self, recipient: ActorId, message: &str, link: &str) -> NotificationId {
        let id = NotificationId(self.next_id);
        self.next_id = self.next_id.saturating_add(1);
        self.entries.insert(
            id,
            Notification {
                id,
                recipient,
                message: message.to_string(),
                link: link.to_string(),
                read: false,
            },
        );
        id
    }

    #[must_use]
    pub fn unread_count(&self, recipient: ActorId) -> usize {
        self.entries
            .values()
            .filter(|n| n.recipient == recipient && !n.read)
            .count()
    }

    /// Newest notifications for a recipient, at most `limit`.
    #[must_use]
    pub fn latest(&self, recipient: ActorId, limit: usize) -> Vec<&Notification> {
        self.entries
            .values()
            .rev()
            .filter(|n| n.recipient == recipient)
            .take(limit)
            .collect()
    }

    /// Mark every notification of a recipient as read. Returns how many changed.
    pub fn mark_all_read(&mut self, recipient: ActorId) -> usize {
        let mut changed = 0;
        for n in self.entries.values_mut() {
            if n.recipient == recipient && !n.read {
                n.read = true;
                changed += 1;
            }
        }
        changed
    }
}

impl NotificationSink for Inbox {
    fn notify(&mut self, recipient: ActorId, message: &str, link: &str) -> Result<(), NotifyError> {
        self.push(recipient, message, link);
        Ok(())
    }
}
