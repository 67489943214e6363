// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Notification records and the fire-and-forget delivery outbox.
//!
//! Notifications are staged inside the same transactional unit as the
//! operation that triggers them, so a failed settlement never produces a
//! spurious notification. On commit each record is also pushed onto a
//! lock-free outbox queue for the (out-of-scope) delivery layer to drain.

use crate::base::{NotificationId, UserId};
use chrono::{DateTime, Utc};
use crossbeam::queue::SegQueue;
use serde::{Deserialize, Serialize};

/// A stored notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub user_id: UserId,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(id: NotificationId, user_id: UserId, content: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id,
            content,
            is_read: false,
            created_at: now,
        }
    }
}

/// An outbound delivery handed to the notification sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub user_id: UserId,
    pub content: String,
}

/// Lock-free FIFO of committed, undelivered notifications.
///
/// Pushes happen only at commit time; ordering follows commit order.
#[derive(Debug, Default)]
pub struct NotificationOutbox {
    queue: SegQueue<Delivery>,
}

impl NotificationOutbox {
    pub fn new() -> Self {
        Self { queue: SegQueue::new() }
    }

    pub(crate) fn push(&self, notification: &Notification) {
        self.queue.push(Delivery {
            user_id: notification.user_id,
            content: notification.content.clone(),
        });
    }

    /// Pops all pending deliveries in FIFO order.
    pub fn drain(&self) -> Vec<Delivery> {
        let mut out = Vec::new();
        while let Some(delivery) = self.queue.pop() {
            out.push(delivery);
        }
        out
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_notification_starts_unread() {
        let n = Notification::new(NotificationId(1), UserId(1), "Card sold".into(), Utc::now());
        assert!(!n.is_read);
    }

    #[test]
    fn outbox_drains_in_fifo_order() {
        let outbox = NotificationOutbox::new();
        let now = Utc::now();
        outbox.push(&Notification::new(NotificationId(1), UserId(1), "first".into(), now));
        outbox.push(&Notification::new(NotificationId(2), UserId(2), "second".into(), now));

        let drained = outbox.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].content, "first");
        assert_eq!(drained[1].content, "second");
        assert!(outbox.is_empty());
    }

    #[test]
    fn drain_on_empty_outbox_is_empty() {
        let outbox = NotificationOutbox::new();
        assert!(outbox.drain().is_empty());
        assert_eq!(outbox.len(), 0);
    }
}
