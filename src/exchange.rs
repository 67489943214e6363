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

//! Card-for-card exchange negotiations.
//!
//! Implemented state machine:
//!
//! ```text
//! Requested --accept--> Accepted   (offered card changes owner)
//!     |
//!     +-----reject--> Rejected
//!     +-----cancel--> Cancelled
//! ```
//!
//! All three outcomes are terminal. Acting on a non-REQUESTED exchange
//! reports `NotFound`, the same as an exchange that never existed.

use crate::base::{CardId, ExchangeId, UserId};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Negotiation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeStatus {
    Requested,
    Accepted,
    Rejected,
    Cancelled,
}

/// A proposed one-for-one card swap.
///
/// # Invariants
///
/// - Status only ever moves out of `Requested`, once.
/// - An offered card has at most one live exchange at any time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub id: ExchangeId,
    pub requester_id: UserId,
    pub offered_card_id: CardId,
    pub target_card_id: CardId,
    pub status: ExchangeStatus,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Exchange {
    pub fn new(
        id: ExchangeId,
        requester_id: UserId,
        offered_card_id: CardId,
        target_card_id: CardId,
        description: Option<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            requester_id,
            offered_card_id,
            target_card_id,
            status: ExchangeStatus::Requested,
            description,
            created_at: now,
            updated_at: now,
        }
    }

    /// True while the exchange blocks the offered card from being
    /// offered elsewhere (REQUESTED or ACCEPTED).
    pub fn is_live(&self) -> bool {
        matches!(self.status, ExchangeStatus::Requested | ExchangeStatus::Accepted)
    }

    fn transition(&mut self, to: ExchangeStatus, now: DateTime<Utc>) -> Result<(), MarketError> {
        if self.status != ExchangeStatus::Requested {
            // Terminal states are indistinguishable from absent ones.
            return Err(MarketError::NotFound);
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn accept(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.transition(ExchangeStatus::Accepted, now)
    }

    pub fn reject(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.transition(ExchangeStatus::Rejected, now)
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), MarketError> {
        self.transition(ExchangeStatus::Cancelled, now)
    }
}
