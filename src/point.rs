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

//! Point balances and the append-only point history.
//!
//! Every user has exactly one [`Point`] row. Balance changes happen only
//! inside a transactional unit, paired with a [`PointHistory`] row that
//! records the signed delta.

use crate::base::{HistoryId, UserId};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What caused a balance change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PointType {
    /// Starting balance granted at registration.
    Join,
    /// Random point-box reward.
    Draw,
    /// Purchase settlement (positive for seller, negative for buyer).
    Purchase,
    /// Reserved for point-bearing exchange events.
    Exchange,
}

/// A user's point balance.
///
/// # Invariants
///
/// - `0 <= balance <= cap` (the cap comes from `MarketConfig`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    pub user_id: UserId,
    pub balance: i64,
}

impl Point {
    pub fn new(user_id: UserId, balance: i64) -> Self {
        debug_assert!(balance >= 0, "starting balance must be non-negative");
        Self { user_id, balance }
    }

    /// Increases the balance, honoring the configured cap.
    pub fn credit(&mut self, amount: i64, cap: i64) -> Result<(), MarketError> {
        if amount <= 0 {
            return Err(MarketError::InvalidAmount);
        }
        let next = self.balance.checked_add(amount).ok_or(MarketError::BalanceLimit)?;
        if next > cap {
            return Err(MarketError::BalanceLimit);
        }
        self.balance = next;
        Ok(())
    }

    /// Decreases the balance, never below zero.
    pub fn debit(&mut self, amount: i64) -> Result<(), MarketError> {
        if amount <= 0 {
            return Err(MarketError::InvalidAmount);
        }
        if self.balance < amount {
            return Err(MarketError::InsufficientBalance);
        }
        self.balance -= amount;
        Ok(())
    }
}

/// Append-only record of one balance-affecting event.
///
/// Rows are never mutated after creation. Besides auditing, DRAW rows are
/// the query source for a user's last draw time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHistory {
    pub id: HistoryId,
    pub user_id: UserId,
    pub points: i64,
    pub point_type: PointType,
    pub created_at: DateTime<Utc>,
}
