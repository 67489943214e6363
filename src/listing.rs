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

//! Shop listings and purchase receipts.
//!
//! A listing offers copies of a card at a price with its own tracked
//! stock, separate from the card's ownership record. The exchange
//! preference fields are informational only; they describe what the
//! seller would accept in trade but constrain nothing.

use crate::base::{CardId, ListingId, PurchaseId, UserId};
use crate::card::{CardGenre, CardGrade};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the seller would like in exchange, shown alongside the listing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExchangePrefs {
    pub grade: Option<CardGrade>,
    pub genre: Option<CardGenre>,
    pub description: Option<String>,
}

/// A card offered for sale.
///
/// # Invariants
///
/// - `remaining_quantity <= initial_quantity` at all times.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub id: ListingId,
    pub seller_id: UserId,
    pub card_id: CardId,
    pub price: i64,
    pub initial_quantity: u32,
    pub remaining_quantity: u32,
    pub prefs: ExchangePrefs,
    pub created_at: DateTime<Utc>,
}

impl Listing {
    pub fn new(
        id: ListingId,
        seller_id: UserId,
        card_id: CardId,
        price: i64,
        quantity: u32,
        prefs: ExchangePrefs,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            seller_id,
            card_id,
            price,
            initial_quantity: quantity,
            remaining_quantity: quantity,
            prefs,
            created_at: now,
        }
    }

    /// Takes sold copies out of the listing's stock.
    pub fn take_stock(&mut self, quantity: u32) -> Result<(), MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if self.remaining_quantity < quantity {
            return Err(MarketError::InsufficientStock);
        }
        self.remaining_quantity -= quantity;
        debug_assert!(
            self.remaining_quantity <= self.initial_quantity,
            "Invariant violated: remaining {} exceeds initial {}",
            self.remaining_quantity,
            self.initial_quantity
        );
        Ok(())
    }

    pub fn is_sold_out(&self) -> bool {
        self.remaining_quantity == 0
    }
}

/// Immutable receipt created once per settled purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: PurchaseId,
    pub buyer_id: UserId,
    pub listing_id: ListingId,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_listing() -> Listing {
        Listing::new(
            ListingId(1),
            UserId(1),
            CardId(1),
            100,
            5,
            ExchangePrefs::default(),
            Utc::now(),
        )
    }

    #[test]
    fn new_listing_starts_fully_stocked() {
        let listing = sample_listing();
        assert_eq!(listing.initial_quantity, 5);
        assert_eq!(listing.remaining_quantity, 5);
        assert!(!listing.is_sold_out());
    }

    #[test]
    fn take_stock_decrements_remaining() {
        let mut listing = sample_listing();
        listing.take_stock(3).unwrap();
        assert_eq!(listing.remaining_quantity, 2);
        assert_eq!(listing.initial_quantity, 5);
    }

    #[test]
    fn take_stock_to_zero_is_sold_out() {
        let mut listing = sample_listing();
        listing.take_stock(5).unwrap();
        assert!(listing.is_sold_out());
    }

    #[test]
    fn take_stock_rejects_overdraw() {
        let mut listing = sample_listing();
        assert_eq!(listing.take_stock(6), Err(MarketError::InsufficientStock));
        assert_eq!(listing.remaining_quantity, 5);
    }

    #[test]
    fn take_stock_rejects_zero() {
        let mut listing = sample_listing();
        assert_eq!(listing.take_stock(0), Err(MarketError::InvalidQuantity));
    }
}
