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

//! Card ownership records.
//!
//! A card row belongs to exactly one owner. Selling copies of a card
//! moves stock out of the seller's row and into a row owned by the buyer
//! (created on first purchase, merged on repeat purchases).

use crate::base::{CardId, UserId};
use crate::error::MarketError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Card rarity grade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardGrade {
    Common,
    Rare,
    SuperRare,
    Legendary,
}

impl CardGrade {
    /// All grades in display order, for filter-count buckets.
    pub const ALL: [CardGrade; 4] = [
        CardGrade::Common,
        CardGrade::Rare,
        CardGrade::SuperRare,
        CardGrade::Legendary,
    ];
}

/// Card photo genre.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardGenre {
    Travel,
    Landscape,
    Portrait,
    Object,
}

impl CardGenre {
    /// All genres in display order, for filter-count buckets.
    pub const ALL: [CardGenre; 4] = [
        CardGenre::Travel,
        CardGenre::Landscape,
        CardGenre::Portrait,
        CardGenre::Object,
    ];
}

/// A card ownership record.
///
/// # Invariants
///
/// - `remaining_quantity <= total_quantity` at all times.
/// - `total_quantity` only decreases through sold copies; `remaining_quantity`
///   only decreases when stock is reserved for a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub owner_id: UserId,
    pub name: String,
    pub price: i64,
    pub grade: CardGrade,
    pub genre: CardGenre,
    pub description: String,
    pub total_quantity: u32,
    pub remaining_quantity: u32,
    pub image_url: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Card {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CardId,
        owner_id: UserId,
        name: impl Into<String>,
        price: i64,
        grade: CardGrade,
        genre: CardGenre,
        description: impl Into<String>,
        quantity: u32,
        image_url: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            owner_id,
            name: name.into(),
            price,
            grade,
            genre,
            description: description.into(),
            total_quantity: quantity,
            remaining_quantity: quantity,
            image_url: image_url.into(),
            created_at: now,
            updated_at: now,
        }
    }

    fn assert_invariants(&self) {
        debug_assert!(
            self.remaining_quantity <= self.total_quantity,
            "Invariant violated: remaining {} exceeds total {}",
            self.remaining_quantity,
            self.total_quantity
        );
    }

    /// Reserves stock for a new listing, reducing the remaining quantity.
    pub fn reserve(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if self.remaining_quantity < quantity {
            return Err(MarketError::InsufficientStock);
        }
        self.remaining_quantity -= quantity;
        self.updated_at = now;
        self.assert_invariants();
        Ok(())
    }

    /// Removes sold copies from the total quantity.
    ///
    /// The remaining quantity already dropped when the listing reserved
    /// its stock, so only the total moves here.
    pub fn deduct_sold(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if self.total_quantity < quantity {
            return Err(MarketError::InsufficientStock);
        }
        self.total_quantity -= quantity;
        self.updated_at = now;
        self.assert_invariants();
        Ok(())
    }

    /// Merges purchased copies into an already-owned row.
    pub fn add_copies(&mut self, quantity: u32, now: DateTime<Utc>) -> Result<(), MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        self.total_quantity = self
            .total_quantity
            .checked_add(quantity)
            .ok_or(MarketError::InvalidQuantity)?;
        self.updated_at = now;
        self.assert_invariants();
        Ok(())
    }

    /// Hands the card to a new owner (exchange acceptance).
    pub fn transfer_to(&mut self, new_owner: UserId, now: DateTime<Utc>) {
        self.owner_id = new_owner;
        self.updated_at = now;
    }

    /// Builds the buyer's copy of this card after a purchase.
    pub fn buyer_copy(&self, id: CardId, owner: UserId, quantity: u32, now: DateTime<Utc>) -> Card {
        Card::new(
            id,
            owner,
            self.name.clone(),
            self.price,
            self.grade,
            self.genre,
            self.description.clone(),
            quantity,
            self.image_url.clone(),
            now,
        )
    }

    /// True when `other` is a copy of the same logical card.
    ///
    /// Rows carry per-owner ids, so copies are matched on the identity
    /// fields that survive the copy.
    pub fn same_card_as(&self, other: &Card) -> bool {
        self.name == other.name && self.grade == other.grade && self.genre == other.genre
    }
}
