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

//! Error types for marketplace operations.

use thiserror::Error;

/// Marketplace operation errors.
///
/// Every variant aborts the enclosing transactional unit; no partial
/// balance, stock, or ownership change survives a failed operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    /// Referenced record (listing, card, point row, exchange) is absent.
    ///
    /// Also returned when acting on an exchange that already resolved;
    /// callers cannot distinguish the two cases.
    #[error("record not found")]
    NotFound,

    /// Caller is not authorized for this operation.
    #[error("operation not permitted for this user")]
    Forbidden,

    /// Buying from or proposing an exchange against one's own listing.
    #[error("cannot trade with yourself")]
    SelfTrade,

    /// Listing (or card) stock cannot cover the requested quantity.
    #[error("insufficient stock")]
    InsufficientStock,

    /// Buyer's point balance cannot cover the total price.
    #[error("insufficient point balance")]
    InsufficientBalance,

    /// Offered card already has a live exchange negotiation.
    #[error("card is already in a live exchange")]
    AlreadyInNegotiation,

    /// Caller does not own the referenced card.
    #[error("card is not owned by this user")]
    NotOwned,

    /// A guarded field changed between read and commit.
    ///
    /// The whole operation must be retried with fresh reads; the engine
    /// never retries on its own.
    #[error("concurrent update detected")]
    Conflict,

    /// Quantity must be at least one.
    #[error("quantity must be at least one")]
    InvalidQuantity,

    /// Ledger delta is zero or negative where a positive amount is required.
    #[error("invalid amount (must be positive)")]
    InvalidAmount,

    /// Credit would exceed the configured balance cap, or price arithmetic
    /// overflowed.
    #[error("point balance limit exceeded")]
    BalanceLimit,

    /// Card already has an active listing.
    #[error("card is already listed for sale")]
    AlreadyListed,

    /// Nickname is taken by another user.
    #[error("nickname is already in use")]
    NicknameTaken,
}
