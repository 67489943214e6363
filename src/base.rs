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

//! Core identifier types for marketplace records.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_type! {
    /// Unique identifier for a marketplace user.
    UserId
}

id_type! {
    /// Unique identifier for a card ownership record.
    ///
    /// Each owner has their own card row; a purchase copies the seller's
    /// card into a new row owned by the buyer.
    CardId
}

id_type! {
    /// Unique identifier for a shop listing.
    ListingId
}

id_type! {
    /// Unique identifier for an exchange negotiation.
    ExchangeId
}

id_type! {
    /// Unique identifier for a purchase receipt.
    PurchaseId
}

id_type! {
    /// Unique identifier for a point history row.
    HistoryId
}

id_type! {
    /// Unique identifier for a notification.
    NotificationId
}

/// Minimal user profile used for response summaries.
///
/// Authentication and session concerns live outside this crate; the
/// engine only needs a nickname to build exchange summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: UserId,
    pub nickname: String,
}
