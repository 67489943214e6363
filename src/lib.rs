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

//! # Cardtrade
//!
//! This library provides the transactional settlement engine for a
//! card-trading marketplace: point purchases of listed cards, direct
//! card-for-card exchange negotiation, and a point ledger with a random
//! reward draw.
//!
//! ## Core Components
//!
//! - [`Marketplace`]: Central engine running every operation as one
//!   atomic, isolated transactional unit
//! - [`Card`] / [`Listing`] / [`Point`] / [`Exchange`]: Ledger
//!   primitives with their own invariants
//! - [`MarketError`]: Error taxonomy for settlement failures
//!
//! ## Example
//!
//! ```
//! use cardtrade_rs::{CardGenre, CardGrade, CardSpec, ExchangePrefs, Marketplace};
//!
//! let market = Marketplace::new();
//! let seller = market.register_user("seller", 0).unwrap();
//! let buyer = market.register_user("buyer", 1000).unwrap();
//!
//! let card = market
//!     .mint_card(
//!         seller,
//!         CardSpec {
//!             name: "Sunrise at Machu Picchu".into(),
//!             price: 100,
//!             grade: CardGrade::Legendary,
//!             genre: CardGenre::Travel,
//!             description: "Dawn over the ruins".into(),
//!             quantity: 5,
//!             image_url: "https://example.com/machupicchu.jpg".into(),
//!         },
//!     )
//!     .unwrap();
//! let listing = market
//!     .list_card(seller, card, 100, 5, ExchangePrefs::default())
//!     .unwrap();
//!
//! let outcome = market.purchase(buyer, listing, 3).unwrap();
//! assert_eq!(outcome.total_price, 300);
//! assert_eq!(outcome.remaining_balance, 700);
//! ```
//!
//! ## Concurrency
//!
//! Operations may run from any number of threads. Every mutation of a
//! balance, stock counter, card owner, or exchange status is an
//! optimistic guarded write: the transactional unit records the row it
//! observed and commits only if that row is still current. A losing
//! unit aborts with [`MarketError::Conflict`] and must be re-invoked;
//! nothing retries automatically.

pub mod base;
mod browse;
pub mod card;
pub mod draw;
mod engine;
pub mod error;
pub mod exchange;
pub mod listing;
pub mod notification;
pub mod point;
mod store;

pub use base::{
    CardId, ExchangeId, HistoryId, ListingId, NotificationId, Profile, PurchaseId, UserId,
};
pub use browse::{CardListingView, FilterKind};
pub use card::{Card, CardGenre, CardGrade};
pub use draw::{RandomSource, ThreadRngSource};
pub use engine::{
    CardSpec, DrawOutcome, ExchangeSummary, MarketConfig, Marketplace, OfferedCardView,
    PurchaseOutcome,
};
pub use error::MarketError;
pub use exchange::{Exchange, ExchangeStatus};
pub use listing::{ExchangePrefs, Listing, Purchase};
pub use notification::{Delivery, Notification, NotificationOutbox};
pub use point::{Point, PointHistory, PointType};
