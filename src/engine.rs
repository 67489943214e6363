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

//! The marketplace settlement engine.
//!
//! [`Marketplace`] is the central component behind every settlement
//! operation: point purchases, card-for-card exchange negotiation, and
//! the point ledger. Each public operation runs as exactly one
//! transactional unit; every balance, stock, and ownership mutation
//! inside it is conditioned on the full row observed earlier in the
//! same unit, so a concurrent change to any field of that row aborts
//! the whole operation with [`MarketError::Conflict`] instead of
//! silently overwriting it.
//!
//! # Operations
//!
//! | Operation | Effect |
//! |-----------|--------|
//! | `purchase` | Moves points buyer→seller, stock listing→buyer card |
//! | `propose_exchange` | Opens a REQUESTED negotiation, notifies seller |
//! | `accept_exchange` | ACCEPTED; offered card changes owner |
//! | `reject_exchange` / `cancel_exchange` | Terminal, no ownership change |
//! | `draw_point_box` | Credits a weighted random reward |
//! | `register_user` / `mint_card` / `list_card` | Record creation flows |
//!
//! # Thread safety
//!
//! The engine is `Send + Sync`; operations from any number of threads
//! interleave safely. There is no queueing or admission control: under
//! heavy contention on one listing or balance, losers surface `Conflict`
//! and must be re-invoked with fresh reads.

use crate::base::{CardId, ExchangeId, ListingId, NotificationId, Profile, PurchaseId, UserId};
use crate::card::{Card, CardGenre, CardGrade};
use crate::draw::{self, RandomSource, ThreadRngSource};
use crate::error::MarketError;
use crate::exchange::{Exchange, ExchangeStatus};
use crate::listing::{ExchangePrefs, Listing, Purchase};
use crate::notification::{Delivery, Notification};
use crate::point::{Point, PointHistory, PointType};
use crate::store::Store;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

/// Engine tunables.
#[derive(Debug, Clone, Copy)]
pub struct MarketConfig {
    /// Hard cap on any point balance; credits past it abort.
    pub max_balance: i64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            max_balance: 10_000_000,
        }
    }
}

/// Everything a card needs at minting time.
#[derive(Debug, Clone)]
pub struct CardSpec {
    pub name: String,
    pub price: i64,
    pub grade: CardGrade,
    pub genre: CardGenre,
    pub description: String,
    pub quantity: u32,
    pub image_url: String,
}

/// Result of a settled purchase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseOutcome {
    pub purchase_id: PurchaseId,
    pub card_name: String,
    pub quantity: u32,
    pub total_price: i64,
    pub remaining_balance: i64,
}

/// Snapshot of the offered card inside an exchange summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OfferedCardView {
    pub card_id: CardId,
    pub name: String,
    pub grade: CardGrade,
    pub price: i64,
    pub image_url: String,
}

impl OfferedCardView {
    fn from_card(card: &Card) -> Self {
        Self {
            card_id: card.id,
            name: card.name.clone(),
            grade: card.grade,
            price: card.price,
            image_url: card.image_url.clone(),
        }
    }
}

/// Response summary for exchange operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeSummary {
    pub exchange_id: ExchangeId,
    pub offered_card: OfferedCardView,
    pub requester_nickname: String,
    pub description: Option<String>,
    pub status: ExchangeStatus,
    pub created_at: DateTime<Utc>,
}

/// Result of opening a point box.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DrawOutcome {
    pub points: i64,
    pub last_draw_time: DateTime<Utc>,
}

/// Marketplace settlement engine.
pub struct Marketplace {
    pub(crate) store: Store,
    config: MarketConfig,
    random: Box<dyn RandomSource>,
}

impl Marketplace {
    /// Creates an engine with default configuration and a thread-local
    /// RNG for point-box draws.
    pub fn new() -> Self {
        Self::with_parts(MarketConfig::default(), Box::new(ThreadRngSource))
    }

    /// Creates an engine with explicit configuration and random source.
    ///
    /// Tests fix the random source to pin draw outcomes.
    pub fn with_parts(config: MarketConfig, random: Box<dyn RandomSource>) -> Self {
        Self {
            store: Store::new(),
            config,
            random,
        }
    }

    // =========================================================================
    // Record creation flows
    // =========================================================================

    /// Registers a user: profile, point row, and a JOIN history entry in
    /// one unit.
    pub fn register_user(
        &self,
        nickname: &str,
        starting_balance: i64,
    ) -> Result<UserId, MarketError> {
        if starting_balance < 0 || starting_balance > self.config.max_balance {
            return Err(MarketError::InvalidAmount);
        }
        let user = self.store.transaction(|tx| {
            if tx.nickname_taken(nickname) {
                return Err(MarketError::NicknameTaken);
            }
            let id = tx.fresh_user_id();
            tx.insert_profile(Profile {
                id,
                nickname: nickname.to_owned(),
            });
            tx.insert_point(Point::new(id, starting_balance));
            tx.push_history(id, starting_balance, PointType::Join);
            Ok(id)
        })?;
        info!(user = %user, nickname, "registered user");
        Ok(user)
    }

    /// Mints a new card owned by `owner`.
    pub fn mint_card(&self, owner: UserId, spec: CardSpec) -> Result<CardId, MarketError> {
        if spec.quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        let card = self.store.transaction(|tx| {
            if !tx.profile_exists(owner) {
                return Err(MarketError::NotFound);
            }
            let id = tx.fresh_card_id();
            tx.insert_card(Card::new(
                id,
                owner,
                spec.name.clone(),
                spec.price,
                spec.grade,
                spec.genre,
                spec.description.clone(),
                spec.quantity,
                spec.image_url.clone(),
                tx.now(),
            ));
            Ok(id)
        })?;
        debug!(card = %card, owner = %owner, "minted card");
        Ok(card)
    }

    /// Puts copies of an owned card up for sale.
    ///
    /// Reserves listing stock out of the card's remaining quantity,
    /// guarded on the value read here.
    pub fn list_card(
        &self,
        seller: UserId,
        card_id: CardId,
        price: i64,
        quantity: u32,
        prefs: ExchangePrefs,
    ) -> Result<ListingId, MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        if price <= 0 {
            return Err(MarketError::InvalidAmount);
        }
        let listing = self.store.transaction(|tx| {
            let mut card = tx.card(card_id)?;
            if card.owner_id != seller {
                return Err(MarketError::NotOwned);
            }
            if tx.has_active_listing_for(card_id) {
                return Err(MarketError::AlreadyListed);
            }
            let observed = card.clone();
            card.reserve(quantity, tx.now())?;
            tx.stage_card(card, observed);

            let id = tx.fresh_listing_id();
            tx.insert_listing(Listing::new(
                id,
                seller,
                card_id,
                price,
                quantity,
                prefs.clone(),
                tx.now(),
            ));
            Ok(id)
        })?;
        info!(listing = %listing, seller = %seller, card = %card_id, quantity, "listed card");
        Ok(listing)
    }

    // =========================================================================
    // Purchase settlement
    // =========================================================================

    /// Settles a purchase of `quantity` copies from a listing.
    ///
    /// Inside one unit: checks self-trade, stock, and balance; debits
    /// the buyer and credits the seller under independent balance
    /// guards; writes the two PURCHASE history rows; moves listing and
    /// card stock; resolves the buyer's copy; records the receipt and
    /// both notifications. Any failure leaves every record untouched.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] - listing or a point row is absent.
    /// - [`MarketError::SelfTrade`] - buyer is the seller.
    /// - [`MarketError::InsufficientStock`] - stock below `quantity`.
    /// - [`MarketError::InsufficientBalance`] - balance below the total.
    /// - [`MarketError::Conflict`] - a guarded field changed concurrently.
    pub fn purchase(
        &self,
        buyer: UserId,
        listing_id: ListingId,
        quantity: u32,
    ) -> Result<PurchaseOutcome, MarketError> {
        if quantity == 0 {
            return Err(MarketError::InvalidQuantity);
        }
        let outcome = self.store.transaction(|tx| {
            let mut listing = tx.listing(listing_id)?;
            if listing.seller_id == buyer {
                return Err(MarketError::SelfTrade);
            }
            if listing.remaining_quantity < quantity {
                return Err(MarketError::InsufficientStock);
            }
            let seller = listing.seller_id;
            let card = tx.card(listing.card_id)?;
            let total_price = listing
                .price
                .checked_mul(i64::from(quantity))
                .ok_or(MarketError::BalanceLimit)?;

            let mut buyer_point = tx.point(buyer)?;
            let buyer_observed = buyer_point.clone();
            if buyer_point.balance < total_price {
                return Err(MarketError::InsufficientBalance);
            }
            buyer_point.debit(total_price)?;
            let remaining_balance = buyer_point.balance;
            tx.stage_point(buyer_point, buyer_observed);

            // Independent guarded read of the seller's balance; the
            // buyer's observation is never reused here.
            let mut seller_point = tx.point(seller)?;
            let seller_observed = seller_point.clone();
            seller_point.credit(total_price, self.config.max_balance)?;
            tx.stage_point(seller_point, seller_observed);

            tx.push_history(seller, total_price, PointType::Purchase);
            tx.push_history(buyer, -total_price, PointType::Purchase);

            let stock_observed = listing.clone();
            listing.take_stock(quantity)?;
            tx.stage_listing(listing, stock_observed);

            let mut seller_card = card.clone();
            seller_card.deduct_sold(quantity, tx.now())?;
            tx.stage_card(seller_card, card.clone());

            match tx.owned_copy_of(&card, buyer) {
                Some(mut copy) => {
                    let copy_observed = copy.clone();
                    copy.add_copies(quantity, tx.now())?;
                    tx.stage_card(copy, copy_observed);
                }
                None => {
                    let copy = card.buyer_copy(tx.fresh_card_id(), buyer, quantity, tx.now());
                    tx.insert_first_copy(copy, &card);
                }
            }

            let purchase_id = tx.push_purchase(buyer, listing_id);
            tx.push_notification(
                seller,
                format!("{} copies of your card \"{}\" were sold.", quantity, card.name),
            );
            tx.push_notification(
                buyer,
                format!(
                    "Successfully purchased {} copies of \"{}\".",
                    quantity, card.name
                ),
            );

            Ok(PurchaseOutcome {
                purchase_id,
                card_name: card.name,
                quantity,
                total_price,
                remaining_balance,
            })
        })?;
        info!(
            buyer = %buyer,
            listing = %listing_id,
            quantity,
            total_price = outcome.total_price,
            "purchase settled"
        );
        Ok(outcome)
    }

    // =========================================================================
    // Exchange negotiation
    // =========================================================================

    /// Proposes trading an owned card for the card behind a listing.
    ///
    /// # Errors
    ///
    /// - [`MarketError::NotFound`] - listing or offered card is absent.
    /// - [`MarketError::SelfTrade`] - proposing against one's own listing.
    /// - [`MarketError::NotOwned`] - offered card belongs to someone else.
    /// - [`MarketError::AlreadyInNegotiation`] - offered card already has
    ///   a live exchange.
    pub fn propose_exchange(
        &self,
        requester: UserId,
        listing_id: ListingId,
        offered_card_id: CardId,
        description: Option<String>,
    ) -> Result<ExchangeSummary, MarketError> {
        let summary = self.store.transaction(|tx| {
            let listing = tx.listing(listing_id)?;
            if listing.seller_id == requester {
                return Err(MarketError::SelfTrade);
            }
            let offered = tx.card(offered_card_id)?;
            if offered.owner_id != requester {
                return Err(MarketError::NotOwned);
            }
            if tx.has_live_exchange_for(offered_card_id) {
                return Err(MarketError::AlreadyInNegotiation);
            }

            let id = tx.fresh_exchange_id();
            let exchange = Exchange::new(
                id,
                requester,
                offered_card_id,
                listing.card_id,
                description.clone(),
                tx.now(),
            );
            let created_at = exchange.created_at;
            tx.insert_exchange(exchange);

            tx.push_notification(
                listing.seller_id,
                format!(
                    "New exchange proposal: \"{}\" was offered for your listed card.",
                    offered.name
                ),
            );

            Ok(ExchangeSummary {
                exchange_id: id,
                offered_card: OfferedCardView::from_card(&offered),
                requester_nickname: tx.nickname(requester)?,
                description,
                status: ExchangeStatus::Requested,
                created_at,
            })
        })?;
        info!(
            exchange = %summary.exchange_id,
            requester = %requester,
            listing = %listing_id,
            "exchange proposed"
        );
        Ok(summary)
    }

    /// Accepts an exchange targeting the caller's listing.
    ///
    /// The offered card changes owner; no points move. Only the
    /// listing's seller may accept.
    pub fn accept_exchange(
        &self,
        seller: UserId,
        listing_id: ListingId,
        exchange_id: ExchangeId,
    ) -> Result<ExchangeSummary, MarketError> {
        let summary = self.store.transaction(|tx| {
            let listing = tx.listing(listing_id)?;
            if listing.seller_id != seller {
                return Err(MarketError::Forbidden);
            }
            let mut exchange = tx.requested_exchange(exchange_id, listing.card_id)?;
            let observed = exchange.clone();
            exchange.accept(tx.now())?;
            let requester = exchange.requester_id;
            let offered_card_id = exchange.offered_card_id;
            let description = exchange.description.clone();
            let created_at = exchange.created_at;
            tx.stage_exchange(exchange, observed);

            // The consideration actually exchanged: the offered card
            // moves to the seller, guarded on the row as observed.
            let mut offered = tx.card(offered_card_id)?;
            let view = OfferedCardView::from_card(&offered);
            let card_observed = offered.clone();
            if offered.owner_id != requester {
                return Err(MarketError::Conflict);
            }
            offered.transfer_to(seller, tx.now());
            tx.stage_card(offered, card_observed);

            tx.push_notification(
                requester,
                format!("Your exchange proposal for \"{}\" was accepted.", view.name),
            );

            Ok(ExchangeSummary {
                exchange_id,
                offered_card: view,
                requester_nickname: tx.nickname(requester)?,
                description,
                status: ExchangeStatus::Accepted,
                created_at,
            })
        })?;
        info!(exchange = %exchange_id, seller = %seller, "exchange accepted");
        Ok(summary)
    }

    /// Rejects an exchange targeting the caller's listing.
    ///
    /// Same authorization as accept; no ownership change.
    pub fn reject_exchange(
        &self,
        seller: UserId,
        listing_id: ListingId,
        exchange_id: ExchangeId,
    ) -> Result<ExchangeSummary, MarketError> {
        let summary = self.store.transaction(|tx| {
            let listing = tx.listing(listing_id)?;
            if listing.seller_id != seller {
                return Err(MarketError::Forbidden);
            }
            let mut exchange = tx.requested_exchange(exchange_id, listing.card_id)?;
            let observed = exchange.clone();
            exchange.reject(tx.now())?;
            let requester = exchange.requester_id;
            let description = exchange.description.clone();
            let created_at = exchange.created_at;
            let offered = tx.card(exchange.offered_card_id)?;
            tx.stage_exchange(exchange, observed);

            tx.push_notification(
                requester,
                format!("Your exchange proposal for \"{}\" was declined.", offered.name),
            );

            Ok(ExchangeSummary {
                exchange_id,
                offered_card: OfferedCardView::from_card(&offered),
                requester_nickname: tx.nickname(requester)?,
                description,
                status: ExchangeStatus::Rejected,
                created_at,
            })
        })?;
        info!(exchange = %exchange_id, seller = %seller, "exchange rejected");
        Ok(summary)
    }

    /// Cancels the caller's own pending exchange.
    pub fn cancel_exchange(
        &self,
        requester: UserId,
        listing_id: ListingId,
        exchange_id: ExchangeId,
    ) -> Result<ExchangeSummary, MarketError> {
        let summary = self.store.transaction(|tx| {
            let listing = tx.listing(listing_id)?;
            let mut exchange = tx.requested_exchange(exchange_id, listing.card_id)?;
            if exchange.requester_id != requester {
                return Err(MarketError::Forbidden);
            }
            let observed = exchange.clone();
            exchange.cancel(tx.now())?;
            let description = exchange.description.clone();
            let created_at = exchange.created_at;
            let offered = tx.card(exchange.offered_card_id)?;
            tx.stage_exchange(exchange, observed);

            tx.push_notification(
                listing.seller_id,
                format!("The exchange proposal offering \"{}\" was withdrawn.", offered.name),
            );

            Ok(ExchangeSummary {
                exchange_id,
                offered_card: OfferedCardView::from_card(&offered),
                requester_nickname: tx.nickname(requester)?,
                description,
                status: ExchangeStatus::Cancelled,
                created_at,
            })
        })?;
        info!(exchange = %exchange_id, requester = %requester, "exchange cancelled");
        Ok(summary)
    }

    // =========================================================================
    // Point ledger
    // =========================================================================

    /// Opens a random point box and credits the reward.
    ///
    /// The reward comes from the fixed distribution in [`crate::draw`].
    /// One unit appends the DRAW history row and applies the guarded
    /// credit; the returned timestamp becomes the new last draw time.
    pub fn draw_point_box(&self, user: UserId) -> Result<DrawOutcome, MarketError> {
        let roll = self.random.roll();
        let points = draw::pick(roll);
        let outcome = self.store.transaction(|tx| {
            let mut point = tx.point(user)?;
            let observed = point.clone();
            tx.push_history(user, points, PointType::Draw);
            point.credit(points, self.config.max_balance)?;
            tx.stage_point(point, observed);
            Ok(DrawOutcome {
                points,
                last_draw_time: tx.now(),
            })
        })?;
        debug!(user = %user, points, "point box drawn");
        Ok(outcome)
    }

    /// Most recent draw timestamp, or `None` for a user who never drew.
    pub fn last_draw_time(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.store.last_draw_time(user)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn profile(&self, user: UserId) -> Option<Profile> {
        self.store.profile(user)
    }

    pub fn point_balance(&self, user: UserId) -> Option<i64> {
        self.store.point(user).map(|p| p.balance)
    }

    pub fn card(&self, id: CardId) -> Option<Card> {
        self.store.card(id)
    }

    pub fn cards_owned_by(&self, user: UserId) -> Vec<Card> {
        self.store.cards_owned_by(user)
    }

    pub fn listing(&self, id: ListingId) -> Option<Listing> {
        self.store.listing(id)
    }

    pub fn exchange(&self, id: ExchangeId) -> Option<Exchange> {
        self.store.exchange(id)
    }

    pub fn purchases_by(&self, buyer: UserId) -> Vec<Purchase> {
        self.store.purchases_by(buyer)
    }

    pub fn point_history(&self, user: UserId) -> Vec<PointHistory> {
        self.store.history_for(user)
    }

    /// Stored notifications for a user, newest first.
    pub fn notifications_for(&self, user: UserId) -> Vec<Notification> {
        self.store.notifications_for(user)
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> Result<(), MarketError> {
        self.store.mark_notification_read(id)
    }

    /// Drains committed, undelivered notifications for the delivery layer.
    pub fn pending_deliveries(&self) -> Vec<Delivery> {
        self.store.outbox().drain()
    }
}

impl Default for Marketplace {
    fn default() -> Self {
        Self::new()
    }
}
