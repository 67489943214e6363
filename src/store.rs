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

//! The transactional unit and optimistic concurrency guard.
//!
//! [`Store`] owns all committed marketplace state behind a single
//! [`RwLock`]. [`Store::transaction`] hands the closure a [`Tx`] that
//! reads committed state (overlaid with the transaction's own staged
//! writes) and stages every mutation. Nothing touches the committed
//! ledger until commit, which re-validates every recorded guard under
//! the write lock and applies all staged writes in one critical section.
//!
//! A guard records the full row a staged write observed. Staged writes
//! replace whole rows, so the guard must cover every field: if any part
//! of the row changed between the read and the commit, the whole unit
//! aborts with [`MarketError::Conflict`] and no write survives. Nothing
//! retries automatically; callers re-invoke the operation with fresh
//! reads.

use crate::base::{
    CardId, ExchangeId, HistoryId, ListingId, NotificationId, Profile, PurchaseId, UserId,
};
use crate::card::Card;
use crate::error::MarketError;
use crate::exchange::{Exchange, ExchangeStatus};
use crate::listing::{Listing, Purchase};
use crate::notification::{Notification, NotificationOutbox};
use crate::point::{Point, PointHistory, PointType};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Committed marketplace state.
#[derive(Debug, Default)]
struct Ledger {
    profiles: HashMap<UserId, Profile>,
    cards: HashMap<CardId, Card>,
    listings: HashMap<ListingId, Listing>,
    points: HashMap<UserId, Point>,
    exchanges: HashMap<ExchangeId, Exchange>,
    purchases: Vec<Purchase>,
    history: Vec<PointHistory>,
    notifications: Vec<Notification>,
}

impl Ledger {
    fn has_live_exchange_for(&self, card: CardId) -> bool {
        self.exchanges
            .values()
            .any(|e| e.offered_card_id == card && e.is_live())
    }

    fn has_active_listing_for(&self, card: CardId) -> bool {
        self.listings
            .values()
            .any(|l| l.card_id == card && !l.is_sold_out())
    }

    fn nickname_taken(&self, nickname: &str) -> bool {
        self.profiles.values().any(|p| p.nickname == nickname)
    }
}

/// Precondition re-checked at commit time.
///
/// Row guards carry the full row as observed; staged writes replace
/// whole rows, so any committed change to the row (owner, stock,
/// status, timestamps) invalidates the snapshot. The remaining variants
/// guard preconditions on rows the unit does not rewrite.
#[derive(Debug, Clone, PartialEq)]
enum Guard {
    PointRow { observed: Point },
    ListingRow { observed: Listing },
    CardRow { observed: Card },
    ExchangeRow { observed: Exchange },
    CardOwner { card: CardId, observed: UserId },
    NoLiveExchangeFor { card: CardId },
    NoActiveListingFor { card: CardId },
    NicknameFree { nickname: String },
    NoOwnedCopyOf { owner: UserId, template: Card },
}

impl Guard {
    fn holds(&self, ledger: &Ledger) -> bool {
        match self {
            Guard::PointRow { observed } => {
                ledger.points.get(&observed.user_id) == Some(observed)
            }
            Guard::ListingRow { observed } => {
                ledger.listings.get(&observed.id) == Some(observed)
            }
            Guard::CardRow { observed } => ledger.cards.get(&observed.id) == Some(observed),
            Guard::ExchangeRow { observed } => {
                ledger.exchanges.get(&observed.id) == Some(observed)
            }
            Guard::CardOwner { card, observed } => {
                ledger.cards.get(card).is_some_and(|c| c.owner_id == *observed)
            }
            Guard::NoLiveExchangeFor { card } => !ledger.has_live_exchange_for(*card),
            Guard::NoActiveListingFor { card } => !ledger.has_active_listing_for(*card),
            Guard::NicknameFree { nickname } => !ledger.nickname_taken(nickname),
            Guard::NoOwnedCopyOf { owner, template } => !ledger
                .cards
                .values()
                .any(|c| c.owner_id == *owner && template.same_card_as(c)),
        }
    }
}

/// Writes staged by one transactional unit.
#[derive(Debug, Default)]
struct Staged {
    profiles: HashMap<UserId, Profile>,
    cards: HashMap<CardId, Card>,
    listings: HashMap<ListingId, Listing>,
    points: HashMap<UserId, Point>,
    exchanges: HashMap<ExchangeId, Exchange>,
    purchases: Vec<Purchase>,
    history: Vec<PointHistory>,
    notifications: Vec<Notification>,
}

/// Per-record-type id sequences, all starting at 1.
#[derive(Debug, Default)]
struct IdSequences {
    users: AtomicU32,
    cards: AtomicU32,
    listings: AtomicU32,
    exchanges: AtomicU32,
    purchases: AtomicU32,
    history: AtomicU32,
    notifications: AtomicU32,
}

impl IdSequences {
    fn next(counter: &AtomicU32) -> u32 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }
}

/// All marketplace records plus the notification outbox.
#[derive(Debug, Default)]
pub struct Store {
    ledger: RwLock<Ledger>,
    outbox: NotificationOutbox,
    ids: IdSequences,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` as one atomic, isolated unit.
    ///
    /// Any error from `f` discards every staged write. On success the
    /// unit commits, which may itself fail with
    /// [`MarketError::Conflict`] if a guarded field moved underneath it.
    pub fn transaction<T>(
        &self,
        f: impl FnOnce(&mut Tx<'_>) -> Result<T, MarketError>,
    ) -> Result<T, MarketError> {
        let mut tx = Tx {
            store: self,
            staged: Staged::default(),
            guards: Vec::new(),
            now: Utc::now(),
        };
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub fn outbox(&self) -> &NotificationOutbox {
        &self.outbox
    }

    // === Committed-state queries (outside any transactional unit) ===

    pub fn profile(&self, user: UserId) -> Option<Profile> {
        self.ledger.read().profiles.get(&user).cloned()
    }

    pub fn point(&self, user: UserId) -> Option<Point> {
        self.ledger.read().points.get(&user).cloned()
    }

    pub fn card(&self, id: CardId) -> Option<Card> {
        self.ledger.read().cards.get(&id).cloned()
    }

    pub fn cards_owned_by(&self, user: UserId) -> Vec<Card> {
        let mut cards: Vec<Card> = self
            .ledger
            .read()
            .cards
            .values()
            .filter(|c| c.owner_id == user)
            .cloned()
            .collect();
        cards.sort_by_key(|c| c.id);
        cards
    }

    pub fn listing(&self, id: ListingId) -> Option<Listing> {
        self.ledger.read().listings.get(&id).cloned()
    }

    pub fn listings(&self) -> Vec<Listing> {
        let mut listings: Vec<Listing> = self.ledger.read().listings.values().cloned().collect();
        listings.sort_by_key(|l| l.id);
        listings
    }

    pub fn exchange(&self, id: ExchangeId) -> Option<Exchange> {
        self.ledger.read().exchanges.get(&id).cloned()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        let mut exchanges: Vec<Exchange> = self.ledger.read().exchanges.values().cloned().collect();
        exchanges.sort_by_key(|e| e.id);
        exchanges
    }

    pub fn purchases_by(&self, buyer: UserId) -> Vec<Purchase> {
        self.ledger
            .read()
            .purchases
            .iter()
            .filter(|p| p.buyer_id == buyer)
            .cloned()
            .collect()
    }

    pub fn history_for(&self, user: UserId) -> Vec<PointHistory> {
        self.ledger
            .read()
            .history
            .iter()
            .filter(|h| h.user_id == user)
            .cloned()
            .collect()
    }

    /// Timestamp of the most recent DRAW history row, if any.
    ///
    /// History is append-only, so the last matching row is the most
    /// recent one.
    pub fn last_draw_time(&self, user: UserId) -> Option<DateTime<Utc>> {
        self.ledger
            .read()
            .history
            .iter()
            .rev()
            .find(|h| h.user_id == user && h.point_type == PointType::Draw)
            .map(|h| h.created_at)
    }

    /// Notifications for a user, newest first.
    pub fn notifications_for(&self, user: UserId) -> Vec<Notification> {
        let mut rows: Vec<Notification> = self
            .ledger
            .read()
            .notifications
            .iter()
            .filter(|n| n.user_id == user)
            .cloned()
            .collect();
        rows.reverse();
        rows
    }

    pub fn mark_notification_read(&self, id: NotificationId) -> Result<(), MarketError> {
        let mut ledger = self.ledger.write();
        let row = ledger
            .notifications
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or(MarketError::NotFound)?;
        row.is_read = true;
        Ok(())
    }
}

/// Transaction-scoped accessor handed to [`Store::transaction`] closures.
pub struct Tx<'a> {
    store: &'a Store,
    staged: Staged,
    guards: Vec<Guard>,
    now: DateTime<Utc>,
}

impl Tx<'_> {
    /// Timestamp shared by everything this unit creates.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }

    pub fn fresh_card_id(&self) -> CardId {
        CardId(IdSequences::next(&self.store.ids.cards))
    }

    pub fn fresh_listing_id(&self) -> ListingId {
        ListingId(IdSequences::next(&self.store.ids.listings))
    }

    pub fn fresh_exchange_id(&self) -> ExchangeId {
        ExchangeId(IdSequences::next(&self.store.ids.exchanges))
    }

    pub fn fresh_user_id(&self) -> UserId {
        UserId(IdSequences::next(&self.store.ids.users))
    }

    // === Reads (committed state overlaid with this unit's writes) ===

    pub fn point(&self, user: UserId) -> Result<Point, MarketError> {
        if let Some(point) = self.staged.points.get(&user) {
            return Ok(point.clone());
        }
        self.store
            .ledger
            .read()
            .points
            .get(&user)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    pub fn card(&self, id: CardId) -> Result<Card, MarketError> {
        if let Some(card) = self.staged.cards.get(&id) {
            return Ok(card.clone());
        }
        self.store
            .ledger
            .read()
            .cards
            .get(&id)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    pub fn listing(&self, id: ListingId) -> Result<Listing, MarketError> {
        if let Some(listing) = self.staged.listings.get(&id) {
            return Ok(listing.clone());
        }
        self.store
            .ledger
            .read()
            .listings
            .get(&id)
            .cloned()
            .ok_or(MarketError::NotFound)
    }

    pub fn nickname(&self, user: UserId) -> Result<String, MarketError> {
        if let Some(profile) = self.staged.profiles.get(&user) {
            return Ok(profile.nickname.clone());
        }
        self.store
            .ledger
            .read()
            .profiles
            .get(&user)
            .map(|p| p.nickname.clone())
            .ok_or(MarketError::NotFound)
    }

    pub fn profile_exists(&self, user: UserId) -> bool {
        self.staged.profiles.contains_key(&user)
            || self.store.ledger.read().profiles.contains_key(&user)
    }

    pub fn nickname_taken(&self, nickname: &str) -> bool {
        self.staged.profiles.values().any(|p| p.nickname == nickname)
            || self.store.ledger.read().nickname_taken(nickname)
    }

    /// Looks up an exchange that is still open for the given target card.
    ///
    /// Unknown ids, mismatched targets, and already-resolved exchanges
    /// all report `NotFound`; the contract does not distinguish them.
    pub fn requested_exchange(
        &self,
        id: ExchangeId,
        target_card: CardId,
    ) -> Result<Exchange, MarketError> {
        let exchange = if let Some(staged) = self.staged.exchanges.get(&id) {
            staged.clone()
        } else {
            self.store
                .ledger
                .read()
                .exchanges
                .get(&id)
                .cloned()
                .ok_or(MarketError::NotFound)?
        };
        if exchange.target_card_id != target_card || exchange.status != ExchangeStatus::Requested {
            return Err(MarketError::NotFound);
        }
        Ok(exchange)
    }

    /// The buyer's existing copy of a card, matched on identity fields.
    pub fn owned_copy_of(&self, card: &Card, owner: UserId) -> Option<Card> {
        if let Some(copy) = self
            .staged
            .cards
            .values()
            .find(|c| c.owner_id == owner && card.same_card_as(c))
        {
            return Some(copy.clone());
        }
        self.store
            .ledger
            .read()
            .cards
            .values()
            .find(|c| {
                c.owner_id == owner
                    && card.same_card_as(c)
                    && !self.staged.cards.contains_key(&c.id)
            })
            .cloned()
    }

    pub fn has_live_exchange_for(&self, card: CardId) -> bool {
        self.staged
            .exchanges
            .values()
            .any(|e| e.offered_card_id == card && e.is_live())
            || self.store.ledger.read().has_live_exchange_for(card)
    }

    pub fn has_active_listing_for(&self, card: CardId) -> bool {
        self.staged
            .listings
            .values()
            .any(|l| l.card_id == card && !l.is_sold_out())
            || self.store.ledger.read().has_active_listing_for(card)
    }

    // === Guarded writes ===

    /// Stages a point row conditioned on the row as observed.
    pub fn stage_point(&mut self, point: Point, observed: Point) {
        debug_assert_eq!(point.user_id, observed.user_id);
        self.guards.push(Guard::PointRow { observed });
        self.staged.points.insert(point.user_id, point);
    }

    /// Stages a listing row conditioned on the row as observed.
    pub fn stage_listing(&mut self, listing: Listing, observed: Listing) {
        debug_assert_eq!(listing.id, observed.id);
        self.guards.push(Guard::ListingRow { observed });
        self.staged.listings.insert(listing.id, listing);
    }

    /// Stages a card row conditioned on the row as observed.
    ///
    /// The staged row replaces the committed one wholesale, so the guard
    /// covers the full row: a concurrent change to any field, not just
    /// the one this unit mutated, aborts the commit.
    pub fn stage_card(&mut self, card: Card, observed: Card) {
        debug_assert_eq!(card.id, observed.id);
        self.guards.push(Guard::CardRow { observed });
        self.staged.cards.insert(card.id, card);
    }

    /// Stages an exchange row conditioned on the row as observed.
    pub fn stage_exchange(&mut self, exchange: Exchange, observed: Exchange) {
        debug_assert_eq!(exchange.id, observed.id);
        self.guards.push(Guard::ExchangeRow { observed });
        self.staged.exchanges.insert(exchange.id, exchange);
    }

    // === Inserts ===

    /// Inserts a brand-new card row (minting).
    pub fn insert_card(&mut self, card: Card) {
        self.staged.cards.insert(card.id, card);
    }

    /// Inserts the buyer's first copy of a card, guarded against a
    /// concurrent purchase creating the same copy first.
    pub fn insert_first_copy(&mut self, copy: Card, original: &Card) {
        self.guards.push(Guard::NoOwnedCopyOf {
            owner: copy.owner_id,
            template: original.clone(),
        });
        self.staged.cards.insert(copy.id, copy);
    }

    /// Inserts a new exchange, guarded against a concurrent proposal for
    /// the same offered card and against the card changing hands.
    pub fn insert_exchange(&mut self, exchange: Exchange) {
        self.guards.push(Guard::NoLiveExchangeFor {
            card: exchange.offered_card_id,
        });
        self.guards.push(Guard::CardOwner {
            card: exchange.offered_card_id,
            observed: exchange.requester_id,
        });
        self.staged.exchanges.insert(exchange.id, exchange);
    }

    /// Inserts a new listing, guarded against a concurrent listing of the
    /// same card.
    pub fn insert_listing(&mut self, listing: Listing) {
        self.guards.push(Guard::NoActiveListingFor { card: listing.card_id });
        self.staged.listings.insert(listing.id, listing);
    }

    /// Inserts a new profile, guarded against a concurrent registration
    /// taking the nickname.
    pub fn insert_profile(&mut self, profile: Profile) {
        self.guards.push(Guard::NicknameFree {
            nickname: profile.nickname.clone(),
        });
        self.staged.profiles.insert(profile.id, profile);
    }

    /// Inserts a fresh point row (registration only).
    pub fn insert_point(&mut self, point: Point) {
        self.staged.points.insert(point.user_id, point);
    }

    // === Appends ===

    pub fn push_history(&mut self, user: UserId, points: i64, point_type: PointType) {
        let id = HistoryId(IdSequences::next(&self.store.ids.history));
        self.staged.history.push(PointHistory {
            id,
            user_id: user,
            points,
            point_type,
            created_at: self.now,
        });
    }

    pub fn push_purchase(&mut self, buyer: UserId, listing: ListingId) -> PurchaseId {
        let id = PurchaseId(IdSequences::next(&self.store.ids.purchases));
        self.staged.purchases.push(Purchase {
            id,
            buyer_id: buyer,
            listing_id: listing,
            created_at: self.now,
        });
        id
    }

    pub fn push_notification(&mut self, user: UserId, content: String) {
        let id = NotificationId(IdSequences::next(&self.store.ids.notifications));
        self.staged
            .notifications
            .push(Notification::new(id, user, content, self.now));
    }

    // === Commit ===

    fn commit(self) -> Result<(), MarketError> {
        let mut ledger = self.store.ledger.write();

        for guard in &self.guards {
            if !guard.holds(&ledger) {
                return Err(MarketError::Conflict);
            }
        }

        let Staged {
            profiles,
            cards,
            listings,
            points,
            exchanges,
            purchases,
            history,
            notifications,
        } = self.staged;

        ledger.profiles.extend(profiles);
        ledger.cards.extend(cards);
        ledger.listings.extend(listings);
        ledger.points.extend(points);
        ledger.exchanges.extend(exchanges);
        ledger.purchases.extend(purchases);
        ledger.history.extend(history);
        for notification in notifications {
            self.store.outbox.push(&notification);
            ledger.notifications.push(notification);
        }
        Ok(())
    }
}
