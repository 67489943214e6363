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

//! Browse views over a user's market activity.
//!
//! Sale listings and live exchange offers share one tagged union,
//! discriminated by a `state` field, instead of a class hierarchy. Filter
//! counting is a closed enum dispatched with a `match`, not a runtime
//! factory.

use crate::base::{CardId, UserId};
use crate::card::{CardGenre, CardGrade};
use crate::engine::Marketplace;
use crate::exchange::ExchangeStatus;
use serde::Serialize;
use std::collections::BTreeMap;

/// A card as it appears in a user's market overview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum CardListingView {
    /// A copy offered for points through a shop listing.
    Sale {
        card_id: CardId,
        name: String,
        grade: CardGrade,
        genre: CardGenre,
        price: i64,
        initial_quantity: u32,
        remaining_quantity: u32,
        owner_nickname: String,
    },
    /// A copy offered in a live card-for-card negotiation.
    Exchange {
        card_id: CardId,
        target_card_id: CardId,
        name: String,
        grade: CardGrade,
        genre: CardGenre,
        price: i64,
        owner_nickname: String,
        status: ExchangeStatus,
    },
}

impl CardListingView {
    pub fn grade(&self) -> CardGrade {
        match self {
            CardListingView::Sale { grade, .. } => *grade,
            CardListingView::Exchange { grade, .. } => *grade,
        }
    }

    pub fn genre(&self) -> CardGenre {
        match self {
            CardListingView::Sale { genre, .. } => *genre,
            CardListingView::Exchange { genre, .. } => *genre,
        }
    }
}

/// Which bucket family to count cards by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Grade,
    Genre,
    SalesMethod,
    StockState,
}

fn grade_label(grade: CardGrade) -> &'static str {
    match grade {
        CardGrade::Common => "COMMON",
        CardGrade::Rare => "RARE",
        CardGrade::SuperRare => "SUPER_RARE",
        CardGrade::Legendary => "LEGENDARY",
    }
}

fn genre_label(genre: CardGenre) -> &'static str {
    match genre {
        CardGenre::Travel => "TRAVEL",
        CardGenre::Landscape => "LANDSCAPE",
        CardGenre::Portrait => "PORTRAIT",
        CardGenre::Object => "OBJECT",
    }
}

impl Marketplace {
    /// Everything a user currently has on the market: sale listings plus
    /// live exchange offers, as one tagged list.
    pub fn my_cards(&self, user: UserId) -> Vec<CardListingView> {
        let nickname = self
            .profile(user)
            .map(|p| p.nickname)
            .unwrap_or_else(|| "Unknown".to_owned());

        let mut views = Vec::new();
        for listing in self.store.listings() {
            if listing.seller_id != user {
                continue;
            }
            let Some(card) = self.store.card(listing.card_id) else {
                continue;
            };
            views.push(CardListingView::Sale {
                card_id: card.id,
                name: card.name,
                grade: card.grade,
                genre: card.genre,
                price: listing.price,
                initial_quantity: listing.initial_quantity,
                remaining_quantity: listing.remaining_quantity,
                owner_nickname: nickname.clone(),
            });
        }
        for exchange in self.store.exchanges() {
            if exchange.requester_id != user || !exchange.is_live() {
                continue;
            }
            let Some(card) = self.store.card(exchange.offered_card_id) else {
                continue;
            };
            views.push(CardListingView::Exchange {
                card_id: card.id,
                target_card_id: exchange.target_card_id,
                name: card.name,
                grade: card.grade,
                genre: card.genre,
                price: card.price,
                owner_nickname: nickname.clone(),
                status: exchange.status,
            });
        }
        views
    }

    /// Bucket counts over a user's market activity.
    ///
    /// Grade and genre buckets always list every variant, including
    /// empty ones, so the caller can render a stable filter panel.
    pub fn filter_counts(&self, user: UserId, kind: FilterKind) -> BTreeMap<String, usize> {
        let views = self.my_cards(user);
        let mut counts = BTreeMap::new();
        match kind {
            FilterKind::Grade => {
                for grade in CardGrade::ALL {
                    let n = views.iter().filter(|v| v.grade() == grade).count();
                    counts.insert(grade_label(grade).to_owned(), n);
                }
            }
            FilterKind::Genre => {
                for genre in CardGenre::ALL {
                    let n = views.iter().filter(|v| v.genre() == genre).count();
                    counts.insert(genre_label(genre).to_owned(), n);
                }
            }
            FilterKind::SalesMethod => {
                let sales = views
                    .iter()
                    .filter(|v| matches!(v, CardListingView::Sale { .. }))
                    .count();
                counts.insert("sale".to_owned(), sales);
                counts.insert("exchange".to_owned(), views.len() - sales);
            }
            FilterKind::StockState => {
                let mut in_stock = 0;
                let mut out_of_stock = 0;
                for view in &views {
                    match view {
                        CardListingView::Sale { remaining_quantity, .. } => {
                            if *remaining_quantity > 0 {
                                in_stock += 1;
                            } else {
                                out_of_stock += 1;
                            }
                        }
                        // An offered card is a single live copy.
                        CardListingView::Exchange { .. } => in_stock += 1,
                    }
                }
                counts.insert("inStock".to_owned(), in_stock);
                counts.insert("outOfStock".to_owned(), out_of_stock);
            }
        }
        counts
    }
}
