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

//! Purchase settlement integration tests.

use cardtrade_rs::{
    CardGenre, CardGrade, CardId, CardSpec, ExchangePrefs, ListingId, MarketConfig, MarketError,
    Marketplace, PointType, ThreadRngSource, UserId,
};

fn sample_spec(name: &str, price: i64, quantity: u32) -> CardSpec {
    CardSpec {
        name: name.to_owned(),
        price,
        grade: CardGrade::Rare,
        genre: CardGenre::Travel,
        description: "A photo card".to_owned(),
        quantity,
        image_url: "https://example.com/card.jpg".to_owned(),
    }
}

fn mint_and_list(
    market: &Marketplace,
    seller: UserId,
    name: &str,
    price: i64,
    quantity: u32,
) -> (CardId, ListingId) {
    let card = market
        .mint_card(seller, sample_spec(name, price, quantity))
        .unwrap();
    let listing = market
        .list_card(seller, card, price, quantity, ExchangePrefs::default())
        .unwrap();
    (card, listing)
}

#[test]
fn purchase_moves_points_and_stock() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let outcome = market.purchase(buyer, listing, 3).unwrap();
    assert_eq!(outcome.quantity, 3);
    assert_eq!(outcome.total_price, 300);
    assert_eq!(outcome.remaining_balance, 700);
    assert_eq!(outcome.card_name, "Pier at dusk");

    assert_eq!(market.point_balance(buyer), Some(700));
    assert_eq!(market.point_balance(seller), Some(300));
    assert_eq!(market.listing(listing).unwrap().remaining_quantity, 2);
}

#[test]
fn purchase_creates_buyer_copy() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (card, listing) = mint_and_list(&market, seller, "Old harbor", 100, 5);

    market.purchase(buyer, listing, 3).unwrap();

    let owned = market.cards_owned_by(buyer);
    assert_eq!(owned.len(), 1);
    assert_ne!(owned[0].id, card);
    assert_eq!(owned[0].name, "Old harbor");
    assert_eq!(owned[0].total_quantity, 3);
    assert_eq!(owned[0].remaining_quantity, 3);
}

#[test]
fn repeat_purchase_merges_into_existing_copy() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Old harbor", 100, 5);

    market.purchase(buyer, listing, 2).unwrap();
    market.purchase(buyer, listing, 1).unwrap();

    // Second purchase increments the copy instead of adding a row.
    let owned = market.cards_owned_by(buyer);
    assert_eq!(owned.len(), 1);
    assert_eq!(owned[0].total_quantity, 3);
}

#[test]
fn seller_card_stock_decreases_with_sales() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (card, listing) = mint_and_list(&market, seller, "Blue door", 100, 5);

    // Listing all five copies reserves the full remaining quantity.
    assert_eq!(market.card(card).unwrap().remaining_quantity, 0);
    assert_eq!(market.card(card).unwrap().total_quantity, 5);

    market.purchase(buyer, listing, 3).unwrap();
    let after = market.card(card).unwrap();
    assert_eq!(after.total_quantity, 2);
    assert_eq!(after.remaining_quantity, 0);
}

#[test]
fn purchase_writes_mirrored_history_rows() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    market.purchase(buyer, listing, 3).unwrap();

    let buyer_rows: Vec<_> = market
        .point_history(buyer)
        .into_iter()
        .filter(|h| h.point_type == PointType::Purchase)
        .collect();
    let seller_rows: Vec<_> = market
        .point_history(seller)
        .into_iter()
        .filter(|h| h.point_type == PointType::Purchase)
        .collect();
    assert_eq!(buyer_rows.len(), 1);
    assert_eq!(seller_rows.len(), 1);
    assert_eq!(buyer_rows[0].points, -300);
    assert_eq!(seller_rows[0].points, 300);
    assert_eq!(buyer_rows[0].points + seller_rows[0].points, 0);
}

#[test]
fn purchase_notifies_both_parties() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    market.purchase(buyer, listing, 3).unwrap();

    let seller_inbox = market.notifications_for(seller);
    let buyer_inbox = market.notifications_for(buyer);
    assert_eq!(seller_inbox.len(), 1);
    assert_eq!(buyer_inbox.len(), 1);
    assert!(seller_inbox[0].content.contains("Pier at dusk"));
    assert!(!seller_inbox[0].is_read);

    let deliveries = market.pending_deliveries();
    assert_eq!(deliveries.len(), 2);
}

#[test]
fn purchase_records_receipt() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let outcome = market.purchase(buyer, listing, 3).unwrap();

    let receipts = market.purchases_by(buyer);
    assert_eq!(receipts.len(), 1);
    assert_eq!(receipts[0].id, outcome.purchase_id);
    assert_eq!(receipts[0].listing_id, listing);
    assert_eq!(receipts[0].buyer_id, buyer);
}

#[test]
fn buying_own_listing_is_rejected() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let result = market.purchase(seller, listing, 1);
    assert_eq!(result, Err(MarketError::SelfTrade));
    assert_eq!(market.point_balance(seller), Some(1000));
}

#[test]
fn purchase_beyond_stock_fails() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 10_000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let result = market.purchase(buyer, listing, 6);
    assert_eq!(result, Err(MarketError::InsufficientStock));
    assert_eq!(market.listing(listing).unwrap().remaining_quantity, 5);
}

#[test]
fn purchase_beyond_balance_fails_and_rolls_back() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 250).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let result = market.purchase(buyer, listing, 3);
    assert_eq!(result, Err(MarketError::InsufficientBalance));

    // Nothing moved.
    assert_eq!(market.point_balance(buyer), Some(250));
    assert_eq!(market.point_balance(seller), Some(0));
    assert_eq!(market.listing(listing).unwrap().remaining_quantity, 5);
    assert!(market.purchases_by(buyer).is_empty());
    assert!(market.pending_deliveries().is_empty());
}

#[test]
fn zero_quantity_purchase_is_rejected() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    assert_eq!(
        market.purchase(buyer, listing, 0),
        Err(MarketError::InvalidQuantity)
    );
}

#[test]
fn unknown_listing_is_not_found() {
    let market = Marketplace::new();
    let buyer = market.register_user("buyer", 1000).unwrap();

    assert_eq!(
        market.purchase(buyer, ListingId(999), 1),
        Err(MarketError::NotFound)
    );
}

#[test]
fn exhausted_listing_stops_selling() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let buyer = market.register_user("buyer", 1000).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 2);

    market.purchase(buyer, listing, 2).unwrap();
    assert!(market.listing(listing).unwrap().is_sold_out());

    let other = market.register_user("other", 1000).unwrap();
    assert_eq!(
        market.purchase(other, listing, 1),
        Err(MarketError::InsufficientStock)
    );
}

#[test]
fn seller_at_balance_cap_aborts_the_sale() {
    let config = MarketConfig { max_balance: 1000 };
    let market = Marketplace::with_parts(config, Box::new(ThreadRngSource));
    let seller = market.register_user("seller", 950).unwrap();
    let buyer = market.register_user("buyer", 500).unwrap();
    let (_, listing) = mint_and_list(&market, seller, "Pier at dusk", 100, 5);

    let result = market.purchase(buyer, listing, 1);
    assert_eq!(result, Err(MarketError::BalanceLimit));
    assert_eq!(market.point_balance(buyer), Some(500));
    assert_eq!(market.point_balance(seller), Some(950));
}

#[test]
fn duplicate_nickname_is_rejected() {
    let market = Marketplace::new();
    market.register_user("alice", 100).unwrap();
    assert_eq!(
        market.register_user("alice", 100),
        Err(MarketError::NicknameTaken)
    );
}

#[test]
fn negative_starting_balance_is_rejected() {
    let market = Marketplace::new();
    assert_eq!(
        market.register_user("alice", -1),
        Err(MarketError::InvalidAmount)
    );
}

#[test]
fn registration_writes_join_history() {
    let market = Marketplace::new();
    let user = market.register_user("alice", 500).unwrap();

    let history = market.point_history(user);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].points, 500);
    assert_eq!(history[0].point_type, PointType::Join);
    assert_eq!(market.point_balance(user), Some(500));
}

#[test]
fn listing_twice_is_rejected() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let card = market
        .mint_card(seller, sample_spec("Pier at dusk", 100, 10))
        .unwrap();
    market
        .list_card(seller, card, 100, 5, ExchangePrefs::default())
        .unwrap();

    let result = market.list_card(seller, card, 100, 5, ExchangePrefs::default());
    assert_eq!(result, Err(MarketError::AlreadyListed));
}

#[test]
fn non_positive_listing_price_is_rejected() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let card = market
        .mint_card(seller, sample_spec("Pier at dusk", 100, 5))
        .unwrap();

    let result = market.list_card(seller, card, 0, 5, ExchangePrefs::default());
    assert_eq!(result, Err(MarketError::InvalidAmount));
}

#[test]
fn listing_someone_elses_card_is_rejected() {
    let market = Marketplace::new();
    let owner = market.register_user("owner", 0).unwrap();
    let other = market.register_user("other", 0).unwrap();
    let card = market
        .mint_card(owner, sample_spec("Pier at dusk", 100, 5))
        .unwrap();

    let result = market.list_card(other, card, 100, 5, ExchangePrefs::default());
    assert_eq!(result, Err(MarketError::NotOwned));
}

#[test]
fn listing_beyond_owned_stock_is_rejected() {
    let market = Marketplace::new();
    let seller = market.register_user("seller", 0).unwrap();
    let card = market
        .mint_card(seller, sample_spec("Pier at dusk", 100, 3))
        .unwrap();

    let result = market.list_card(seller, card, 100, 4, ExchangePrefs::default());
    assert_eq!(result, Err(MarketError::InsufficientStock));
}
