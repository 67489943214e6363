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

use cardtrade_rs::{
    CardGenre, CardGrade, CardId, CardSpec, ExchangeId, ExchangePrefs, ListingId, Marketplace,
    UserId,
};
use clap::Parser;
use csv::{ReaderBuilder, Trim, Writer};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufReader, Read, Write};
use std::path::PathBuf;
use std::process;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Marketplace replay - process operation CSV files
///
/// Reads marketplace operations from a CSV file, applies them in order,
/// and writes final point balances to stdout. Record ids (users, cards,
/// listings, exchanges) are assigned sequentially starting at 1 per record
/// type, in the order the creating rows appear.
#[derive(Parser, Debug)]
#[command(name = "cardtrade-rs")]
#[command(about = "A marketplace engine that replays operation CSVs", long_about = None)]
struct Args {
    /// Path to CSV file with operations
    ///
    /// Expected format: op,user,listing,card,exchange,quantity,price,name
    /// Example: cargo run -- scenario.csv > balances.csv
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let file = match File::open(&args.input) {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Error opening file '{}': {}", args.input.display(), e);
            process::exit(1);
        }
    };

    let (market, users) = match replay_operations(BufReader::new(file)) {
        Ok(pair) => pair,
        Err(e) => {
            eprintln!("Error processing operations: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = write_balances(&market, &users, std::io::stdout()) {
        eprintln!("Error writing output: {}", e);
        process::exit(1);
    }
}

/// Raw CSV record matching the input format.
///
/// Fields: `op, user, listing, card, exchange, quantity, price, name`
#[derive(Debug, Deserialize)]
struct CsvRecord {
    op: String,
    user: Option<u32>,
    listing: Option<u32>,
    card: Option<u32>,
    exchange: Option<u32>,
    quantity: Option<u32>,
    price: Option<i64>,
    name: Option<String>,
}

impl CsvRecord {
    fn user(&self) -> Result<UserId, String> {
        self.user.map(UserId).ok_or_else(|| "missing user".into())
    }

    fn listing(&self) -> Result<ListingId, String> {
        self.listing.map(ListingId).ok_or_else(|| "missing listing".into())
    }

    fn card(&self) -> Result<CardId, String> {
        self.card.map(CardId).ok_or_else(|| "missing card".into())
    }

    fn exchange(&self) -> Result<ExchangeId, String> {
        self.exchange.map(ExchangeId).ok_or_else(|| "missing exchange".into())
    }
}

/// Applies every operation row against a fresh marketplace.
///
/// Domain failures (insufficient stock, conflicts, ...) are logged and
/// skipped so one bad row does not poison the replay; malformed rows
/// abort.
fn replay_operations<R: Read>(reader: R) -> Result<(Marketplace, Vec<UserId>), Box<dyn std::error::Error>> {
    let market = Marketplace::new();
    let mut users = Vec::new();

    let mut csv_reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(reader);

    for (line, result) in csv_reader.deserialize::<CsvRecord>().enumerate() {
        let record = result?;
        match apply(&market, &mut users, &record) {
            Ok(()) => {}
            Err(e) => warn!(line = line + 2, op = %record.op, error = %e, "operation skipped"),
        }
    }

    Ok((market, users))
}

fn apply(
    market: &Marketplace,
    users: &mut Vec<UserId>,
    record: &CsvRecord,
) -> Result<(), String> {
    match record.op.as_str() {
        "register" => {
            let name = record.name.as_deref().ok_or("missing name")?;
            let balance = record.price.unwrap_or(0);
            let id = market.register_user(name, balance).map_err(|e| e.to_string())?;
            users.push(id);
        }
        "mint" => {
            let owner = record.user()?;
            let spec = CardSpec {
                name: record.name.clone().ok_or("missing name")?,
                price: record.price.unwrap_or(0),
                grade: CardGrade::Common,
                genre: CardGenre::Travel,
                description: String::new(),
                quantity: record.quantity.unwrap_or(1),
                image_url: String::new(),
            };
            market.mint_card(owner, spec).map_err(|e| e.to_string())?;
        }
        "list" => {
            market
                .list_card(
                    record.user()?,
                    record.card()?,
                    record.price.unwrap_or(0),
                    record.quantity.unwrap_or(1),
                    ExchangePrefs::default(),
                )
                .map_err(|e| e.to_string())?;
        }
        "purchase" => {
            market
                .purchase(record.user()?, record.listing()?, record.quantity.unwrap_or(1))
                .map_err(|e| e.to_string())?;
        }
        "propose" => {
            market
                .propose_exchange(record.user()?, record.listing()?, record.card()?, None)
                .map_err(|e| e.to_string())?;
        }
        "accept" => {
            market
                .accept_exchange(record.user()?, record.listing()?, record.exchange()?)
                .map_err(|e| e.to_string())?;
        }
        "reject" => {
            market
                .reject_exchange(record.user()?, record.listing()?, record.exchange()?)
                .map_err(|e| e.to_string())?;
        }
        "cancel" => {
            market
                .cancel_exchange(record.user()?, record.listing()?, record.exchange()?)
                .map_err(|e| e.to_string())?;
        }
        "draw" => {
            market.draw_point_box(record.user()?).map_err(|e| e.to_string())?;
        }
        other => return Err(format!("unknown operation '{other}'")),
    }
    Ok(())
}

/// Writes final balances as CSV: `user,nickname,balance`.
fn write_balances<W: Write>(
    market: &Marketplace,
    users: &[UserId],
    writer: W,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut csv_writer = Writer::from_writer(writer);
    csv_writer.write_record(["user", "nickname", "balance"])?;
    for user in users {
        let nickname = market
            .profile(*user)
            .map(|p| p.nickname)
            .unwrap_or_else(|| "Unknown".to_owned());
        let balance = market.point_balance(*user).unwrap_or(0);
        csv_writer.write_record([user.to_string(), nickname, balance.to_string()])?;
    }
    csv_writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replay_settles_a_purchase() {
        let input = "\
op,user,listing,card,exchange,quantity,price,name
register,,,,,,0,seller
register,,,,,,1000,buyer
mint,1,,,,5,100,Pier at dusk
list,1,,1,,5,100,
purchase,2,1,,,3,,
";
        let (market, users) = replay_operations(input.as_bytes()).unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(market.point_balance(users[0]), Some(300));
        assert_eq!(market.point_balance(users[1]), Some(700));
    }

    #[test]
    fn replay_skips_failing_rows() {
        let input = "\
op,user,listing,card,exchange,quantity,price,name
register,,,,,,100,alice
purchase,1,999,,,1,,
";
        let (market, users) = replay_operations(input.as_bytes()).unwrap();
        assert_eq!(market.point_balance(users[0]), Some(100));
    }

    #[test]
    fn balances_render_as_csv() {
        let input = "\
op,user,listing,card,exchange,quantity,price,name
register,,,,,,250,alice
";
        let (market, users) = replay_operations(input.as_bytes()).unwrap();
        let mut out = Vec::new();
        write_balances(&market, &users, &mut out).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("user,nickname,balance"));
        assert!(text.contains("1,alice,250"));
    }
}
