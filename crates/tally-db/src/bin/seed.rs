//! # Seed Data Generator
//!
//! Populates a database with demo stores, products and a run of daily stock
//! rows, driven through the same movements the ledger uses.
//!
//! ## Usage
//! ```bash
//! cargo run -p tally-db --bin seed
//! cargo run -p tally-db --bin seed -- --db ./data/tally.db --days 14
//! ```
//!
//! Every product gets a row per store per day: opening carried from the prior
//! day, a morning delivery every third day, a few sales, and an evening count
//! that is sometimes short.

use chrono::{Duration, NaiveDate, Utc};
use clap::Parser;
use tally_core::movement::{apply_count, apply_receipt, apply_sale, open_day};
use tally_db::{Database, DbConfig};
use tracing_subscriber::EnvFilter;

const STORES: &[&str] = &["Harbour Café", "Station Kiosk", "Market Hall"];

/// (sku, name, price cents, cost cents)
const PRODUCTS: &[(&str, &str, i64, Option<i64>)] = &[
    ("ESP", "Espresso", 250, Some(60)),
    ("LAT", "Latte", 420, Some(110)),
    ("FLW", "Flat White", 400, Some(105)),
    ("COLA", "Diet Cola", 300, Some(120)),
    ("WAT", "Still Water", 180, Some(40)),
    ("CRS", "Croissant", 280, Some(95)),
    ("BRW", "Brownie", 320, None),
    ("CHP", "Sea Salt Chips", 220, Some(90)),
    ("SAN", "Ham Sandwich", 550, Some(260)),
    ("OJ", "Orange Juice", 350, None),
];

#[derive(Debug, Parser)]
#[command(name = "seed", about = "Tally demo data generator")]
struct Args {
    /// Database file path
    #[arg(short, long, default_value = "./tally_dev.db")]
    db: String,

    /// Number of trading days to generate, ending today
    #[arg(long, default_value_t = 7)]
    days: i64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn")),
        )
        .init();

    let args = Args::parse();
    let days = args.days.clamp(1, 366);

    println!("Tally Seed Data Generator");
    println!("=========================");
    println!("Database: {}", args.db);
    println!("Days:     {}", days);
    println!();

    let db = Database::new(DbConfig::new(&args.db)).await?;

    let existing = db.products().count().await?;
    if existing > 0 {
        println!("Database already has {} products; skipping.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let mut stores = Vec::with_capacity(STORES.len());
    for name in STORES {
        stores.push(db.stores().create(name).await?);
    }

    let mut products = Vec::with_capacity(PRODUCTS.len());
    for (sku, name, price, cost) in PRODUCTS {
        products.push(db.products().create(sku, name, *price, *cost).await?);
    }

    println!("Created {} stores, {} products", stores.len(), products.len());

    let start = std::time::Instant::now();
    let first_day = Utc::now().date_naive() - Duration::days(days - 1);
    let repo = db.stock_entries();
    let mut written = 0usize;

    for (si, store) in stores.iter().enumerate() {
        for (pi, product) in products.iter().enumerate() {
            let mut prior = None;

            for offset in 0..days {
                let date: NaiveDate = first_day + Duration::days(offset);
                let seed = (si * 31 + pi * 7) as i64 + offset * 13;

                let mut entry = open_day(product, store, date, prior.as_ref());

                if offset % 3 == 0 || entry.closing_stock < 10 {
                    entry = apply_receipt(&entry, 20 + seed % 15)?;
                }

                let sold = (seed % 9).min(entry.closing_stock);
                if sold > 0 {
                    entry = apply_sale(&entry, sold)?;
                }

                // roughly one row in five comes up short at the evening count
                let missing = if seed % 5 == 0 { 1 + seed % 3 } else { 0 };
                entry = apply_count(&entry, (entry.closing_stock - missing).max(0))?;
                entry.operator_name = Some(format!("staff-{}", seed % 4 + 1));

                let stored = repo.upsert(&entry).await?;
                prior = Some(stored);
                written += 1;
            }
        }
    }

    println!("Wrote {} stock rows in {:?}", written, start.elapsed());
    println!("Seed complete.");

    Ok(())
}
