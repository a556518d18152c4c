//! # Seed Data Generator
//!
//! Populates the database with test products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 products (default) into ./stockbook.db
//! cargo run -p stockbook-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p stockbook-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p stockbook-db --bin seed -- --db ./data/stockbook.db
//! ```
//!
//! Each product gets a deterministic-ish price ($0.99 - $19.99) and stock
//! (0 - 100) derived from its index, so reseeding is reproducible.

use chrono::Utc;
use std::env;
use stockbook_core::Product;
use stockbook_db::{Database, DbConfig};
use uuid::Uuid;

/// Product nouns for readable test data.
const NOUNS: &[&str] = &[
    "Notebook", "Stapler", "Monitor", "Keyboard", "Mouse", "Desk Lamp", "Cable", "Adapter",
    "Charger", "Headset", "Webcam", "Dock", "Printer Paper", "Ink Cartridge", "Whiteboard",
    "Marker", "Envelope", "Folder", "Binder", "Label Roll",
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let count = arg_value(&args, "--count")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(200);
    let db_path = arg_value(&args, "--db").unwrap_or_else(|| "./stockbook.db".to_string());

    tracing::info!(count, db = %db_path, "Seeding products");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let products = db.products();

    let now = Utc::now();
    for i in 0..count {
        let noun = NOUNS[i % NOUNS.len()];
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: format!("{} #{}", noun, i + 1),
            description: None,
            // $0.99 .. $19.99 in 25-cent steps
            unit_price_cents: 99 + ((i as i64 * 25) % 1900),
            // 0 .. 100 units
            quantity_on_hand: (i as i64 * 7) % 101,
            created_at: now,
            updated_at: now,
        };
        products.insert(&product).await?;
    }

    let total = products.count().await?;
    tracing::info!(total, "Seed complete");

    db.close().await;
    Ok(())
}

/// Returns the value following a `--flag` argument, if present.
fn arg_value(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}
