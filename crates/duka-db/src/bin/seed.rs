//! # Seed Data Generator
//!
//! Populates the database with test products and credit customers for
//! development.
//!
//! ## Usage
//! ```bash
//! # Seed the default development database
//! cargo run -p duka-db --bin seed
//!
//! # Specify database path
//! cargo run -p duka-db --bin seed -- --db ./data/duka.db
//! ```

use chrono::Utc;
use std::env;
use uuid::Uuid;

use duka_core::{CreditCustomer, Product};
use duka_db::{Database, DbConfig};

/// Catalog for a typical neighbourhood duka. Prices in minor units.
const PRODUCTS: &[(&str, i64, &str)] = &[
    ("Soda 300ml", 250, "Drinks"),
    ("Soda 500ml", 350, "Drinks"),
    ("Drinking Water 1L", 500, "Drinks"),
    ("Fresh Milk 500ml", 600, "Dairy"),
    ("Mala 500ml", 650, "Dairy"),
    ("Bread 400g", 550, "Bakery"),
    ("Bread 800g", 950, "Bakery"),
    ("Maize Flour 2kg", 1550, "Staples"),
    ("Wheat Flour 2kg", 1650, "Staples"),
    ("Rice 1kg", 1800, "Staples"),
    ("Sugar 1kg", 1700, "Staples"),
    ("Cooking Oil 500ml", 1900, "Staples"),
    ("Tea Leaves 250g", 1200, "Beverages"),
    ("Bar Soap", 1500, "Household"),
    ("Washing Powder 500g", 1300, "Household"),
    ("Matches", 100, "Household"),
    ("Kerosene 1L", 1850, "Household"),
    ("Eggs (tray)", 4200, "Farm"),
    ("Salt 500g", 350, "Staples"),
    ("Biscuits", 450, "Snacks"),
];

const CUSTOMERS: &[(&str, &str, i64)] = &[
    ("Wanjiku Kamau", "0712000001", 0),
    ("Otieno Odhiambo", "0722000002", 1500),
    ("Amina Hassan", "0733000003", 0),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = String::from("./duka_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Duka POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./duka_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Duka POS Seed Data Generator");
    println!("===============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.products().list_all().await?;
    if !existing.is_empty() {
        println!("⚠ Database already has {} products", existing.len());
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Seeding products...");
    for (name, price, category) in PRODUCTS {
        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            price: *price,
            category: Some(category.to_string()),
            stock: Some(48),
        };
        db.products().upsert(&product).await?;
    }
    println!("  {} products", PRODUCTS.len());

    println!("Seeding credit customers...");
    for (name, phone, balance) in CUSTOMERS {
        let customer = CreditCustomer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            phone: Some(phone.to_string()),
            balance: *balance,
            created_at: Utc::now(),
        };
        db.credit_customers().insert(&customer).await?;
    }
    println!("  {} customers", CUSTOMERS.len());

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
