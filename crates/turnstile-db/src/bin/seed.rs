//! # Seed Data Generator
//!
//! Populates the database with a few events, their ticket types and one
//! account of every kind, for local development.
//!
//! ## Usage
//! ```bash
//! # Seed ./turnstile_dev.db
//! cargo run -p turnstile-db --bin seed
//!
//! # Specify database path
//! cargo run -p turnstile-db --bin seed -- --db ./data/turnstile.db
//! ```
//!
//! Prints the generated ids so they can be used in requests right away.

use chrono::{Duration, Utc};
use std::env;
use turnstile_core::{Curator, Event, Guest, Sponsor, TicketType, VenueOwner};
use turnstile_db::{Database, DbConfig};
use uuid::Uuid;

/// (title, venue, days from now)
const EVENTS: &[(&str, &str, i64)] = &[
    ("Warehouse Sessions", "The Warehouse", 14),
    ("Rooftop Jazz Night", "Skyline Terrace", 30),
    ("Indie Film Weekend", "Old Mill Cinema", 45),
];

/// (name, price in paise, capacity, benefits)
const TICKET_TYPES: &[(&str, i64, i64, &[&str])] = &[
    ("Early Bird", 2_499, 50, &["Entry before 8pm"]),
    ("General Admission", 4_999, 400, &[]),
    ("VIP", 15_000, 40, &["Lounge access", "Fast lane entry", "Welcome drink"]),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();

    let mut db_path = String::from("./turnstile_dev.db");

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
                println!("Turnstile Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./turnstile_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Turnstile Seed Data Generator");
    println!("=============================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    let existing = db.events().count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} events", existing);
        println!("  Skipping seed to avoid duplicates.");
        return Ok(());
    }

    println!();
    println!("Events:");
    let now = Utc::now();
    for (title, venue, days) in EVENTS {
        let event = Event {
            id: Uuid::new_v4().to_string(),
            title: title.to_string(),
            venue: Some(venue.to_string()),
            starts_at: now + Duration::days(*days),
            created_at: now,
        };
        db.events().insert(&event).await?;
        println!("  {} {}", event.id, event.title);

        for (name, price_cents, available, benefits) in TICKET_TYPES {
            let ticket = TicketType {
                id: Uuid::new_v4().to_string(),
                event_id: event.id.clone(),
                name: name.to_string(),
                description: None,
                benefits: benefits.iter().map(|b| b.to_string()).collect(),
                price_cents: *price_cents,
                currency: "INR".to_string(),
                available: *available,
                sold: 0,
                sale_start: None,
                sale_end: Some(event.starts_at),
            };
            db.inventory().insert(&ticket).await?;
            println!("    {} {} @ {}", ticket.id, ticket.name, ticket.price());
        }
    }

    println!();
    println!("Accounts:");
    let accounts = db.accounts();

    let sponsor = Sponsor {
        id: Uuid::new_v4().to_string(),
        business_name: "Acme Drinks".to_string(),
        contact_name: "Riya Kapoor".to_string(),
        email: "sponsor@acme.test".to_string(),
        bookings: Vec::new(),
    };
    accounts.insert_sponsor(&sponsor).await?;
    println!("  sponsor     {}", sponsor.id);

    let curator = Curator {
        id: Uuid::new_v4().to_string(),
        first_name: "Arjun".to_string(),
        last_name: "Mehta".to_string(),
        stage_name: Some("DJ Arj".to_string()),
        email: "curator@example.com".to_string(),
        bookings: Vec::new(),
    };
    accounts.insert_curator(&curator).await?;
    println!("  curator     {}", curator.id);

    let guest = Guest {
        id: Uuid::new_v4().to_string(),
        first_name: "Sam".to_string(),
        last_name: "Lee".to_string(),
        email: "guest@example.com".to_string(),
        bookings: Vec::new(),
    };
    accounts.insert_guest(&guest).await?;
    println!("  guest       {}", guest.id);

    let owner = VenueOwner {
        id: Uuid::new_v4().to_string(),
        venue_name: "The Warehouse".to_string(),
        address: "12 Dock Road".to_string(),
        email: "owner@warehouse.test".to_string(),
        bookings: Vec::new(),
    };
    accounts.insert_venue_owner(&owner).await?;
    println!("  venueOwner  {}", owner.id);

    println!();
    println!("✓ Seed complete!");

    Ok(())
}
