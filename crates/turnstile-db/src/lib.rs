//! # turnstile-db: Storage Layer for Turnstile
//!
//! SQLite persistence for the marketplace. Every cross-entity write goes
//! through the [`Ledger`], which wraps it in one transaction.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Turnstile Data Flow                              │
//! │                                                                         │
//! │  Checkout / Reconciler (turnstile-payments)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  turnstile-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │    Ledger    │  │   │
//! │  │   │   (pool.rs)   │    │               │    │ (ledger.rs)  │  │   │
//! │  │   │               │    │ EventRepo     │    │              │  │   │
//! │  │   │ SqlitePool    │◄───│ InventoryRepo │◄───│ confirm      │  │   │
//! │  │   │ Migrations    │    │ OrderRepo     │    │ reverse      │  │   │
//! │  │   │               │    │ AccountRepo   │    │ (one tx)     │  │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Per-entity repositories
//! - [`ledger`] - Atomic confirm / reverse of an order's side effects
//!
//! ## Usage
//!
//! ```rust,ignore
//! use turnstile_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("./turnstile.db")).await?;
//! let tickets = db.inventory().list_for_event(&event_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ledger;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use ledger::{ConfirmOutcome, Ledger, ReverseOutcome};
pub use pool::{Database, DbConfig};

pub use repository::account::AccountRepository;
pub use repository::event::EventRepository;
pub use repository::inventory::InventoryRepository;
pub use repository::order::OrderRepository;
