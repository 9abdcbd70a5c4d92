//! # Turnstile API
//!
//! HTTP server for the events marketplace: ticket listing, quoting and
//! booking for buyers, the payment gateway webhook, and admin refunds.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           Turnstile API                                 │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────────┐  ┌────────────────────────┐│
//! │  │  tickets       │  │  payments          │  │  accounts              ││
//! │  │                │  │                    │  │                        ││
//! │  │ • list         │  │ • webhook (HMAC)   │  │ • my bookings          ││
//! │  │ • quote        │  │ • history / lookup │  │                        ││
//! │  │ • book         │  │ • refund  (admin)  │  │                        ││
//! │  │                │  │ • review  (admin)  │  │                        ││
//! │  └────────────────┘  └────────────────────┘  └────────────────────────┘│
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                      Infrastructure                               │  │
//! │  │                                                                   │  │
//! │  │  ┌──────────────┐  ┌──────────────────────┐  ┌─────────────────┐ │  │
//! │  │  │  SQLite      │  │  Payment gateway     │  │  JWT Auth       │ │  │
//! │  │  │  (turnstile- │  │  (turnstile-payments)│  │                 │ │  │
//! │  │  │   db)        │  │  + pending sweeper   │  │ buyer / admin   │ │  │
//! │  │  └──────────────┘  └──────────────────────┘  └─────────────────┘ │  │
//! │  └──────────────────────────────────────────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `HTTP_PORT` - listen port (default: 8080)
//! - `BIND_ADDR` - listen interface (default: 0.0.0.0)
//! - `DATABASE_PATH` - SQLite file (default: turnstile.db)
//! - `JWT_SECRET` - Secret for JWT signing
//! - `JWT_LIFETIME_SECS` - Token lifetime (default: 3600)
//! - `PAYMENTS_CONFIG` - Path to `payments.toml`
//! - `RUST_LOG` - log filter (default: info,turnstile=debug)

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

// Re-exports
pub use auth::{AuthUser, Claims, JwtManager};
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ApiResult};
pub use routes::build_router;
pub use state::AppState;
