//! Router configuration.

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers::{accounts, health, payments, tickets};
use crate::state::AppState;

/// Build the complete router.
///
/// - `/health` and the ticket read/quote endpoints are public
/// - `/payments/webhook` is authenticated by its signature header
/// - everything else requires a bearer token
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        // Tickets
        .route("/events/{id}/tickets", get(tickets::list_tickets))
        .route("/events/{id}/tickets/quote", post(tickets::quote))
        .route("/events/{id}/tickets/book", post(tickets::book))
        // Payments
        .route("/payments/webhook", post(payments::webhook))
        .route("/payments/history", get(payments::history))
        .route("/payments/review", get(payments::review_queue))
        .route("/payments/{id}", get(payments::get_payment))
        .route("/payments/{id}/refund", post(payments::refund))
        .route("/payments/{id}/resolve", post(payments::resolve))
        // Accounts
        .route("/accounts/me/bookings", get(accounts::my_bookings))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
