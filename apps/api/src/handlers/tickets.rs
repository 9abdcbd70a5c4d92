//! Ticket endpoints: listing, quoting and booking.
//!
//! ```text
//! GET  /events/{id}/tickets        ticket types with remaining counts
//! POST /events/{id}/tickets/quote  price a cart, nothing reserved
//! POST /events/{id}/tickets/book   pending order + hosted checkout URL
//! ```
//!
//! All amounts are integer minor units of `currency`.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use turnstile_core::pricing::{Quote, QuoteLine, Selection};
use turnstile_core::TicketType;

use crate::auth::AuthUser;
use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub benefits: Vec<String>,
    pub price: i64,
    pub currency: String,
    /// Still for sale.
    pub available: i64,
    pub sale_start_date: Option<DateTime<Utc>>,
    pub sale_end_date: Option<DateTime<Utc>>,
}

impl From<TicketType> for TicketView {
    fn from(ticket: TicketType) -> Self {
        TicketView {
            available: ticket.remaining(),
            id: ticket.id,
            name: ticket.name,
            description: ticket.description,
            benefits: ticket.benefits,
            price: ticket.price_cents,
            currency: ticket.currency,
            sale_start_date: ticket.sale_start,
            sale_end_date: ticket.sale_end,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteRequest {
    pub line_items: Vec<Selection>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownLine {
    pub ticket_type_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub subtotal: i64,
}

impl From<QuoteLine> for BreakdownLine {
    fn from(line: QuoteLine) -> Self {
        BreakdownLine {
            ticket_type_id: line.ticket_type_id,
            name: line.name,
            quantity: line.quantity,
            unit_price: line.unit_price_cents,
            subtotal: line.subtotal_cents,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuoteResponse {
    pub currency: String,
    pub subtotal: i64,
    pub booking_fee: i64,
    pub gst: i64,
    pub total: i64,
    pub per_item_breakdown: Vec<BreakdownLine>,
}

impl From<Quote> for QuoteResponse {
    fn from(quote: Quote) -> Self {
        QuoteResponse {
            currency: quote.currency,
            subtotal: quote.subtotal_cents,
            booking_fee: quote.booking_fee_cents,
            gst: quote.gst_cents,
            total: quote.total_cents,
            per_item_breakdown: quote.lines.into_iter().map(BreakdownLine::from).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookRequest {
    pub line_items: Vec<Selection>,
    pub buyer_email: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookResponse {
    pub order_id: String,
    pub payment_url: String,
    pub amount: i64,
    pub currency: String,
}

/// `GET /events/{id}/tickets`
pub async fn list_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> ApiResult<Json<Vec<TicketView>>> {
    let tickets = state.checkout.ticket_types(&event_id).await?;
    Ok(Json(tickets.into_iter().map(TicketView::from).collect()))
}

/// `POST /events/{id}/tickets/quote`
pub async fn quote(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Json(request): Json<QuoteRequest>,
) -> ApiResult<Json<QuoteResponse>> {
    let quote = state.checkout.quote(&event_id, &request.line_items).await?;
    Ok(Json(quote.into()))
}

/// `POST /events/{id}/tickets/book`
///
/// Responds 201 with the hosted checkout URL. The order stays `pending`
/// until the gateway confirms payment.
pub async fn book(
    State(state): State<AppState>,
    user: AuthUser,
    Path(event_id): Path<String>,
    Json(request): Json<BookRequest>,
) -> ApiResult<(StatusCode, Json<BookResponse>)> {
    let buyer = user.buyer()?;
    let receipt = state
        .checkout
        .book(&buyer, &event_id, &request.line_items, &request.buyer_email)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(BookResponse {
            order_id: receipt.order.id,
            payment_url: receipt.payment_url,
            amount: receipt.order.total_cents,
            currency: receipt.order.currency,
        }),
    ))
}
