//! Payment endpoints: the gateway webhook, buyer history and admin
//! operations.
//!
//! ## Webhook Responses
//! ```text
//! ┌──────────────────────────────────────┬────────┬──────────────────────────┐
//! │ Outcome                              │ Status │ Gateway behaviour        │
//! ├──────────────────────────────────────┼────────┼──────────────────────────┤
//! │ bad / missing signature              │  401   │ (forged, nothing stored) │
//! │ applied, duplicate, ignored event    │  200   │ done                     │
//! │ signed but unparseable body          │  200   │ done (logged)            │
//! │ unknown reference                    │  200   │ done (logged)            │
//! │ oversell / amount mismatch / missing │  200   │ done (order flagged)     │
//! │ gateway verification unavailable    │  503   │ retries later            │
//! └──────────────────────────────────────┴────────┴──────────────────────────┘
//! ```

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use turnstile_core::Order;
use turnstile_payments::{
    PaymentError, Reconciliation, RefundOutcome, ResolveOutcome, WebhookEvent, SIGNATURE_HEADER,
};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Most rows returned by the list endpoints.
const LIST_LIMIT: i64 = 100;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: &'static str,
}

impl WebhookAck {
    fn new(outcome: &'static str) -> Json<Self> {
        Json(WebhookAck {
            received: true,
            outcome,
        })
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    pub order_id: String,
    pub outcome: &'static str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveResponse {
    pub order_id: String,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refunded_cents: Option<i64>,
}

/// `POST /payments/webhook`
///
/// Authenticated by the HMAC signature header over the raw body, never by a
/// buyer session. The payload only names the reference; the charge itself is
/// re-verified with the gateway before anything changes.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookAck>> {
    let signature = headers.get(SIGNATURE_HEADER).and_then(|value| value.to_str().ok());
    if let Err(err) = state.verifier.verify(&body, signature) {
        warn!(error = %err, "Webhook rejected");
        return Err(err.into());
    }

    let event = match WebhookEvent::parse(&body) {
        Ok(event) => event,
        Err(err) => {
            // The sender holds the secret; a retry would carry the same body.
            warn!(error = %err, "Signed webhook could not be parsed");
            return Ok(WebhookAck::new("malformed"));
        }
    };

    match state.reconciler.handle_webhook(&event).await {
        Ok(None) => Ok(WebhookAck::new("ignored")),
        Ok(Some(outcome)) => Ok(WebhookAck::new(match outcome {
            Reconciliation::Confirmed => "confirmed",
            Reconciliation::AlreadyProcessed(_) => "already_processed",
            Reconciliation::Failed => "failed",
            Reconciliation::StillPending { .. } => "pending",
        })),
        Err(PaymentError::UnknownOrder(_)) => Ok(WebhookAck::new("unknown_order")),
        Err(err) if err.needs_review() => Ok(WebhookAck::new("held_for_review")),
        Err(err) => Err(err.into()),
    }
}

/// `GET /payments/history`
///
/// The caller's orders, newest first.
pub async fn history(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    let buyer = user.buyer()?;
    let orders = state
        .db
        .orders()
        .list_for_buyer(&buyer.id, buyer.kind, LIST_LIMIT)
        .await?;
    Ok(Json(orders))
}

/// `GET /payments/{id}`
///
/// Status polling view for the buyer; admins can read any order.
pub async fn get_payment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state
        .db
        .orders()
        .get_by_id(&order_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Order not found: {order_id}")))?;

    let allowed = user.is_admin()
        || user
            .role
            .account_kind()
            .is_some_and(|kind| order.is_owned_by(&user.id, kind));
    if !allowed {
        return Err(ApiError::forbidden("Not your order"));
    }

    Ok(Json(order))
}

/// `GET /payments/review` (admin)
///
/// Paid orders that could not be applied automatically.
pub async fn review_queue(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<Order>>> {
    user.require_admin()?;
    let orders = state.db.orders().list_flagged(LIST_LIMIT).await?;
    Ok(Json(orders))
}

/// `POST /payments/{id}/refund` (admin)
pub async fn refund(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<RefundResponse>> {
    user.require_admin()?;

    let outcome = state.reconciler.refund(&order_id).await?;
    info!(order_id = %order_id, admin = %user.id, ?outcome, "Refund requested");

    Ok(Json(RefundResponse {
        order_id,
        outcome: match outcome {
            RefundOutcome::Refunded => "refunded",
            RefundOutcome::AlreadyRefunded => "already_refunded",
        },
    }))
}

/// `POST /payments/{id}/resolve` (admin)
///
/// Closes an order from the review queue: whatever the gateway captured is
/// refunded and the order fails. Seats are never granted from here.
pub async fn resolve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<ResolveResponse>> {
    user.require_admin()?;

    let outcome = state.reconciler.resolve_review(&order_id).await?;
    info!(order_id = %order_id, admin = %user.id, ?outcome, "Review resolved");

    let (outcome, refunded_cents) = match outcome {
        ResolveOutcome::Refunded { amount_cents } => ("refunded", Some(amount_cents)),
        ResolveOutcome::Closed => ("closed", None),
        ResolveOutcome::AlreadyResolved => ("already_resolved", None),
        ResolveOutcome::Superseded(_) => ("superseded", None),
    };
    Ok(Json(ResolveResponse {
        order_id,
        outcome,
        refunded_cents,
    }))
}
