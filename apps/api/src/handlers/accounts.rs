//! Account endpoints.

use axum::extract::State;
use axum::Json;

use turnstile_core::BookingEntry;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// `GET /accounts/me/bookings`
///
/// The caller's booking ledger, oldest first. Refunded bookings stay in the
/// list with status `cancelled`.
pub async fn my_bookings(State(state): State<AppState>, user: AuthUser) -> ApiResult<Json<Vec<BookingEntry>>> {
    let buyer = user.buyer()?;
    let account = state
        .db
        .accounts()
        .find(buyer.kind, &buyer.id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Account not found: {}", buyer.id)))?;
    Ok(Json(account.bookings().to_vec()))
}
