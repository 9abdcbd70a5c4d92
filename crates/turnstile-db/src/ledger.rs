//! # Ledger
//!
//! Applies and reverses the side effects of an order as one unit.
//!
//! ## Confirm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. orders: pending → completed          (CAS; 0 rows → already done) │
//! │   2. ticket_types: sold += q, per line    (0 rows → oversold, ROLLBACK)│
//! │   3. account.append_booking(entry)        (in memory, rejects dupes)   │
//! │      <kind>_bookings: INSERT that entry   (order_id is the PK)         │
//! │   4. event_attendees: INSERT OR IGNORE                                 │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Reverse
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN                                                                  │
//! │   1. orders: completed → refunded         (CAS; 0 rows → not completed)│
//! │   2. ticket_types: sold -= q, per line    (0 rows → drift, ROLLBACK)   │
//! │   3. account.cancel_booking(order)        (in memory)                  │
//! │      <kind>_bookings: status = cancelled                               │
//! │   4. event_attendees: DELETE unless another completed order remains    │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status CAS is the first write, so it takes SQLite's write lock before
//! anything else is touched. Whoever wins the CAS owns the side effects;
//! a concurrent duplicate sees zero rows and backs off. Dropping the
//! transaction without committing rolls everything back, including the CAS.
//!
//! The buyer's booking ledger is changed only through the [`Account`]
//! capability; the row written is the one the account recorded, in the table
//! for `account.kind()`. If either call returns an error the in-memory account
//! may be ahead of storage and should be reloaded.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::{account as accounts, event as events, inventory, order as orders};
use turnstile_core::{Account, CoreError, Order, OrderStatus};

/// Result of [`Ledger::confirm_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// All effects applied and committed.
    Confirmed,
    /// The order had already left `pending`; nothing was written.
    AlreadyProcessed(OrderStatus),
    /// A line item no longer fits in capacity; nothing was written.
    Oversold { ticket_type_id: String },
}

/// Result of [`Ledger::reverse_order`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReverseOutcome {
    /// All effects undone and committed.
    Reversed,
    /// The order was not `completed`; nothing was written.
    NotCompleted(OrderStatus),
    /// A `sold` counter is lower than the quantity to release; nothing was written.
    Drift { ticket_type_id: String },
}

/// Transactional writer spanning orders, inventory, bookings and attendees.
#[derive(Debug, Clone)]
pub struct Ledger {
    pool: SqlitePool,
}

impl Ledger {
    pub fn new(pool: SqlitePool) -> Self {
        Ledger { pool }
    }

    /// Completes a pending order and applies its effects.
    ///
    /// `buyer` must be the account that placed the order; the booking is
    /// appended to it and persisted from it.
    pub async fn confirm_order(&self, order: &Order, buyer: &mut dyn Account) -> DbResult<ConfirmOutcome> {
        ensure_buyer(order, buyer)?;

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let won = orders::transition(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Completed, now).await?;
        if !won {
            let status = orders::current_status(&mut tx, &order.id).await?;
            debug!(order_id = %order.id, %status, "Confirm skipped: order already processed");
            return Ok(ConfirmOutcome::AlreadyProcessed(status));
        }

        for item in &order.line_items {
            if !inventory::reserve(&mut tx, &item.ticket_type_id, item.quantity).await? {
                warn!(
                    order_id = %order.id,
                    ticket_type_id = %item.ticket_type_id,
                    quantity = item.quantity,
                    "Confirm rolled back: ticket type oversold"
                );
                return Ok(ConfirmOutcome::Oversold {
                    ticket_type_id: item.ticket_type_id.clone(),
                });
            }
        }

        buyer.append_booking(order.booking_entry(now)).map_err(|err| match err {
            CoreError::DuplicateBooking(order_id) => DbError::duplicate("order_id", order_id),
            other => DbError::Internal(other.to_string()),
        })?;
        accounts::insert_booking(&mut tx, &*buyer, &order.id).await?;
        events::add_attendee(&mut tx, &order.event_id, buyer.kind(), buyer.id(), now).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            order_id = %order.id,
            buyer_id = %buyer.id(),
            kind = %buyer.kind(),
            total_cents = order.total_cents,
            "Order confirmed"
        );
        Ok(ConfirmOutcome::Confirmed)
    }

    /// Refunds a completed order and undoes its effects.
    ///
    /// `buyer` must be the account that placed the order; its booking is
    /// cancelled and the cancellation persisted from it.
    pub async fn reverse_order(&self, order: &Order, buyer: &mut dyn Account) -> DbResult<ReverseOutcome> {
        ensure_buyer(order, buyer)?;

        let now = Utc::now();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let won = orders::transition(&mut tx, &order.id, OrderStatus::Completed, OrderStatus::Refunded, now).await?;
        if !won {
            let status = orders::current_status(&mut tx, &order.id).await?;
            debug!(order_id = %order.id, %status, "Reverse skipped: order not completed");
            return Ok(ReverseOutcome::NotCompleted(status));
        }

        for item in &order.line_items {
            if !inventory::release(&mut tx, &item.ticket_type_id, item.quantity).await? {
                warn!(
                    order_id = %order.id,
                    ticket_type_id = %item.ticket_type_id,
                    "Reverse rolled back: inventory drift"
                );
                return Ok(ReverseOutcome::Drift {
                    ticket_type_id: item.ticket_type_id.clone(),
                });
            }
        }

        match buyer.cancel_booking(&order.id) {
            Ok(()) => {
                if !accounts::update_booking_status(&mut tx, &*buyer, &order.id).await? {
                    warn!(order_id = %order.id, "Refunded order had no booking row");
                }
            }
            Err(CoreError::BookingNotFound(_)) => {
                warn!(order_id = %order.id, buyer_id = %buyer.id(), "Refunded order missing from buyer's ledger");
            }
            Err(other) => return Err(DbError::Internal(other.to_string())),
        }

        events::remove_attendee_if_unbooked(&mut tx, &order.event_id, buyer.kind(), buyer.id()).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(order_id = %order.id, total_cents = order.total_cents, "Order reversed");
        Ok(ReverseOutcome::Reversed)
    }
}

/// The ledger only writes into the account that placed the order.
fn ensure_buyer(order: &Order, buyer: &dyn Account) -> DbResult<()> {
    if order.is_owned_by(buyer.id(), buyer.kind()) {
        Ok(())
    } else {
        Err(DbError::Internal(format!(
            "order {} belongs to {} {}, not {} {}",
            order.id,
            order.buyer_account_kind,
            order.buyer_id,
            buyer.kind(),
            buyer.id()
        )))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
