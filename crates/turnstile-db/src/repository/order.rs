//! # Order Repository
//!
//! Orders, their frozen line items, and the status compare-and-set.
//!
//! ## Status Changes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Every status change is                                                 │
//! │                                                                         │
//! │    UPDATE orders SET status = :to WHERE id = :id AND status = :from     │
//! │                                                                         │
//! │  rows_affected = 1  → this caller won the transition                    │
//! │  rows_affected = 0  → someone else already moved the order              │
//! │                                                                         │
//! │  pending → completed and completed → refunded run inside the ledger     │
//! │  transaction; pending → failed runs standalone (no side effects).      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Refunds are claimed with the same pattern on `refund_claimed_at` before
//! the gateway is called, and review flags are cleared with
//! `WHERE review_reason IS NOT NULL`.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use turnstile_core::{AccountKind, LineItem, Order, OrderStatus};

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct OrderRow {
    id: String,
    buyer_id: String,
    buyer_account_kind: AccountKind,
    buyer_email: String,
    event_id: String,
    currency: String,
    subtotal_cents: i64,
    booking_fee_cents: i64,
    tax_cents: i64,
    total_cents: i64,
    status: OrderStatus,
    gateway_reference: String,
    payment_url: Option<String>,
    review_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    completed_at: Option<DateTime<Utc>>,
    refunded_at: Option<DateTime<Utc>>,
}

impl OrderRow {
    fn into_order(self, line_items: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            buyer_id: self.buyer_id,
            buyer_account_kind: self.buyer_account_kind,
            buyer_email: self.buyer_email,
            event_id: self.event_id,
            line_items,
            currency: self.currency,
            subtotal_cents: self.subtotal_cents,
            booking_fee_cents: self.booking_fee_cents,
            tax_cents: self.tax_cents,
            total_cents: self.total_cents,
            status: self.status,
            gateway_reference: self.gateway_reference,
            payment_url: self.payment_url,
            review_reason: self.review_reason,
            created_at: self.created_at,
            updated_at: self.updated_at,
            completed_at: self.completed_at,
            refunded_at: self.refunded_at,
        }
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct LineItemRow {
    ticket_type_id: String,
    name: String,
    quantity: i64,
    unit_price_cents: i64,
    line_total_cents: i64,
}

impl From<LineItemRow> for LineItem {
    fn from(row: LineItemRow) -> Self {
        LineItem {
            ticket_type_id: row.ticket_type_id,
            name: row.name,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            line_total_cents: row.line_total_cents,
        }
    }
}

const SELECT_ORDER: &str = r#"
    SELECT id, buyer_id, buyer_account_kind, buyer_email, event_id, currency,
           subtotal_cents, booking_fee_cents, tax_cents, total_cents, status,
           gateway_reference, payment_url, review_reason,
           created_at, updated_at, completed_at, refunded_at
    FROM orders
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Inserts a pending order and its line items in one transaction.
    pub async fn insert(&self, order: &Order) -> DbResult<()> {
        debug!(id = %order.id, buyer_id = %order.buyer_id, total_cents = order.total_cents, "Inserting order");

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, buyer_id, buyer_account_kind, buyer_email, event_id, currency,
                subtotal_cents, booking_fee_cents, tax_cents, total_cents, status,
                gateway_reference, payment_url, review_reason,
                created_at, updated_at, completed_at, refunded_at
            ) VALUES (
                ?1, ?2, ?3, ?4, ?5, ?6,
                ?7, ?8, ?9, ?10, ?11,
                ?12, ?13, ?14,
                ?15, ?16, ?17, ?18
            )
            "#,
        )
        .bind(&order.id)
        .bind(&order.buyer_id)
        .bind(order.buyer_account_kind)
        .bind(&order.buyer_email)
        .bind(&order.event_id)
        .bind(&order.currency)
        .bind(order.subtotal_cents)
        .bind(order.booking_fee_cents)
        .bind(order.tax_cents)
        .bind(order.total_cents)
        .bind(order.status)
        .bind(&order.gateway_reference)
        .bind(&order.payment_url)
        .bind(&order.review_reason)
        .bind(order.created_at)
        .bind(order.updated_at)
        .bind(order.completed_at)
        .bind(order.refunded_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in order.line_items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_line_items (
                    order_id, position, ticket_type_id, name,
                    quantity, unit_price_cents, line_total_cents
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.ticket_type_id)
            .bind(&item.name)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.line_total_cents)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE id = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.attach_line_items(row).await?)),
            None => Ok(None),
        }
    }

    /// Looks an order up by the reference the gateway echoes back.
    pub async fn get_by_reference(&self, reference: &str) -> DbResult<Option<Order>> {
        let sql = format!("{SELECT_ORDER} WHERE gateway_reference = ?1");
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(reference)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.attach_line_items(row).await?)),
            None => Ok(None),
        }
    }

    /// A buyer's orders, newest first.
    pub async fn list_for_buyer(
        &self,
        buyer_id: &str,
        kind: AccountKind,
        limit: i64,
    ) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{SELECT_ORDER} WHERE buyer_id = ?1 AND buyer_account_kind = ?2 ORDER BY created_at DESC LIMIT ?3"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(buyer_id)
            .bind(kind)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.attach_all(rows).await
    }

    /// Pending orders created before `cutoff`, oldest first. Orders flagged
    /// for review are left to the operator and not returned.
    pub async fn list_pending_before(&self, cutoff: DateTime<Utc>, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{SELECT_ORDER} WHERE status = 'pending' AND review_reason IS NULL AND created_at < ?1 \
             ORDER BY created_at ASC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(cutoff)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.attach_all(rows).await
    }

    /// Orders waiting for an operator, oldest first.
    pub async fn list_flagged(&self, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "{SELECT_ORDER} WHERE review_reason IS NOT NULL ORDER BY updated_at ASC LIMIT ?1"
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.attach_all(rows).await
    }

    pub async fn count_by_status(&self, status: OrderStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Stores the hosted checkout URL returned by the gateway.
    pub async fn set_payment_url(&self, id: &str, url: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE orders SET payment_url = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(url)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// `pending → failed`. Returns `false` if the order was no longer pending.
    pub async fn mark_failed(&self, id: &str) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        let moved = transition(&mut conn, id, OrderStatus::Pending, OrderStatus::Failed, Utc::now()).await?;
        if moved {
            info!(order_id = %id, "Order marked failed");
        }
        Ok(moved)
    }

    /// Records why a paid order could not be applied. The status is untouched.
    pub async fn flag_for_review(&self, id: &str, reason: &str) -> DbResult<()> {
        warn!(order_id = %id, reason = %reason, "Order flagged for manual review");

        let result = sqlx::query("UPDATE orders SET review_reason = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(reason)
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }
        Ok(())
    }

    /// Clears the review flag once an operator has resolved the order.
    ///
    /// Returns `false` if the order was not flagged, so of two operators
    /// resolving the same order only one sees `true`.
    pub async fn clear_review(&self, id: &str) -> DbResult<bool> {
        let result = sqlx::query(
            "UPDATE orders SET review_reason = NULL, updated_at = ?1 WHERE id = ?2 AND review_reason IS NOT NULL",
        )
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Claims a completed order for refund.
    ///
    /// Succeeds if the order is `completed` and unclaimed, or its claim was
    /// taken before `stale_before`. Returns `false` otherwise.
    pub async fn claim_refund(&self, id: &str, now: DateTime<Utc>, stale_before: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE orders
            SET refund_claimed_at = ?1, updated_at = ?1
            WHERE id = ?2
              AND status = 'completed'
              AND (refund_claimed_at IS NULL OR refund_claimed_at < ?3)
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(stale_before)
        .execute(&self.pool)
        .await?;

        let claimed = result.rows_affected() == 1;
        debug!(order_id = %id, claimed, "Refund claim");
        Ok(claimed)
    }

    /// Drops a refund claim after the gateway refused or timed out.
    pub async fn release_refund_claim(&self, id: &str) -> DbResult<()> {
        sqlx::query("UPDATE orders SET refund_claimed_at = NULL, updated_at = ?1 WHERE id = ?2 AND status = 'completed'")
            .bind(Utc::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn attach_line_items(&self, row: OrderRow) -> DbResult<Order> {
        let items = sqlx::query_as::<_, LineItemRow>(
            r#"
            SELECT ticket_type_id, name, quantity, unit_price_cents, line_total_cents
            FROM order_line_items
            WHERE order_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(&row.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(row.into_order(items.into_iter().map(LineItem::from).collect()))
    }

    async fn attach_all(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(self.attach_line_items(row).await?);
        }
        Ok(orders)
    }
}

// =============================================================================
// Transactional helpers (used by the ledger)
// =============================================================================

/// Compare-and-set on the status column. Stamps `completed_at` / `refunded_at`.
pub(crate) async fn transition(
    conn: &mut SqliteConnection,
    id: &str,
    from: OrderStatus,
    to: OrderStatus,
    now: DateTime<Utc>,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE orders
        SET status = ?1,
            updated_at = ?2,
            completed_at = CASE WHEN ?1 = 'completed' THEN ?2 ELSE completed_at END,
            refunded_at  = CASE WHEN ?1 = 'refunded'  THEN ?2 ELSE refunded_at  END,
            review_reason = CASE WHEN ?1 = 'completed' THEN NULL ELSE review_reason END
        WHERE id = ?3 AND status = ?4
        "#,
    )
    .bind(to)
    .bind(now)
    .bind(id)
    .bind(from)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Current status, read on the same connection as the caller's transaction.
pub(crate) async fn current_status(conn: &mut SqliteConnection, id: &str) -> DbResult<OrderStatus> {
    let status: Option<OrderStatus> = sqlx::query_scalar("SELECT status FROM orders WHERE id = ?1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

    status.ok_or_else(|| DbError::not_found("Order", id))
}
