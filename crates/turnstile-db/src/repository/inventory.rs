//! # Inventory Repository
//!
//! Ticket types and their `sold` counters.
//!
//! ## Reserve / Release
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reserve(id, q)                                                         │
//! │    UPDATE ticket_types SET sold = sold + q                              │
//! │    WHERE id = ? AND sold + q <= available        → 1 row: reserved      │
//! │                                                  → 0 rows: sold out     │
//! │                                                                         │
//! │  release(id, q)                                                         │
//! │    UPDATE ticket_types SET sold = sold - q                              │
//! │    WHERE id = ? AND sold >= q                    → 0 rows: drift        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The check and the increment are one statement, so two buyers racing for
//! the last ticket cannot both succeed. The table's CHECK constraint backs
//! this up.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult};
use turnstile_core::validation::{validate_capacity, validate_price_cents};
use turnstile_core::TicketType;

/// Row shape of `ticket_types`; `benefits` is a JSON array.
#[derive(Debug, Clone, sqlx::FromRow)]
struct TicketTypeRow {
    id: String,
    event_id: String,
    name: String,
    description: Option<String>,
    benefits: String,
    price_cents: i64,
    currency: String,
    available: i64,
    sold: i64,
    sale_start: Option<DateTime<Utc>>,
    sale_end: Option<DateTime<Utc>>,
}

impl TryFrom<TicketTypeRow> for TicketType {
    type Error = DbError;

    fn try_from(row: TicketTypeRow) -> Result<Self, Self::Error> {
        Ok(TicketType {
            benefits: serde_json::from_str(&row.benefits)?,
            id: row.id,
            event_id: row.event_id,
            name: row.name,
            description: row.description,
            price_cents: row.price_cents,
            currency: row.currency,
            available: row.available,
            sold: row.sold,
            sale_start: row.sale_start,
            sale_end: row.sale_end,
        })
    }
}

const SELECT_TICKET_TYPE: &str = r#"
    SELECT id, event_id, name, description, benefits, price_cents, currency,
           available, sold, sale_start, sale_end
    FROM ticket_types
"#;

/// Repository for ticket inventory.
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Inserts a ticket type.
    ///
    /// ## Errors
    /// `CheckViolation` for a price outside `0..=MAX_PRICE_CENTS`, a negative
    /// capacity, or `sold > available`.
    pub async fn insert(&self, ticket: &TicketType) -> DbResult<()> {
        validate_price_cents(ticket.price_cents)
            .and_then(|_| validate_capacity(ticket.available))
            .map_err(|e| DbError::CheckViolation { message: e.to_string() })?;

        debug!(id = %ticket.id, event_id = %ticket.event_id, name = %ticket.name, "Inserting ticket type");

        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO ticket_types (
                id, event_id, name, description, benefits, price_cents, currency,
                available, sold, sale_start, sale_end, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.event_id)
        .bind(&ticket.name)
        .bind(&ticket.description)
        .bind(serde_json::to_string(&ticket.benefits)?)
        .bind(ticket.price_cents)
        .bind(&ticket.currency)
        .bind(ticket.available)
        .bind(ticket.sold)
        .bind(ticket.sale_start)
        .bind(ticket.sale_end)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TicketType>> {
        let sql = format!("{SELECT_TICKET_TYPE} WHERE id = ?1");
        let row = sqlx::query_as::<_, TicketTypeRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TicketType::try_from).transpose()
    }

    /// All ticket types of an event, cheapest first.
    pub async fn list_for_event(&self, event_id: &str) -> DbResult<Vec<TicketType>> {
        let sql = format!("{SELECT_TICKET_TYPE} WHERE event_id = ?1 ORDER BY price_cents ASC, name ASC");
        let rows = sqlx::query_as::<_, TicketTypeRow>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(TicketType::try_from).collect()
    }

    /// Changes the price of a ticket type. Existing orders keep their snapshot.
    pub async fn update_price(&self, id: &str, price_cents: i64) -> DbResult<()> {
        validate_price_cents(price_cents)
            .map_err(|e| DbError::CheckViolation { message: e.to_string() })?;

        let result = sqlx::query(
            "UPDATE ticket_types SET price_cents = ?1, updated_at = ?2 WHERE id = ?3",
        )
        .bind(price_cents)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TicketType", id));
        }
        Ok(())
    }

    /// Read-only check that `quantity` more tickets can still be sold.
    ///
    /// Advisory only: [`reserve`](Self::reserve) repeats the check atomically.
    pub async fn check_availability(&self, id: &str, quantity: i64) -> DbResult<bool> {
        let ticket = self
            .get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("TicketType", id))?;
        Ok(ticket.check_availability(quantity))
    }

    /// Atomically increments `sold` by `quantity` if capacity allows.
    ///
    /// Returns `false` when the ticket type is sold out for that quantity.
    pub async fn reserve(&self, id: &str, quantity: i64) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        reserve(&mut conn, id, quantity).await
    }

    /// Atomically decrements `sold` by `quantity`.
    ///
    /// Returns `false` when `sold < quantity`, which means the counters have
    /// drifted from the orders that produced them.
    pub async fn release(&self, id: &str, quantity: i64) -> DbResult<bool> {
        let mut conn = self.pool.acquire().await?;
        release(&mut conn, id, quantity).await
    }
}

// =============================================================================
// Transactional helpers (used by the ledger)
// =============================================================================

pub(crate) async fn reserve(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ticket_types
        SET sold = sold + ?1, updated_at = ?2
        WHERE id = ?3 AND sold + ?1 <= available
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let reserved = result.rows_affected() == 1;
    if !reserved {
        debug!(ticket_type_id = %id, quantity, "Reservation refused");
    }
    Ok(reserved)
}

pub(crate) async fn release(conn: &mut SqliteConnection, id: &str, quantity: i64) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        UPDATE ticket_types
        SET sold = sold - ?1, updated_at = ?2
        WHERE id = ?3 AND sold >= ?1
        "#,
    )
    .bind(quantity)
    .bind(Utc::now())
    .bind(id)
    .execute(&mut *conn)
    .await?;

    let released = result.rows_affected() == 1;
    if !released {
        warn!(ticket_type_id = %id, quantity, "Release refused: sold counter below quantity");
    }
    Ok(released)
}
