//! # Account Repository
//!
//! Storage for the four account kinds and their booking ledgers.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  AccountKind     account table     booking table                       │
//! │  ───────────     ─────────────     ─────────────────────               │
//! │  Sponsor         sponsors          sponsor_bookings                    │
//! │  Curator         curators          curator_bookings                    │
//! │  Guest           guests            guest_bookings                      │
//! │  VenueOwner      venue_owners      venue_owner_bookings                │
//! │                                                                         │
//! │  find(kind, id) → Box<dyn Account> with its bookings loaded            │
//! │  ledger writes  → the entry the account recorded, into the table of    │
//! │                   account.kind(), under account.id()                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Table names come from [`AccountKind`] only, never from request input.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use turnstile_core::{
    Account, AccountKind, BookingEntry, BookingStatus, Curator, Guest, Sponsor, VenueOwner,
};

/// `(account table, booking table)` for a kind.
const fn tables(kind: AccountKind) -> (&'static str, &'static str) {
    match kind {
        AccountKind::Sponsor => ("sponsors", "sponsor_bookings"),
        AccountKind::Curator => ("curators", "curator_bookings"),
        AccountKind::Guest => ("guests", "guest_bookings"),
        AccountKind::VenueOwner => ("venue_owners", "venue_owner_bookings"),
    }
}

// =============================================================================
// Row Mapping
// =============================================================================

#[derive(Debug, Clone, sqlx::FromRow)]
struct SponsorRow {
    id: String,
    business_name: String,
    contact_name: String,
    email: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct CuratorRow {
    id: String,
    first_name: String,
    last_name: String,
    stage_name: Option<String>,
    email: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct GuestRow {
    id: String,
    first_name: String,
    last_name: String,
    email: String,
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct VenueOwnerRow {
    id: String,
    venue_name: String,
    address: String,
    email: String,
}

/// Row shape of every `*_bookings` table; `line_items` is a JSON array.
#[derive(Debug, Clone, sqlx::FromRow)]
struct BookingRow {
    order_id: String,
    event_id: String,
    line_items: String,
    total_amount_cents: i64,
    currency: String,
    booking_date: DateTime<Utc>,
    status: BookingStatus,
}

impl TryFrom<BookingRow> for BookingEntry {
    type Error = DbError;

    fn try_from(row: BookingRow) -> Result<Self, Self::Error> {
        Ok(BookingEntry {
            line_items: serde_json::from_str(&row.line_items)?,
            order_id: row.order_id,
            event_id: row.event_id,
            total_amount_cents: row.total_amount_cents,
            currency: row.currency,
            booking_date: row.booking_date,
            status: row.status,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for all account kinds.
#[derive(Debug, Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AccountRepository { pool }
    }

    pub async fn insert_sponsor(&self, sponsor: &Sponsor) -> DbResult<()> {
        debug!(id = %sponsor.id, "Inserting sponsor");
        sqlx::query(
            r#"
            INSERT INTO sponsors (id, business_name, contact_name, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&sponsor.id)
        .bind(&sponsor.business_name)
        .bind(&sponsor.contact_name)
        .bind(&sponsor.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_curator(&self, curator: &Curator) -> DbResult<()> {
        debug!(id = %curator.id, "Inserting curator");
        sqlx::query(
            r#"
            INSERT INTO curators (id, first_name, last_name, stage_name, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&curator.id)
        .bind(&curator.first_name)
        .bind(&curator.last_name)
        .bind(&curator.stage_name)
        .bind(&curator.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_guest(&self, guest: &Guest) -> DbResult<()> {
        debug!(id = %guest.id, "Inserting guest");
        sqlx::query(
            r#"
            INSERT INTO guests (id, first_name, last_name, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&guest.id)
        .bind(&guest.first_name)
        .bind(&guest.last_name)
        .bind(&guest.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn insert_venue_owner(&self, owner: &VenueOwner) -> DbResult<()> {
        debug!(id = %owner.id, "Inserting venue owner");
        sqlx::query(
            r#"
            INSERT INTO venue_owners (id, venue_name, address, email, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&owner.id)
        .bind(&owner.venue_name)
        .bind(&owner.address)
        .bind(&owner.email)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Whether an account of `kind` with `id` exists.
    pub async fn exists(&self, kind: AccountKind, id: &str) -> DbResult<bool> {
        let (accounts, _) = tables(kind);
        let sql = format!("SELECT 1 FROM {accounts} WHERE id = ?1");
        let found: Option<i64> = sqlx::query_scalar(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Loads an account with its booking history.
    pub async fn find(&self, kind: AccountKind, id: &str) -> DbResult<Option<Box<dyn Account>>> {
        let bookings = self.bookings(kind, id).await?;

        let account: Option<Box<dyn Account>> = match kind {
            AccountKind::Sponsor => sqlx::query_as::<_, SponsorRow>(
                "SELECT id, business_name, contact_name, email FROM sponsors WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| {
                Box::new(Sponsor {
                    id: row.id,
                    business_name: row.business_name,
                    contact_name: row.contact_name,
                    email: row.email,
                    bookings,
                }) as Box<dyn Account>
            }),

            AccountKind::Curator => sqlx::query_as::<_, CuratorRow>(
                "SELECT id, first_name, last_name, stage_name, email FROM curators WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| {
                Box::new(Curator {
                    id: row.id,
                    first_name: row.first_name,
                    last_name: row.last_name,
                    stage_name: row.stage_name,
                    email: row.email,
                    bookings,
                }) as Box<dyn Account>
            }),

            AccountKind::Guest => sqlx::query_as::<_, GuestRow>(
                "SELECT id, first_name, last_name, email FROM guests WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| {
                Box::new(Guest {
                    id: row.id,
                    first_name: row.first_name,
                    last_name: row.last_name,
                    email: row.email,
                    bookings,
                }) as Box<dyn Account>
            }),

            AccountKind::VenueOwner => sqlx::query_as::<_, VenueOwnerRow>(
                "SELECT id, venue_name, address, email FROM venue_owners WHERE id = ?1",
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(|row| {
                Box::new(VenueOwner {
                    id: row.id,
                    venue_name: row.venue_name,
                    address: row.address,
                    email: row.email,
                    bookings,
                }) as Box<dyn Account>
            }),
        };

        Ok(account)
    }

    /// Booking history of an account, oldest first.
    pub async fn bookings(&self, kind: AccountKind, account_id: &str) -> DbResult<Vec<BookingEntry>> {
        let (_, bookings) = tables(kind);
        let sql = format!(
            r#"
            SELECT order_id, event_id, line_items, total_amount_cents, currency, booking_date, status
            FROM {bookings}
            WHERE account_id = ?1
            ORDER BY booking_date ASC
            "#
        );
        let rows = sqlx::query_as::<_, BookingRow>(&sql)
            .bind(account_id)
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(BookingEntry::try_from).collect()
    }
}

// =============================================================================
// Transactional helpers (used by the ledger)
// =============================================================================

/// The account's entry for `order_id`, or an internal error if the caller
/// has not recorded it on the account yet.
fn recorded_entry<'a>(account: &'a dyn Account, order_id: &str) -> DbResult<&'a BookingEntry> {
    account.find_booking(order_id).ok_or_else(|| {
        DbError::Internal(format!(
            "{} account {} holds no booking for order {order_id}",
            account.kind(),
            account.id()
        ))
    })
}

/// Writes the booking `account` holds for `order_id` into the account's own
/// booking table. The order id is the primary key, so a second insert for
/// the same order fails with `UniqueViolation`.
pub(crate) async fn insert_booking(
    conn: &mut SqliteConnection,
    account: &dyn Account,
    order_id: &str,
) -> DbResult<()> {
    let entry = recorded_entry(account, order_id)?;
    let (_, bookings) = tables(account.kind());
    let sql = format!(
        r#"
        INSERT INTO {bookings} (
            order_id, account_id, event_id, line_items,
            total_amount_cents, currency, booking_date, status
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#
    );

    sqlx::query(&sql)
        .bind(&entry.order_id)
        .bind(account.id())
        .bind(&entry.event_id)
        .bind(serde_json::to_string(&entry.line_items)?)
        .bind(entry.total_amount_cents)
        .bind(&entry.currency)
        .bind(entry.booking_date)
        .bind(entry.status)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

/// Copies the status `account` holds for `order_id` to the stored row.
/// Returns `false` if the row does not exist.
pub(crate) async fn update_booking_status(
    conn: &mut SqliteConnection,
    account: &dyn Account,
    order_id: &str,
) -> DbResult<bool> {
    let entry = recorded_entry(account, order_id)?;
    let (_, bookings) = tables(account.kind());
    let sql = format!("UPDATE {bookings} SET status = ?1 WHERE order_id = ?2 AND account_id = ?3");

    let result = sqlx::query(&sql)
        .bind(entry.status)
        .bind(order_id)
        .bind(account.id())
        .execute(&mut *conn)
        .await?;

    Ok(result.rows_affected() == 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sponsor() -> Sponsor {
        Sponsor {
            id: "s-1".to_string(),
            business_name: "Acme Drinks".to_string(),
            contact_name: "Riya".to_string(),
            email: "riya@acme.test".to_string(),
            bookings: Vec::new(),
        }
    }

    fn curator() -> Curator {
        Curator {
            id: "c-1".to_string(),
            first_name: "Arjun".to_string(),
            last_name: "Mehta".to_string(),
            stage_name: None,
            email: "arjun@example.com".to_string(),
            bookings: Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_find_each_kind() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let accounts = db.accounts();
        accounts.insert_sponsor(&sponsor()).await.unwrap();
        accounts.insert_curator(&curator()).await.unwrap();

        let found = accounts.find(AccountKind::Sponsor, "s-1").await.unwrap().unwrap();
        assert_eq!(found.kind(), AccountKind::Sponsor);
        assert_eq!(found.display_name(), "Acme Drinks");

        let found = accounts.find(AccountKind::Curator, "c-1").await.unwrap().unwrap();
        assert_eq!(found.display_name(), "Arjun Mehta");

        // Same id under a different kind is a different account.
        assert!(accounts.find(AccountKind::Guest, "s-1").await.unwrap().is_none());
        assert!(!accounts.exists(AccountKind::VenueOwner, "c-1").await.unwrap());
        assert!(accounts.exists(AccountKind::Curator, "c-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.accounts().insert_sponsor(&sponsor()).await.unwrap();

        let mut other = sponsor();
        other.id = "s-2".to_string();
        let err = db.accounts().insert_sponsor(&other).await.unwrap_err();
        assert!(matches!(err, DbError::UniqueViolation { .. }));
    }

    #[test]
    fn test_table_names_are_per_kind() {
        let names: Vec<_> = AccountKind::ALL.iter().map(|k| tables(*k).1).collect();
        assert_eq!(
            names,
            vec!["sponsor_bookings", "curator_bookings", "guest_bookings", "venue_owner_bookings"]
        );
    }
}
