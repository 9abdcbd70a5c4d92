//! # Event Repository
//!
//! Events and their attendee lists.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use turnstile_core::{AccountKind, Event};

/// Row shape of `events`.
#[derive(Debug, Clone, sqlx::FromRow)]
struct EventRow {
    id: String,
    title: String,
    venue: Option<String>,
    starts_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<EventRow> for Event {
    fn from(row: EventRow) -> Self {
        Event {
            id: row.id,
            title: row.title,
            venue: row.venue,
            starts_at: row.starts_at,
            created_at: row.created_at,
        }
    }
}

/// Repository for event database operations.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: SqlitePool,
}

impl EventRepository {
    pub fn new(pool: SqlitePool) -> Self {
        EventRepository { pool }
    }

    pub async fn insert(&self, event: &Event) -> DbResult<()> {
        debug!(id = %event.id, title = %event.title, "Inserting event");

        sqlx::query(
            r#"
            INSERT INTO events (id, title, venue, starts_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(&event.id)
        .bind(&event.title)
        .bind(&event.venue)
        .bind(event.starts_at)
        .bind(event.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Event>> {
        let row = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, venue, starts_at, created_at
            FROM events
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Event::from))
    }

    /// Upcoming events first.
    pub async fn list(&self, limit: i64) -> DbResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, EventRow>(
            r#"
            SELECT id, title, venue, starts_at, created_at
            FROM events
            ORDER BY starts_at ASC
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Event::from).collect())
    }

    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM events")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Accounts holding a completed booking for the event.
    pub async fn attendees(&self, event_id: &str) -> DbResult<Vec<(AccountKind, String)>> {
        let rows: Vec<(AccountKind, String)> = sqlx::query_as(
            r#"
            SELECT account_kind, account_id
            FROM event_attendees
            WHERE event_id = ?1
            ORDER BY added_at ASC
            "#,
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn is_attendee(&self, event_id: &str, kind: AccountKind, account_id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT 1 FROM event_attendees
            WHERE event_id = ?1 AND account_kind = ?2 AND account_id = ?3
            "#,
        )
        .bind(event_id)
        .bind(kind)
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(found.is_some())
    }
}

// =============================================================================
// Transactional helpers (used by the ledger)
// =============================================================================

/// Adds the account to the event's attendees. Already listed is not an error.
pub(crate) async fn add_attendee(
    conn: &mut SqliteConnection,
    event_id: &str,
    kind: AccountKind,
    account_id: &str,
    now: DateTime<Utc>,
) -> DbResult<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO event_attendees (event_id, account_kind, account_id, added_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(event_id)
    .bind(kind)
    .bind(account_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Removes the account from the attendees unless another completed order of
/// theirs for the same event still stands.
pub(crate) async fn remove_attendee_if_unbooked(
    conn: &mut SqliteConnection,
    event_id: &str,
    kind: AccountKind,
    account_id: &str,
) -> DbResult<bool> {
    let result = sqlx::query(
        r#"
        DELETE FROM event_attendees
        WHERE event_id = ?1 AND account_kind = ?2 AND account_id = ?3
          AND NOT EXISTS (
              SELECT 1 FROM orders
              WHERE event_id = ?1 AND buyer_account_kind = ?2 AND buyer_id = ?3
                AND status = 'completed'
          )
        "#,
    )
    .bind(event_id)
    .bind(kind)
    .bind(account_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};

    fn sample_event(id: &str) -> Event {
        Event {
            id: id.to_string(),
            title: "Warehouse Sessions".to_string(),
            venue: Some("The Warehouse".to_string()),
            starts_at: Utc::now() + chrono::Duration::days(30),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.events().insert(&sample_event("ev-1")).await.unwrap();

        let event = db.events().get_by_id("ev-1").await.unwrap().unwrap();
        assert_eq!(event.title, "Warehouse Sessions");
        assert!(db.events().get_by_id("missing").await.unwrap().is_none());
        assert_eq!(db.events().count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_attendee_add_is_idempotent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.events().insert(&sample_event("ev-1")).await.unwrap();

        let mut conn = db.pool().acquire().await.unwrap();
        add_attendee(&mut conn, "ev-1", AccountKind::Guest, "g-1", Utc::now()).await.unwrap();
        add_attendee(&mut conn, "ev-1", AccountKind::Guest, "g-1", Utc::now()).await.unwrap();
        drop(conn);

        let attendees = db.events().attendees("ev-1").await.unwrap();
        assert_eq!(attendees, vec![(AccountKind::Guest, "g-1".to_string())]);
        assert!(db.events().is_attendee("ev-1", AccountKind::Guest, "g-1").await.unwrap());
        assert!(!db.events().is_attendee("ev-1", AccountKind::Sponsor, "g-1").await.unwrap());
    }
}
