//! # Account Booking Ledger
//!
//! Four disjoint kinds of account can buy tickets. They share no base record;
//! each keeps its own booking history. Everything that records or cancels a
//! booking goes through the [`Account`] capability, so callers never branch
//! on the kind. The storage ledger persists exactly the entry the account
//! recorded.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         dyn Account                                     │
//! │          id() · kind() · email() · display_name()                       │
//! │          bookings() · append_booking() · cancel_booking()               │
//! │                                                                         │
//! │   ┌──────────┐   ┌──────────┐   ┌──────────┐   ┌────────────┐         │
//! │   │ Sponsor  │   │ Curator  │   │  Guest   │   │ VenueOwner │         │
//! │   │ business │   │  stage   │   │  first/  │   │   venue    │         │
//! │   │   name   │   │   name   │   │   last   │   │   name     │         │
//! │   └──────────┘   └──────────┘   └──────────┘   └────────────┘         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::types::{AccountKind, BookingEntry, BookingStatus};

// =============================================================================
// Account Capability
// =============================================================================

/// A buyer account of any kind.
pub trait Account: fmt::Debug + Send + Sync {
    fn id(&self) -> &str;

    fn kind(&self) -> AccountKind;

    fn email(&self) -> &str;

    /// Name shown on tickets and receipts.
    fn display_name(&self) -> String;

    /// Booking history, oldest first.
    fn bookings(&self) -> &[BookingEntry];

    fn bookings_mut(&mut self) -> &mut Vec<BookingEntry>;

    /// Records a confirmed booking.
    ///
    /// ## Errors
    /// `DuplicateBooking` if an entry for the same order already exists, so
    /// an order can never be booked twice into one account.
    fn append_booking(&mut self, entry: BookingEntry) -> CoreResult<()> {
        if self.find_booking(&entry.order_id).is_some() {
            return Err(CoreError::DuplicateBooking(entry.order_id));
        }
        self.bookings_mut().push(entry);
        Ok(())
    }

    /// Marks the booking for `order_id` as cancelled. Cancelling twice is a no-op.
    fn cancel_booking(&mut self, order_id: &str) -> CoreResult<()> {
        let entry = self
            .bookings_mut()
            .iter_mut()
            .find(|entry| entry.order_id == order_id)
            .ok_or_else(|| CoreError::BookingNotFound(order_id.to_string()))?;
        entry.status = BookingStatus::Cancelled;
        Ok(())
    }

    fn find_booking(&self, order_id: &str) -> Option<&BookingEntry> {
        self.bookings().iter().find(|entry| entry.order_id == order_id)
    }
}

// =============================================================================
// Sponsor
// =============================================================================

/// A business sponsoring events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sponsor {
    pub id: String,
    pub business_name: String,
    pub contact_name: String,
    pub email: String,
    #[serde(default)]
    pub bookings: Vec<BookingEntry>,
}

impl Account for Sponsor {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AccountKind {
        AccountKind::Sponsor
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> String {
        self.business_name.clone()
    }

    fn bookings(&self) -> &[BookingEntry] {
        &self.bookings
    }

    fn bookings_mut(&mut self) -> &mut Vec<BookingEntry> {
        &mut self.bookings
    }
}

// =============================================================================
// Curator
// =============================================================================

/// A performer or curator; may go by a stage name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Curator {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub stage_name: Option<String>,
    pub email: String,
    #[serde(default)]
    pub bookings: Vec<BookingEntry>,
}

impl Account for Curator {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AccountKind {
        AccountKind::Curator
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> String {
        match self.stage_name.as_deref() {
            Some(stage) if !stage.trim().is_empty() => stage.to_string(),
            _ => format!("{} {}", self.first_name, self.last_name),
        }
    }

    fn bookings(&self) -> &[BookingEntry] {
        &self.bookings
    }

    fn bookings_mut(&mut self) -> &mut Vec<BookingEntry> {
        &mut self.bookings
    }
}

// =============================================================================
// Guest
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Guest {
    pub id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub bookings: Vec<BookingEntry>,
}

impl Account for Guest {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AccountKind {
        AccountKind::Guest
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    fn bookings(&self) -> &[BookingEntry] {
        &self.bookings
    }

    fn bookings_mut(&mut self) -> &mut Vec<BookingEntry> {
        &mut self.bookings
    }
}

// =============================================================================
// Venue Owner
// =============================================================================

/// The owner of a venue hosting events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VenueOwner {
    pub id: String,
    pub venue_name: String,
    pub address: String,
    pub email: String,
    #[serde(default)]
    pub bookings: Vec<BookingEntry>,
}

impl Account for VenueOwner {
    fn id(&self) -> &str {
        &self.id
    }

    fn kind(&self) -> AccountKind {
        AccountKind::VenueOwner
    }

    fn email(&self) -> &str {
        &self.email
    }

    fn display_name(&self) -> String {
        self.venue_name.clone()
    }

    fn bookings(&self) -> &[BookingEntry] {
        &self.bookings
    }

    fn bookings_mut(&mut self) -> &mut Vec<BookingEntry> {
        &mut self.bookings
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(order_id: &str) -> BookingEntry {
        BookingEntry {
            order_id: order_id.to_string(),
            event_id: "ev-1".to_string(),
            line_items: Vec::new(),
            total_amount_cents: 36_108,
            currency: "INR".to_string(),
            booking_date: Utc::now(),
            status: BookingStatus::Confirmed,
        }
    }

    fn all_kinds() -> Vec<Box<dyn Account>> {
        vec![
            Box::new(Sponsor {
                id: "s-1".to_string(),
                business_name: "Acme Drinks".to_string(),
                contact_name: "Riya".to_string(),
                email: "riya@acme.test".to_string(),
                bookings: Vec::new(),
            }),
            Box::new(Curator {
                id: "c-1".to_string(),
                first_name: "Arjun".to_string(),
                last_name: "Mehta".to_string(),
                stage_name: Some("DJ Arj".to_string()),
                email: "arj@example.com".to_string(),
                bookings: Vec::new(),
            }),
            Box::new(Guest {
                id: "g-1".to_string(),
                first_name: "Sam".to_string(),
                last_name: "Lee".to_string(),
                email: "sam@example.com".to_string(),
                bookings: Vec::new(),
            }),
            Box::new(VenueOwner {
                id: "v-1".to_string(),
                venue_name: "The Warehouse".to_string(),
                address: "12 Dock Rd".to_string(),
                email: "owner@warehouse.test".to_string(),
                bookings: Vec::new(),
            }),
        ]
    }

    #[test]
    fn test_every_kind_records_bookings_through_the_trait() {
        for mut account in all_kinds() {
            account.append_booking(entry("o-1")).unwrap();
            assert_eq!(account.bookings().len(), 1);
            assert!(account.find_booking("o-1").is_some());
        }
    }

    #[test]
    fn test_duplicate_booking_rejected() {
        let mut accounts = all_kinds();
        let account = &mut accounts[2];
        account.append_booking(entry("o-1")).unwrap();
        let err = account.append_booking(entry("o-1")).unwrap_err();
        assert!(matches!(err, CoreError::DuplicateBooking(id) if id == "o-1"));
        assert_eq!(account.bookings().len(), 1);
    }

    #[test]
    fn test_cancel_booking_keeps_history() {
        let mut accounts = all_kinds();
        let account = &mut accounts[0];
        account.append_booking(entry("o-1")).unwrap();
        account.append_booking(entry("o-2")).unwrap();

        account.cancel_booking("o-1").unwrap();
        account.cancel_booking("o-1").unwrap();

        assert_eq!(account.bookings().len(), 2);
        assert_eq!(account.find_booking("o-1").map(|b| b.status), Some(BookingStatus::Cancelled));
        assert_eq!(account.find_booking("o-2").map(|b| b.status), Some(BookingStatus::Confirmed));
        assert!(matches!(
            account.cancel_booking("missing"),
            Err(CoreError::BookingNotFound(_))
        ));
    }

    #[test]
    fn test_display_names() {
        let names: Vec<String> = all_kinds().iter().map(|a| a.display_name()).collect();
        assert_eq!(names, vec!["Acme Drinks", "DJ Arj", "Sam Lee", "The Warehouse"]);
    }

    #[test]
    fn test_kinds_are_distinct() {
        let kinds: Vec<AccountKind> = all_kinds().iter().map(|a| a.kind()).collect();
        assert_eq!(kinds, AccountKind::ALL.to_vec());
    }
}
