//! End-to-end checkout and reconciliation against an in-memory database and
//! the scriptable mock gateway.

use chrono::{Duration as ChronoDuration, Utc};
use std::sync::Arc;
use std::time::Duration;

use turnstile_core::pricing::Selection;
use turnstile_core::{AccountKind, BookingStatus, CoreError, Event, Guest, OrderStatus, TicketType};
use turnstile_db::{Database, DbConfig};
use turnstile_payments::config::ReconcilerSettings;
use turnstile_payments::{
    Buyer, ChargeStatus, Checkout, MockGateway, PaymentError, PaymentGateway, Reconciler, Reconciliation,
    RefundOutcome, ResolveOutcome, WebhookEvent,
};

struct Harness {
    db: Database,
    gateway: Arc<MockGateway>,
    checkout: Checkout,
    reconciler: Reconciler,
}

fn ticket(id: &str, price_cents: i64, available: i64) -> TicketType {
    TicketType {
        id: id.to_string(),
        event_id: "ev-1".to_string(),
        name: id.to_uppercase(),
        description: None,
        benefits: Vec::new(),
        price_cents,
        currency: "INR".to_string(),
        available,
        sold: 0,
        sale_start: None,
        sale_end: None,
    }
}

async fn harness(tickets: &[TicketType]) -> Harness {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    db.events()
        .insert(&Event {
            id: "ev-1".to_string(),
            title: "Harbour Lights".to_string(),
            venue: Some("Pier 9".to_string()),
            starts_at: Utc::now() + ChronoDuration::days(7),
            created_at: Utc::now(),
        })
        .await
        .unwrap();
    for t in tickets {
        db.inventory().insert(t).await.unwrap();
    }

    let gateway = Arc::new(MockGateway::new());
    let shared: Arc<dyn PaymentGateway> = gateway.clone();
    let timeout = Duration::from_secs(5);
    let settings = ReconcilerSettings {
        sweep_interval_secs: 0,
        grace_period_secs: 0,
        pending_expiry_mins: 0,
        batch_size: 50,
        refund_claim_ttl_secs: 300,
    };

    Harness {
        checkout: Checkout::new(db.clone(), shared.clone(), timeout),
        reconciler: Reconciler::new(db.clone(), shared, timeout, settings),
        db,
        gateway,
    }
}

async fn guest(db: &Database, id: &str) -> Buyer {
    db.accounts()
        .insert_guest(&Guest {
            id: id.to_string(),
            first_name: "Test".to_string(),
            last_name: id.to_string(),
            email: format!("{id}@example.com"),
            bookings: Vec::new(),
        })
        .await
        .unwrap();
    Buyer::new(id, AccountKind::Guest)
}

async fn sold(db: &Database, id: &str) -> i64 {
    db.inventory().get_by_id(id).await.unwrap().unwrap().sold
}

#[tokio::test]
async fn booking_creates_pending_order_without_reserving() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;

    let receipt = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap();

    assert_eq!(receipt.order.total_cents, 36_108);
    assert!(receipt.payment_url.contains(&receipt.order.id));
    assert!(h.gateway.has_session(&receipt.order.id));

    let stored = h.db.orders().get_by_id(&receipt.order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert_eq!(stored.payment_url.as_deref(), Some(receipt.payment_url.as_str()));
    assert_eq!(sold(&h.db, "vip").await, 0);
}

#[tokio::test]
async fn duplicate_webhook_books_once() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let receipt = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap();
    h.gateway.settle(&receipt.order.id, ChargeStatus::Success);

    let first = h.reconciler.reconcile(&receipt.order.id).await.unwrap();
    let second = h.reconciler.reconcile(&receipt.order.id).await.unwrap();

    assert_eq!(first, Reconciliation::Confirmed);
    assert_eq!(second, Reconciliation::AlreadyProcessed(OrderStatus::Completed));
    assert_eq!(sold(&h.db, "vip").await, 2);
    assert_eq!(h.db.accounts().bookings(AccountKind::Guest, "g-1").await.unwrap().len(), 1);
    assert!(h.db.events().is_attendee("ev-1", AccountKind::Guest, "g-1").await.unwrap());
    // The duplicate never reached the gateway.
    assert_eq!(h.gateway.verify_calls(), 1);
}

#[tokio::test]
async fn price_change_after_booking_does_not_change_charge() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let receipt = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap();

    h.db.inventory().update_price("vip", 99_900).await.unwrap();
    h.gateway.settle(&receipt.order.id, ChargeStatus::Success);
    h.reconciler.reconcile(&receipt.order.id).await.unwrap();

    let order = h.db.orders().get_by_id(&receipt.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.total_cents, 36_108);
    assert_eq!(order.line_items[0].unit_price_cents, 15_000);

    let bookings = h.db.accounts().bookings(AccountKind::Guest, "g-1").await.unwrap();
    assert_eq!(bookings[0].total_amount_cents, 36_108);
}

#[tokio::test]
async fn failing_line_item_leaves_whole_order_unapplied() {
    let h = harness(&[ticket("vip", 15_000, 5), ticket("ga", 4_999, 1)]).await;
    let first = guest(&h.db, "g-1").await;
    let second = guest(&h.db, "g-2").await;

    let ga_only = h
        .checkout
        .book(&first, "ev-1", &[Selection::new("ga", 1)], "g-1@example.com")
        .await
        .unwrap();
    let mixed = h
        .checkout
        .book(
            &second,
            "ev-1",
            &[Selection::new("vip", 2), Selection::new("ga", 1)],
            "g-2@example.com",
        )
        .await
        .unwrap();

    h.gateway.settle(&ga_only.order.id, ChargeStatus::Success);
    h.gateway.settle(&mixed.order.id, ChargeStatus::Success);
    h.reconciler.reconcile(&ga_only.order.id).await.unwrap();

    let err = h.reconciler.reconcile(&mixed.order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::OversellDetected { ref ticket_type_id, .. } if ticket_type_id == "ga"));

    assert_eq!(sold(&h.db, "vip").await, 0);
    assert_eq!(sold(&h.db, "ga").await, 1);
    let order = h.db.orders().get_by_id(&mixed.order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert!(order.needs_review());
    assert!(h.db.accounts().bookings(AccountKind::Guest, "g-2").await.unwrap().is_empty());
}

#[tokio::test]
async fn two_buyers_racing_for_the_last_ticket() {
    let h = harness(&[ticket("last", 10_000, 1)]).await;
    let a = guest(&h.db, "g-a").await;
    let b = guest(&h.db, "g-b").await;

    let order_a = h
        .checkout
        .book(&a, "ev-1", &[Selection::new("last", 1)], "a@example.com")
        .await
        .unwrap()
        .order;
    let order_b = h
        .checkout
        .book(&b, "ev-1", &[Selection::new("last", 1)], "b@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order_a.id, ChargeStatus::Success);
    h.gateway.settle(&order_b.id, ChargeStatus::Success);

    let (ra, rb) = tokio::join!(
        h.reconciler.reconcile(&order_a.id),
        h.reconciler.reconcile(&order_b.id)
    );

    let results = [ra, rb];
    let confirmed = results
        .iter()
        .filter(|r| matches!(r, Ok(Reconciliation::Confirmed)))
        .count();
    let oversold = results
        .iter()
        .filter(|r| matches!(r, Err(PaymentError::OversellDetected { .. })))
        .count();

    assert_eq!(confirmed, 1);
    assert_eq!(oversold, 1);
    assert_eq!(sold(&h.db, "last").await, 1);

    // The paid loser is surfaced for a manual refund.
    let flagged = h.db.orders().list_flagged(10).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].status, OrderStatus::Pending);
}

#[tokio::test]
async fn refund_reverses_inventory_and_booking() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 3)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);
    h.reconciler.reconcile(&order.id).await.unwrap();
    assert_eq!(sold(&h.db, "vip").await, 3);

    assert_eq!(h.reconciler.refund(&order.id).await.unwrap(), RefundOutcome::Refunded);

    assert_eq!(sold(&h.db, "vip").await, 0);
    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Refunded);
    assert!(stored.refunded_at.is_some());

    let bookings = h.db.accounts().bookings(AccountKind::Guest, "g-1").await.unwrap();
    assert_eq!(bookings[0].status, BookingStatus::Cancelled);
    assert!(!h.db.events().is_attendee("ev-1", AccountKind::Guest, "g-1").await.unwrap());

    let refunds = h.gateway.refunds();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].amount_cents, stored.total_cents);

    assert_eq!(h.reconciler.refund(&order.id).await.unwrap(), RefundOutcome::AlreadyRefunded);
    assert_eq!(h.gateway.refunds().len(), 1);
}

#[tokio::test]
async fn refund_of_pending_order_is_refused() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap()
        .order;

    let err = h.reconciler.refund(&order.id).await.unwrap_err();
    assert_eq!(err.to_string(), "Payment cannot be refunded from pending status");
    assert!(h.gateway.refunds().is_empty());
}

#[tokio::test]
async fn refund_waits_for_gateway() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);
    h.reconciler.reconcile(&order.id).await.unwrap();

    h.gateway.set_offline(true);
    let err = h.reconciler.refund(&order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayUnavailable(_)));

    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Completed);
    assert_eq!(sold(&h.db, "vip").await, 1);

    // The failed attempt released its claim.
    h.gateway.set_offline(false);
    assert_eq!(h.reconciler.refund(&order.id).await.unwrap(), RefundOutcome::Refunded);
    assert_eq!(h.gateway.refunds().len(), 1);
}

#[tokio::test]
async fn concurrent_refunds_reach_the_gateway_once() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);
    h.reconciler.reconcile(&order.id).await.unwrap();
    h.gateway.set_refund_delay(Duration::from_millis(100));

    let (first, second) = tokio::join!(h.reconciler.refund(&order.id), h.reconciler.refund(&order.id));

    let results = [first, second];
    let refunded = results
        .iter()
        .filter(|r| matches!(r, Ok(RefundOutcome::Refunded)))
        .count();
    let turned_away = results
        .iter()
        .filter(|r| {
            matches!(
                r,
                Ok(RefundOutcome::AlreadyRefunded) | Err(PaymentError::RefundInProgress { .. })
            )
        })
        .count();
    assert_eq!(refunded, 1);
    assert_eq!(turned_away, 1);

    assert_eq!(h.gateway.refunds().len(), 1);
    assert_eq!(sold(&h.db, "vip").await, 0);
    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Refunded);
}

#[tokio::test]
async fn held_order_is_refunded_and_closed() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);
    h.gateway.set_charged_amount(&order.id, 100);
    assert!(h.reconciler.reconcile(&order.id).await.unwrap_err().needs_review());

    let outcome = h.reconciler.resolve_review(&order.id).await.unwrap();
    assert_eq!(outcome, ResolveOutcome::Refunded { amount_cents: 100 });

    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
    assert!(!stored.needs_review());
    assert!(h.db.orders().list_flagged(10).await.unwrap().is_empty());
    assert_eq!(h.gateway.refunds().len(), 1);
    assert_eq!(h.gateway.refunds()[0].amount_cents, 100);
    assert_eq!(sold(&h.db, "vip").await, 0);

    let err = h.reconciler.resolve_review(&order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotInReview { .. }));
    assert_eq!(h.gateway.refunds().len(), 1);
}

#[tokio::test]
async fn resolve_requires_a_flagged_order() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap()
        .order;

    let err = h.reconciler.resolve_review(&order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotInReview { .. }));
    let err = h.reconciler.resolve_review("missing").await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound { .. }));

    // Flagged, but the gateway never captured anything.
    h.db.orders().flag_for_review(&order.id, "checked by support").await.unwrap();
    assert_eq!(h.reconciler.resolve_review(&order.id).await.unwrap(), ResolveOutcome::Closed);
    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Failed);
    assert!(h.gateway.refunds().is_empty());
}

#[tokio::test]
async fn resolve_survives_gateway_outage_and_races() {
    let h = harness(&[ticket("last", 10_000, 1)]).await;
    let a = guest(&h.db, "g-a").await;
    let b = guest(&h.db, "g-b").await;
    let first = h
        .checkout
        .book(&a, "ev-1", &[Selection::new("last", 1)], "a@example.com")
        .await
        .unwrap()
        .order;
    let second = h
        .checkout
        .book(&b, "ev-1", &[Selection::new("last", 1)], "b@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&first.id, ChargeStatus::Success);
    h.gateway.settle(&second.id, ChargeStatus::Success);
    h.reconciler.reconcile(&first.id).await.unwrap();
    let err = h.reconciler.reconcile(&second.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::OversellDetected { .. }));

    h.gateway.set_offline(true);
    let err = h.reconciler.resolve_review(&second.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayUnavailable(_)));
    let stored = h.db.orders().get_by_id(&second.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.needs_review());

    h.gateway.set_offline(false);
    let (x, y) = tokio::join!(
        h.reconciler.resolve_review(&second.id),
        h.reconciler.resolve_review(&second.id)
    );
    let outcomes = [x.unwrap(), y.unwrap()];
    assert!(outcomes.contains(&ResolveOutcome::Refunded { amount_cents: second.total_cents }));
    assert!(outcomes.contains(&ResolveOutcome::AlreadyResolved));
    assert_eq!(h.gateway.refunds().len(), 1);
    assert_eq!(sold(&h.db, "last").await, 1);
}

#[tokio::test]
async fn failed_charge_fails_order() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Failed);

    assert_eq!(h.reconciler.reconcile(&order.id).await.unwrap(), Reconciliation::Failed);
    assert_eq!(
        h.reconciler.reconcile(&order.id).await.unwrap(),
        Reconciliation::AlreadyProcessed(OrderStatus::Failed)
    );
    assert_eq!(sold(&h.db, "vip").await, 0);
    assert!(h.db.accounts().bookings(AccountKind::Guest, "g-1").await.unwrap().is_empty());
}

#[tokio::test]
async fn charged_amount_must_match_total() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 2)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);
    h.gateway.set_charged_amount(&order.id, 100);

    let err = h.reconciler.reconcile(&order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::AmountMismatch { charged: 100, expected: 36_108, .. }));

    let stored = h.db.orders().get_by_id(&order.id).await.unwrap().unwrap();
    assert_eq!(stored.status, OrderStatus::Pending);
    assert!(stored.needs_review());
    assert_eq!(sold(&h.db, "vip").await, 0);
}

#[tokio::test]
async fn unknown_reference_and_ignored_events() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;

    let err = h.reconciler.reconcile("no-such-order").await.unwrap_err();
    assert!(matches!(err, PaymentError::UnknownOrder(_)));

    let transfer = WebhookEvent::parse(br#"{"event":"transfer.success","data":{"reference":"t-1"}}"#).unwrap();
    assert_eq!(h.reconciler.handle_webhook(&transfer).await.unwrap(), None);

    let subscription =
        WebhookEvent::parse(br#"{"event":"subscription.create","data":{"subscription_code":"SUB_1"}}"#).unwrap();
    assert_eq!(h.reconciler.handle_webhook(&subscription).await.unwrap(), None);
}

#[tokio::test]
async fn gateway_outage_leaves_order_pending() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;

    h.gateway.set_offline(true);
    let err = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(h.db.orders().count_by_status(OrderStatus::Pending).await.unwrap(), 1);

    h.gateway.set_offline(false);
    let order = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
        .await
        .unwrap()
        .order;
    h.gateway.settle(&order.id, ChargeStatus::Success);

    h.gateway.set_offline(true);
    let err = h.reconciler.reconcile(&order.id).await.unwrap_err();
    assert!(matches!(err, PaymentError::GatewayUnavailable(_)));
    assert_eq!(sold(&h.db, "vip").await, 0);

    // The retried webhook succeeds once the gateway is back.
    h.gateway.set_offline(false);
    assert_eq!(h.reconciler.reconcile(&order.id).await.unwrap(), Reconciliation::Confirmed);
}

#[tokio::test]
async fn booking_rejections() {
    let h = harness(&[ticket("vip", 15_000, 3)]).await;
    let buyer = guest(&h.db, "g-1").await;

    let err = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 4)], "g-1@example.com")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        PaymentError::Domain(CoreError::InsufficientAvailability { remaining: 3, .. })
    ));
    assert_eq!(err.to_string(), "Only 3 tickets available for VIP");

    let err = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("nope", 1)], "g-1@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Domain(CoreError::UnknownTicketType(_))));

    let stranger = Buyer::new("ghost", AccountKind::Sponsor);
    let err = h
        .checkout
        .book(&stranger, "ev-1", &[Selection::new("vip", 1)], "ghost@example.com")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::NotFound { .. }));

    let err = h
        .checkout
        .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "not-an-email")
        .await
        .unwrap_err();
    assert!(matches!(err, PaymentError::Domain(CoreError::Validation(_))));

    let err = h.checkout.quote("ev-404", &[Selection::new("vip", 1)]).await.unwrap_err();
    assert!(matches!(err, PaymentError::NotFound { .. }));

    assert_eq!(h.db.orders().count_by_status(OrderStatus::Pending).await.unwrap(), 0);
}

#[tokio::test]
async fn sweep_settles_stale_pending_orders() {
    let h = harness(&[ticket("vip", 15_000, 10)]).await;
    let buyer = guest(&h.db, "g-1").await;

    let mut ids = Vec::new();
    for _ in 0..4 {
        let order = h
            .checkout
            .book(&buyer, "ev-1", &[Selection::new("vip", 1)], "g-1@example.com")
            .await
            .unwrap()
            .order;
        ids.push(order.id);
    }
    h.gateway.settle(&ids[0], ChargeStatus::Success);
    h.gateway.settle(&ids[1], ChargeStatus::Failed);
    h.gateway.settle(&ids[2], ChargeStatus::Abandoned);
    h.db.orders().flag_for_review(&ids[3], "operator hold").await.unwrap();

    let report = h
        .reconciler
        .sweep_pending(Utc::now() + ChronoDuration::seconds(1))
        .await
        .unwrap();

    assert_eq!(report.examined, 3);
    assert_eq!(report.confirmed, 1);
    assert_eq!(report.failed, 1);
    assert_eq!(report.expired, 1);

    let status = |i: usize| {
        let db = h.db.clone();
        let id = ids[i].clone();
        async move { db.orders().get_by_id(&id).await.unwrap().unwrap().status }
    };
    assert_eq!(status(0).await, OrderStatus::Completed);
    assert_eq!(status(1).await, OrderStatus::Failed);
    assert_eq!(status(2).await, OrderStatus::Failed);
    assert_eq!(status(3).await, OrderStatus::Pending);
    assert_eq!(sold(&h.db, "vip").await, 1);
}
