//! # Webhook Reconciler
//!
//! Turns a gateway notification into a completed (or failed) order, exactly
//! once, and reverses completed orders on refund.
//!
//! ## Reconcile
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reference                                                              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │  load order ── none ──────────────────────────► UnknownOrder            │
//! │     │                                                                   │
//! │  status != pending ───────────────────────────► AlreadyProcessed (no-op)│
//! │     │                                                                   │
//! │  verify_charge(reference)  (never trust the webhook body)               │
//! │     ├─ unreachable / timeout ─────────────────► GatewayUnavailable      │
//! │     ├─ failed ──► pending → failed ───────────► Failed                  │
//! │     ├─ pending / abandoned / unknown ─────────► StillPending            │
//! │     └─ success                                                          │
//! │          ├─ amount ≠ total ──► flag ──────────► AmountMismatch          │
//! │          ├─ no account ──────► flag ──────────► AccountMissing          │
//! │          └─ Ledger::confirm_order (one transaction)                     │
//! │               ├─ Confirmed ───────────────────► Confirmed               │
//! │               ├─ lost the CAS ────────────────► AlreadyProcessed        │
//! │               └─ oversold ──► flag ───────────► OversellDetected        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The status compare-and-set inside the ledger transaction is the only
//! idempotency gate. The early status check just avoids a gateway round trip
//! for duplicates.
//!
//! A paid order that cannot be applied stays `pending` with a review reason
//! so an operator can refund it; it is never completed without inventory.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use turnstile_core::{Account, Order, OrderStatus};
use turnstile_db::{ConfirmOutcome, Database, ReverseOutcome};

use crate::config::ReconcilerSettings;
use crate::error::{GatewayError, PaymentError, PaymentResult};
use crate::gateway::{bounded, Charge, ChargeStatus, PaymentGateway};
use crate::webhook::WebhookEvent;

// =============================================================================
// Outcomes
// =============================================================================

/// What a reconciliation did to the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// The order completed and its effects were applied.
    Confirmed,
    /// The order had already left `pending`; nothing changed.
    AlreadyProcessed(OrderStatus),
    /// The gateway reported the charge failed; the order is now `failed`.
    Failed,
    /// Not paid yet. `None` when the gateway has no record of the charge.
    StillPending { gateway_status: Option<ChargeStatus> },
}

/// Result of an admin refund.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundOutcome {
    Refunded,
    /// Already refunded earlier; nothing was sent to the gateway.
    AlreadyRefunded,
}

/// Result of [`Reconciler::resolve_review`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveOutcome {
    /// The captured charge was refunded and the order failed.
    Refunded { amount_cents: i64 },
    /// Nothing was captured; the order failed without a refund.
    Closed,
    /// Another operator resolved the order first; nothing was sent.
    AlreadyResolved,
    /// The order completed or was refunded before it could be failed.
    Superseded(OrderStatus),
}

/// Counters for one sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub confirmed: usize,
    pub failed: usize,
    /// Unpaid past the expiry and abandoned at the gateway.
    pub expired: usize,
    pub still_pending: usize,
    pub errors: usize,
}

// =============================================================================
// Reconciler
// =============================================================================

#[derive(Debug, Clone)]
pub struct Reconciler {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    call_timeout: Duration,
    settings: ReconcilerSettings,
}

impl Reconciler {
    pub fn new(
        db: Database,
        gateway: Arc<dyn PaymentGateway>,
        call_timeout: Duration,
        settings: ReconcilerSettings,
    ) -> Self {
        Reconciler {
            db,
            gateway,
            call_timeout,
            settings,
        }
    }

    /// Dispatches an authenticated webhook. Events other than
    /// `charge.success` are acknowledged and ignored (`Ok(None)`).
    pub async fn handle_webhook(&self, event: &WebhookEvent) -> PaymentResult<Option<Reconciliation>> {
        let reference = match event.reference() {
            Some(reference) if event.is_charge_success() => reference,
            reference => {
                debug!(event = %event.event, reference = ?reference, "Ignoring webhook event");
                return Ok(None);
            }
        };
        self.reconcile(reference).await.map(Some)
    }

    /// Reconciles the order behind a gateway reference.
    pub async fn reconcile(&self, reference: &str) -> PaymentResult<Reconciliation> {
        let order = match self.db.orders().get_by_reference(reference).await? {
            Some(order) => order,
            None => {
                warn!(reference = %reference, "Webhook for unknown order");
                return Err(PaymentError::UnknownOrder(reference.to_string()));
            }
        };
        self.reconcile_order(&order).await
    }

    async fn reconcile_order(&self, order: &Order) -> PaymentResult<Reconciliation> {
        if order.status != OrderStatus::Pending {
            debug!(order_id = %order.id, status = %order.status, "Order already processed");
            return Ok(Reconciliation::AlreadyProcessed(order.status));
        }

        let charge = match bounded(self.call_timeout, self.gateway.verify_charge(&order.gateway_reference)).await {
            Ok(charge) => charge,
            Err(GatewayError::UnknownReference(_)) => {
                debug!(order_id = %order.id, "Gateway has no charge for order yet");
                return Ok(Reconciliation::StillPending { gateway_status: None });
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Charge verification failed; order left pending");
                return Err(PaymentError::GatewayUnavailable(err));
            }
        };

        match charge.status {
            ChargeStatus::Success => self.apply_success(order, &charge).await,
            ChargeStatus::Failed => self.apply_failure(order).await,
            status @ (ChargeStatus::Abandoned | ChargeStatus::Pending) => Ok(Reconciliation::StillPending {
                gateway_status: Some(status),
            }),
        }
    }

    async fn apply_success(&self, order: &Order, charge: &Charge) -> PaymentResult<Reconciliation> {
        if charge.amount_cents != order.total_cents || !charge.currency.eq_ignore_ascii_case(&order.currency) {
            return self
                .hold_for_review(
                    order,
                    PaymentError::AmountMismatch {
                        order_id: order.id.clone(),
                        expected: order.total_cents,
                        charged: charge.amount_cents,
                        currency: charge.currency.clone(),
                    },
                )
                .await;
        }

        let Some(mut account) = self.db.accounts().find(order.buyer_account_kind, &order.buyer_id).await? else {
            return self
                .hold_for_review(
                    order,
                    PaymentError::AccountMissing {
                        order_id: order.id.clone(),
                        kind: order.buyer_account_kind,
                        buyer_id: order.buyer_id.clone(),
                    },
                )
                .await;
        };

        match self.db.ledger().confirm_order(order, account.as_mut()).await? {
            ConfirmOutcome::Confirmed => {
                info!(
                    order_id = %order.id,
                    buyer = %account.display_name(),
                    buyer_kind = %account.kind(),
                    total = order.total_cents,
                    "Payment reconciled"
                );
                Ok(Reconciliation::Confirmed)
            }
            ConfirmOutcome::AlreadyProcessed(status) => Ok(Reconciliation::AlreadyProcessed(status)),
            ConfirmOutcome::Oversold { ticket_type_id } => {
                error!(
                    order_id = %order.id,
                    ticket_type_id = %ticket_type_id,
                    "Verified payment would oversell; refund required"
                );
                self.hold_for_review(
                    order,
                    PaymentError::OversellDetected {
                        order_id: order.id.clone(),
                        ticket_type_id,
                    },
                )
                .await
            }
        }
    }

    async fn apply_failure(&self, order: &Order) -> PaymentResult<Reconciliation> {
        if self.db.orders().mark_failed(&order.id).await? {
            return Ok(Reconciliation::Failed);
        }

        let current = self
            .db
            .orders()
            .get_by_id(&order.id)
            .await?
            .map_or(order.status, |o| o.status);
        Ok(Reconciliation::AlreadyProcessed(current))
    }

    /// Leaves the order pending with `reason` recorded, then returns it.
    async fn hold_for_review(&self, order: &Order, reason: PaymentError) -> PaymentResult<Reconciliation> {
        error!(order_id = %order.id, reason = %reason, "Paid order held for manual review");
        self.db.orders().flag_for_review(&order.id, &reason.to_string()).await?;
        Err(reason)
    }

    // =========================================================================
    // Refunds
    // =========================================================================

    /// Refunds a completed order at the gateway, then reverses its effects.
    ///
    /// The order is claimed before the gateway is called, so concurrent
    /// requests send at most one refund. If the gateway refuses or times out
    /// the claim is released, nothing local changes, and the refund can be
    /// retried.
    pub async fn refund(&self, order_id: &str) -> PaymentResult<RefundOutcome> {
        let order = self.load(order_id).await?;

        match order.status {
            OrderStatus::Completed => {}
            OrderStatus::Refunded => return Ok(RefundOutcome::AlreadyRefunded),
            status => {
                return Err(PaymentError::NotRefundable {
                    order_id: order.id.clone(),
                    status,
                })
            }
        }

        let mut account = self
            .db
            .accounts()
            .find(order.buyer_account_kind, &order.buyer_id)
            .await?
            .ok_or_else(|| PaymentError::AccountMissing {
                order_id: order.id.clone(),
                kind: order.buyer_account_kind,
                buyer_id: order.buyer_id.clone(),
            })?;

        let now = Utc::now();
        let stale_before = now - self.settings.refund_claim_ttl();
        if !self.db.orders().claim_refund(&order.id, now, stale_before).await? {
            let current = self.load(order_id).await?.status;
            debug!(order_id = %order.id, status = %current, "Refund claim not taken");
            return match current {
                OrderStatus::Refunded => Ok(RefundOutcome::AlreadyRefunded),
                OrderStatus::Completed => Err(PaymentError::RefundInProgress {
                    order_id: order.id.clone(),
                }),
                status => Err(PaymentError::NotRefundable {
                    order_id: order.id.clone(),
                    status,
                }),
            };
        }

        let refunded = bounded(
            self.call_timeout,
            self.gateway.refund(&order.gateway_reference, order.total_cents),
        )
        .await;
        if let Err(err) = refunded {
            warn!(order_id = %order.id, error = %err, "Gateway refund failed");
            self.db.orders().release_refund_claim(&order.id).await?;
            return Err(PaymentError::GatewayUnavailable(err));
        }

        match self.db.ledger().reverse_order(&order, account.as_mut()).await? {
            ReverseOutcome::Reversed => {
                info!(
                    order_id = %order.id,
                    buyer = %account.display_name(),
                    amount = order.total_cents,
                    "Order refunded"
                );
                Ok(RefundOutcome::Refunded)
            }
            ReverseOutcome::NotCompleted(OrderStatus::Refunded) => Ok(RefundOutcome::AlreadyRefunded),
            ReverseOutcome::NotCompleted(status) => Err(PaymentError::NotRefundable {
                order_id: order.id.clone(),
                status,
            }),
            ReverseOutcome::Drift { ticket_type_id } => {
                let err = PaymentError::LedgerDrift {
                    order_id: order.id.clone(),
                    ticket_type_id,
                };
                error!(order_id = %order.id, reason = %err, "Refunded at gateway but ledger not reversed");
                self.db.orders().flag_for_review(&order.id, &err.to_string()).await?;
                Err(err)
            }
        }
    }

    // =========================================================================
    // Review Queue
    // =========================================================================

    /// Closes an order held for review: refunds whatever the gateway
    /// captured, fails the order and clears its flag.
    ///
    /// ```text
    /// 1. order flagged and pending/failed        else NotInReview
    /// 2. verify_charge                           unreachable → GatewayUnavailable
    /// 3. pending → failed (CAS)                  completed meanwhile → Superseded
    /// 4. clear flag (CAS)                        lost → AlreadyResolved
    /// 5. refund the amount actually charged      nothing captured → Closed
    /// ```
    ///
    /// If the gateway refund fails the order stays failed and is flagged
    /// again, so the operator can retry.
    pub async fn resolve_review(&self, order_id: &str) -> PaymentResult<ResolveOutcome> {
        let order = self.load(order_id).await?;
        let resolvable = matches!(order.status, OrderStatus::Pending | OrderStatus::Failed);
        if !order.needs_review() || !resolvable {
            return Err(PaymentError::NotInReview {
                order_id: order.id.clone(),
            });
        }

        let captured = match bounded(self.call_timeout, self.gateway.verify_charge(&order.gateway_reference)).await {
            Ok(charge) if charge.status == ChargeStatus::Success => Some(charge.amount_cents),
            Ok(_) | Err(GatewayError::UnknownReference(_)) => None,
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Cannot resolve review: charge verification failed");
                return Err(PaymentError::GatewayUnavailable(err));
            }
        };

        if !self.db.orders().mark_failed(&order.id).await? {
            let current = self.load(order_id).await?.status;
            if current != OrderStatus::Failed {
                info!(order_id = %order.id, status = %current, "Reviewed order moved on before resolution");
                return Ok(ResolveOutcome::Superseded(current));
            }
        }

        if !self.db.orders().clear_review(&order.id).await? {
            return Ok(ResolveOutcome::AlreadyResolved);
        }

        let Some(amount_cents) = captured else {
            info!(order_id = %order.id, "Reviewed order closed without a captured charge");
            return Ok(ResolveOutcome::Closed);
        };

        match bounded(self.call_timeout, self.gateway.refund(&order.gateway_reference, amount_cents)).await {
            Ok(_) => {
                info!(order_id = %order.id, amount = amount_cents, "Reviewed order refunded and closed");
                Ok(ResolveOutcome::Refunded { amount_cents })
            }
            Err(err) => {
                warn!(order_id = %order.id, error = %err, "Gateway refund failed while resolving review");
                let reason = format!("refund of {amount_cents} failed: {err}");
                self.db.orders().flag_for_review(&order.id, &reason).await?;
                Err(PaymentError::GatewayUnavailable(err))
            }
        }
    }

    async fn load(&self, order_id: &str) -> PaymentResult<Order> {
        self.db
            .orders()
            .get_by_id(order_id)
            .await?
            .ok_or_else(|| PaymentError::not_found("Order", order_id))
    }

    // =========================================================================
    // Sweep
    // =========================================================================

    /// Re-verifies stale pending orders with the gateway.
    ///
    /// Orders younger than the grace period are left for their webhook.
    /// Orders flagged for review are skipped. An order unpaid past the
    /// expiry whose charge is abandoned, or unknown to the gateway, fails.
    pub async fn sweep_pending(&self, now: DateTime<Utc>) -> PaymentResult<SweepReport> {
        let cutoff = now - self.settings.grace_period();
        let expiry = self.settings.pending_expiry();
        let orders = self
            .db
            .orders()
            .list_pending_before(cutoff, self.settings.batch_size)
            .await?;

        let mut report = SweepReport::default();
        for order in &orders {
            report.examined += 1;

            match self.reconcile_order(order).await {
                Ok(Reconciliation::Confirmed) => report.confirmed += 1,
                Ok(Reconciliation::Failed) => report.failed += 1,
                Ok(Reconciliation::AlreadyProcessed(_)) => {}
                Ok(Reconciliation::StillPending { gateway_status }) => {
                    let abandoned = matches!(gateway_status, None | Some(ChargeStatus::Abandoned));
                    if abandoned && order.created_at + expiry <= now {
                        if self.db.orders().mark_failed(&order.id).await? {
                            info!(order_id = %order.id, "Expired unpaid order");
                            report.expired += 1;
                        }
                    } else {
                        report.still_pending += 1;
                    }
                }
                Err(err) => {
                    debug!(order_id = %order.id, error = %err, "Sweep could not reconcile order");
                    report.errors += 1;
                }
            }
        }

        if report.examined > 0 {
            info!(
                examined = report.examined,
                confirmed = report.confirmed,
                failed = report.failed,
                expired = report.expired,
                errors = report.errors,
                "Pending order sweep finished"
            );
        }
        Ok(report)
    }

    /// Runs [`sweep_pending`](Self::sweep_pending) every `interval` until
    /// `shutdown` flips to true.
    pub async fn run_sweeper(&self, interval: Duration, mut shutdown: watch::Receiver<bool>) {
        info!(?interval, "Pending order sweeper started");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.sweep_pending(Utc::now()).await {
                        warn!(error = %err, "Pending order sweep failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Pending order sweeper stopped");
                        return;
                    }
                }
            }
        }
    }
}
