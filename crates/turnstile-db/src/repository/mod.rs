//! # Repository Module
//!
//! One repository per aggregate. Each holds a pool clone and owns the SQL for
//! its tables.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  EventRepository      events                                            │
//! │  InventoryRepository  ticket_types       reserve / release (atomic)    │
//! │  OrderRepository      orders, order_line_items   status CAS             │
//! │  AccountRepository    4 account tables + 4 booking tables               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Writes that must commit together with other entities take a
//! `&mut SqliteConnection` so the [`Ledger`](crate::ledger::Ledger) can run
//! them inside one transaction.

pub mod account;
pub mod event;
pub mod inventory;
pub mod order;
