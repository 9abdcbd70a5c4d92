//! Request handlers, one module per resource.

pub mod accounts;
pub mod health;
pub mod payments;
pub mod tickets;
