//! Core types for the credit ledger.
//!
//! This crate provides the foundational types shared by the storage layer,
//! the ledger engines and the HTTP service:
//!
//! - **Identifiers**: `UserId`, `CreditId`, `TransactionId`, `PaymentId`
//! - **Grants**: `CreditRecord`, `GrantType`
//! - **Ledger entries**: `CreditTransaction`, `TransactionType`
//! - **Plans**: `PlanTier`, `BillingCycle`, `PlanKey`, `PlanCatalog`
//! - **Billing**: `SubscriptionState`, `PaymentRecord`
//! - **Time**: `DayWindow`
//!
//! # Credit Unit
//!
//! A credit is an abstract unit of prepaid usage. Amounts are stored as
//! `i64` and are never fractional.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod billing;
pub mod credits;
pub mod day;
pub mod ids;
pub mod plan;
pub mod record;

pub use billing::{PaymentRecord, SubscriptionState};
pub use credits::{CreditTransaction, TransactionType};
pub use day::DayWindow;
pub use ids::{CreditId, IdError, PaymentId, TransactionId, UserId};
pub use plan::{BillingCycle, PlanCatalog, PlanError, PlanKey, PlanTier};
pub use record::{CreditRecord, GrantType};
