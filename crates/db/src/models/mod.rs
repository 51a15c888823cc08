#![allow(clippy::useless_conversion)]

pub mod idempotency;
pub mod ledger;
pub mod order;
