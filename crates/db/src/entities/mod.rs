pub mod idempotency_record;
pub mod ledger_entry;
pub mod order;
