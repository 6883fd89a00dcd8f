//! # hybridflow-store
//!
//! SQLite persistence for tenants, chat sessions, messages and the
//! idempotency ledger.

pub mod store;

pub use store::{
    ledger::ProcessedEvent, messages::NewMessage, messages::StoredMessage, sessions::Session,
    Store,
};
