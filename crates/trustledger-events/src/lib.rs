//! Domain event log for the TrustLedger registries.
//!
//! Every committed registry mutation appends exactly one event to the
//! `ledger_events` table, inside the same transaction as the mutation. A
//! failed operation therefore leaves no event behind, and a reader never
//! sees an event for a change that is not visible yet.
//!
//! # Registries
//!
//! | Registry | Event types |
//! |----------|-------------|
//! | `IDENTITY` | `AGENT_REGISTERED`, `AGENT_UPDATED`, `AGENT_DEACTIVATED` |
//! | `REPUTATION` | `FEEDBACK_AUTHORIZED`, `FEEDBACK_SUBMITTED`, `FEEDBACK_REVOKED` |
//! | `VALIDATION` | `VALIDATION_REQUESTED`, `VALIDATION_RESPONSE_SUBMITTED` |
//!
//! # Usage
//!
//! ```rust,ignore
//! use trustledger_events::{emit_event, EventPayload};
//!
//! emit_event(
//!     &tx,
//!     &EventPayload::AgentDeactivated { agent_id },
//! )?;
//! ```

mod error;
mod event;
mod store;

pub use error::EventError;
pub use event::{EventPayload, LedgerEvent, ParseRegistryError, Registry};
pub use store::{emit_event, query_events, EventFilter, DEFAULT_QUERY_LIMIT};

#[cfg(test)]
mod tests;
