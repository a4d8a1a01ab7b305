//! Storage traits and implementations.
//!
//! Each store is a thread-safe trait with an in-memory implementation. Activity
//! metrics and audit logs also have a `ClickHouse` implementation for durable
//! deployments.

pub mod activity_store;
pub mod audit_store;
pub mod state_store;

pub use activity_store::{
    ActivityStore, ActivityStoreError, ClickHouseActivityStore, InMemoryActivityStore,
};
pub use audit_store::{AuditStore, AuditStoreError, ClickHouseAuditStore, InMemoryAuditStore};
pub use state_store::{InMemoryStateStore, StateStore, StateStoreError};
