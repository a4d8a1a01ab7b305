//! Integration tests for the Rivalwatch API.
//!
//! These tests drive the full router with in-memory stores and a manual
//! clock: messages go in over HTTP, ticks run on demand, and results are
//! read back through the query and command endpoints.

mod activity_tests;
mod commands_tests;
mod common;
mod comparison_tests;
mod health_tests;
mod retention_tests;
