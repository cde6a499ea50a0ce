//! Deterministic, pure logic shared by the deploy pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! values and return deterministic outputs suitable for tests.

pub mod checkout;
pub mod divergence;
pub mod policy;
pub mod types;
