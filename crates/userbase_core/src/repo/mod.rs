//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the data access contract the service layer depends on.
//! - Isolate SQLite query details from business orchestration.
//!
//! # Invariants
//! - Repositories own no business rules; validation lives in `service`.
//! - Missing rows are reported as absent values on read paths.

pub mod user_repo;
