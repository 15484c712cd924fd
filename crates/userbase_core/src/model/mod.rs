//! Domain model for the user store.
//!
//! # Responsibility
//! - Define canonical data structures used by repository and service.
//! - Keep field rules next to the record they constrain.
//!
//! # Invariants
//! - Every persisted user is identified by a storage-assigned `UserId`.
//! - Soft deletion flips `active`; hard deletion removes the row.

pub mod user;
