//! Core use-case services.
//!
//! # Responsibility
//! - Enforce business rules and orchestrate repository calls.
//! - Keep callers decoupled from storage details.

pub mod user_service;
