//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the record store contract consumed by ordering services.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod record_repo;
