//! Domain model for ordered records.
//!
//! # Responsibility
//! - Define the record shape shared by repository and service layers.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - All records share one ordering domain; there is no grouping key.

pub mod record;
