//! Sortable record domain model.
//!
//! # Responsibility
//! - Define the canonical row carried through ordering operations.
//!
//! # Invariants
//! - `id` is stable and never reused for another record.
//! - `order_column` values need not be contiguous or unique at rest.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier for one sortable record.
pub type RecordId = Uuid;

/// One row of an ordered table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortableRecord {
    /// Stable record ID.
    pub id: RecordId,
    /// User-facing payload.
    pub label: String,
    /// Integer rank; lower values sort first.
    pub order_column: i64,
    /// Epoch ms creation timestamp. Zero until persisted.
    pub created_at: i64,
    /// Epoch ms update timestamp. Zero until persisted.
    pub updated_at: i64,
}

impl SortableRecord {
    /// Creates an unsaved record with a generated ID and order `0`.
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), label)
    }

    /// Creates an unsaved record with a caller-provided ID.
    ///
    /// Used by import paths where identity already exists externally.
    pub fn with_id(id: RecordId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            order_column: 0,
            created_at: 0,
            updated_at: 0,
        }
    }

    /// Returns a copy with the given order value.
    pub fn with_order(mut self, order_column: i64) -> Self {
        self.order_column = order_column;
        self
    }
}
