//! Persistent record ordering over SQLite.
//!
//! Records carry an integer rank column. This crate assigns initial ranks,
//! reorders records from id lists, and swaps adjacent records.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use config::{ConfigError, SortableConfig, DEFAULT_ORDER_COLUMN};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::record::{RecordId, SortableRecord};
pub use repo::record_repo::{
    OrderDirection, OrderFilter, RecordQuery, RecordRepoError, RecordRepoResult, RecordStore,
    SqliteRecordStore,
};
pub use service::order_service::{
    parse_id_list, run_in_transaction, OrderResult, OrderService, OrderServiceError,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
