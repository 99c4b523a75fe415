//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide find/max/query/save primitives over `sortable_records`.
//! - Keep SQL text, including the configured order column, inside this module.
//!
//! # Invariants
//! - The order column name is validated once in `try_new` and never taken
//!   from per-call input.
//! - Ordered queries are deterministic: `<order column>, id` in the requested
//!   direction.

use crate::config::SortableConfig;
use crate::db::migrations::latest_version;
use crate::db::{schema_version, DbError};
use crate::model::record::{RecordId, SortableRecord};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const RECORDS_TABLE: &str = "sortable_records";
const RESERVED_COLUMNS: [&str; 4] = ["id", "label", "created_at", "updated_at"];

/// Result type used by record store operations.
pub type RecordRepoResult<T> = Result<T, RecordRepoError>;

/// Errors from record store operations.
#[derive(Debug)]
pub enum RecordRepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    /// Target record does not exist.
    NotFound(RecordId),
    /// Configured order column cannot be used.
    InvalidColumnName(String),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    /// Required table is missing.
    MissingRequiredTable(&'static str),
    /// Required column is missing from expected table.
    MissingRequiredColumn { table: &'static str, column: String },
    /// Persisted data cannot be converted to a valid record.
    InvalidData(String),
}

impl Display for RecordRepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::InvalidColumnName(name) => {
                write!(f, "`{name}` cannot be used as order column")
            }
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "record store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "record store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "record store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RecordRepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RecordRepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RecordRepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Strict comparison against the order column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFilter {
    /// `order > value`
    Above(i64),
    /// `order < value`
    Below(i64),
}

/// Sort direction over `(order, id)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Ascending,
    Descending,
}

/// Ordered, optionally filtered and limited record query.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    pub filter: Option<OrderFilter>,
    pub direction: OrderDirection,
    pub limit: Option<u32>,
}

impl RecordQuery {
    /// All records by ascending order.
    pub fn ordered() -> Self {
        Self::default()
    }

    /// Nearest record with a strictly higher order.
    pub fn next_above(order: i64) -> Self {
        Self {
            filter: Some(OrderFilter::Above(order)),
            direction: OrderDirection::Ascending,
            limit: Some(1),
        }
    }

    /// Nearest record with a strictly lower order.
    pub fn next_below(order: i64) -> Self {
        Self {
            filter: Some(OrderFilter::Below(order)),
            direction: OrderDirection::Descending,
            limit: Some(1),
        }
    }
}

/// Persistence contract required by the ordering service.
pub trait RecordStore {
    /// Loads one record, failing with `NotFound` when absent.
    fn find(&self, id: RecordId) -> RecordRepoResult<SortableRecord>;
    /// Highest order value, `None` on an empty table.
    fn max_order(&self) -> RecordRepoResult<Option<i64>>;
    /// Runs an ordered query.
    fn query(&self, query: &RecordQuery) -> RecordRepoResult<Vec<SortableRecord>>;
    /// Persists a new record and returns the stored row.
    fn insert(&self, record: &SortableRecord) -> RecordRepoResult<SortableRecord>;
    /// Persists label and order of an existing record.
    fn save(&self, record: &SortableRecord) -> RecordRepoResult<()>;
}

/// SQLite-backed record store.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
    order_column: String,
    quoted_column: String,
    select_sql: String,
}

impl<'conn> SqliteRecordStore<'conn> {
    /// Creates a store from a migrated connection and resolved config.
    pub fn try_new(conn: &'conn Connection, config: &SortableConfig) -> RecordRepoResult<Self> {
        config
            .validate()
            .map_err(|_| RecordRepoError::InvalidColumnName(config.order_column_name.clone()))?;
        let order_column = config.resolved_order_column().to_string();
        if RESERVED_COLUMNS
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(&order_column))
        {
            return Err(RecordRepoError::InvalidColumnName(order_column));
        }

        ensure_record_connection_ready(conn, &order_column)?;

        let quoted_column = quote_identifier(&order_column);
        let select_sql = format!(
            "SELECT
                id,
                label,
                {quoted_column} AS order_value,
                created_at,
                updated_at
             FROM {RECORDS_TABLE}"
        );
        Ok(Self {
            conn,
            order_column,
            quoted_column,
            select_sql,
        })
    }

    /// Returns the resolved order column name.
    pub fn order_column(&self) -> &str {
        &self.order_column
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn find(&self, id: RecordId) -> RecordRepoResult<SortableRecord> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1;", self.select_sql))?;
        let mut rows = stmt.query([id.to_string()])?;
        if let Some(row) = rows.next()? {
            return parse_record_row(row);
        }
        Err(RecordRepoError::NotFound(id))
    }

    fn max_order(&self) -> RecordRepoResult<Option<i64>> {
        let value = self.conn.query_row(
            &format!("SELECT MAX({}) FROM {RECORDS_TABLE};", self.quoted_column),
            [],
            |row| row.get::<_, Option<i64>>(0),
        )?;
        Ok(value)
    }

    fn query(&self, query: &RecordQuery) -> RecordRepoResult<Vec<SortableRecord>> {
        let column = self.quoted_column.as_str();
        let mut sql = format!("{} WHERE 1 = 1", self.select_sql);
        let mut bind_values: Vec<Value> = Vec::new();

        match query.filter {
            Some(OrderFilter::Above(order)) => {
                sql.push_str(&format!(" AND {column} > ?"));
                bind_values.push(Value::Integer(order));
            }
            Some(OrderFilter::Below(order)) => {
                sql.push_str(&format!(" AND {column} < ?"));
                bind_values.push(Value::Integer(order));
            }
            None => {}
        }

        match query.direction {
            OrderDirection::Ascending => sql.push_str(&format!(" ORDER BY {column} ASC, id ASC")),
            OrderDirection::Descending => {
                sql.push_str(&format!(" ORDER BY {column} DESC, id DESC"))
            }
        }

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }
        Ok(records)
    }

    fn insert(&self, record: &SortableRecord) -> RecordRepoResult<SortableRecord> {
        self.conn.execute(
            &format!(
                "INSERT INTO {RECORDS_TABLE} (id, label, {}) VALUES (?1, ?2, ?3);",
                self.quoted_column
            ),
            params![
                record.id.to_string(),
                record.label.as_str(),
                record.order_column
            ],
        )?;
        self.find(record.id)
    }

    fn save(&self, record: &SortableRecord) -> RecordRepoResult<()> {
        let changed = self.conn.execute(
            &format!(
                "UPDATE {RECORDS_TABLE}
                 SET label = ?2,
                     {} = ?3,
                     updated_at = (strftime('%s', 'now') * 1000)
                 WHERE id = ?1;",
                self.quoted_column
            ),
            params![
                record.id.to_string(),
                record.label.as_str(),
                record.order_column
            ],
        )?;
        if changed == 0 {
            return Err(RecordRepoError::NotFound(record.id));
        }
        Ok(())
    }
}

fn parse_record_row(row: &Row<'_>) -> RecordRepoResult<SortableRecord> {
    let id_text: String = row.get("id")?;
    let id = Uuid::parse_str(&id_text).map_err(|_| {
        RecordRepoError::InvalidData(format!(
            "invalid uuid `{id_text}` in {RECORDS_TABLE}.id"
        ))
    })?;

    Ok(SortableRecord {
        id,
        label: row.get("label")?,
        order_column: row.get("order_value")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

fn ensure_record_connection_ready(conn: &Connection, order_column: &str) -> RecordRepoResult<()> {
    let expected_version = latest_version();
    let actual_version = schema_version(conn)?;
    if actual_version != expected_version {
        return Err(RecordRepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    if !table_exists(conn, RECORDS_TABLE)? {
        return Err(RecordRepoError::MissingRequiredTable(RECORDS_TABLE));
    }

    let mut required: Vec<&str> = RESERVED_COLUMNS.to_vec();
    required.push(order_column);
    for column in required {
        if !table_has_column(conn, RECORDS_TABLE, column)? {
            return Err(RecordRepoError::MissingRequiredColumn {
                table: RECORDS_TABLE,
                column: column.to_string(),
            });
        }
    }

    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> RecordRepoResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> RecordRepoResult<bool> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let current: String = row.get(1)?;
        if current.eq_ignore_ascii_case(column) {
            return Ok(true);
        }
    }
    Ok(false)
}

/// Wraps an identifier in double quotes so keywords such as `order` stay usable.
fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
