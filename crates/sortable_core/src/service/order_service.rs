//! Record ordering use-case service.
//!
//! # Responsibility
//! - Assign initial order values to new records.
//! - Reorder records from a caller-supplied id sequence.
//! - Move records one position up/down by swapping with the adjacent record.
//!
//! # Invariants
//! - Plain service calls are a sequence of independent store writes; a failure
//!   midway leaves earlier writes committed. Use `run_in_transaction` for
//!   all-or-nothing behavior.
//! - "No adjacent record" is `Ok(None)`/`Ok(false)`, never an error.

use crate::config::SortableConfig;
use crate::model::record::{RecordId, SortableRecord};
use crate::repo::record_repo::{
    RecordQuery, RecordRepoError, RecordRepoResult, RecordStore, SqliteRecordStore,
};
use log::{debug, info, warn};
use rusqlite::{Connection, Transaction, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;
use uuid::Uuid;

/// Result type for ordering service operations.
pub type OrderResult<T> = Result<T, OrderServiceError>;

/// Errors from ordering service operations.
#[derive(Debug)]
pub enum OrderServiceError {
    /// Reorder input is not a sequence of record ids.
    InvalidArgument(String),
    /// Target record does not exist.
    NotFound(RecordId),
    /// Next order value does not fit in `i64`.
    OrderOverflow,
    /// Store-level failure, passed through unchanged.
    Repo(RecordRepoError),
}

impl Display for OrderServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::OrderOverflow => write!(f, "order value overflow"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for OrderServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RecordRepoError> for OrderServiceError {
    fn from(value: RecordRepoError) -> Self {
        match value {
            RecordRepoError::NotFound(id) => Self::NotFound(id),
            other => Self::Repo(other),
        }
    }
}

impl From<rusqlite::Error> for OrderServiceError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Repo(value.into())
    }
}

/// Ordering service facade over a record store.
pub struct OrderService<S: RecordStore> {
    store: S,
    config: SortableConfig,
}

impl<S: RecordStore> OrderService<S> {
    /// Creates service from store implementation and resolved config.
    pub fn new(store: S, config: SortableConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SortableConfig {
        &self.config
    }

    /// Returns the highest stored order value, `0` for an empty table.
    pub fn highest_order_number(&self) -> OrderResult<i64> {
        Ok(self.store.max_order()?.unwrap_or(0))
    }

    /// Sets `record.order_column` to one past the current highest value.
    pub fn assign_initial_order(&self, record: &mut SortableRecord) -> OrderResult<()> {
        let next = self
            .highest_order_number()?
            .checked_add(1)
            .ok_or(OrderServiceError::OrderOverflow)?;
        record.order_column = next;
        Ok(())
    }

    /// Creates and persists a record with the given label.
    pub fn create(&self, label: impl Into<String>) -> OrderResult<SortableRecord> {
        self.create_record(SortableRecord::new(label))
    }

    /// Persists a new record, assigning its order first when
    /// `sort_when_creating` is enabled.
    pub fn create_record(&self, mut record: SortableRecord) -> OrderResult<SortableRecord> {
        if self.config.sort_when_creating {
            self.assign_initial_order(&mut record)?;
        }
        let stored = self.store.insert(&record)?;
        debug!(
            "event=record_create module=order status=ok order={} sorted_on_create={}",
            stored.order_column, self.config.sort_when_creating
        );
        Ok(stored)
    }

    /// Loads one record.
    pub fn find(&self, id: RecordId) -> OrderResult<SortableRecord> {
        self.store.find(id).map_err(Into::into)
    }

    /// Lists all records by ascending order.
    pub fn list_ordered(&self) -> OrderResult<Vec<SortableRecord>> {
        self.store.query(&RecordQuery::ordered()).map_err(Into::into)
    }

    /// Assigns `start_order, start_order + 1, ...` to records in id order.
    ///
    /// Returns the number of records written. A missing id aborts with
    /// `NotFound`; records before it keep their new order.
    pub fn set_new_order<I>(&self, ids: I, start_order: i64) -> OrderResult<usize>
    where
        I: IntoIterator<Item = RecordId>,
    {
        let started_at = Instant::now();
        let mut next_order = Some(start_order);
        let mut written = 0usize;

        for id in ids {
            let order = next_order.ok_or(OrderServiceError::OrderOverflow)?;
            if let Err(err) = self.write_order(id, order) {
                warn!(
                    "event=order_reorder module=order status=error written={} duration_ms={} error={}",
                    written,
                    started_at.elapsed().as_millis(),
                    err
                );
                return Err(err.into());
            }
            written += 1;
            next_order = order.checked_add(1);
        }

        info!(
            "event=order_reorder module=order status=ok count={} start_order={} duration_ms={}",
            written,
            start_order,
            started_at.elapsed().as_millis()
        );
        Ok(written)
    }

    /// Reorders from a raw JSON payload that must be an array of record ids.
    pub fn set_new_order_from_json(&self, raw: &str, start_order: i64) -> OrderResult<usize> {
        let ids = parse_id_list(raw)?;
        self.set_new_order(ids, start_order)
    }

    /// Swaps order with the nearest record above in rank (higher value).
    ///
    /// Returns `false` when `record` already has the highest order.
    pub fn move_order_down(&self, record: &mut SortableRecord) -> OrderResult<bool> {
        let query = RecordQuery::next_above(record.order_column);
        self.move_toward(record, query, "down")
    }

    /// Swaps order with the nearest record below in rank (lower value).
    ///
    /// Returns `false` when `record` already has the lowest order.
    pub fn move_order_up(&self, record: &mut SortableRecord) -> OrderResult<bool> {
        let query = RecordQuery::next_below(record.order_column);
        self.move_toward(record, query, "up")
    }

    /// Loads a record by id and moves it down; `None` when nothing moved.
    pub fn move_order_down_by_id(&self, id: RecordId) -> OrderResult<Option<SortableRecord>> {
        let mut record = self.find(id)?;
        Ok(self.move_order_down(&mut record)?.then_some(record))
    }

    /// Loads a record by id and moves it up; `None` when nothing moved.
    pub fn move_order_up_by_id(&self, id: RecordId) -> OrderResult<Option<SortableRecord>> {
        let mut record = self.find(id)?;
        Ok(self.move_order_up(&mut record)?.then_some(record))
    }

    /// Exchanges order values of `a` and `b`, saving `b` first.
    pub fn swap_order(&self, a: &mut SortableRecord, b: &mut SortableRecord) -> OrderResult<()> {
        std::mem::swap(&mut a.order_column, &mut b.order_column);
        self.store.save(b)?;
        self.store.save(a)?;
        debug!(
            "event=order_swap module=order status=ok a_order={} b_order={}",
            a.order_column, b.order_column
        );
        Ok(())
    }

    fn write_order(&self, id: RecordId, order: i64) -> RecordRepoResult<()> {
        let mut record = self.store.find(id)?;
        record.order_column = order;
        self.store.save(&record)
    }

    fn move_toward(
        &self,
        record: &mut SortableRecord,
        query: RecordQuery,
        direction: &'static str,
    ) -> OrderResult<bool> {
        let Some(mut neighbour) = self.store.query(&query)?.into_iter().next() else {
            debug!("event=order_move module=order status=noop direction={direction}");
            return Ok(false);
        };
        self.swap_order(record, &mut neighbour)?;
        debug!("event=order_move module=order status=ok direction={direction}");
        Ok(true)
    }
}

/// Runs `op` against a service bound to one IMMEDIATE transaction.
///
/// Commits when `op` returns `Ok`, rolls back otherwise.
pub fn run_in_transaction<T, F>(
    conn: &Connection,
    config: &SortableConfig,
    op: F,
) -> OrderResult<T>
where
    F: FnOnce(&OrderService<SqliteRecordStore<'_>>) -> OrderResult<T>,
{
    let tx = Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?;
    let outcome = {
        let store = SqliteRecordStore::try_new(&tx, config)?;
        let service = OrderService::new(store, config.clone());
        op(&service)
    };

    match outcome {
        Ok(value) => {
            tx.commit()?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = tx.rollback() {
                warn!(
                    "event=order_tx module=order status=error error_code=rollback_failed error={}",
                    rollback_err
                );
            }
            Err(err)
        }
    }
}

/// Parses a JSON array of record id strings.
///
/// Fails with `InvalidArgument` for anything that is not such an array.
pub fn parse_id_list(raw: &str) -> OrderResult<Vec<RecordId>> {
    let value: serde_json::Value = serde_json::from_str(raw)
        .map_err(|err| OrderServiceError::InvalidArgument(format!("id list is not JSON: {err}")))?;
    let serde_json::Value::Array(items) = value else {
        return Err(OrderServiceError::InvalidArgument(
            "id list must be an array".to_string(),
        ));
    };

    items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            item.as_str()
                .and_then(|text| Uuid::parse_str(text).ok())
                .ok_or_else(|| {
                    OrderServiceError::InvalidArgument(format!(
                        "id list element {index} is not a record id"
                    ))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{parse_id_list, OrderService, OrderServiceError};
    use crate::config::SortableConfig;
    use crate::model::record::{RecordId, SortableRecord};
    use crate::repo::record_repo::{
        OrderDirection, OrderFilter, RecordQuery, RecordRepoError, RecordRepoResult, RecordStore,
    };
    use std::cell::RefCell;

    #[derive(Default)]
    struct FakeStore {
        rows: RefCell<Vec<SortableRecord>>,
        saved: RefCell<Vec<RecordId>>,
        reject_save_of: Option<RecordId>,
    }

    impl FakeStore {
        fn seeded(orders: &[i64]) -> Self {
            let store = Self::default();
            for order in orders {
                store
                    .rows
                    .borrow_mut()
                    .push(SortableRecord::new(format!("row-{order}")).with_order(*order));
            }
            store
        }

        fn id_at(&self, index: usize) -> RecordId {
            self.rows.borrow()[index].id
        }
    }

    impl RecordStore for FakeStore {
        fn find(&self, id: RecordId) -> RecordRepoResult<SortableRecord> {
            self.rows
                .borrow()
                .iter()
                .find(|row| row.id == id)
                .cloned()
                .ok_or(RecordRepoError::NotFound(id))
        }

        fn max_order(&self) -> RecordRepoResult<Option<i64>> {
            Ok(self.rows.borrow().iter().map(|row| row.order_column).max())
        }

        fn query(&self, query: &RecordQuery) -> RecordRepoResult<Vec<SortableRecord>> {
            let mut rows: Vec<_> = self
                .rows
                .borrow()
                .iter()
                .filter(|row| match query.filter {
                    Some(OrderFilter::Above(order)) => row.order_column > order,
                    Some(OrderFilter::Below(order)) => row.order_column < order,
                    None => true,
                })
                .cloned()
                .collect();
            rows.sort_by_key(|row| (row.order_column, row.id));
            if query.direction == OrderDirection::Descending {
                rows.reverse();
            }
            if let Some(limit) = query.limit {
                rows.truncate(limit as usize);
            }
            Ok(rows)
        }

        fn insert(&self, record: &SortableRecord) -> RecordRepoResult<SortableRecord> {
            self.rows.borrow_mut().push(record.clone());
            Ok(record.clone())
        }

        fn save(&self, record: &SortableRecord) -> RecordRepoResult<()> {
            if self.reject_save_of == Some(record.id) {
                return Err(RecordRepoError::InvalidData("write rejected".to_string()));
            }
            let mut rows = self.rows.borrow_mut();
            let row = rows
                .iter_mut()
                .find(|row| row.id == record.id)
                .ok_or(RecordRepoError::NotFound(record.id))?;
            *row = record.clone();
            self.saved.borrow_mut().push(record.id);
            Ok(())
        }
    }

    fn service(store: FakeStore) -> OrderService<FakeStore> {
        OrderService::new(store, SortableConfig::default())
    }

    #[test]
    fn highest_order_number_is_zero_on_empty_store() {
        let service = service(FakeStore::default());
        assert_eq!(service.highest_order_number().unwrap(), 0);

        let mut record = SortableRecord::new("first");
        service.assign_initial_order(&mut record).unwrap();
        assert_eq!(record.order_column, 1);
    }

    #[test]
    fn assign_initial_order_reports_overflow() {
        let service = service(FakeStore::seeded(&[i64::MAX]));
        let mut record = SortableRecord::new("late");
        let err = service.assign_initial_order(&mut record).unwrap_err();
        assert!(matches!(err, OrderServiceError::OrderOverflow));
    }

    #[test]
    fn swap_saves_second_record_before_first() {
        let store = FakeStore::seeded(&[1, 2]);
        let (a_id, b_id) = (store.id_at(0), store.id_at(1));
        let service = service(store);

        let mut a = service.find(a_id).unwrap();
        let mut b = service.find(b_id).unwrap();
        service.swap_order(&mut a, &mut b).unwrap();

        assert_eq!(*service.store.saved.borrow(), vec![b_id, a_id]);
        assert_eq!(a.order_column, 2);
        assert_eq!(b.order_column, 1);
    }

    #[test]
    fn move_up_picks_adjacent_record_not_the_lowest() {
        let store = FakeStore::seeded(&[1, 2, 3, 4]);
        let (lowest, third, fourth) = (store.id_at(0), store.id_at(2), store.id_at(3));
        let service = service(store);

        let mut record = service.find(fourth).unwrap();
        assert!(service.move_order_up(&mut record).unwrap());

        assert_eq!(service.find(fourth).unwrap().order_column, 3);
        assert_eq!(service.find(third).unwrap().order_column, 4);
        assert_eq!(service.find(lowest).unwrap().order_column, 1);
    }

    #[test]
    fn reorder_missing_id_keeps_earlier_writes() {
        let store = FakeStore::seeded(&[1, 2]);
        let (a, b) = (store.id_at(0), store.id_at(1));
        let missing = RecordId::new_v4();
        let service = service(store);

        let err = service.set_new_order([b, missing, a], 10).unwrap_err();
        assert!(matches!(err, OrderServiceError::NotFound(id) if id == missing));
        assert_eq!(service.find(b).unwrap().order_column, 10);
        assert_eq!(service.find(a).unwrap().order_column, 1);
    }

    #[test]
    fn reorder_save_failure_keeps_earlier_writes() {
        let mut store = FakeStore::seeded(&[1, 2, 3]);
        let (a, b, c) = (store.id_at(0), store.id_at(1), store.id_at(2));
        store.reject_save_of = Some(b);
        let service = service(store);

        let err = service.set_new_order([c, b, a], 10).unwrap_err();
        assert!(matches!(err, OrderServiceError::Repo(RecordRepoError::InvalidData(_))));
        assert_eq!(service.find(c).unwrap().order_column, 10);
        assert_eq!(service.find(b).unwrap().order_column, 2);
        assert_eq!(service.find(a).unwrap().order_column, 1);
        assert_eq!(*service.store.saved.borrow(), vec![c]);
    }

    #[test]
    fn reorder_overflow_is_reported_after_last_representable_value() {
        let store = FakeStore::seeded(&[1, 2]);
        let (a, b) = (store.id_at(0), store.id_at(1));
        let service = service(store);

        let err = service.set_new_order([a, b], i64::MAX).unwrap_err();
        assert!(matches!(err, OrderServiceError::OrderOverflow));
        assert_eq!(service.find(a).unwrap().order_column, i64::MAX);
    }

    #[test]
    fn parse_id_list_rejects_non_sequences() {
        for raw in ["{}", "\"abc\"", "42", "null", "not json"] {
            let err = parse_id_list(raw).unwrap_err();
            assert!(
                matches!(err, OrderServiceError::InvalidArgument(_)),
                "payload {raw} should be rejected"
            );
        }

        let err = parse_id_list("[1, 2]").unwrap_err();
        assert!(matches!(err, OrderServiceError::InvalidArgument(message) if message.contains("element 0")));
    }

    #[test]
    fn parse_id_list_keeps_list_order() {
        let a = RecordId::new_v4();
        let b = RecordId::new_v4();
        let raw = format!("[\"{b}\", \"{a}\"]");
        assert_eq!(parse_id_list(&raw).unwrap(), vec![b, a]);
        assert!(parse_id_list("[]").unwrap().is_empty());
    }
}
