//! Row store interface.

use async_trait::async_trait;

use crate::query::{Aggregate, Filter, LockScope, SortOrder};
use crate::row::{Row, RowKey};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[cfg(any(feature = "sqlite", feature = "postgres"))]
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Invalid SQL identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("Unsupported value in column {column}")]
    UnsupportedValue { column: String },

    #[error("Unit of work already finished")]
    TransactionClosed,

    #[error("Shifting row {key} by {delta} overflows its position")]
    PositionOverflow { key: RowKey, delta: i64 },

    #[error("Injected failure: {0}")]
    Injected(&'static str),

    #[error("Storage type {0} is not enabled in this build")]
    UnknownStorage(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Interface to the table holding sortable rows.
///
/// All reads that feed a write happen through a [`UnitOfWork`], so the
/// read-compute-write sequence of each position operation is atomic.
///
/// Implementations:
/// - `InMemoryRowStore`: in-process storage for tests and local use
/// - `SqliteRowStore`: SQLite storage
/// - `PostgresRowStore`: PostgreSQL storage
#[async_trait]
pub trait RowStore: Send + Sync {
    /// Read one row by key without taking any lock.
    ///
    /// Only used to discover which group to lock; callers re-read inside
    /// the unit of work before acting on the result.
    async fn find_by_key(&self, key: &RowKey, depth: u8) -> Result<Option<Row>>;

    /// Start a unit of work serialized on `scope`.
    ///
    /// A `Group` unit of work excludes others on the same group and any
    /// `Collection` unit of work, but never waits on other groups.
    async fn begin(&self, scope: LockScope) -> Result<Box<dyn UnitOfWork>>;
}

/// An open transaction against a [`RowStore`].
///
/// Must be finished with [`commit`](UnitOfWork::commit) or
/// [`rollback`](UnitOfWork::rollback). Dropping an unfinished unit of work
/// discards its writes on a best-effort basis.
#[async_trait]
pub trait UnitOfWork: Send {
    /// First row matching `filter` in `order`.
    async fn find_one(&mut self, filter: &Filter, order: &SortOrder, depth: u8)
        -> Result<Option<Row>>;

    /// Rows matching `filter` in `order`, at most `limit` of them.
    async fn find_all(
        &mut self,
        filter: &Filter,
        order: &SortOrder,
        limit: Option<u64>,
        depth: u8,
    ) -> Result<Vec<Row>>;

    /// Min or max position over matching rows, `None` when nothing matches.
    async fn aggregate(&mut self, filter: &Filter, aggregate: Aggregate) -> Result<Option<i64>>;

    /// Set the position of a single row.
    async fn update_position(&mut self, key: &RowKey, position: i64) -> Result<()>;

    /// `position = position + delta` for every matching row.
    ///
    /// Returns the number of rows changed.
    async fn shift_positions(&mut self, filter: &Filter, delta: i64) -> Result<u64>;

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
