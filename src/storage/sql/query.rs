//! SQL database abstraction trait.

use crate::query::LockScope;

/// Trait for SQL database backends.
///
/// This trait abstracts over different SQL databases (PostgreSQL, SQLite)
/// by providing the pool type, query building, and the statements that
/// open a serialized unit of work.
pub trait SqlDatabase: Send + Sync + 'static {
    /// The connection pool type for this database.
    type Pool: Clone + Send + Sync;

    /// A connection checked out of the pool.
    type Connection: Send;

    /// Statement that opens a transaction.
    const BEGIN: &'static str;

    /// Build a SQL query string from a sea-query SELECT statement.
    fn build_select(stmt: sea_query::SelectStatement) -> String;

    /// Build a SQL query string from a sea-query UPDATE statement.
    fn build_update(stmt: sea_query::UpdateStatement) -> String;

    /// Statements run right after `BEGIN` to serialize on `scope`.
    fn lock_statements(table: &str, scope: &LockScope) -> Vec<String>;

    /// Mark a connection so it is closed instead of returned to the pool.
    fn discard(conn: &mut Self::Connection);
}
