//! Unified SQL storage implementations.
//!
//! This module provides a shared row store for SQL-based storage backends
//! (PostgreSQL, SQLite). The implementation is parameterized by database type
//! using the `SqlDatabase` trait.

mod lock;
mod query;
mod row_store;
mod table;

pub use lock::{advisory_lock_statements, lock_key};
pub use query::SqlDatabase;
pub use row_store::{SqlRowStore, SqlUnitOfWork};
pub use table::TableSpec;

#[cfg(feature = "postgres")]
pub mod postgres {
    //! PostgreSQL database backend.
    //!
    //! Units of work serialize on transaction-scoped advisory locks, so
    //! operations on different groups run concurrently.

    use sea_query::PostgresQueryBuilder;
    use sqlx::pool::PoolConnection;
    use sqlx::PgPool;

    use crate::query::LockScope;

    /// PostgreSQL database marker type.
    pub struct Postgres;

    impl super::SqlDatabase for Postgres {
        type Pool = PgPool;
        type Connection = PoolConnection<sqlx::Postgres>;

        const BEGIN: &'static str = "BEGIN";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(PostgresQueryBuilder)
        }

        fn lock_statements(table: &str, scope: &LockScope) -> Vec<String> {
            super::advisory_lock_statements(table, scope)
        }

        fn discard(conn: &mut Self::Connection) {
            conn.close_on_drop();
        }
    }

    /// PostgreSQL row store.
    pub type PostgresRowStore = super::SqlRowStore<Postgres>;
}

#[cfg(feature = "sqlite")]
pub mod sqlite {
    //! SQLite database backend.
    //!
    //! SQLite cannot lock below the database, so every unit of work takes
    //! the write lock up front and groups serialize against each other.

    use sea_query::SqliteQueryBuilder;
    use sqlx::pool::PoolConnection;
    use sqlx::SqlitePool;

    use crate::query::LockScope;

    /// SQLite database marker type.
    pub struct Sqlite;

    impl super::SqlDatabase for Sqlite {
        type Pool = SqlitePool;
        type Connection = PoolConnection<sqlx::Sqlite>;

        // BEGIN IMMEDIATE acquires the write lock upfront, preventing deadlocks
        // when concurrent DEFERRED transactions race to upgrade from shared to exclusive.
        const BEGIN: &'static str = "BEGIN IMMEDIATE";

        fn build_select(stmt: sea_query::SelectStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn build_update(stmt: sea_query::UpdateStatement) -> String {
            stmt.to_string(SqliteQueryBuilder)
        }

        fn lock_statements(_table: &str, _scope: &LockScope) -> Vec<String> {
            Vec::new()
        }

        fn discard(conn: &mut Self::Connection) {
            conn.close_on_drop();
        }
    }

    /// SQLite row store.
    pub type SqliteRowStore = super::SqlRowStore<Sqlite>;
}
