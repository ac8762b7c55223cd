//! Unified SQL RowStore implementation.
//!
//! Uses a macro to generate implementations for each SQL backend,
//! eliminating code duplication while maintaining type safety.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::warn;

use super::table::TableSpec;
use super::SqlDatabase;
use crate::config::CollectionConfig;
use crate::interfaces::Result;

/// SQL-based implementation of RowStore.
///
/// This generic implementation works with any SQL database that implements
/// the `SqlDatabase` trait (PostgreSQL, SQLite).
pub struct SqlRowStore<DB: SqlDatabase> {
    pool: DB::Pool,
    table: Arc<TableSpec>,
    _marker: PhantomData<DB>,
}

impl<DB: SqlDatabase> SqlRowStore<DB> {
    /// Create a new SQL row store over `table` with the given pool.
    pub fn new(pool: DB::Pool, table: TableSpec) -> Self {
        Self {
            pool,
            table: Arc::new(table),
            _marker: PhantomData,
        }
    }

    /// Create a store for a configured collection.
    pub fn for_collection(pool: DB::Pool, config: &CollectionConfig) -> Result<Self> {
        Ok(Self::new(pool, TableSpec::from_config(config)?))
    }

    /// Get the underlying pool.
    pub fn pool(&self) -> &DB::Pool {
        &self.pool
    }
}

/// Open transaction on a pooled connection.
pub struct SqlUnitOfWork<DB: SqlDatabase> {
    conn: Option<DB::Connection>,
    table: Arc<TableSpec>,
}

impl<DB: SqlDatabase> Drop for SqlUnitOfWork<DB> {
    fn drop(&mut self) {
        // Never hand a connection with an open transaction back to the pool.
        if let Some(conn) = self.conn.as_mut() {
            warn!(table = %self.table.name(), "Unit of work dropped unfinished; closing connection");
            DB::discard(conn);
        }
    }
}

/// Macro to implement RowStore and UnitOfWork for a specific SQL backend.
///
/// This eliminates duplication between PostgreSQL and SQLite implementations
/// while maintaining full type safety.
macro_rules! impl_row_store {
    ($db_type:ty, $row_type:ty, $feature:literal) => {
        #[cfg(feature = $feature)]
        impl SqlUnitOfWork<$db_type> {
            /// Roll back after a failed statement. A connection that cannot be
            /// rolled back is closed instead of going back to the pool.
            async fn abandon(conn: &mut <$db_type as SqlDatabase>::Connection, table: &str) {
                if let Err(e) = sqlx::query("ROLLBACK").execute(&mut **conn).await {
                    warn!(table, error = %e, "Rollback failed; closing connection");
                    <$db_type as SqlDatabase>::discard(conn);
                }
            }

            fn decode_key(row: &$row_type, index: usize) -> crate::interfaces::Result<crate::row::RowKey> {
                use sqlx::Row;

                use crate::row::RowKey;

                if let Ok(n) = row.try_get::<i64, _>(index) {
                    return Ok(RowKey::Int(n));
                }
                if let Ok(n) = row.try_get::<i32, _>(index) {
                    return Ok(RowKey::Int(n as i64));
                }
                if let Ok(s) = row.try_get::<String, _>(index) {
                    return Ok(RowKey::Text(s));
                }
                Err(crate::interfaces::StorageError::UnsupportedValue {
                    column: super::table::KEY_ALIAS.to_string(),
                })
            }

            fn decode_value(
                row: &$row_type,
                index: usize,
                column: &str,
            ) -> crate::interfaces::Result<crate::row::Value> {
                use sqlx::Row;

                use crate::row::Value;

                if let Ok(n) = row.try_get::<Option<i64>, _>(index) {
                    return Ok(n.map(Value::Int).unwrap_or(Value::Null));
                }
                if let Ok(n) = row.try_get::<Option<i32>, _>(index) {
                    return Ok(n.map(|n| Value::Int(n as i64)).unwrap_or(Value::Null));
                }
                if let Ok(n) = row.try_get::<Option<i16>, _>(index) {
                    return Ok(n.map(|n| Value::Int(n as i64)).unwrap_or(Value::Null));
                }
                if let Ok(s) = row.try_get::<Option<String>, _>(index) {
                    return Ok(s.map(Value::Text).unwrap_or(Value::Null));
                }
                Err(crate::interfaces::StorageError::UnsupportedValue {
                    column: column.to_string(),
                })
            }

            /// Columns: key, position, then group fields in order.
            fn decode_row(table: &TableSpec, row: &$row_type) -> crate::interfaces::Result<crate::row::Row> {
                use sqlx::Row;

                let key = Self::decode_key(row, 0)?;
                let position: i64 = row.try_get(1)?;
                let mut decoded = crate::row::Row::new(key, position);
                for (offset, field) in table.group_fields().iter().enumerate() {
                    let value = Self::decode_value(row, offset + 2, field)?;
                    decoded.fields.insert(field.clone(), value);
                }
                Ok(decoded)
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::RowStore for SqlRowStore<$db_type> {
            async fn find_by_key(
                &self,
                key: &crate::row::RowKey,
                _depth: u8,
            ) -> crate::interfaces::Result<Option<crate::row::Row>> {
                use crate::query::{Filter, SortOrder};

                let stmt = self
                    .table
                    .select(&Filter::by_key(key), &SortOrder::default(), Some(1))?;
                let sql = <$db_type>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&self.pool).await?;

                row.map(|row| SqlUnitOfWork::<$db_type>::decode_row(&self.table, &row))
                    .transpose()
            }

            async fn begin(
                &self,
                scope: crate::query::LockScope,
            ) -> crate::interfaces::Result<Box<dyn crate::interfaces::UnitOfWork>> {
                let mut conn = self.pool.acquire().await?;
                sqlx::query(<$db_type>::BEGIN).execute(&mut *conn).await?;

                for stmt in <$db_type>::lock_statements(self.table.name(), &scope) {
                    if let Err(e) = sqlx::query(&stmt).execute(&mut *conn).await {
                        SqlUnitOfWork::<$db_type>::abandon(&mut conn, self.table.name()).await;
                        return Err(e.into());
                    }
                }

                tracing::trace!(table = %self.table.name(), ?scope, "Began unit of work");

                Ok(Box::new(SqlUnitOfWork::<$db_type> {
                    conn: Some(conn),
                    table: self.table.clone(),
                }))
            }
        }

        #[cfg(feature = $feature)]
        #[async_trait::async_trait]
        impl crate::interfaces::UnitOfWork for SqlUnitOfWork<$db_type> {
            async fn find_one(
                &mut self,
                filter: &crate::query::Filter,
                order: &crate::query::SortOrder,
                _depth: u8,
            ) -> crate::interfaces::Result<Option<crate::row::Row>> {
                let conn = self
                    .conn
                    .as_mut()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;

                let stmt = self.table.select(filter, order, Some(1))?;
                let sql = <$db_type>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&mut **conn).await?;

                row.map(|row| Self::decode_row(&self.table, &row)).transpose()
            }

            async fn find_all(
                &mut self,
                filter: &crate::query::Filter,
                order: &crate::query::SortOrder,
                limit: Option<u64>,
                _depth: u8,
            ) -> crate::interfaces::Result<Vec<crate::row::Row>> {
                let conn = self
                    .conn
                    .as_mut()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;

                let stmt = self.table.select(filter, order, limit)?;
                let sql = <$db_type>::build_select(stmt);
                let rows = sqlx::query(&sql).fetch_all(&mut **conn).await?;

                let mut decoded = Vec::with_capacity(rows.len());
                for row in rows {
                    decoded.push(Self::decode_row(&self.table, &row)?);
                }
                Ok(decoded)
            }

            async fn aggregate(
                &mut self,
                filter: &crate::query::Filter,
                aggregate: crate::query::Aggregate,
            ) -> crate::interfaces::Result<Option<i64>> {
                use sqlx::Row;

                let conn = self
                    .conn
                    .as_mut()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;

                let stmt = self.table.aggregate(filter, aggregate)?;
                let sql = <$db_type>::build_select(stmt);
                let row = sqlx::query(&sql).fetch_optional(&mut **conn).await?;

                match row {
                    Some(row) => Ok(row.try_get::<Option<i64>, _>(0)?),
                    None => Ok(None),
                }
            }

            async fn update_position(
                &mut self,
                key: &crate::row::RowKey,
                position: i64,
            ) -> crate::interfaces::Result<()> {
                let conn = self
                    .conn
                    .as_mut()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;

                let sql = <$db_type>::build_update(self.table.update_position(key, position));
                sqlx::query(&sql).execute(&mut **conn).await?;
                Ok(())
            }

            async fn shift_positions(
                &mut self,
                filter: &crate::query::Filter,
                delta: i64,
            ) -> crate::interfaces::Result<u64> {
                let conn = self
                    .conn
                    .as_mut()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;

                let sql = <$db_type>::build_update(self.table.shift_positions(filter, delta)?);
                let result = sqlx::query(&sql).execute(&mut **conn).await?;
                Ok(result.rows_affected())
            }

            async fn commit(mut self: Box<Self>) -> crate::interfaces::Result<()> {
                let mut conn = self
                    .conn
                    .take()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;
                if let Err(e) = sqlx::query("COMMIT").execute(&mut *conn).await {
                    warn!(table = %self.table.name(), error = %e, "Commit failed; rolling back");
                    Self::abandon(&mut conn, self.table.name()).await;
                    return Err(e.into());
                }
                Ok(())
            }

            async fn rollback(mut self: Box<Self>) -> crate::interfaces::Result<()> {
                let mut conn = self
                    .conn
                    .take()
                    .ok_or(crate::interfaces::StorageError::TransactionClosed)?;
                if let Err(e) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    <$db_type as SqlDatabase>::discard(&mut conn);
                    return Err(e.into());
                }
                Ok(())
            }
        }
    };
}

// Generate implementations for each SQL backend
impl_row_store!(super::postgres::Postgres, sqlx::postgres::PgRow, "postgres");
impl_row_store!(super::sqlite::Sqlite, sqlx::sqlite::SqliteRow, "sqlite");
