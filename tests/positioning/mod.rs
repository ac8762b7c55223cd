//! Shared position manager integration tests.
//!
//! Tests the PositionManager contract against every RowStore implementation.
//! Each backend test binary provides a `Fixture` and runs the suite with
//! `run_position_manager_tests!`.

pub mod position_manager_tests;

use std::sync::Arc;

use async_trait::async_trait;
use sortable::{CollectionConfig, RowStore};

/// Backend-specific access to the `tasks` table used by the suite.
///
/// Rows have an integer key, a nullable integer `list_id` group field, a
/// `title` and a position column named `sort`.
#[async_trait]
pub trait Fixture: Send + Sync {
    fn config(&self) -> CollectionConfig;

    fn store(&self) -> Arc<dyn RowStore>;

    /// Delete every row.
    async fn reset(&self);

    async fn insert(&self, id: i64, list_id: Option<i64>, position: i64, title: &str);

    async fn remove(&self, id: i64);

    /// Stored position, bypassing the store under test.
    async fn position(&self, id: i64) -> Option<i64>;
}
