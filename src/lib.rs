//! Sortable - gapless positions for grouped rows
//!
//! Keeps an integer ordering over the rows of a table, partitioned into
//! groups by one or more fields, and moves rows within that ordering
//! atomically against in-memory, SQLite or PostgreSQL storage.

pub mod config;
pub mod interfaces;
pub mod position;
pub mod query;
pub mod row;
pub mod storage;
pub mod utils;

pub use config::{CollectionConfig, Config};
pub use interfaces::{RowStore, StorageError, UnitOfWork};
pub use position::{MoveOutcome, PositionError, PositionManager};
pub use query::{Column, Direction, SortOrder};
pub use row::{GroupValues, NewRow, Placeable, Row, RowKey, Value};
