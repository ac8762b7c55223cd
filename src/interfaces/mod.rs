//! Abstract interfaces for sortable components.
//!
//! These traits define the contract for the row store the position
//! manager reads from and writes to.

pub mod row_store;

pub use row_store::{Result, RowStore, StorageError, UnitOfWork};
