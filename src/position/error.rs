//! Position manager errors and outcomes.

use std::fmt;

use crate::interfaces::StorageError;
use crate::row::{GroupValues, RowKey};

/// Result type for position operations.
pub type Result<T> = std::result::Result<T, PositionError>;

/// Failures of a position operation.
///
/// Expected no-ops (unknown key, boundary reached) are not errors; they are
/// reported through [`MoveOutcome`].
#[derive(Debug, thiserror::Error)]
pub enum PositionError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Row is missing group field {0:?}")]
    MissingGroupField(String),

    #[error("Group of row {key} kept changing while locking it")]
    GroupUnstable { key: RowKey },

    #[error("No position left after the end of group {group}")]
    PositionOverflow { group: GroupValues },
}

/// What a move operation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Positions were written.
    Moved,
    /// No row has the given key.
    NotFound,
    /// The row already sits at the edge of its group in the direction of travel.
    AtBoundary,
    /// The key was blank or the step count was zero.
    InvalidInput,
}

impl MoveOutcome {
    /// The plain success flag.
    pub fn is_moved(self) -> bool {
        matches!(self, MoveOutcome::Moved)
    }
}

impl fmt::Display for MoveOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MoveOutcome::Moved => "moved",
            MoveOutcome::NotFound => "not found",
            MoveOutcome::AtBoundary => "at boundary",
            MoveOutcome::InvalidInput => "invalid input",
        };
        f.write_str(text)
    }
}
