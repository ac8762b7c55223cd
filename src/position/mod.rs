//! Position manager.
//!
//! Keeps an integer ordering over the rows of each group of one collection.
//! Every operation reads the rows it needs and writes the new positions
//! inside a single unit of work locked on the row's group, so concurrent
//! callers cannot interleave and produce duplicate or skipped positions.
//!
//! # Operations
//!
//! | Operation          | Writes                                   |
//! |--------------------|------------------------------------------|
//! | `move_to_top`      | whole group shifted by one, then the row |
//! | `move_up/down(_by)`| the row and the rows it steps over       |
//! | `move_to_end`      | the row                                  |
//! | `sort`             | every row not already at its rank        |

mod error;

pub use error::{MoveOutcome, PositionError, Result};

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::CollectionConfig;
use crate::interfaces::{RowStore, UnitOfWork};
use crate::query::{Aggregate, Filter, LockScope, PositionBound, SortOrder};
use crate::row::{GroupValues, Placeable, Row, RowKey};

/// Position reported by `min_position` for a group with no rows.
pub const EMPTY_GROUP_MIN: i64 = 0;

/// Position `max_position` assigns in a group with no rows.
pub const EMPTY_GROUP_NEXT: i64 = 1;

/// Times a row's group is re-discovered before giving up.
const MAX_LOCK_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Travel {
    Up,
    Down,
}

/// Maintains positions for one collection.
///
/// Holds its own configuration; create one per collection.
pub struct PositionManager {
    config: CollectionConfig,
    store: Arc<dyn RowStore>,
}

impl PositionManager {
    pub fn new(config: CollectionConfig, store: Arc<dyn RowStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &CollectionConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn RowStore> {
        &self.store
    }

    fn depth(&self) -> u8 {
        self.config.read_depth
    }

    fn group_of(&self, row: &Row) -> GroupValues {
        row.group(&self.config.group_fields)
    }

    /// Group a not-yet-persisted row will belong to.
    pub fn pending_group<P: Placeable + ?Sized>(&self, row: &P) -> Result<GroupValues> {
        let mut group = GroupValues::new();
        for field in &self.config.group_fields {
            let value = row
                .group_value(field)
                .ok_or_else(|| PositionError::MissingGroupField(field.clone()))?;
            group = group.with(field.clone(), value);
        }
        Ok(group)
    }

    // =========================================================================
    // Placement queries
    // =========================================================================

    /// One past the highest position in `group`, or 1 for an empty group.
    pub async fn max_position(&self, group: &GroupValues) -> Result<i64> {
        let group = group.normalized(&self.config.group_fields);
        let mut uow = self.store.begin(LockScope::Group(group.clone())).await?;
        let result = max_in(uow.as_mut(), &group).await;
        finish(uow, result).await
    }

    /// Lowest position in `group`, or [`EMPTY_GROUP_MIN`] for an empty group.
    pub async fn min_position(&self, group: &GroupValues) -> Result<i64> {
        let group = group.normalized(&self.config.group_fields);
        let mut uow = self.store.begin(LockScope::Group(group.clone())).await?;
        let result = min_in(uow.as_mut(), &group).await;
        finish(uow, result).await
    }

    /// Rows of `group` by position, ties broken by key.
    pub async fn ordered(&self, group: &GroupValues) -> Result<Vec<Row>> {
        let group = group.normalized(&self.config.group_fields);
        let mut uow = self.store.begin(LockScope::Group(group.clone())).await?;
        let result = uow
            .find_all(
                &Filter::for_group(&group),
                &SortOrder::position_asc(),
                None,
                self.depth(),
            )
            .await
            .map_err(PositionError::from);
        finish(uow, result).await
    }

    // =========================================================================
    // Creation hook
    // =========================================================================

    /// Place a row that is about to be created at the end of its group.
    ///
    /// Does nothing for rows that already have a key (updates) or an
    /// explicit position. Returns the position assigned, if any.
    #[tracing::instrument(name = "position.assign_initial", skip_all)]
    pub async fn assign_initial_position<P: Placeable + Send + ?Sized>(
        &self,
        row: &mut P,
    ) -> Result<Option<i64>> {
        if row.key().is_some() || row.position().is_some() {
            return Ok(None);
        }

        let group = self.pending_group(row)?;
        let position = self.max_position(&group).await?;
        row.set_position(position);

        debug!(group = %group, position, "Assigned initial position");
        Ok(Some(position))
    }

    // =========================================================================
    // Moves
    // =========================================================================

    /// Make the row the first of its group, shifting every sibling down one.
    #[tracing::instrument(name = "position.move_to_top", skip_all, fields(%key))]
    pub async fn move_to_top(&self, key: &RowKey) -> Result<MoveOutcome> {
        if key.is_blank() {
            return Ok(MoveOutcome::InvalidInput);
        }
        let Some((mut uow, row)) = self.lock_row(key).await? else {
            return Ok(MoveOutcome::NotFound);
        };

        let result = self.move_to_top_in(uow.as_mut(), &row).await;
        finish(uow, result).await
    }

    async fn move_to_top_in(&self, uow: &mut dyn UnitOfWork, row: &Row) -> Result<MoveOutcome> {
        let group = self.group_of(row);
        let min = min_in(uow, &group).await?;

        let siblings = Filter::for_group(&group).with_position(PositionBound::Gte(min));
        let shifted = uow.shift_positions(&siblings, 1).await?;
        uow.update_position(&row.key, min).await?;

        debug!(key = %row.key, group = %group, position = min, shifted, "Moved row to top");
        Ok(MoveOutcome::Moved)
    }

    /// Make the row the last of its group.
    #[tracing::instrument(name = "position.move_to_end", skip_all, fields(%key))]
    pub async fn move_to_end(&self, key: &RowKey) -> Result<MoveOutcome> {
        if key.is_blank() {
            return Ok(MoveOutcome::InvalidInput);
        }
        let Some((mut uow, row)) = self.lock_row(key).await? else {
            return Ok(MoveOutcome::NotFound);
        };

        let result = self.move_to_end_in(uow.as_mut(), &row).await;
        finish(uow, result).await
    }

    async fn move_to_end_in(&self, uow: &mut dyn UnitOfWork, row: &Row) -> Result<MoveOutcome> {
        let group = self.group_of(row);
        let max = max_in(uow, &group).await?;
        uow.update_position(&row.key, max).await?;

        debug!(key = %row.key, group = %group, position = max, "Moved row to end");
        Ok(MoveOutcome::Moved)
    }

    /// Swap the row with the one right before it.
    pub async fn move_up(&self, key: &RowKey) -> Result<MoveOutcome> {
        self.move_up_by(key, 1).await
    }

    /// Swap the row with the one right after it.
    pub async fn move_down(&self, key: &RowKey) -> Result<MoveOutcome> {
        self.move_down_by(key, 1).await
    }

    /// Move the row `steps` places towards the top, or as far as it goes.
    #[tracing::instrument(name = "position.move_up", skip_all, fields(%key, steps = steps))]
    pub async fn move_up_by(&self, key: &RowKey, steps: u32) -> Result<MoveOutcome> {
        self.step(key, steps, Travel::Up).await
    }

    /// Move the row `steps` places towards the end, or as far as it goes.
    #[tracing::instrument(name = "position.move_down", skip_all, fields(%key, steps = steps))]
    pub async fn move_down_by(&self, key: &RowKey, steps: u32) -> Result<MoveOutcome> {
        self.step(key, steps, Travel::Down).await
    }

    async fn step(&self, key: &RowKey, steps: u32, travel: Travel) -> Result<MoveOutcome> {
        if key.is_blank() || steps == 0 {
            return Ok(MoveOutcome::InvalidInput);
        }
        let Some((mut uow, row)) = self.lock_row(key).await? else {
            return Ok(MoveOutcome::NotFound);
        };

        let result = self.step_in(uow.as_mut(), &row, steps, travel).await;
        finish(uow, result).await
    }

    /// Rotate the row with the `steps` nearest rows in the direction of travel.
    ///
    /// Each passed row takes the position of the one before it and the row
    /// takes the position of the farthest one. One step is a plain swap.
    async fn step_in(
        &self,
        uow: &mut dyn UnitOfWork,
        row: &Row,
        steps: u32,
        travel: Travel,
    ) -> Result<MoveOutcome> {
        let group = self.group_of(row);
        let (bound, order) = match travel {
            Travel::Up => (PositionBound::Lt(row.position), SortOrder::position_desc()),
            Travel::Down => (PositionBound::Gt(row.position), SortOrder::position_asc()),
        };

        let passed = uow
            .find_all(
                &Filter::for_group(&group).with_position(bound),
                &order,
                Some(u64::from(steps)),
                self.depth(),
            )
            .await?;
        if passed.is_empty() {
            debug!(key = %row.key, ?travel, "Row already at group boundary");
            return Ok(MoveOutcome::AtBoundary);
        }

        let mut vacated = row.position;
        for other in &passed {
            uow.update_position(&other.key, vacated).await?;
            vacated = other.position;
        }
        uow.update_position(&row.key, vacated).await?;

        debug!(
            key = %row.key,
            group = %group,
            from = row.position,
            to = vacated,
            passed = passed.len(),
            "Stepped row"
        );
        Ok(MoveOutcome::Moved)
    }

    // =========================================================================
    // Resequencing
    // =========================================================================

    /// Renumber matching rows `1..=N` in `order`.
    ///
    /// `filter` restricts the rows taking part; `None` renumbers the whole
    /// collection as one sequence. A filter on exactly the configured group
    /// fields locks only that group. Returns the number of rows ranked.
    #[tracing::instrument(name = "position.sort", skip_all)]
    pub async fn sort(&self, order: &SortOrder, filter: Option<&GroupValues>) -> Result<usize> {
        let fields = &self.config.group_fields;
        let selection = filter
            .map(|f| f.normalized(fields))
            .unwrap_or_default();
        let scope = if selection.covers_exactly(fields) {
            LockScope::Group(selection.clone())
        } else {
            LockScope::Collection
        };

        let mut uow = self.store.begin(scope).await?;
        let result = self.sort_in(uow.as_mut(), order, &selection).await;
        finish(uow, result).await
    }

    async fn sort_in(
        &self,
        uow: &mut dyn UnitOfWork,
        order: &SortOrder,
        selection: &GroupValues,
    ) -> Result<usize> {
        let rows = uow
            .find_all(&Filter::for_group(selection), order, None, self.depth())
            .await?;

        let mut rewritten = 0;
        for (rank, row) in (1..).zip(rows.iter()) {
            if row.position != rank {
                uow.update_position(&row.key, rank).await?;
                rewritten += 1;
            }
        }

        info!(
            collection = %self.config.name,
            filter = %selection,
            rows = rows.len(),
            rewritten,
            "Resequenced rows"
        );
        Ok(rows.len())
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Open a unit of work locked on the group of `key` and load the row.
    ///
    /// The group is discovered with an unlocked read, so the row is read
    /// again under the lock and the attempt repeated if it moved group.
    async fn lock_row(&self, key: &RowKey) -> Result<Option<(Box<dyn UnitOfWork>, Row)>> {
        for attempt in 1..=MAX_LOCK_ATTEMPTS {
            let Some(seen) = self.store.find_by_key(key, self.depth()).await? else {
                return Ok(None);
            };
            let group = self.group_of(&seen);

            let mut uow = self.store.begin(LockScope::Group(group.clone())).await?;
            let current = uow
                .find_one(&Filter::by_key(key), &SortOrder::default(), self.depth())
                .await;

            match current {
                Ok(Some(row)) if self.group_of(&row) == group => return Ok(Some((uow, row))),
                Ok(Some(_)) => {
                    debug!(%key, attempt, "Row changed group before lock was taken");
                    rollback_quietly(uow).await;
                }
                Ok(None) => {
                    rollback_quietly(uow).await;
                    return Ok(None);
                }
                Err(e) => {
                    rollback_quietly(uow).await;
                    return Err(e.into());
                }
            }
        }

        warn!(%key, attempts = MAX_LOCK_ATTEMPTS, "Gave up locking row group");
        Err(PositionError::GroupUnstable { key: key.clone() })
    }
}

async fn max_in(uow: &mut dyn UnitOfWork, group: &GroupValues) -> Result<i64> {
    let max = uow
        .aggregate(&Filter::for_group(group), Aggregate::Max)
        .await?;
    match max {
        None => Ok(EMPTY_GROUP_NEXT),
        Some(m) => m.checked_add(1).ok_or_else(|| PositionError::PositionOverflow {
            group: group.clone(),
        }),
    }
}

async fn min_in(uow: &mut dyn UnitOfWork, group: &GroupValues) -> Result<i64> {
    let min = uow
        .aggregate(&Filter::for_group(group), Aggregate::Min)
        .await?;
    Ok(min.unwrap_or(EMPTY_GROUP_MIN))
}

/// Commit on success, roll back on failure.
async fn finish<T>(uow: Box<dyn UnitOfWork>, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            uow.commit().await?;
            Ok(value)
        }
        Err(e) => {
            rollback_quietly(uow).await;
            Err(e)
        }
    }
}

async fn rollback_quietly(uow: Box<dyn UnitOfWork>) {
    if let Err(e) = uow.rollback().await {
        warn!(error = %e, "Rollback failed");
    }
}
