//! Query vocabulary the position manager speaks to row stores.
//!
//! Equality on fields, one bound on the position column and an ordering.
//! Every backend must be able to express all of it.

use crate::row::{GroupValues, RowKey, Value};

/// Bound on the position column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PositionBound {
    Lt(i64),
    Gt(i64),
    Gte(i64),
}

impl PositionBound {
    pub fn admits(&self, position: i64) -> bool {
        match *self {
            PositionBound::Lt(p) => position < p,
            PositionBound::Gt(p) => position > p,
            PositionBound::Gte(p) => position >= p,
        }
    }
}

/// Conjunctive row filter.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    pub key: Option<RowKey>,
    /// Field equalities. `Value::Null` matches only null columns.
    pub fields: Vec<(String, Value)>,
    pub position: Option<PositionBound>,
}

impl Filter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_key(key: &RowKey) -> Self {
        Self {
            key: Some(key.clone()),
            ..Self::default()
        }
    }

    /// Rows of one group.
    pub fn for_group(group: &GroupValues) -> Self {
        Self {
            fields: group
                .iter()
                .map(|(f, v)| (f.to_string(), v.clone()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn with_position(mut self, bound: PositionBound) -> Self {
        self.position = Some(bound);
        self
    }
}

/// Column an ordering term refers to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Column {
    Key,
    Position,
    Field(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTerm {
    pub column: Column,
    pub direction: Direction,
}

/// Ordering expression for reads and for resequencing.
///
/// Stores append a key-ascending tie-break so equal sort values enumerate
/// deterministically.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortOrder(Vec<OrderTerm>);

impl Default for SortOrder {
    /// Primary key ascending.
    fn default() -> Self {
        Self::by(Column::Key, Direction::Asc)
    }
}

impl SortOrder {
    pub fn by(column: Column, direction: Direction) -> Self {
        Self(vec![OrderTerm { column, direction }])
    }

    pub fn then(mut self, column: Column, direction: Direction) -> Self {
        self.0.push(OrderTerm { column, direction });
        self
    }

    pub fn position_asc() -> Self {
        Self::by(Column::Position, Direction::Asc).then(Column::Key, Direction::Asc)
    }

    pub fn position_desc() -> Self {
        Self::by(Column::Position, Direction::Desc).then(Column::Key, Direction::Asc)
    }

    pub fn terms(&self) -> &[OrderTerm] {
        &self.0
    }
}

/// Aggregate over the position column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    Min,
    Max,
}

/// Serialization unit a unit of work holds until commit or rollback.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LockScope {
    /// Exclusive on one group, shared on the collection.
    Group(GroupValues),
    /// Exclusive on the whole collection.
    Collection,
}
