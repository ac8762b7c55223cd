//! Statement builders for the configured sortable table.
//!
//! Table and column names come from configuration, so they are validated
//! once here and then used through `Alias`.

use sea_query::{
    Alias, Cond, Expr, Func, NullOrdering, Order, Query, SelectStatement, SimpleExpr,
    UpdateStatement,
};

use crate::config::CollectionConfig;
use crate::interfaces::{Result, StorageError};
use crate::query::{Aggregate, Column, Direction, Filter, PositionBound, SortOrder};
use crate::row::{RowKey, Value};

/// Column alias for the selected key.
pub const KEY_ALIAS: &str = "row_key";
/// Column alias for the selected position.
pub const POSITION_ALIAS: &str = "row_position";
/// Column alias for aggregate results.
pub const AGGREGATE_ALIAS: &str = "position_agg";

const INTEGER_TYPE: &str = "BIGINT";

fn checked(name: &str) -> Result<Alias> {
    let mut chars = name.chars();
    let valid = matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(Alias::new(name))
    } else {
        Err(StorageError::InvalidIdentifier(name.to_string()))
    }
}

fn key_expr(key: &RowKey) -> SimpleExpr {
    match key {
        RowKey::Int(n) => Expr::val(*n).into(),
        RowKey::Text(s) => Expr::val(s.clone()).into(),
    }
}

/// Layout of the table holding sortable rows.
#[derive(Debug, Clone)]
pub struct TableSpec {
    table: String,
    key: String,
    position: String,
    group_fields: Vec<String>,
}

impl TableSpec {
    pub fn new(
        table: impl Into<String>,
        key: impl Into<String>,
        position: impl Into<String>,
        group_fields: Vec<String>,
    ) -> Result<Self> {
        let spec = Self {
            table: table.into(),
            key: key.into(),
            position: position.into(),
            group_fields,
        };
        checked(&spec.table)?;
        checked(&spec.key)?;
        checked(&spec.position)?;
        for field in &spec.group_fields {
            checked(field)?;
        }
        Ok(spec)
    }

    pub fn from_config(config: &CollectionConfig) -> Result<Self> {
        Self::new(
            config.table_name(),
            config.key_column.clone(),
            config.position_field.clone(),
            config.group_fields.clone(),
        )
    }

    pub fn name(&self) -> &str {
        &self.table
    }

    pub fn group_fields(&self) -> &[String] {
        &self.group_fields
    }

    fn table(&self) -> Alias {
        Alias::new(&self.table)
    }

    fn key_col(&self) -> Alias {
        Alias::new(&self.key)
    }

    fn position_col(&self) -> Alias {
        Alias::new(&self.position)
    }

    fn condition(&self, filter: &Filter) -> Result<Cond> {
        let mut cond = Cond::all();
        if let Some(key) = &filter.key {
            cond = cond.add(Expr::col(self.key_col()).eq(key_expr(key)));
        }
        for (field, value) in &filter.fields {
            let col = checked(field)?;
            cond = cond.add(match value {
                Value::Null => Expr::col(col).is_null(),
                Value::Int(n) => Expr::col(col).eq(*n),
                Value::Text(s) => Expr::col(col).eq(s.as_str()),
            });
        }
        if let Some(bound) = filter.position {
            let col = Expr::col(self.position_col());
            cond = cond.add(match bound {
                PositionBound::Lt(p) => col.lt(p),
                PositionBound::Gt(p) => col.gt(p),
                PositionBound::Gte(p) => col.gte(p),
            });
        }
        Ok(cond)
    }

    /// `SELECT key, position, group fields... WHERE filter ORDER BY order`.
    ///
    /// Result columns are positional: key, position, then the group fields
    /// in configuration order.
    pub fn select(
        &self,
        filter: &Filter,
        order: &SortOrder,
        limit: Option<u64>,
    ) -> Result<SelectStatement> {
        let mut stmt = Query::select();
        stmt.expr_as(Expr::col(self.key_col()), Alias::new(KEY_ALIAS))
            .expr_as(
                Func::cast_as(Expr::col(self.position_col()), Alias::new(INTEGER_TYPE)),
                Alias::new(POSITION_ALIAS),
            )
            .columns(self.group_fields.iter().map(Alias::new))
            .from(self.table())
            .cond_where(self.condition(filter)?);

        // NULL sorts lowest, as it does in the in-memory store. Key and
        // position are never NULL.
        for term in order.terms() {
            let (direction, nulls) = match term.direction {
                Direction::Asc => (Order::Asc, NullOrdering::First),
                Direction::Desc => (Order::Desc, NullOrdering::Last),
            };
            match &term.column {
                Column::Key => stmt.order_by(self.key_col(), direction),
                Column::Position => stmt.order_by(self.position_col(), direction),
                Column::Field(name) => stmt.order_by_with_nulls(checked(name)?, direction, nulls),
            };
        }
        stmt.order_by(self.key_col(), Order::Asc);

        if let Some(limit) = limit {
            stmt.limit(limit);
        }
        Ok(stmt)
    }

    /// `SELECT CAST(MIN|MAX(position) AS BIGINT) WHERE filter`.
    pub fn aggregate(&self, filter: &Filter, aggregate: Aggregate) -> Result<SelectStatement> {
        let position = Expr::col(self.position_col());
        let agg = match aggregate {
            Aggregate::Min => Func::min(position),
            Aggregate::Max => Func::max(position),
        };
        Ok(Query::select()
            .expr_as(
                Func::cast_as(agg, Alias::new(INTEGER_TYPE)),
                Alias::new(AGGREGATE_ALIAS),
            )
            .from(self.table())
            .cond_where(self.condition(filter)?)
            .to_owned())
    }

    /// `UPDATE ... SET position = :position WHERE key = :key`.
    pub fn update_position(&self, key: &RowKey, position: i64) -> UpdateStatement {
        Query::update()
            .table(self.table())
            .value(self.position_col(), Expr::val(position))
            .and_where(Expr::col(self.key_col()).eq(key_expr(key)))
            .to_owned()
    }

    /// `UPDATE ... SET position = position + :delta WHERE filter`.
    pub fn shift_positions(&self, filter: &Filter, delta: i64) -> Result<UpdateStatement> {
        Ok(Query::update()
            .table(self.table())
            .value(
                self.position_col(),
                Expr::col(self.position_col()).add(delta),
            )
            .cond_where(self.condition(filter)?)
            .to_owned())
    }
}
