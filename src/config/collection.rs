//! Per-collection positioning configuration.

use serde::Deserialize;

/// Default name of the position column.
pub const DEFAULT_POSITION_FIELD: &str = "sort";
/// Default name of the primary key column.
pub const DEFAULT_KEY_COLUMN: &str = "id";

/// How one collection (table) is kept in order.
///
/// Fixed at setup; each `PositionManager` owns its own copy.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Name the collection is looked up by.
    pub name: String,
    /// Table holding the rows. Defaults to `name`.
    pub table: String,
    /// Primary key column.
    pub key_column: String,
    /// Integer column holding the position.
    pub position_field: String,
    /// Columns whose combined values partition the ordering space.
    pub group_fields: Vec<String>,
    /// Levels of related rows to load alongside a row. Stores holding flat
    /// rows ignore it.
    pub read_depth: u8,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            table: String::new(),
            key_column: DEFAULT_KEY_COLUMN.to_string(),
            position_field: DEFAULT_POSITION_FIELD.to_string(),
            group_fields: Vec::new(),
            read_depth: 0,
        }
    }
}

impl CollectionConfig {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            table: name.clone(),
            name,
            ..Self::default()
        }
    }

    pub fn with_table(mut self, table: impl Into<String>) -> Self {
        self.table = table.into();
        self
    }

    pub fn with_key_column(mut self, column: impl Into<String>) -> Self {
        self.key_column = column.into();
        self
    }

    pub fn with_position_field(mut self, field: impl Into<String>) -> Self {
        self.position_field = field.into();
        self
    }

    pub fn with_group_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.group_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_read_depth(mut self, depth: u8) -> Self {
        self.read_depth = depth;
        self
    }

    /// Table name, falling back to the collection name.
    pub fn table_name(&self) -> &str {
        if self.table.is_empty() {
            &self.name
        } else {
            &self.table
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_defaults() {
        let config = CollectionConfig::new("tasks");
        assert_eq!(config.table_name(), "tasks");
        assert_eq!(config.key_column, "id");
        assert_eq!(config.position_field, "sort");
        assert!(config.group_fields.is_empty());
        assert_eq!(config.read_depth, 0);
    }

    #[test]
    fn test_collection_from_yaml_falls_back_to_name() {
        let config: CollectionConfig =
            serde_yaml::from_str("name: tasks\ngroup_fields: [list_id]\n").unwrap();
        assert_eq!(config.table_name(), "tasks");
        assert_eq!(config.group_fields, vec!["list_id".to_string()]);
        assert_eq!(config.position_field, "sort");
    }

    #[test]
    fn test_builder_overrides() {
        let config = CollectionConfig::new("tasks")
            .with_table("todo_items")
            .with_position_field("rank")
            .with_group_fields(["list_id", "owner_id"]);
        assert_eq!(config.table_name(), "todo_items");
        assert_eq!(config.position_field, "rank");
        assert_eq!(config.group_fields.len(), 2);
    }
}
