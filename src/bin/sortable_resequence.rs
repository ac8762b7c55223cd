//! sortable-resequence: renumber a collection's positions
//!
//! Rewrites the positions of a configured collection to `1..=N` in key
//! order, either for the whole collection or for one group.
//!
//! ## Usage
//! ```text
//! sortable-resequence [--config <path>] <collection> [field=value ...]
//! ```
//!
//! ## Configuration
//! - SORTABLE_CONFIG: Path to the YAML configuration (default: sortable.yaml)
//! - SORTABLE_LOG: Log filter (default: info)
//!
//! Values that parse as integers are matched as integers, everything else
//! as text. `field=` (empty value) matches NULL.

use std::sync::Arc;

use clap::Parser;
use tracing::info;

use sortable::config::Config;
use sortable::storage::init_storage;
use sortable::utils::bootstrap::{connect_with_retry, init_tracing};
use sortable::{GroupValues, PositionManager, SortOrder, Value};

const CONNECT_RETRIES: u32 = 5;

#[derive(Parser, Debug)]
#[command(author, version, about = "Renumber a sortable collection to 1..=N", long_about = None)]
struct Args {
    /// Configuration file, layered over sortable.yaml
    #[arg(short, long)]
    config: Option<String>,

    /// Collection name as configured under `collections`
    collection: String,

    /// Group to resequence, as field=value pairs; omit to renumber everything
    #[arg(value_parser = parse_group_value)]
    group: Vec<(String, Value)>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_tracing();

    let config = Config::load(args.config.as_deref())?;
    let collection = config.collection(&args.collection)?.clone();
    let group: GroupValues = args.group.into_iter().collect();

    let storage = &config.storage;
    let target = &collection;
    let store = connect_with_retry(&storage.storage_type.to_string(), CONNECT_RETRIES, move || {
        init_storage(storage, target)
    })
    .await?;

    let manager = PositionManager::new(collection.clone(), Arc::clone(&store));
    let filter = (!group.is_empty()).then_some(&group);
    let ranked = manager.sort(&SortOrder::default(), filter).await?;

    info!(collection = %collection.name, group = %group, rows = ranked, "sortable-resequence finished");
    Ok(())
}

/// `field=value`: integers become `Int`, an empty value is `Null`, anything
/// else is `Text`.
fn parse_group_value(arg: &str) -> Result<(String, Value), String> {
    let (field, raw) = arg
        .split_once('=')
        .ok_or_else(|| format!("expected field=value, got {arg:?}"))?;
    if field.is_empty() {
        return Err(format!("missing field name in {arg:?}"));
    }
    let value = if raw.is_empty() {
        Value::Null
    } else {
        raw.parse::<i64>()
            .map(Value::Int)
            .unwrap_or_else(|_| Value::Text(raw.to_string()))
    };
    Ok((field.to_string(), value))
}
