//! Advisory lock keys for group and collection scopes.

use sha2::{Digest, Sha256};

use crate::query::LockScope;
use crate::row::GroupValues;

/// 64-bit advisory lock key for a table, or for one group of it.
///
/// First eight bytes of SHA-256 over the table name and the group values.
pub fn lock_key(table: &str, group: Option<&GroupValues>) -> i64 {
    let mut hasher = Sha256::new();
    hasher.update(table.as_bytes());
    match group {
        Some(group) => {
            for (field, value) in group.iter() {
                hasher.update([0x1e_u8]);
                hasher.update(field.as_bytes());
                hasher.update([0x1f_u8]);
                hasher.update(value.to_string().as_bytes());
            }
        }
        None => hasher.update(b"\0collection"),
    }
    let digest = hasher.finalize();
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    i64::from_be_bytes(bytes)
}

/// PostgreSQL transaction-scoped advisory locks for `scope`.
pub fn advisory_lock_statements(table: &str, scope: &LockScope) -> Vec<String> {
    let collection = lock_key(table, None);
    match scope {
        LockScope::Group(group) => vec![
            format!("SELECT pg_advisory_xact_lock_shared({})", collection),
            format!("SELECT pg_advisory_xact_lock({})", lock_key(table, Some(group))),
        ],
        LockScope::Collection => vec![format!("SELECT pg_advisory_xact_lock({})", collection)],
    }
}
