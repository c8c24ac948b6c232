use std::collections::HashMap;

use sea_orm::ConnectionTrait;

use super::ownership_ledger::OwnershipLedger;
use super::users::UserDirectory;
use crate::config::StorageConfig;
use crate::error::AppError;

/// Storage accounting for one user (or the whole vault).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct UsageSummary {
    /// Size of each distinct content hash held, counted once.
    pub deduplicated_bytes: i64,
    /// Size of every ownership row, as if nothing were shared.
    pub original_bytes: i64,
    pub file_count: u64,
    pub unique_count: u64,
    pub duplicate_count: u64,
    pub savings_bytes: i64,
    /// In `[0, 100]`.
    pub savings_percent: f64,
}

impl UsageSummary {
    /// Build from `(content_hash, size)` pairs, one per ownership row.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, i64)>,
        S: AsRef<str>,
    {
        let mut distinct: HashMap<String, i64> = HashMap::new();
        let mut original_bytes = 0i64;
        let mut file_count = 0u64;

        for (hash, size) in entries {
            file_count += 1;
            original_bytes = original_bytes.saturating_add(size);
            distinct.entry(hash.as_ref().to_owned()).or_insert(size);
        }

        let deduplicated_bytes = distinct.values().fold(0i64, |acc, s| acc.saturating_add(*s));
        let unique_count = distinct.len() as u64;
        let savings_bytes = original_bytes.saturating_sub(deduplicated_bytes).max(0);
        let savings_percent = if original_bytes <= 0 {
            0.0
        } else {
            (savings_bytes as f64 / original_bytes as f64 * 100.0).clamp(0.0, 100.0)
        };

        Self {
            deduplicated_bytes,
            original_bytes,
            file_count,
            unique_count,
            duplicate_count: file_count.saturating_sub(unique_count),
            savings_bytes,
            savings_percent,
        }
    }
}

/// Compute a user's usage from the ledgers.
pub async fn compute_usage<C: ConnectionTrait>(
    conn: &C,
    user_id: &str,
) -> Result<UsageSummary, AppError> {
    let entries = OwnershipLedger::new(conn).usage_entries(user_id).await?;
    Ok(UsageSummary::from_entries(entries))
}

/// Admission check for new bytes against a user's quota.
pub struct QuotaGate<'a, C: ConnectionTrait> {
    conn: &'a C,
    storage: &'a StorageConfig,
}

impl<'a, C: ConnectionTrait> QuotaGate<'a, C> {
    pub fn new(conn: &'a C, storage: &'a StorageConfig) -> Self {
        Self { conn, storage }
    }

    /// Deny when deduplicated usage plus `additional` would exceed the quota.
    pub async fn check(&self, user_id: &str, additional: i64) -> Result<(), AppError> {
        let user = UserDirectory::new(self.conn, self.storage)
            .get_or_create(user_id)
            .await?;
        let used = compute_usage(self.conn, user_id).await?.deduplicated_bytes;

        if used.saturating_add(additional) > user.storage_quota {
            tracing::info!(
                user_id,
                used,
                requested = additional,
                quota = user.storage_quota,
                "Upload denied by quota"
            );
            return Err(AppError::QuotaExceeded {
                used,
                requested: additional,
                quota: user.storage_quota,
            });
        }
        Ok(())
    }
}
