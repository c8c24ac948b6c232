use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entity::vault_user;
use crate::vault::UsageSummary;

use super::shared::usage_percent;

#[derive(Serialize, utoipa::ToSchema)]
pub struct ProfileResponse {
    #[schema(example = "user_2abc")]
    pub id: String,
    #[schema(example = "user")]
    pub role: String,
    /// Quota in bytes.
    #[schema(example = 104857600)]
    pub storage_quota: i64,
    /// Deduplicated bytes held.
    pub storage_used: i64,
    pub created_at: DateTime<Utc>,
}

impl ProfileResponse {
    pub fn new(user: vault_user::Model, usage: &UsageSummary) -> Self {
        Self {
            id: user.id,
            role: user.role,
            storage_quota: user.storage_quota,
            storage_used: usage.deduplicated_bytes,
            created_at: user.created_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageResponse {
    pub used: i64,
    pub quota: i64,
    pub free: i64,
    #[schema(example = 12.5)]
    pub usage_percent: f64,
}

impl StorageResponse {
    pub fn new(quota: i64, usage: &UsageSummary) -> Self {
        let used = usage.deduplicated_bytes;
        Self {
            used,
            quota,
            free: quota.saturating_sub(used).max(0),
            usage_percent: usage_percent(used, quota),
        }
    }
}

/// Usage with and without deduplication.
#[derive(Serialize, utoipa::ToSchema)]
pub struct StorageStatisticsResponse {
    pub deduplicated_bytes: i64,
    pub original_bytes: i64,
    pub file_count: u64,
    pub unique_count: u64,
    pub duplicate_count: u64,
    pub savings_bytes: i64,
    pub savings_percent: f64,
    pub quota: i64,
    pub free: i64,
    pub usage_percent: f64,
}

impl StorageStatisticsResponse {
    pub fn new(quota: i64, usage: UsageSummary) -> Self {
        let storage = StorageResponse::new(quota, &usage);
        Self {
            deduplicated_bytes: usage.deduplicated_bytes,
            original_bytes: usage.original_bytes,
            file_count: usage.file_count,
            unique_count: usage.unique_count,
            duplicate_count: usage.duplicate_count,
            savings_bytes: usage.savings_bytes,
            savings_percent: usage.savings_percent,
            quota,
            free: storage.free,
            usage_percent: storage.usage_percent,
        }
    }
}
