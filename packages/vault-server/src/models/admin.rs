use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::entity::vault_user;
use crate::vault::SystemStats;
use crate::vault::lifecycle::{ReferenceReconciliation, TagReconciliation};

use super::shared::Pagination;

/// Default page size of the admin user list.
pub const USER_LIST_PER_PAGE: u64 = 50;

#[derive(Serialize, utoipa::ToSchema)]
pub struct AdminUserResponse {
    pub id: String,
    #[schema(example = "user")]
    pub role: String,
    pub storage_quota: i64,
    pub storage_used: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<vault_user::Model> for AdminUserResponse {
    fn from(u: vault_user::Model) -> Self {
        Self {
            id: u.id,
            role: u.role,
            storage_quota: u.storage_quota,
            storage_used: u.storage_used,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct UserListResponse {
    pub data: Vec<AdminUserResponse>,
    pub pagination: Pagination,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateRoleRequest {
    /// `user` or `admin`.
    #[schema(example = "admin")]
    pub role: String,
}

#[derive(Deserialize, utoipa::ToSchema)]
pub struct UpdateQuotaRequest {
    /// New quota in megabytes.
    #[schema(example = 500)]
    pub quota_mb: i64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct DeleteUserResponse {
    pub id: String,
    pub files_deleted: u64,
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct SystemStatsResponse {
    pub user_count: u64,
    pub file_count: u64,
    pub unique_content_count: u64,
    pub stored_bytes: i64,
    pub logical_bytes: i64,
    pub savings_bytes: i64,
    pub savings_percent: f64,
}

impl From<SystemStats> for SystemStatsResponse {
    fn from(s: SystemStats) -> Self {
        Self {
            user_count: s.user_count,
            file_count: s.file_count,
            unique_content_count: s.unique_content_count,
            stored_bytes: s.stored_bytes,
            logical_bytes: s.logical_bytes,
            savings_bytes: s.savings_bytes,
            savings_percent: s.savings_percent,
        }
    }
}

#[derive(Serialize, utoipa::ToSchema)]
pub struct ReconcileResponse {
    /// Reference counts rewritten from the ownership ledger.
    pub counts_corrected: u64,
    /// Content rows removed because nothing referenced them.
    pub content_released: u64,
    pub blob_delete_failures: u64,
    /// Content rows whose blob is missing from the store.
    pub missing_blobs: u64,
    pub blobs_tagged_public: u64,
    pub blobs_cleared: u64,
    pub tag_failures: u64,
}

impl ReconcileResponse {
    pub fn new(refs: ReferenceReconciliation, tags: TagReconciliation) -> Self {
        Self {
            counts_corrected: refs.corrected,
            content_released: refs.released,
            blob_delete_failures: refs.blob_delete_failures,
            missing_blobs: refs.missing_blobs,
            blobs_tagged_public: tags.tagged_public,
            blobs_cleared: tags.cleared,
            tag_failures: tags.failures,
        }
    }
}
