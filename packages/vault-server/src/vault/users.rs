use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;

use super::ownership_ledger::OwnershipLedger;
use super::usage::{UsageSummary, compute_usage};
use crate::config::StorageConfig;
use crate::entity::{content_record, vault_user};
use crate::error::AppError;

const MB: i64 = 1024 * 1024;

/// Vault-wide totals for the admin dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemStats {
    pub user_count: u64,
    pub file_count: u64,
    pub unique_content_count: u64,
    /// Bytes actually held in the content store.
    pub stored_bytes: i64,
    /// Bytes the vault would hold without deduplication.
    pub logical_bytes: i64,
    pub savings_bytes: i64,
    pub savings_percent: f64,
}

pub struct UserDirectory<'a, C: ConnectionTrait> {
    conn: &'a C,
    storage: &'a StorageConfig,
}

impl<'a, C: ConnectionTrait> UserDirectory<'a, C> {
    pub fn new(conn: &'a C, storage: &'a StorageConfig) -> Self {
        Self { conn, storage }
    }

    /// Ensure a row exists for a verified identity, provisioning it with the
    /// default quota on first sight.
    pub async fn get_or_create(&self, user_id: &str) -> Result<vault_user::Model, DbErr> {
        if let Some(user) = self.get(user_id).await? {
            return Ok(user);
        }

        let now = Utc::now();
        let model = vault_user::ActiveModel {
            id: Set(user_id.to_owned()),
            role: Set(vault_user::ROLE_USER.to_owned()),
            storage_quota: Set(self.storage.default_quota_bytes()),
            storage_used: Set(0),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = vault_user::Entity::insert(model)
            .on_conflict(
                OnConflict::column(vault_user::Column::Id)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await;

        match result {
            Ok(rows) if rows > 0 => tracing::info!(user_id, "Provisioned vault user"),
            Ok(_) | Err(DbErr::RecordNotInserted) => {}
            Err(e) => return Err(e),
        }

        self.get(user_id).await?.ok_or_else(|| {
            DbErr::Custom("vault_user missing after provisioning".to_string())
        })
    }

    pub async fn get(&self, user_id: &str) -> Result<Option<vault_user::Model>, DbErr> {
        vault_user::Entity::find_by_id(user_id.to_owned())
            .one(self.conn)
            .await
    }

    /// Fail with `PermissionDenied` unless the stored role is admin.
    pub async fn require_admin(&self, user_id: &str) -> Result<vault_user::Model, AppError> {
        let user = self.get_or_create(user_id).await?;
        if !user.is_admin() {
            return Err(AppError::PermissionDenied);
        }
        Ok(user)
    }

    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<vault_user::Model>, u64), DbErr> {
        let query = vault_user::Entity::find();
        let total = query.clone().count(self.conn).await?;
        let users = query
            .order_by_desc(vault_user::Column::CreatedAt)
            .order_by_asc(vault_user::Column::Id)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(self.conn)
            .await?;
        Ok((users, total))
    }

    pub async fn set_role(&self, user_id: &str, role: &str) -> Result<vault_user::Model, AppError> {
        if role != vault_user::ROLE_USER && role != vault_user::ROLE_ADMIN {
            return Err(AppError::Validation(
                "Role must be one of: user, admin".into(),
            ));
        }
        let mut active = self.require(user_id).await?.into_active_model();
        active.role = Set(role.to_owned());
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.conn).await?)
    }

    /// Set the quota in megabytes. Accepts `1..=max_quota_mb`.
    pub async fn set_quota_mb(
        &self,
        user_id: &str,
        quota_mb: i64,
    ) -> Result<vault_user::Model, AppError> {
        if quota_mb <= 0 || quota_mb > self.storage.max_quota_mb {
            return Err(AppError::Validation(format!(
                "Quota must be between 1 and {} MB",
                self.storage.max_quota_mb
            )));
        }
        let mut active = self.require(user_id).await?.into_active_model();
        active.storage_quota = Set(quota_mb.saturating_mul(MB));
        active.updated_at = Set(Utc::now());
        Ok(active.update(self.conn).await?)
    }

    async fn require(&self, user_id: &str) -> Result<vault_user::Model, AppError> {
        self.get(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("User '{user_id}' not found")))
    }

    /// Bring the legacy `storage_used` counter in line with computed usage.
    pub async fn refresh_storage_used(&self, user_id: &str) -> Result<UsageSummary, AppError> {
        let usage = compute_usage(self.conn, user_id).await?;
        vault_user::Entity::update_many()
            .col_expr(
                vault_user::Column::StorageUsed,
                Expr::value(usage.deduplicated_bytes),
            )
            .filter(vault_user::Column::Id.eq(user_id))
            .exec(self.conn)
            .await?;
        Ok(usage)
    }

    /// Remove the user row. Callers release the user's files first.
    pub async fn delete(&self, user_id: &str) -> Result<bool, DbErr> {
        let result = vault_user::Entity::delete_by_id(user_id.to_owned())
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn system_stats(&self) -> Result<SystemStats, DbErr> {
        let user_count = vault_user::Entity::find().count(self.conn).await?;
        let file_count = OwnershipLedger::new(self.conn).count_all().await?;

        let sizes: Vec<i64> = content_record::Entity::find()
            .select_only()
            .column(content_record::Column::Size)
            .into_tuple()
            .all(self.conn)
            .await?;
        let stored_bytes = sizes.iter().fold(0i64, |acc, s| acc.saturating_add(*s));

        let logical = UsageSummary::from_entries(
            OwnershipLedger::new(self.conn).all_usage_entries().await?,
        );

        let savings_bytes = std::cmp::Ord::max(logical.original_bytes.saturating_sub(stored_bytes), 0);
        let savings_percent = if logical.original_bytes <= 0 {
            0.0
        } else {
            (savings_bytes as f64 / logical.original_bytes as f64 * 100.0).clamp(0.0, 100.0)
        };

        Ok(SystemStats {
            user_count,
            file_count,
            unique_content_count: sizes.len() as u64,
            stored_bytes,
            logical_bytes: logical.original_bytes,
            savings_bytes,
            savings_percent,
        })
    }
}
