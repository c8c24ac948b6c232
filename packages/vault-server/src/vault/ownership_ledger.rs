use std::collections::HashSet;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::{content_record, ownership_record};

/// An ownership row joined with the content it points at.
pub type OwnedFile = (ownership_record::Model, content_record::Model);

pub struct OwnershipLedger<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> OwnershipLedger<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn create(
        &self,
        user_id: &str,
        content_hash: &str,
        filename: &str,
    ) -> Result<ownership_record::Model, DbErr> {
        let now = Utc::now();
        ownership_record::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(user_id.to_owned()),
            content_hash: Set(content_hash.to_owned()),
            filename: Set(filename.to_owned()),
            is_public: Set(false),
            download_count: Set(0),
            uploaded_at: Set(now),
            updated_at: Set(now),
        }
        .insert(self.conn)
        .await
    }

    /// Find a row by id, scoped to its owner.
    pub async fn find_owned(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<ownership_record::Model>, DbErr> {
        ownership_record::Entity::find_by_id(id)
            .filter(ownership_record::Column::UserId.eq(user_id))
            .one(self.conn)
            .await
    }

    /// Owner-scoped lookup holding a row lock until the caller commits.
    pub async fn find_owned_for_update(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<ownership_record::Model>, DbErr> {
        ownership_record::Entity::find_by_id(id)
            .filter(ownership_record::Column::UserId.eq(user_id))
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    /// Owner-scoped lookup that also loads the content row.
    pub async fn find_owned_with_content(
        &self,
        user_id: &str,
        id: Uuid,
    ) -> Result<Option<OwnedFile>, DbErr> {
        let row = ownership_record::Entity::find_by_id(id)
            .filter(ownership_record::Column::UserId.eq(user_id))
            .find_also_related(content_record::Entity)
            .one(self.conn)
            .await?;
        Ok(row.and_then(|(o, c)| c.map(|c| (o, c))))
    }

    /// Lookup visible to `viewer`: the owner sees any of their files, everyone
    /// else (including anonymous callers) only public ones.
    pub async fn find_visible(
        &self,
        viewer: Option<&str>,
        id: Uuid,
    ) -> Result<Option<OwnedFile>, DbErr> {
        let visibility = match viewer {
            Some(user_id) => Condition::any()
                .add(ownership_record::Column::UserId.eq(user_id))
                .add(ownership_record::Column::IsPublic.eq(true)),
            None => Condition::all().add(ownership_record::Column::IsPublic.eq(true)),
        };

        let row = ownership_record::Entity::find_by_id(id)
            .filter(visibility)
            .find_also_related(content_record::Entity)
            .one(self.conn)
            .await?;
        Ok(row.and_then(|(o, c)| c.map(|c| (o, c))))
    }

    /// A user's files, newest first.
    pub async fn list_for_user(
        &self,
        user_id: &str,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OwnedFile>, u64), DbErr> {
        let query = ownership_record::Entity::find()
            .filter(ownership_record::Column::UserId.eq(user_id));

        let total = query.clone().count(self.conn).await?;

        let rows = query
            .order_by_desc(ownership_record::Column::UploadedAt)
            .order_by_desc(ownership_record::Column::Id)
            .find_also_related(content_record::Entity)
            .offset((page.saturating_sub(1)) * per_page)
            .limit(per_page)
            .all(self.conn)
            .await?;

        let files = rows
            .into_iter()
            .filter_map(|(o, c)| c.map(|c| (o, c)))
            .collect();

        Ok((files, total))
    }

    pub async fn ids_for_user(&self, user_id: &str) -> Result<Vec<Uuid>, DbErr> {
        ownership_record::Entity::find()
            .select_only()
            .column(ownership_record::Column::Id)
            .filter(ownership_record::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.conn)
            .await
    }

    /// `(content_hash, size)` for every file the user holds, one entry per
    /// ownership row.
    pub async fn usage_entries(&self, user_id: &str) -> Result<Vec<(String, i64)>, DbErr> {
        ownership_record::Entity::find()
            .select_only()
            .column(ownership_record::Column::ContentHash)
            .column(content_record::Column::Size)
            .inner_join(content_record::Entity)
            .filter(ownership_record::Column::UserId.eq(user_id))
            .into_tuple()
            .all(self.conn)
            .await
    }

    /// `(content_hash, size)` for every ownership row in the vault.
    pub async fn all_usage_entries(&self) -> Result<Vec<(String, i64)>, DbErr> {
        ownership_record::Entity::find()
            .select_only()
            .column(ownership_record::Column::ContentHash)
            .column(content_record::Column::Size)
            .inner_join(content_record::Entity)
            .into_tuple()
            .all(self.conn)
            .await
    }

    /// Flip the public flag. Returns `false` if the row is gone or owned by
    /// someone else.
    pub async fn set_public(&self, user_id: &str, id: Uuid, public: bool) -> Result<bool, DbErr> {
        let result = ownership_record::Entity::update_many()
            .col_expr(ownership_record::Column::IsPublic, Expr::value(public))
            .col_expr(ownership_record::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(ownership_record::Column::Id.eq(id))
            .filter(ownership_record::Column::UserId.eq(user_id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    /// Whether any row for `hash` is currently public.
    pub async fn any_public(&self, hash: &str) -> Result<bool, DbErr> {
        let n = ownership_record::Entity::find()
            .filter(ownership_record::Column::ContentHash.eq(hash))
            .filter(ownership_record::Column::IsPublic.eq(true))
            .count(self.conn)
            .await?;
        Ok(n > 0)
    }

    /// Every hash with at least one public row.
    pub async fn public_hashes(&self) -> Result<HashSet<String>, DbErr> {
        let hashes: Vec<String> = ownership_record::Entity::find()
            .select_only()
            .column(ownership_record::Column::ContentHash)
            .filter(ownership_record::Column::IsPublic.eq(true))
            .distinct()
            .into_tuple()
            .all(self.conn)
            .await?;
        Ok(hashes.into_iter().collect())
    }

    /// Hard delete. There is no tombstone state.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = ownership_record::Entity::delete_by_id(id)
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn increment_download_count(&self, id: Uuid) -> Result<(), DbErr> {
        ownership_record::Entity::update_many()
            .col_expr(
                ownership_record::Column::DownloadCount,
                Expr::col(ownership_record::Column::DownloadCount).add(1),
            )
            .filter(ownership_record::Column::Id.eq(id))
            .exec(self.conn)
            .await?;
        Ok(())
    }

    pub async fn count_all(&self) -> Result<u64, DbErr> {
        ownership_record::Entity::find().count(self.conn).await
    }
}
