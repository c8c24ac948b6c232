use std::collections::HashMap;

use chrono::Utc;
use sea_orm::prelude::Expr;
use sea_orm::sea_query::{Func, LockType, OnConflict};
use sea_orm::*;

use crate::entity::{content_record, ownership_record};

/// Outcome of [`ContentLedger::delete_if_unreferenced`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Unreference {
    /// Live ownership rows remain; the count was rewritten to this value.
    StillReferenced(i64),
    /// The row is gone. The caller owns deleting this blob key.
    Removed { blob_key: String },
    /// There was no row for the hash.
    Missing,
}

/// Row-level operations on the content ledger.
///
/// Every mutating call is meant to run on the caller's transaction so it
/// commits or rolls back together with the ownership change that caused it.
pub struct ContentLedger<'a, C: ConnectionTrait> {
    conn: &'a C,
}

impl<'a, C: ConnectionTrait> ContentLedger<'a, C> {
    pub fn new(conn: &'a C) -> Self {
        Self { conn }
    }

    pub async fn find(&self, hash: &str) -> Result<Option<content_record::Model>, DbErr> {
        content_record::Entity::find_by_id(hash.to_owned())
            .one(self.conn)
            .await
    }

    /// Fetch the row with a `FOR UPDATE` lock. Serializes every writer that
    /// touches this hash's reference count until the caller commits.
    pub async fn find_for_update(
        &self,
        hash: &str,
    ) -> Result<Option<content_record::Model>, DbErr> {
        content_record::Entity::find_by_id(hash.to_owned())
            .lock(LockType::Update)
            .one(self.conn)
            .await
    }

    pub async fn all(&self) -> Result<Vec<content_record::Model>, DbErr> {
        content_record::Entity::find()
            .order_by_asc(content_record::Column::ContentHash)
            .all(self.conn)
            .await
    }

    pub async fn find_many(
        &self,
        hashes: &[String],
    ) -> Result<HashMap<String, content_record::Model>, DbErr> {
        if hashes.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = content_record::Entity::find()
            .filter(content_record::Column::ContentHash.is_in(hashes.iter().cloned()))
            .all(self.conn)
            .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.content_hash.clone(), r))
            .collect())
    }

    /// Insert a fresh row with a reference count of 1.
    ///
    /// Returns `false` without touching the existing row when the hash is
    /// already present, which is how a losing concurrent completion finds out.
    pub async fn insert_if_absent(
        &self,
        hash: &str,
        size: i64,
        media_type: &str,
        blob_key: &str,
    ) -> Result<bool, DbErr> {
        let now = Utc::now();
        let model = content_record::ActiveModel {
            content_hash: Set(hash.to_owned()),
            size: Set(size),
            media_type: Set(media_type.to_owned()),
            reference_count: Set(1),
            blob_key: Set(blob_key.to_owned()),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let result = content_record::Entity::insert(model)
            .on_conflict(
                OnConflict::column(content_record::Column::ContentHash)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(self.conn)
            .await;

        match result {
            Ok(rows) => Ok(rows > 0),
            Err(DbErr::RecordNotInserted) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Add one reference. Returns `false` if the row no longer exists.
    pub async fn increment_reference(&self, hash: &str) -> Result<bool, DbErr> {
        let result = content_record::Entity::update_many()
            .col_expr(
                content_record::Column::ReferenceCount,
                Expr::col(content_record::Column::ReferenceCount).add(1),
            )
            .col_expr(content_record::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(content_record::Column::ContentHash.eq(hash))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected > 0)
    }

    pub async fn set_reference_count(&self, hash: &str, count: i64) -> Result<(), DbErr> {
        let count = i32::try_from(count)
            .map_err(|_| DbErr::Custom(format!("reference count {count} out of range")))?;
        content_record::Entity::update_many()
            .col_expr(content_record::Column::ReferenceCount, Expr::value(count))
            .col_expr(content_record::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(content_record::Column::ContentHash.eq(hash))
            .exec(self.conn)
            .await?;
        Ok(())
    }

    /// Count live ownership rows pointing at `hash`.
    pub async fn count_references(&self, hash: &str) -> Result<i64, DbErr> {
        let n = ownership_record::Entity::find()
            .filter(ownership_record::Column::ContentHash.eq(hash))
            .count(self.conn)
            .await?;
        Ok(n as i64)
    }

    /// Recount from the ownership ledger and either write the count back or
    /// remove the row when nothing references it any more.
    ///
    /// The stored count is never trusted here. Callers must hold the row lock
    /// (see [`ContentLedger::find_for_update`]) for the result to be exact.
    pub async fn delete_if_unreferenced(&self, hash: &str) -> Result<Unreference, DbErr> {
        let Some(record) = self.find(hash).await? else {
            return Ok(Unreference::Missing);
        };

        let remaining = self.count_references(hash).await?;
        if remaining > 0 {
            if i64::from(record.reference_count) != remaining {
                tracing::warn!(
                    content_hash = %hash,
                    stored = record.reference_count,
                    actual = remaining,
                    "Reference count drift corrected"
                );
            }
            self.set_reference_count(hash, remaining).await?;
            return Ok(Unreference::StillReferenced(remaining));
        }

        content_record::Entity::delete_by_id(hash.to_owned())
            .exec(self.conn)
            .await?;

        Ok(Unreference::Removed {
            blob_key: record.blob_key,
        })
    }

    /// Rewrite every stored count from the ownership ledger.
    ///
    /// Rows with no remaining references are deleted and their blob keys
    /// returned so the caller can reclaim them from the content store.
    pub async fn recount_all(&self) -> Result<RecountReport, DbErr> {
        let live: Vec<(String, i64)> = ownership_record::Entity::find()
            .select_only()
            .column(ownership_record::Column::ContentHash)
            .column_as(sea_orm::sea_query::SimpleExpr::from(Func::count(Expr::col(ownership_record::Column::Id))), "refs")
            .group_by(ownership_record::Column::ContentHash)
            .into_tuple()
            .all(self.conn)
            .await?;
        let live: HashMap<String, i64> = live.into_iter().collect();

        let records = content_record::Entity::find()
            .lock(LockType::Update)
            .all(self.conn)
            .await?;

        let mut report = RecountReport::default();
        for record in records {
            match live.get(&record.content_hash) {
                Some(&n) if n == i64::from(record.reference_count) => {}
                Some(&n) => {
                    self.set_reference_count(&record.content_hash, n).await?;
                    report.corrected += 1;
                }
                None => {
                    content_record::Entity::delete_by_id(record.content_hash.clone())
                        .exec(self.conn)
                        .await?;
                    report.orphaned_blob_keys.push(record.blob_key);
                }
            }
        }

        Ok(report)
    }
}

/// Result of [`ContentLedger::recount_all`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecountReport {
    /// Rows whose stored count was wrong and has been rewritten.
    pub corrected: u64,
    /// Blob keys of rows removed because nothing referenced them.
    pub orphaned_blob_keys: Vec<String>,
}
