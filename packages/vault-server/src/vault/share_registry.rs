use chrono::Utc;
use sea_orm::sea_query::OnConflict;
use sea_orm::*;
use uuid::Uuid;

use crate::entity::share_link;
use crate::utils::share_id;

/// Candidate ids tried before giving up.
const MAX_ID_ATTEMPTS: u32 = 8;

/// Short-id to ownership-row mapping for public files.
pub struct ShareRegistry<'a, C: ConnectionTrait> {
    conn: &'a C,
    id_length: usize,
}

impl<'a, C: ConnectionTrait> ShareRegistry<'a, C> {
    pub fn new(conn: &'a C, id_length: usize) -> Self {
        Self { conn, id_length }
    }

    pub async fn find_by_ownership(
        &self,
        ownership_id: Uuid,
    ) -> Result<Option<share_link::Model>, DbErr> {
        share_link::Entity::find()
            .filter(share_link::Column::OwnershipId.eq(ownership_id))
            .one(self.conn)
            .await
    }

    pub async fn find(&self, short_id: &str) -> Result<Option<share_link::Model>, DbErr> {
        share_link::Entity::find_by_id(short_id.to_owned())
            .one(self.conn)
            .await
    }

    /// Return the link for `ownership_id`, creating one if there is none.
    ///
    /// Idempotent: a second call (or a concurrent one) yields the same id, and
    /// so does a call after the link was deleted and the file made public again.
    pub async fn get_or_create(&self, ownership_id: Uuid) -> Result<share_link::Model, DbErr> {
        if let Some(existing) = self.find_by_ownership(ownership_id).await? {
            return Ok(existing);
        }

        for attempt in 0..MAX_ID_ATTEMPTS {
            let candidate = share_link::ActiveModel {
                id: Set(share_id::derive(ownership_id, attempt, self.id_length)),
                ownership_id: Set(ownership_id),
                created_at: Set(Utc::now()),
            };

            // Either unique key may collide: the id with another file's link,
            // or the ownership with a concurrent creator. Neither aborts the
            // surrounding transaction.
            let result = share_link::Entity::insert(candidate)
                .on_conflict(OnConflict::new().do_nothing().to_owned())
                .exec_without_returning(self.conn)
                .await;

            match result {
                Ok(_) | Err(DbErr::RecordNotInserted) => {}
                Err(e) => return Err(e),
            }

            if let Some(link) = self.find_by_ownership(ownership_id).await? {
                return Ok(link);
            }
            tracing::debug!(%ownership_id, attempt, "Share id collision, trying next candidate");
        }

        Err(DbErr::Custom(format!(
            "could not allocate a share id after {MAX_ID_ATTEMPTS} attempts"
        )))
    }

    /// Remove the link for `ownership_id`, if any.
    pub async fn delete_for_ownership(&self, ownership_id: Uuid) -> Result<u64, DbErr> {
        let result = share_link::Entity::delete_many()
            .filter(share_link::Column::OwnershipId.eq(ownership_id))
            .exec(self.conn)
            .await?;
        Ok(result.rows_affected)
    }
}

/// Path under which a share id resolves.
pub fn share_path(short_id: &str) -> String {
    format!("/share/{short_id}")
}
