use sea_orm::*;
use sea_query::{Index, IndexCreateStatement, PostgresQueryBuilder, SqliteQueryBuilder};
use tracing::info;

use crate::entity::ownership_record;

/// Ensure required database indexes exist.
///
/// SeaORM's schema-sync doesn't support composite non-unique indexes,
/// so we create them manually on startup.
pub async fn ensure_indexes(db: &DatabaseConnection) -> Result<(), DbErr> {
    // Listing a user's files newest first:
    // SELECT ... FROM ownership_record WHERE user_id = ? ORDER BY uploaded_at DESC
    let user_uploaded = Index::create()
        .if_not_exists()
        .name("idx_ownership_user_uploaded")
        .table(ownership_record::Entity)
        .col(ownership_record::Column::UserId)
        .col(ownership_record::Column::UploadedAt)
        .to_owned();
    ensure_index(db, "idx_ownership_user_uploaded", user_uploaded).await;

    // Reference recounts:
    // SELECT COUNT(*) FROM ownership_record WHERE content_hash = ?
    let by_hash = Index::create()
        .if_not_exists()
        .name("idx_ownership_content_hash")
        .table(ownership_record::Entity)
        .col(ownership_record::Column::ContentHash)
        .to_owned();
    ensure_index(db, "idx_ownership_content_hash", by_hash).await;

    Ok(())
}

async fn ensure_index(db: &DatabaseConnection, name: &str, stmt: IndexCreateStatement) {
    let sql = match db.get_database_backend() {
        DbBackend::Sqlite => stmt.to_string(SqliteQueryBuilder),
        _ => stmt.to_string(PostgresQueryBuilder),
    };
    match db.execute_unprepared(&sql).await {
        Ok(_) => {
            info!("Ensured index {} exists", name);
        }
        Err(e) => {
            tracing::warn!("Failed to create index {}: {}", name, e);
        }
    }
}
