use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "content_record")]
pub struct Model {
    /// SHA-256 content hash, lowercase hex.
    #[sea_orm(primary_key, auto_increment = false)]
    pub content_hash: String,

    /// Size in bytes as observed by the content store at completion.
    pub size: i64,

    pub media_type: String,

    /// Number of ownership records pointing at this row.
    pub reference_count: i32,

    /// Content store key, derived from the hash.
    pub blob_key: String,

    #[sea_orm(has_many)]
    pub ownerships: HasMany<super::ownership_record::Entity>,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
