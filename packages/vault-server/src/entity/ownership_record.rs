use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ownership_record")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: String,

    pub content_hash: String,
    #[sea_orm(belongs_to, from = "content_hash", to = "content_hash")]
    pub content: HasOne<super::content_record::Entity>,

    /// User-chosen name. The same content may be held under several names.
    pub filename: String,

    #[sea_orm(default_value = false)]
    pub is_public: bool,

    /// Best-effort counter, never decremented.
    #[sea_orm(default_value = 0)]
    pub download_count: i64,

    #[sea_orm(has_one)]
    pub share_link: HasOne<super::share_link::Entity>,

    pub uploaded_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
