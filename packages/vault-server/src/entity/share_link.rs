use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "share_link")]
pub struct Model {
    /// Short alphanumeric identifier used in `/share/{id}`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// At most one link per ownership record.
    #[sea_orm(unique)]
    pub ownership_id: Uuid,
    #[sea_orm(
        belongs_to,
        from = "ownership_id",
        to = "id",
        on_delete = "Cascade"
    )]
    pub ownership: HasOne<super::ownership_record::Entity>,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
