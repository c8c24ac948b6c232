use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

pub const ROLE_USER: &str = "user";
pub const ROLE_ADMIN: &str = "admin";

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "vault_user")]
pub struct Model {
    /// External identity, taken from the verified token subject.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// One of: user, admin
    pub role: String,

    /// Quota in bytes.
    pub storage_quota: i64,

    /// Legacy running counter. Authoritative usage is computed from the ledgers.
    pub storage_used: i64,

    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

impl Model {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }
}

impl ActiveModelBehavior for ActiveModel {}
