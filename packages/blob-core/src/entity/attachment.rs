use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "attachment")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Logical attribute name on the owner (e.g. "avatar").
    #[sea_orm(unique_key = "owner_slot")]
    pub name: String,

    /// Owner entity kind, validated against the configured registry.
    #[sea_orm(unique_key = "owner_slot")]
    pub owner_kind: String,

    /// Owner entity ID (canonical string form).
    #[sea_orm(unique_key = "owner_slot")]
    pub owner_id: String,

    pub blob_id: Uuid,

    #[sea_orm(belongs_to, from = "blob_id", to = "id")]
    pub blob: HasOne<super::blob::Entity>,

    /// Ordering position for multi-valued attachments; 0 for single-valued.
    #[sea_orm(unique_key = "owner_slot")]
    pub position: i32,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
