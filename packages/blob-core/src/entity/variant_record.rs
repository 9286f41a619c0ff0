use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "variant_record")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[sea_orm(unique_key = "blob_variation")]
    pub blob_id: Uuid,

    #[sea_orm(belongs_to, from = "blob_id", to = "id")]
    pub blob: HasOne<super::blob::Entity>,

    /// Digest of the normalized transformation. At most one row exists per
    /// (blob_id, variation_digest); concurrent requests are single-flighted.
    #[sea_orm(unique_key = "blob_variation")]
    pub variation_digest: String,

    /// Backend key of the derived artifact (`variants/{blob_key}/{digest}`).
    pub key: String,

    pub byte_size: i64,

    pub content_type: String,

    pub created_at: DateTimeUtc,
}

impl ActiveModelBehavior for ActiveModel {}
