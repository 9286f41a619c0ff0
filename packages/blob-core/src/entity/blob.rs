use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[sea_orm::model]
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "blob")]
pub struct Model {
    /// UUIDv7 primary key.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Opaque backend storage key. Unique within the service.
    #[sea_orm(unique)]
    pub key: String,

    /// Original upload filename.
    pub filename: String,

    /// MIME content type (sniffed or declared at creation).
    pub content_type: String,

    /// Size of the stored bytes. Immutable once set.
    pub byte_size: i64,

    /// SHA-256 content checksum (hex). Immutable once set.
    pub checksum: String,

    /// Name of the storage service holding the bytes.
    pub service_name: String,

    pub created_at: DateTimeUtc,

    #[sea_orm(has_many)]
    pub attachments: HasMany<super::attachment::Entity>,

    #[sea_orm(has_many)]
    pub variant_records: HasMany<super::variant_record::Entity>,
}

impl ActiveModelBehavior for ActiveModel {}
