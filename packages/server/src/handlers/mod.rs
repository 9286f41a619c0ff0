pub mod attachments;
pub mod blobs;
pub mod direct_uploads;
pub mod disk;
pub mod representations;
