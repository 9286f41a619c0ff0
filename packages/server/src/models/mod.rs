pub mod attachment;
pub mod blob;
pub mod direct_upload;
pub mod representation;
