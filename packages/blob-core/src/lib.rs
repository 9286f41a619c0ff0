pub mod attachments;
pub mod blobs;
pub mod context;
pub mod database;
pub mod entity;
pub mod error;
pub mod sniff;
pub mod variants;

pub use context::Context;
pub use error::CoreError;
pub use variants::{Transformation, VariantEngine, representable};
