use std::sync::Arc;

use blob_core::{Context, VariantEngine};

use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub ctx: Context,
    pub variants: Arc<VariantEngine>,
    pub config: Arc<AppConfig>,
}
