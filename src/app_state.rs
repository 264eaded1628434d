use std::sync::Arc;

use crate::attachment::AttachmentStorage;
use crate::config::Config;
use crate::store::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub attachments: AttachmentStorage,
    pub config: Config,
}
