use super::{optional_text, required_text};
use crate::{ActionPerformer, ActionResponse, Outcome, PerformerError, StepContext, StepOutput};
use actuate_types::Row;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Copies a site's files to or from its cloud store.
pub trait StorageSync: Send + Sync {
    /// Synchronises `path` of `site_id`. Runs on the work queue.
    fn sync(&self, site_id: &str, path: &str) -> Result<(), String>;
}

/// `site.storage.sync`: queues a storage sync for `site_id` and
/// returns immediately.
pub struct SiteStorageSync {
    backend: Arc<dyn StorageSync>,
}

impl SiteStorageSync {
    /// Registry name.
    pub const NAME: &'static str = "site.storage.sync";

    /// Creates the performer.
    #[must_use]
    pub fn new(backend: Arc<dyn StorageSync>) -> Self {
        Self { backend }
    }
}

impl ActionPerformer for SiteStorageSync {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let site_id = required_text(attributes, "site_id")?;
        let path = optional_text(attributes, "path").unwrap_or_else(|| "/".to_string());

        let backend = Arc::clone(&self.backend);
        let (job_site, job_path) = (site_id.clone(), path.clone());
        let handle = step.queue.submit(
            Self::NAME,
            Box::new(move || backend.sync(&job_site, &job_path)),
        );
        info!(site = %site_id, path = %path, job = %handle.id(), "storage sync queued");

        Ok(StepOutput::result(json!({"site_id": site_id, "path": path, "job": handle.id().to_string()}))
            .and_respond(ActionResponse::notify("success", "Success", "Sync queued")))
    }
}
