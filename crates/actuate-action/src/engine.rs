//! Top-level entry point: one transaction per invocation.
//!
//! ```text
//! ActionEngine::invoke
//!   catalog lookup ── miss ──> UnknownAction
//!   store.begin
//!   OutcomeDispatcher::run
//!     Ok  ──> commit   (commit error -> Store failure, responses kept)
//!     Err ──> rollback
//! ```

use crate::config::ActuateConfig;
use crate::performers::{
    BecomeAdmin, LogMailer, Mailer, NoSystemControl, PasswordResetBegin, PasswordResetVerify,
    RandomGenerate, ResponseCreate, Restart, SiteStorageSync, StorageSync, SystemControl,
};
use crate::{
    ActionCatalog, ActionError, ActionFailure, ActionPerformer, ActionRequest, ActionResponse,
    OutcomeDispatcher, OwnerStamp, PerformerRegistry, ResetTokenIssuer, Store, SystemHandler,
    SystemRoutes, WorkQueue,
};
use actuate_auth::{Actor, PermissionPolicy, TieredPolicy};
use actuate_hook::{Interceptor, InterceptorChain, RowAccessGate, TableAccessGate};
use actuate_script::Resolver;
use actuate_types::GroupId;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Builder for [`ActionEngine`].
pub struct ActionEngineBuilder {
    catalog: ActionCatalog,
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
    config: ActuateConfig,
    performers: Vec<Arc<dyn ActionPerformer>>,
    interceptors: Vec<Arc<dyn Interceptor>>,
    routes: Vec<(String, Arc<dyn SystemHandler>)>,
    mailer: Arc<dyn Mailer>,
    control: Arc<dyn SystemControl>,
    storage: Option<Arc<dyn StorageSync>>,
}

impl ActionEngineBuilder {
    /// Replaces the default configuration.
    #[must_use]
    pub fn with_config(mut self, config: ActuateConfig) -> Self {
        self.config = config;
        self
    }

    /// Registers an extra performer. Replaces a built-in of the same name.
    #[must_use]
    pub fn with_performer(mut self, performer: Arc<dyn ActionPerformer>) -> Self {
        self.performers.push(performer);
        self
    }

    /// Registers an extra interceptor next to the access gates.
    #[must_use]
    pub fn with_interceptor(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    /// Adds or replaces a system dispatch entry.
    #[must_use]
    pub fn with_route(mut self, outcome_type: impl Into<String>, handler: Arc<dyn SystemHandler>) -> Self {
        self.routes.push((outcome_type.into(), handler));
        self
    }

    /// Sets the mail transport used by `password.reset.begin`.
    #[must_use]
    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    /// Sets the host hooks behind `__become_admin` and `__restart`.
    #[must_use]
    pub fn with_control(mut self, control: Arc<dyn SystemControl>) -> Self {
        self.control = control;
        self
    }

    /// Enables `site.storage.sync` with the given backend.
    #[must_use]
    pub fn with_storage_sync(mut self, storage: Arc<dyn StorageSync>) -> Self {
        self.storage = Some(storage);
        self
    }

    fn token_issuer(&self) -> ResetTokenIssuer {
        let settings = &self.config.password_reset;
        if settings.secret.is_empty() {
            warn!("no password reset secret configured; reset tokens will not survive a restart");
            let mut secret = [0u8; 32];
            rand::thread_rng().fill_bytes(&mut secret);
            ResetTokenIssuer::new(STANDARD.encode(secret), settings.token_ttl_minutes)
        } else {
            ResetTokenIssuer::new(settings.secret.as_bytes(), settings.token_ttl_minutes)
        }
    }

    /// Assembles the engine.
    #[must_use]
    pub fn build(self) -> ActionEngine {
        let admin_group = self.config.auth.admin_group.unwrap_or_else(|| {
            debug!("no admin group configured; only explicit administrators bypass checks");
            GroupId::new()
        });
        let policy: Arc<dyn PermissionPolicy> = Arc::new(TieredPolicy::new(admin_group));

        let mut chain = InterceptorChain::new();
        chain.register(Arc::new(TableAccessGate::new(Arc::clone(&policy))));
        chain.register(Arc::new(RowAccessGate::new(Arc::clone(&policy))));
        chain.register(Arc::new(OwnerStamp::new(self.config.auth.default_row_permission)));
        for interceptor in &self.interceptors {
            chain.register(Arc::clone(interceptor));
        }

        let issuer = self.token_issuer();
        let reset = &self.config.password_reset;
        let mut performers = PerformerRegistry::builder()
            .register(Arc::new(PasswordResetBegin::new(
                issuer.clone(),
                Arc::clone(&self.mailer),
                reset.sender.clone(),
                reset.subject.clone(),
            )))
            .register(Arc::new(PasswordResetVerify::new(issuer)))
            .register(Arc::new(RandomGenerate))
            .register(Arc::new(ResponseCreate))
            .register(Arc::new(BecomeAdmin::new(Arc::clone(&self.control))))
            .register(Arc::new(Restart::new(Arc::clone(&self.control))));
        if let Some(storage) = &self.storage {
            performers = performers.register(Arc::new(SiteStorageSync::new(Arc::clone(storage))));
        }
        for performer in &self.performers {
            performers = performers.register(Arc::clone(performer));
        }

        let mut routes = SystemRoutes::with_defaults(self.config.schema.upload_dir.clone());
        for (outcome_type, handler) in self.routes {
            routes.register(outcome_type, handler);
        }

        let dispatcher = OutcomeDispatcher::new(
            Resolver::new(self.config.script.limits()),
            chain,
            performers.build(),
            routes,
            policy,
        );
        info!(
            actions = self.catalog.len(),
            performers = dispatcher.performers().len(),
            interceptors = dispatcher.chain().len(),
            "action engine ready"
        );

        ActionEngine {
            catalog: self.catalog,
            store: self.store,
            queue: self.queue,
            dispatcher,
            config: self.config,
        }
    }
}

/// Runs catalog actions against a store, one transaction per invocation.
pub struct ActionEngine {
    catalog: ActionCatalog,
    store: Arc<dyn Store>,
    queue: Arc<dyn WorkQueue>,
    dispatcher: OutcomeDispatcher,
    config: ActuateConfig,
}

impl ActionEngine {
    /// Starts a builder with the built-in performers, gates and routes.
    #[must_use]
    pub fn builder(catalog: ActionCatalog, store: Arc<dyn Store>, queue: Arc<dyn WorkQueue>) -> ActionEngineBuilder {
        ActionEngineBuilder {
            catalog,
            store,
            queue,
            config: ActuateConfig::default(),
            performers: Vec::new(),
            interceptors: Vec::new(),
            routes: Vec::new(),
            mailer: Arc::new(LogMailer),
            control: Arc::new(NoSystemControl),
            storage: None,
        }
    }

    /// The loaded definitions.
    #[must_use]
    pub fn catalog(&self) -> &ActionCatalog {
        &self.catalog
    }

    /// The dispatcher every invocation runs through.
    #[must_use]
    pub fn dispatcher(&self) -> &OutcomeDispatcher {
        &self.dispatcher
    }

    /// Effective configuration.
    #[must_use]
    pub fn config(&self) -> &ActuateConfig {
        &self.config
    }

    /// Runs one action.
    ///
    /// Commits when every outcome succeeded and rolls back otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`ActionFailure`] carrying the responses produced before
    /// the failure. [`ActionError::UnknownAction`] when the catalog has no
    /// such action; [`ActionError::Store`] when the transaction cannot be
    /// opened or committed.
    pub fn invoke(&self, request: &ActionRequest, actor: &Actor) -> Result<Vec<ActionResponse>, ActionFailure> {
        let definition = self
            .catalog
            .get(&request.on_type, &request.action)
            .ok_or_else(|| {
                ActionFailure::bare(ActionError::UnknownAction {
                    on_type: request.on_type.clone(),
                    name: request.action.clone(),
                })
            })?;

        let mut tx = self.store.begin().map_err(ActionFailure::bare)?;
        match self
            .dispatcher
            .run(definition, request, actor, tx.as_mut(), self.queue.as_ref())
        {
            Ok(responses) => match tx.commit() {
                Ok(()) => Ok(responses),
                Err(err) => {
                    warn!(table = %request.on_type, action = %request.action, error = %err, "commit failed");
                    Err(ActionFailure {
                        error: err.into(),
                        responses,
                    })
                }
            },
            Err(failure) => {
                tx.rollback();
                debug!(
                    table = %request.on_type,
                    action = %request.action,
                    error = %failure.error,
                    "action rolled back"
                );
                Err(failure)
            }
        }
    }
}

impl fmt::Debug for ActionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionEngine")
            .field("actions", &self.catalog.len())
            .field("performers", &self.dispatcher.performers().names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{MockPerformer, RecordingQueue};
    use serde_json::json;

    fn engine(catalog: &str) -> ActionEngine {
        let catalog = ActionCatalog::from_json_str(catalog).expect("catalog");
        ActionEngine::builder(catalog, Arc::new(MemoryStore::new()), Arc::new(RecordingQueue::new()))
            .with_performer(Arc::new(MockPerformer::returning("random.generate", json!({"value": "fixed"}))))
            .build()
    }

    #[test]
    fn registers_builtins_and_gates() {
        let engine = engine("[]");
        let names = engine.dispatcher().performers().names();
        assert!(names.contains(&"password.reset.begin"));
        assert!(names.contains(&"__restart"));
        assert!(!names.contains(&"site.storage.sync"));
        assert_eq!(
            engine.dispatcher().chain().len(),
            3,
            "table gate, row gate and owner stamp"
        );
    }

    #[test]
    fn success_commits_and_failure_rolls_back() {
        use actuate_auth::{Capability, PermissionValue, ResourcePermission};
        use actuate_types::ReferenceId;

        let catalog = ActionCatalog::from_json_str(
            r#"[
                {"type": "note", "name": "add", "instance_optional": true,
                 "out_fields": [{"type": "note", "method": "POST", "attributes": {"title": "$attributes.title"}}]},
                {"type": "note", "name": "add_then_fail", "instance_optional": true,
                 "out_fields": [
                    {"type": "note", "method": "POST", "attributes": {"title": "doomed"}},
                    {"type": "missing.performer", "method": "EXECUTE"}
                 ]}
            ]"#,
        )
        .expect("catalog");
        let store = Arc::new(MemoryStore::new());
        let world = |c| ResourcePermission::new(None, PermissionValue::new(Capability::empty(), Capability::empty(), c));
        store.define_table("note", world(Capability::ALL));
        store.set_action_permission("note", "add", world(Capability::EXECUTE));
        store.set_action_permission("note", "add_then_fail", world(Capability::EXECUTE));

        let engine = ActionEngine::builder(catalog, store.clone(), Arc::new(RecordingQueue::new())).build();
        let author = Actor::user(ReferenceId::new());

        let request = ActionRequest::new("note", "add").with_attribute("title", json!("kept"));
        engine.invoke(&request, &author).expect("add");
        assert_eq!(store.version(), 1);
        let rows = store.rows("note");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["title"], json!("kept"));
        assert_eq!(rows[0]["owner_id"], json!(author.user_id().map(|id| id.to_string())));

        let failure = engine
            .invoke(&ActionRequest::new("note", "add_then_fail"), &author)
            .expect_err("unknown performer");
        assert_eq!(failure.responses.len(), 2);
        assert_eq!(store.version(), 1);
        assert_eq!(store.rows("note").len(), 1);
    }

    #[test]
    fn unknown_action_fails_without_responses() {
        let failure = engine("[]")
            .invoke(&ActionRequest::new("note", "nope"), &Actor::guest())
            .expect_err("unknown");
        assert!(matches!(failure.error, ActionError::UnknownAction { .. }));
        assert!(failure.responses.is_empty());
    }
}
