//! Process-level performers: administrator promotion and restart.

use crate::{ActionPerformer, ActionResponse, Outcome, PerformerError, StepContext, StepOutput};
use actuate_types::{ReferenceId, Row};
use std::sync::Arc;
use tracing::{info, warn};

/// Host hooks for promoting users and restarting the service.
pub trait SystemControl: Send + Sync {
    /// Whether promotion is currently open (e.g. no administrator exists yet).
    fn can_become_admin(&self) -> bool;

    /// Promotes `user`. `Ok(false)` means the host refused.
    fn become_admin(&self, user: ReferenceId) -> Result<bool, String>;

    /// Restarts the service. Called from a background job.
    fn restart(&self) -> Result<(), String>;
}

/// [`SystemControl`] for hosts without process control. Refuses promotion;
/// restarts only log.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSystemControl;

impl SystemControl for NoSystemControl {
    fn can_become_admin(&self) -> bool {
        false
    }

    fn become_admin(&self, _user: ReferenceId) -> Result<bool, String> {
        Ok(false)
    }

    fn restart(&self) -> Result<(), String> {
        warn!("restart requested but no system control is configured");
        Ok(())
    }
}

fn queue_restart(step: &StepContext<'_>, control: &Arc<dyn SystemControl>) {
    let control = Arc::clone(control);
    let handle = step.queue.submit(Restart::NAME, Box::new(move || control.restart()));
    info!(job = %handle.id(), "restart queued");
}

/// `__become_admin`: promotes the invoking user, then restarts.
pub struct BecomeAdmin {
    control: Arc<dyn SystemControl>,
}

impl BecomeAdmin {
    /// Registry name.
    pub const NAME: &'static str = "__become_admin";
    /// Redirect delay while the service restarts.
    pub const REDIRECT_DELAY_MS: u64 = 15_000;

    /// Creates the performer.
    #[must_use]
    pub fn new(control: Arc<dyn SystemControl>) -> Self {
        Self { control }
    }

    fn unauthorized() -> StepOutput {
        StepOutput::respond(ActionResponse::notify("error", "Failed", "Unauthorized"))
    }
}

impl ActionPerformer for BecomeAdmin {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        _attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        let Some(user) = step.actor.user_id() else {
            return Ok(Self::unauthorized());
        };
        if !self.control.can_become_admin() {
            return Ok(Self::unauthorized());
        }
        let promoted = self
            .control
            .become_admin(user)
            .map_err(|reason| PerformerError::failed(Self::NAME, reason))?;
        if !promoted {
            return Ok(Self::unauthorized());
        }

        info!(user = %user, "user promoted to administrator");
        queue_restart(step, &self.control);
        Ok(StepOutput::respond(ActionResponse::redirect("/", "self", Self::REDIRECT_DELAY_MS)))
    }
}

/// `__restart`: queues a service restart.
pub struct Restart {
    control: Arc<dyn SystemControl>,
}

impl Restart {
    /// Registry name.
    pub const NAME: &'static str = "__restart";
    /// Redirect delay while the service restarts.
    pub const REDIRECT_DELAY_MS: u64 = 5_000;

    /// Creates the performer.
    #[must_use]
    pub fn new(control: Arc<dyn SystemControl>) -> Self {
        Self { control }
    }
}

impl ActionPerformer for Restart {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        _attributes: &Row,
        step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        queue_restart(step, &self.control);
        Ok(
            StepOutput::respond(ActionResponse::notify("success", "Success", "Initiating system update."))
                .and_respond(ActionResponse::redirect("/", "self", Self::REDIRECT_DELAY_MS)),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::testing::{RecordingControl, StepHarness};
    use crate::Method;
    use actuate_auth::Actor;
    use serde_json::json;

    fn run(
        performer: &dyn ActionPerformer,
        actor: Actor,
    ) -> (StepOutput, StepHarness) {
        let store = MemoryStore::new();
        let mut harness = StepHarness::new(&store).expect("harness").with_actor(actor);
        let out = performer
            .do_action(
                &Outcome::new(performer.name(), Method::Execute),
                &Row::new(),
                &mut harness.step(),
            )
            .expect("perform");
        (out, harness)
    }

    #[test]
    fn promotion_requires_user_and_permission() {
        let closed = Arc::new(RecordingControl::new());
        let (out, harness) = run(&BecomeAdmin::new(closed.clone()), Actor::user(ReferenceId::new()));
        assert_eq!(out.responses[0].attributes["message"], json!("Unauthorized"));
        assert!(harness.queue.submitted().is_empty());

        let open = Arc::new(RecordingControl::permissive());
        let (out, _) = run(&BecomeAdmin::new(open.clone()), Actor::guest());
        assert!(out.responses[0].is_notify("error"));
        assert!(open.promoted().is_empty());
    }

    #[test]
    fn promotion_redirects_and_queues_restart() {
        let control = Arc::new(RecordingControl::permissive());
        let user = ReferenceId::new();
        let (out, harness) = run(&BecomeAdmin::new(control.clone()), Actor::user(user));

        assert_eq!(control.promoted(), vec![user]);
        assert_eq!(out.responses[0].attributes["delay"], json!(15_000));
        assert_eq!(harness.queue.submitted(), vec![Restart::NAME]);
        assert_eq!(control.restarts(), 0);
        assert_eq!(harness.queue.run_all(), 1);
        assert_eq!(control.restarts(), 1);
    }

    #[test]
    fn restart_notifies_then_redirects() {
        let control = Arc::new(RecordingControl::new());
        let (out, harness) = run(&Restart::new(control), Actor::guest());
        assert!(out.responses[0].is_notify("success"));
        assert_eq!(out.responses[1].attributes["location"], json!("/"));
        assert_eq!(harness.queue.submitted().len(), 1);
    }
}
