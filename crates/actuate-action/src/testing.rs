//! Test doubles for performers, queues and collaborators.
//!
//! Available under `cfg(test)` and the `test-utils` feature.

use crate::performers::{MailMessage, Mailer, StorageSync, SystemControl};
use crate::queue::run_job;
use crate::{
    ActionPerformer, ActionResponse, Job, JobHandle, JobStatus, Outcome, PerformerError,
    StepContext, StepOutput, Store, Transaction, WorkQueue,
};
use actuate_auth::{Actor, PermissionPolicy, TieredPolicy};
use actuate_hook::InterceptorChain;
use actuate_types::{GroupId, ReferenceId, Row, StoreError};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A [`TieredPolicy`] with a fresh, unused admin group.
pub fn tiered_policy() -> Arc<dyn PermissionPolicy> {
    Arc::new(TieredPolicy::new(GroupId::new()))
}

type PerformFn = dyn Fn(&Row) -> Result<StepOutput, PerformerError> + Send + Sync;

/// Configurable [`ActionPerformer`] that records the attributes it saw.
pub struct MockPerformer {
    name: String,
    perform: Box<PerformFn>,
    calls: Mutex<Vec<Row>>,
}

impl MockPerformer {
    /// Performer that runs `perform` on every call.
    pub fn new(
        name: &str,
        perform: impl Fn(&Row) -> Result<StepOutput, PerformerError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.to_string(),
            perform: Box::new(perform),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Performer that always returns `value` as its result.
    pub fn returning(name: &str, value: Value) -> Self {
        Self::new(name, move |_| Ok(StepOutput::result(value.clone())))
    }

    /// Performer that always answers with `response`.
    pub fn responding(name: &str, response: ActionResponse) -> Self {
        Self::new(name, move |_| Ok(StepOutput::respond(response.clone())))
    }

    /// Performer that always fails with `message`.
    pub fn failing(name: &str, message: &str) -> Self {
        let performer = name.to_string();
        let message = message.to_string();
        Self::new(name, move |_| Err(PerformerError::failed(performer.clone(), message.clone())))
    }

    /// Attributes of every call so far.
    pub fn calls(&self) -> Vec<Row> {
        self.calls.lock().clone()
    }
}

impl ActionPerformer for MockPerformer {
    fn name(&self) -> &str {
        &self.name
    }

    fn do_action(
        &self,
        _outcome: &Outcome,
        attributes: &Row,
        _step: &mut StepContext<'_>,
    ) -> Result<StepOutput, PerformerError> {
        self.calls.lock().push(attributes.clone());
        (self.perform)(attributes)
    }
}

/// [`WorkQueue`] that holds jobs until [`run_all`](Self::run_all).
#[derive(Default)]
pub struct RecordingQueue {
    jobs: Mutex<Vec<(String, Job, tokio::sync::oneshot::Sender<JobStatus>)>>,
    submitted: Mutex<Vec<String>>,
}

impl RecordingQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Names of every job submitted so far, in order.
    pub fn submitted(&self) -> Vec<String> {
        self.submitted.lock().clone()
    }

    /// Runs every pending job on the calling thread. Returns how many ran.
    pub fn run_all(&self) -> usize {
        let jobs: Vec<_> = self.jobs.lock().drain(..).collect();
        let count = jobs.len();
        for (name, job, done) in jobs {
            run_job(&name, job, done);
        }
        count
    }
}

impl WorkQueue for RecordingQueue {
    fn submit(&self, name: &str, job: Job) -> JobHandle {
        let (handle, done) = JobHandle::channel(name);
        self.submitted.lock().push(name.to_string());
        self.jobs.lock().push((name.to_string(), job, done));
        handle
    }
}

/// [`Mailer`] that keeps every message.
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<MailMessage>>,
    failure: Option<String>,
}

impl RecordingMailer {
    /// Mailer that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mailer that rejects everything with `reason`.
    pub fn failing(reason: &str) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            failure: Some(reason.to_string()),
        }
    }

    /// Messages accepted so far.
    pub fn sent(&self) -> Vec<MailMessage> {
        self.sent.lock().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, message: &MailMessage) -> Result<(), String> {
        if let Some(reason) = &self.failure {
            return Err(reason.clone());
        }
        self.sent.lock().push(message.clone());
        Ok(())
    }
}

/// [`SystemControl`] that counts restarts and records promotions.
#[derive(Default)]
pub struct RecordingControl {
    allow_promotion: bool,
    promoted: Mutex<Vec<ReferenceId>>,
    restarts: AtomicUsize,
}

impl RecordingControl {
    /// Control that refuses promotion.
    pub fn new() -> Self {
        Self::default()
    }

    /// Control that allows promotion.
    pub fn permissive() -> Self {
        Self {
            allow_promotion: true,
            ..Self::default()
        }
    }

    /// Users promoted so far.
    pub fn promoted(&self) -> Vec<ReferenceId> {
        self.promoted.lock().clone()
    }

    /// Restarts requested so far.
    pub fn restarts(&self) -> usize {
        self.restarts.load(Ordering::SeqCst)
    }
}

impl SystemControl for RecordingControl {
    fn can_become_admin(&self) -> bool {
        self.allow_promotion
    }

    fn become_admin(&self, user: ReferenceId) -> Result<bool, String> {
        if !self.allow_promotion {
            return Ok(false);
        }
        self.promoted.lock().push(user);
        Ok(true)
    }

    fn restart(&self) -> Result<(), String> {
        self.restarts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// [`StorageSync`] that records `(site_id, path)` pairs.
#[derive(Default)]
pub struct RecordingSync {
    synced: Mutex<Vec<(String, String)>>,
}

impl RecordingSync {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Syncs run so far.
    pub fn synced(&self) -> Vec<(String, String)> {
        self.synced.lock().clone()
    }
}

impl StorageSync for RecordingSync {
    fn sync(&self, site_id: &str, path: &str) -> Result<(), String> {
        self.synced.lock().push((site_id.to_string(), path.to_string()));
        Ok(())
    }
}

/// Owns everything a [`StepContext`] borrows.
///
/// ```ignore
/// let mut harness = StepHarness::new(&store)?;
/// performer.do_action(&outcome, &attributes, &mut harness.step())?;
/// ```
pub struct StepHarness {
    /// Open transaction on the store.
    pub tx: Box<dyn Transaction>,
    /// Invoking actor; a guest unless replaced.
    pub actor: Actor,
    /// Queue that holds submitted jobs.
    pub queue: RecordingQueue,
    /// Interceptor chain; empty unless replaced.
    pub chain: InterceptorChain,
}

impl StepHarness {
    /// Opens a transaction on `store`.
    pub fn new(store: &dyn Store) -> Result<Self, StoreError> {
        Ok(Self {
            tx: store.begin()?,
            actor: Actor::guest(),
            queue: RecordingQueue::new(),
            chain: InterceptorChain::new(),
        })
    }

    /// Replaces the actor.
    #[must_use]
    pub fn with_actor(mut self, actor: Actor) -> Self {
        self.actor = actor;
        self
    }

    /// Borrows a step context.
    pub fn step(&mut self) -> StepContext<'_> {
        StepContext {
            tx: self.tx.as_mut(),
            actor: &self.actor,
            queue: &self.queue,
            chain: &self.chain,
        }
    }
}
