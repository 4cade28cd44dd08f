//! Fire-and-forget background work.
//!
//! Performers hand long-running side effects (storage sync, restarts) to a
//! [`WorkQueue`] and return immediately. The dispatcher never awaits the
//! returned [`JobHandle`]; callers that care can keep it and
//! [`wait`](JobHandle::wait) later.

use parking_lot::Mutex;
use std::fmt;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// A unit of background work. `Err` carries a failure message.
pub type Job = Box<dyn FnOnce() -> Result<(), String> + Send + 'static>;

/// Final state of a job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// The job returned `Ok`.
    Completed,
    /// The job returned `Err`.
    Failed(String),
    /// The job was dropped before it ran.
    Abandoned,
}

/// Handle to a submitted job.
pub struct JobHandle {
    id: Uuid,
    name: String,
    status: oneshot::Receiver<JobStatus>,
}

impl JobHandle {
    /// Creates a handle and the sender that completes it.
    #[must_use]
    pub fn channel(name: impl Into<String>) -> (Self, oneshot::Sender<JobStatus>) {
        let (tx, rx) = oneshot::channel();
        let handle = Self {
            id: Uuid::new_v4(),
            name: name.into(),
            status: rx,
        };
        (handle, tx)
    }

    /// Job id.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Job name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the status if the job already finished.
    pub fn try_status(&mut self) -> Option<JobStatus> {
        match self.status.try_recv() {
            Ok(status) => Some(status),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(JobStatus::Abandoned),
        }
    }

    /// Waits for the job to finish.
    pub async fn wait(self) -> JobStatus {
        self.status.await.unwrap_or(JobStatus::Abandoned)
    }
}

impl fmt::Debug for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobHandle")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Accepts background jobs without blocking the caller.
pub trait WorkQueue: Send + Sync {
    /// Schedules `job`. Must not run it on the caller's thread.
    fn submit(&self, name: &str, job: Job) -> JobHandle;
}

/// Runs a job and reports its status.
pub(crate) fn run_job(name: &str, job: Job, done: oneshot::Sender<JobStatus>) {
    let status = match job() {
        Ok(()) => {
            info!(job = name, "job completed");
            JobStatus::Completed
        }
        Err(message) => {
            warn!(job = name, error = %message, "job failed");
            JobStatus::Failed(message)
        }
    };
    let _ = done.send(status);
}

/// [`WorkQueue`] backed by tokio's blocking pool.
pub struct TokioWorkQueue {
    runtime: Handle,
    outstanding: Mutex<Vec<JoinHandle<()>>>,
}

impl TokioWorkQueue {
    /// Creates a queue on the given runtime.
    #[must_use]
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            outstanding: Mutex::new(Vec::new()),
        }
    }

    /// Creates a queue on the runtime of the calling task.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    #[must_use]
    pub fn current() -> Self {
        Self::new(Handle::current())
    }

    /// Number of jobs submitted and not yet drained.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.outstanding.lock().len()
    }

    /// Waits for every submitted job. Used on shutdown.
    pub async fn drain(&self) {
        let handles = std::mem::take(&mut *self.outstanding.lock());
        debug!(jobs = handles.len(), "draining work queue");
        for handle in handles {
            if let Err(err) = handle.await {
                warn!(error = %err, "background job panicked");
            }
        }
    }
}

impl WorkQueue for TokioWorkQueue {
    fn submit(&self, name: &str, job: Job) -> JobHandle {
        let (handle, done) = JobHandle::channel(name);
        let job_name = name.to_string();
        let join = self.runtime.spawn_blocking(move || run_job(&job_name, job, done));
        let mut outstanding = self.outstanding.lock();
        outstanding.retain(|h| !h.is_finished());
        outstanding.push(join);
        info!(job = name, id = %handle.id(), "job queued");
        handle
    }
}

impl fmt::Debug for TokioWorkQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokioWorkQueue")
            .field("outstanding", &self.outstanding())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(flavor = "multi_thread")]
    async fn submitted_job_runs_and_reports() {
        let queue = TokioWorkQueue::current();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);

        let handle = queue.submit(
            "count",
            Box::new(move || {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }),
        );
        assert_eq!(handle.name(), "count");
        assert_eq!(handle.wait().await, JobStatus::Completed);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_is_reported() {
        let queue = TokioWorkQueue::current();
        let handle = queue.submit("broken", Box::new(|| Err("disk full".into())));
        assert_eq!(handle.wait().await, JobStatus::Failed("disk full".into()));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn drain_waits_for_all_jobs() {
        let queue = TokioWorkQueue::current();
        let counter = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let c = Arc::clone(&counter);
            drop(queue.submit(
                "sleep",
                Box::new(move || {
                    std::thread::sleep(std::time::Duration::from_millis(20));
                    c.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }),
            ));
        }
        queue.drain().await;
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn dropped_sender_is_abandoned() {
        let (mut handle, done) = JobHandle::channel("never");
        assert_eq!(handle.try_status(), None);
        drop(done);
        assert_eq!(handle.try_status(), Some(JobStatus::Abandoned));
    }
}
