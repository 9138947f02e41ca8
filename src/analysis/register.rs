//! Job register: in-memory job store, the only authority over ids and transitions.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::RwLock;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

use super::model::{AnalysisKind, Job, JobId, JobState};
use crate::error::JobError;

struct Entry {
    job: Job,
    /// Set while the job's worker may still be running.
    worker: Option<AbortHandle>,
}

/// Process-wide job store. Shared as `Arc<JobRegister>`; callers only ever
/// get cloned snapshots back.
pub struct JobRegister {
    jobs: RwLock<HashMap<JobId, Entry>>,
    retention: TimeDelta,
}

impl JobRegister {
    /// Create a register that evicts entries idle for longer than `retention`.
    pub fn new(retention: Duration) -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            retention: TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX),
        })
    }

    /// Register a new pending job and return its id.
    pub async fn create_job(&self, kind: AnalysisKind) -> JobId {
        let mut jobs = self.jobs.write().await;
        let mut id = JobId::generate();
        while jobs.contains_key(&id) {
            id = JobId::generate();
        }

        jobs.insert(
            id.clone(),
            Entry {
                job: Job::new(id.clone(), kind),
                worker: None,
            },
        );

        debug!(job_id = %id, kind = %kind, "Job created");
        id
    }

    /// Keep the worker's abort handle so eviction can stop it.
    /// Ignored when the job already finished or is gone.
    pub async fn attach_worker(&self, id: &JobId, handle: AbortHandle) {
        let mut jobs = self.jobs.write().await;
        if let Some(entry) = jobs.get_mut(id) {
            if !entry.job.state.is_terminal() {
                entry.worker = Some(handle);
            }
        }
    }

    /// Write the terminal state for a job. Only the job's worker calls this.
    pub async fn record_result(&self, id: &JobId, state: JobState) -> Result<(), JobError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs
            .get_mut(id)
            .ok_or_else(|| JobError::NotFound { id: id.clone() })?;

        if entry.job.state.is_terminal() || !state.is_terminal() {
            warn!(
                job_id = %id,
                current = %entry.job.status(),
                target = %state.status(),
                "Rejected job transition"
            );
            return Err(JobError::InvalidTransition {
                id: id.clone(),
                state: entry.job.status().to_string(),
                target: state.status().to_string(),
            });
        }

        let status = state.status();
        entry.job.state = state;
        entry.job.updated_at = Utc::now();
        entry.worker = None;

        info!(job_id = %id, kind = %entry.job.kind, status = %status, "Job resolved");
        Ok(())
    }

    /// Point-in-time snapshot of a job.
    pub async fn get_job(&self, id: &JobId) -> Result<Job, JobError> {
        self.jobs
            .read()
            .await
            .get(id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| JobError::NotFound { id: id.clone() })
    }

    /// Evict entries not updated within the retention window as of `now`.
    /// Pending entries have their worker aborted first. Returns the count evicted.
    pub async fn sweep(&self, now: DateTime<Utc>) -> usize {
        let Some(cutoff) = now.checked_sub_signed(self.retention) else {
            return 0;
        };

        let mut jobs = self.jobs.write().await;
        let before = jobs.len();

        jobs.retain(|id, entry| {
            if entry.job.updated_at >= cutoff {
                return true;
            }
            if let Some(worker) = entry.worker.take() {
                warn!(job_id = %id, "Aborting worker of expired pending job");
                worker.abort();
            }
            debug!(job_id = %id, status = %entry.job.status(), "Job evicted");
            false
        });

        let evicted = before - jobs.len();
        if evicted > 0 {
            info!(count = evicted, remaining = jobs.len(), "Evicted expired jobs");
        }
        evicted
    }

    /// Total tracked jobs (all statuses).
    pub async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.jobs.read().await.is_empty()
    }

    /// Jobs still waiting on their worker.
    pub async fn pending_count(&self) -> usize {
        self.jobs
            .read()
            .await
            .values()
            .filter(|e| !e.job.state.is_terminal())
            .count()
    }
}

/// Spawn a background task that periodically evicts expired jobs.
pub fn spawn_sweep_task(register: Arc<JobRegister>, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        loop {
            interval.tick().await;
            register.sweep(Utc::now()).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::model::{AnalysisResult, CommentedCode, JobStatus};

    fn register() -> Arc<JobRegister> {
        JobRegister::new(Duration::from_secs(60 * 60))
    }

    fn commented() -> JobState {
        JobState::Complete(AnalysisResult::Comments(CommentedCode {
            commented_code: "// hi".into(),
        }))
    }

    #[tokio::test]
    async fn created_job_is_pending() {
        let register = register();
        let id = register.create_job(AnalysisKind::Review).await;

        let job = register.get_job(&id).await.unwrap();
        assert_eq!(job.status(), JobStatus::Pending);
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.kind, AnalysisKind::Review);
        assert_eq!(register.len().await, 1);
        assert_eq!(register.pending_count().await, 1);
    }

    #[tokio::test]
    async fn unknown_id_is_not_found() {
        let register = register();
        register.create_job(AnalysisKind::Review).await;

        let missing = JobId::from("0123456789abcdef0123456789abcdef");
        assert!(matches!(
            register.get_job(&missing).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(matches!(
            register.record_result(&missing, commented()).await,
            Err(JobError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn only_first_terminal_write_wins() {
        let register = register();
        let id = register.create_job(AnalysisKind::Comments).await;

        register.record_result(&id, commented()).await.unwrap();
        let second = register
            .record_result(&id, JobState::Error { message: "late".into() })
            .await;
        assert!(matches!(second, Err(JobError::InvalidTransition { .. })));

        let job = register.get_job(&id).await.unwrap();
        assert_eq!(job.state, commented());
        assert_eq!(register.pending_count().await, 0);
    }

    #[tokio::test]
    async fn cannot_record_pending() {
        let register = register();
        let id = register.create_job(AnalysisKind::Bugs).await;
        assert!(matches!(
            register.record_result(&id, JobState::Pending).await,
            Err(JobError::InvalidTransition { .. })
        ));
    }

    #[tokio::test]
    async fn polling_has_no_side_effects() {
        let register = register();
        let id = register.create_job(AnalysisKind::Review).await;
        register
            .record_result(&id, JobState::Error { message: "failed".into() })
            .await
            .unwrap();

        let first = register.get_job(&id).await.unwrap();
        for _ in 0..10 {
            assert_eq!(register.get_job(&id).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn ids_are_unique() {
        let register = register();
        let mut ids = std::collections::HashSet::new();
        for _ in 0..100 {
            assert!(ids.insert(register.create_job(AnalysisKind::Review).await));
        }
    }

    #[tokio::test]
    async fn sweep_keeps_fresh_and_evicts_old() {
        let register = register();
        let id = register.create_job(AnalysisKind::Review).await;
        register.record_result(&id, commented()).await.unwrap();

        assert_eq!(register.sweep(Utc::now()).await, 0);
        assert!(register.get_job(&id).await.is_ok());

        let later = Utc::now() + TimeDelta::hours(2);
        assert_eq!(register.sweep(later).await, 1);
        assert!(matches!(
            register.get_job(&id).await,
            Err(JobError::NotFound { .. })
        ));
        assert!(register.is_empty().await);
    }

    #[tokio::test]
    async fn sweep_aborts_stale_worker() {
        let register = register();
        let id = register.create_job(AnalysisKind::Review).await;

        let worker = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        register.attach_worker(&id, worker.abort_handle()).await;

        let later = Utc::now() + TimeDelta::hours(2);
        assert_eq!(register.sweep(later).await, 1);

        let err = worker.await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[tokio::test]
    async fn attach_after_resolution_is_ignored() {
        let register = register();
        let id = register.create_job(AnalysisKind::Comments).await;
        register.record_result(&id, commented()).await.unwrap();

        let worker = tokio::spawn(async {});
        register.attach_worker(&id, worker.abort_handle()).await;
        worker.await.unwrap();

        // Eviction of a resolved job never touches a worker.
        assert_eq!(register.sweep(Utc::now() + TimeDelta::hours(2)).await, 1);
    }
}
