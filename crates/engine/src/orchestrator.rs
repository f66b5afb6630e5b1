//! Job orchestration: partitions a job's targets by account, runs account
//! passes under a bounded concurrency limiter, persists every per-target
//! outcome as it lands, and supports pause/resume across process restarts.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thema_core::config::AppConfig;
use thema_core::types::{
    AdGroupTarget, ItemStatus, Job, JobItem, JobStatus, ProcessingResult, TargetOutcome,
};
use thema_core::{RefreshError, RefreshResult};
use thema_remote::{AdsApi, RemoteExecutor};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::content::ContentGenerator;
use crate::dispatcher::AccountDispatcher;
use crate::report;
use crate::store::JobStore;

pub struct JobOrchestrator {
    store: Arc<dyn JobStore>,
    dispatcher: AccountDispatcher,
    config: Arc<AppConfig>,
    /// Pause flags of the passes currently running in this process.
    active: DashMap<Uuid, Arc<AtomicBool>>,
}

impl JobOrchestrator {
    /// The remote client is owned here and handed down to every account
    /// pass, so tests and rehearsal runs inject their own implementation.
    pub fn new(
        store: Arc<dyn JobStore>,
        api: Arc<dyn AdsApi>,
        generator: Arc<dyn ContentGenerator>,
        config: AppConfig,
    ) -> Self {
        let config = Arc::new(config);
        let remote = RemoteExecutor::new(api, config.retry.clone());
        let dispatcher = AccountDispatcher::new(remote, generator, config.clone());
        Self {
            store,
            dispatcher,
            config,
            active: DashMap::new(),
        }
    }

    /// Persist a new job with one pending item per target.
    pub fn create_job(
        &self,
        targets: &[AdGroupTarget],
        input_source: Option<String>,
    ) -> RefreshResult<Job> {
        if targets.is_empty() {
            return Err(RefreshError::Validation(
                "job has no targets".to_string(),
            ));
        }

        let job = Job::new(targets.len() as u64, input_source);
        let items: Vec<JobItem> = targets
            .iter()
            .map(|target| JobItem::new(job.id, target))
            .collect();
        self.store.insert_job(&job, &items)?;

        metrics::counter!("jobs.created").increment(1);
        info!(job_id = %job.id, targets = targets.len(), "job created");
        Ok(job)
    }

    /// Run one processing pass over every item not yet successfully
    /// processed. Re-invocation after a pause, failure or crash re-attempts
    /// pending and failed items only; success and skipped items are never
    /// touched again.
    pub async fn process_job(&self, job_id: Uuid) -> RefreshResult<Job> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))?;

        if self.active.contains_key(&job_id) {
            return Err(RefreshError::Validation(format!(
                "job {job_id} is already being processed"
            )));
        }
        if job.status == JobStatus::Running {
            // Left running by a pass that never settled (crash); re-enter.
            warn!(job_id = %job_id, "job was left running, re-entering");
        } else if !job.status.can_transition(JobStatus::Running) {
            return Err(RefreshError::InvalidTransition {
                from: job.status,
                to: JobStatus::Running,
            });
        }

        self.store.reset_failed_items(job_id)?;
        self.store.set_job_status(job_id, JobStatus::Running, None)?;

        let pause = Arc::new(AtomicBool::new(false));
        self.active.insert(job_id, pause.clone());
        let outcome = self.run_pass(job_id, pause).await;
        self.active.remove(&job_id);
        outcome
    }

    async fn run_pass(&self, job_id: Uuid, pause: Arc<AtomicBool>) -> RefreshResult<Job> {
        let items = self.store.items_for_job(job_id)?;
        let runnable: Vec<JobItem> = items
            .into_iter()
            .filter(|item| item.status == ItemStatus::Pending)
            .collect();

        // Partition by account, preserving first-seen account order.
        let mut account_order: Vec<String> = Vec::new();
        let mut groups: HashMap<String, Vec<JobItem>> = HashMap::new();
        for item in runnable {
            if !groups.contains_key(&item.account_id) {
                account_order.push(item.account_id.clone());
            }
            groups.entry(item.account_id.clone()).or_default().push(item);
        }

        info!(
            job_id = %job_id,
            accounts = account_order.len(),
            max_concurrent = self.config.performance.max_concurrent_accounts,
            "dispatching account passes"
        );

        let semaphore = Arc::new(Semaphore::new(
            self.config.performance.max_concurrent_accounts.max(1),
        ));
        let mut join_set: JoinSet<usize> = JoinSet::new();
        let mut paused = false;

        for account_id in account_order {
            if pause.load(Ordering::SeqCst) {
                paused = true;
                break;
            }
            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };
            // The flag may have been raised while waiting for a permit.
            if pause.load(Ordering::SeqCst) {
                paused = true;
                break;
            }

            let account_items = groups.remove(&account_id).unwrap_or_default();
            let dispatcher = self.dispatcher.clone();
            let store = Arc::clone(&self.store);
            join_set.spawn(async move {
                let targets: Vec<AdGroupTarget> =
                    account_items.iter().map(|item| item.target()).collect();
                let results = dispatcher.process_account(&account_id, &targets).await;
                let store_errors = record_results(store.as_ref(), &account_items, results);
                drop(permit);
                store_errors
            });
        }

        let mut store_errors = 0usize;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(errors) => store_errors += errors,
                Err(e) => {
                    error!(job_id = %job_id, error = %e, "account task aborted");
                    store_errors += 1;
                }
            }
        }

        let job = self
            .store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))?;

        let final_job = if store_errors > 0 {
            self.store.set_job_status(
                job_id,
                JobStatus::Failed,
                Some(format!("{store_errors} results could not be recorded")),
            )?
        } else if paused {
            info!(job_id = %job_id, processed = job.processed, total = job.total, "job paused");
            self.store.set_job_status(job_id, JobStatus::Paused, None)?
        } else if job.processed == job.total {
            metrics::counter!("jobs.completed").increment(1);
            info!(
                job_id = %job_id,
                successful = job.successful,
                failed = job.failed,
                skipped = job.skipped,
                "job completed"
            );
            self.store.set_job_status(job_id, JobStatus::Completed, None)?
        } else {
            self.store.set_job_status(
                job_id,
                JobStatus::Failed,
                Some("items left unprocessed after pass".to_string()),
            )?
        };

        Ok(final_job)
    }

    /// Stop dispatching new accounts; in-flight account passes finish so no
    /// account is left with ads created but unlabeled. The job's status
    /// flips to `paused` once those passes have settled.
    pub fn pause_job(&self, job_id: Uuid) -> RefreshResult<Job> {
        let Some(flag) = self.active.get(&job_id) else {
            return Err(RefreshError::Validation(format!(
                "job {job_id} is not running"
            )));
        };
        flag.store(true, Ordering::SeqCst);
        info!(job_id = %job_id, "pause requested");

        self.store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))
    }

    /// Re-enter processing for a paused or failed job, restricted to items
    /// not yet successfully processed.
    pub async fn resume_job(&self, job_id: Uuid) -> RefreshResult<Job> {
        self.process_job(job_id).await
    }

    /// Snapshot read; never blocks on in-progress work.
    pub fn get_job_status(&self, job_id: Uuid) -> RefreshResult<Job> {
        self.store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))
    }

    pub fn list_jobs(&self, limit: usize) -> RefreshResult<Vec<Job>> {
        self.store.list_jobs(limit)
    }

    /// All items of a job in creation order.
    pub fn list_job_items(&self, job_id: Uuid) -> RefreshResult<Vec<JobItem>> {
        self.store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))?;
        self.store.items_for_job(job_id)
    }

    /// Delete the job and its items. Refused while the job is running.
    pub fn delete_job(&self, job_id: Uuid) -> RefreshResult<()> {
        let job = self
            .store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))?;
        if job.status == JobStatus::Running || self.active.contains_key(&job_id) {
            return Err(RefreshError::Validation(format!(
                "job {job_id} is running and cannot be deleted"
            )));
        }
        self.store.delete_job(job_id)?;
        info!(job_id = %job_id, "job deleted");
        Ok(())
    }

    /// CSV report of every failed and skipped item with its reason.
    pub fn failure_report(&self, job_id: Uuid) -> RefreshResult<String> {
        self.store
            .get_job(job_id)?
            .ok_or(RefreshError::JobNotFound(job_id))?;
        let items = self.store.items_for_job(job_id)?;
        Ok(report::render(&items))
    }
}

/// Persist one account's results, one serialized write per item. Returns
/// the number of results that could not be recorded.
fn record_results(
    store: &dyn JobStore,
    items: &[JobItem],
    results: Vec<ProcessingResult>,
) -> usize {
    let mut store_errors = 0;
    for (item, result) in items.iter().zip(results) {
        let (status, new_ad_resource, message) = match result.outcome {
            TargetOutcome::Success { new_ad_resource } => {
                (ItemStatus::Success, new_ad_resource, None)
            }
            TargetOutcome::Skipped { reason } => {
                (ItemStatus::Skipped, None, Some(reason.to_string()))
            }
            TargetOutcome::Failed { error } => (ItemStatus::Failed, None, Some(error)),
        };
        metrics::counter!("items.processed", "status" => status.as_str()).increment(1);

        if let Err(e) = store.record_item_result(
            item.id,
            status,
            new_ad_resource,
            result.campaign_id,
            message,
        ) {
            error!(item_id = %item.id, error = %e, "failed to persist item result");
            store_errors += 1;
        }
    }
    store_errors
}
