//! Job persistence behind a trait.
//!
//! `MemoryJobStore` is the in-process implementation backed by DashMap;
//! production deployments put a relational store behind the same trait.

use dashmap::DashMap;
use thema_core::types::{ItemStatus, Job, JobItem, JobStatus};
use thema_core::{RefreshError, RefreshResult};
use tracing::warn;
use uuid::Uuid;

/// Record CRUD for jobs and their items.
///
/// `record_item_result` is the only write issued concurrently (one call per
/// item, items partitioned by account task), and implementations must apply
/// it serially per item so job counters always equal the per-state item
/// sums.
pub trait JobStore: Send + Sync + 'static {
    fn insert_job(&self, job: &Job, items: &[JobItem]) -> RefreshResult<()>;

    fn get_job(&self, job_id: Uuid) -> RefreshResult<Option<Job>>;

    /// Jobs ordered newest first.
    fn list_jobs(&self, limit: usize) -> RefreshResult<Vec<Job>>;

    /// Removes the job and all of its items. Returns `false` when unknown.
    fn delete_job(&self, job_id: Uuid) -> RefreshResult<bool>;

    /// Sets status and bookkeeping timestamps; `started_at` on first entry
    /// into running, `completed_at` on completed/failed.
    fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> RefreshResult<Job>;

    /// Items in creation order.
    fn items_for_job(&self, job_id: Uuid) -> RefreshResult<Vec<JobItem>>;

    /// Moves a pending item to its terminal per-attempt status and bumps the
    /// job counters in the same logical write.
    fn record_item_result(
        &self,
        item_id: Uuid,
        status: ItemStatus,
        new_ad_resource: Option<String>,
        campaign_id: Option<String>,
        message: Option<String>,
    ) -> RefreshResult<()>;

    /// Resets every failed item of the job back to pending (a resume
    /// re-attempt) and recomputes the job counters from item states.
    /// Returns the number of items reset.
    fn reset_failed_items(&self, job_id: Uuid) -> RefreshResult<usize>;
}

/// Thread-safe in-memory job store.
pub struct MemoryJobStore {
    jobs: DashMap<Uuid, Job>,
    items: DashMap<Uuid, JobItem>,
    /// job id → item ids in creation order
    job_items: DashMap<Uuid, Vec<Uuid>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            items: DashMap::new(),
            job_items: DashMap::new(),
        }
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl JobStore for MemoryJobStore {
    fn insert_job(&self, job: &Job, items: &[JobItem]) -> RefreshResult<()> {
        self.jobs.insert(job.id, job.clone());
        let mut order = Vec::with_capacity(items.len());
        for item in items {
            order.push(item.id);
            self.items.insert(item.id, item.clone());
        }
        self.job_items.insert(job.id, order);
        Ok(())
    }

    fn get_job(&self, job_id: Uuid) -> RefreshResult<Option<Job>> {
        Ok(self.jobs.get(&job_id).map(|j| j.clone()))
    }

    fn list_jobs(&self, limit: usize) -> RefreshResult<Vec<Job>> {
        let mut jobs: Vec<Job> = self.jobs.iter().map(|j| j.clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs.truncate(limit);
        Ok(jobs)
    }

    fn delete_job(&self, job_id: Uuid) -> RefreshResult<bool> {
        let removed = self.jobs.remove(&job_id).is_some();
        if let Some((_, order)) = self.job_items.remove(&job_id) {
            for item_id in order {
                self.items.remove(&item_id);
            }
        }
        Ok(removed)
    }

    fn set_job_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error_message: Option<String>,
    ) -> RefreshResult<Job> {
        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(RefreshError::JobNotFound(job_id))?;
        let job = entry.value_mut();
        let now = chrono::Utc::now();

        job.status = status;
        job.error_message = error_message;
        job.updated_at = now;
        match status {
            JobStatus::Running => {
                if job.started_at.is_none() {
                    job.started_at = Some(now);
                }
                job.completed_at = None;
            }
            JobStatus::Completed | JobStatus::Failed => job.completed_at = Some(now),
            _ => {}
        }

        Ok(job.clone())
    }

    fn items_for_job(&self, job_id: Uuid) -> RefreshResult<Vec<JobItem>> {
        let order = self
            .job_items
            .get(&job_id)
            .map(|o| o.clone())
            .unwrap_or_default();
        Ok(order
            .iter()
            .filter_map(|item_id| self.items.get(item_id).map(|i| i.clone()))
            .collect())
    }

    fn record_item_result(
        &self,
        item_id: Uuid,
        status: ItemStatus,
        new_ad_resource: Option<String>,
        campaign_id: Option<String>,
        message: Option<String>,
    ) -> RefreshResult<()> {
        let job_id = {
            let mut entry = self
                .items
                .get_mut(&item_id)
                .ok_or_else(|| RefreshError::Store(format!("unknown job item {item_id}")))?;
            let item = entry.value_mut();

            if item.status.is_terminal() {
                warn!(item_id = %item_id, status = ?item.status, "item already terminal, result dropped");
                return Ok(());
            }

            item.status = status;
            item.new_ad_resource = new_ad_resource;
            if campaign_id.is_some() && item.campaign_id.is_none() {
                item.campaign_id = campaign_id;
            }
            item.error_message = message;
            item.processed_at = Some(chrono::Utc::now());
            item.job_id
        };

        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(RefreshError::JobNotFound(job_id))?;
        let job = entry.value_mut();
        job.processed += 1;
        match status {
            ItemStatus::Success => job.successful += 1,
            ItemStatus::Failed => job.failed += 1,
            ItemStatus::Skipped => job.skipped += 1,
            ItemStatus::Pending => {}
        }
        job.updated_at = chrono::Utc::now();
        Ok(())
    }

    fn reset_failed_items(&self, job_id: Uuid) -> RefreshResult<usize> {
        let order = self
            .job_items
            .get(&job_id)
            .map(|o| o.clone())
            .unwrap_or_default();

        let mut reset = 0;
        let mut successful = 0u64;
        let mut skipped = 0u64;
        for item_id in &order {
            if let Some(mut entry) = self.items.get_mut(item_id) {
                let item = entry.value_mut();
                match item.status {
                    ItemStatus::Failed => {
                        item.status = ItemStatus::Pending;
                        item.error_message = None;
                        item.new_ad_resource = None;
                        item.processed_at = None;
                        reset += 1;
                    }
                    ItemStatus::Success => successful += 1,
                    ItemStatus::Skipped => skipped += 1,
                    ItemStatus::Pending => {}
                }
            }
        }

        let mut entry = self
            .jobs
            .get_mut(&job_id)
            .ok_or(RefreshError::JobNotFound(job_id))?;
        let job = entry.value_mut();
        job.successful = successful;
        job.skipped = skipped;
        job.failed = 0;
        job.processed = successful + skipped;
        job.updated_at = chrono::Utc::now();

        Ok(reset)
    }
}
