//! In-memory stand-in for the remote advertising platform.
//!
//! Backs the test suite and the CLI rehearsal mode. Live traffic goes
//! through a transport-backed `AdsApi` implementation supplied by the
//! embedding service; this one keeps per-account state in DashMaps and
//! additionally records call counts, accepts scripted faults per operation,
//! and can simulate call latency.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thema_core::ads::{
    AdGroupLabelRecord, AdRecord, AdStatus, BatchOutcome, CampaignRecord, CreateAdOperation,
    LabelRecord, MutateOutcome,
};
use thema_core::{RemoteError, RemoteResult};

use crate::api::AdsApi;

/// Everything the sandbox knows about one account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    #[serde(default)]
    pub labels: Vec<LabelRecord>,
    #[serde(default)]
    pub ads: Vec<AdRecord>,
    #[serde(default)]
    pub campaigns: Vec<CampaignRecord>,
    #[serde(default)]
    pub ad_group_labels: Vec<AdGroupLabelRecord>,
    /// (ad resource, label resource) assignments.
    #[serde(default)]
    pub ad_labels: Vec<(String, String)>,
}

/// Serializable sandbox fixture: account id → state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxSeed {
    pub accounts: HashMap<String, AccountState>,
}

pub struct InMemoryAdsApi {
    accounts: DashMap<String, AccountState>,
    call_counts: DashMap<&'static str, u64>,
    faults: Mutex<HashMap<String, VecDeque<RemoteError>>>,
    latency: Duration,
    next_id: AtomicU64,
}

impl InMemoryAdsApi {
    pub fn new() -> Self {
        Self {
            accounts: DashMap::new(),
            call_counts: DashMap::new(),
            faults: Mutex::new(HashMap::new()),
            latency: Duration::ZERO,
            next_id: AtomicU64::new(1),
        }
    }

    /// Simulate per-call transport latency (applied on the blocking pool).
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn from_seed(seed: SandboxSeed) -> Self {
        let api = Self::new();
        for (account_id, state) in seed.accounts {
            api.accounts.insert(account_id, state);
        }
        api
    }

    pub fn seed_account(&self, account_id: &str, state: AccountState) {
        self.accounts.insert(account_id.to_string(), state);
    }

    /// Queue an error for the next call to `op`; faults drain in FIFO order.
    pub fn inject_fault(&self, op: &str, error: RemoteError) {
        self.faults
            .lock()
            .entry(op.to_string())
            .or_default()
            .push_back(error);
    }

    /// Number of calls made to `op` so far.
    pub fn calls(&self, op: &str) -> u64 {
        self.call_counts.get(op).map(|count| *count).unwrap_or(0)
    }

    /// Total calls across all operations.
    pub fn total_calls(&self) -> u64 {
        self.call_counts.iter().map(|entry| *entry.value()).sum()
    }

    /// Snapshot of an account's state, for assertions.
    pub fn account(&self, account_id: &str) -> Option<AccountState> {
        self.accounts.get(account_id).map(|s| s.clone())
    }

    fn observe(&self, op: &'static str) -> RemoteResult<()> {
        *self.call_counts.entry(op).or_insert(0) += 1;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }
        if let Some(fault) = self
            .faults
            .lock()
            .get_mut(op)
            .and_then(|queue| queue.pop_front())
        {
            return Err(fault);
        }
        Ok(())
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for InMemoryAdsApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AdsApi for InMemoryAdsApi {
    fn list_labels(&self, account_id: &str) -> RemoteResult<Vec<LabelRecord>> {
        self.observe("list_labels")?;
        Ok(self
            .accounts
            .get(account_id)
            .map(|s| s.labels.clone())
            .unwrap_or_default())
    }

    fn list_ads(&self, account_id: &str, ad_groups: &[String]) -> RemoteResult<Vec<AdRecord>> {
        self.observe("list_ads")?;
        Ok(self
            .accounts
            .get(account_id)
            .map(|s| {
                s.ads
                    .iter()
                    .filter(|ad| ad_groups.contains(&ad.ad_group))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    fn list_campaigns(&self, account_id: &str) -> RemoteResult<Vec<CampaignRecord>> {
        self.observe("list_campaigns")?;
        Ok(self
            .accounts
            .get(account_id)
            .map(|s| s.campaigns.clone())
            .unwrap_or_default())
    }

    fn list_ad_group_labels(&self, account_id: &str) -> RemoteResult<Vec<AdGroupLabelRecord>> {
        self.observe("list_ad_group_labels")?;
        Ok(self
            .accounts
            .get(account_id)
            .map(|s| s.ad_group_labels.clone())
            .unwrap_or_default())
    }

    fn create_ads(
        &self,
        account_id: &str,
        operations: &[CreateAdOperation],
    ) -> RemoteResult<BatchOutcome> {
        self.observe("create_ads")?;
        let mut state = self.accounts.entry(account_id.to_string()).or_default();
        let mut results = Vec::with_capacity(operations.len());

        for op in operations {
            let ad_group_id = op.ad_group.rsplit('/').next().unwrap_or(&op.ad_group);
            let resource_name = format!(
                "customers/{account_id}/adGroupAds/{ad_group_id}~{}",
                self.next_id()
            );
            state.ads.push(AdRecord {
                resource_name: resource_name.clone(),
                ad_group: op.ad_group.clone(),
                status: AdStatus::Enabled,
                headlines: op.headlines.clone(),
                descriptions: op.descriptions.clone(),
                final_urls: vec![op.final_url.clone()],
                path1: op.path1.clone(),
                path2: op.path2.clone(),
            });
            results.push(MutateOutcome::Created { resource_name });
        }

        Ok(BatchOutcome { results })
    }

    fn create_labels(&self, account_id: &str, names: &[String]) -> RemoteResult<BatchOutcome> {
        self.observe("create_labels")?;
        let mut state = self.accounts.entry(account_id.to_string()).or_default();
        let mut results = Vec::with_capacity(names.len());

        // Get-or-create per name: an existing name resolves to its resource.
        for name in names {
            let resource_name = match state.labels.iter().find(|l| &l.name == name) {
                Some(existing) => existing.resource_name.clone(),
                None => {
                    let resource_name =
                        format!("customers/{account_id}/labels/{}", self.next_id());
                    state.labels.push(LabelRecord {
                        resource_name: resource_name.clone(),
                        name: name.clone(),
                    });
                    resource_name
                }
            };
            results.push(MutateOutcome::Created { resource_name });
        }

        Ok(BatchOutcome { results })
    }

    fn attach_ad_labels(
        &self,
        account_id: &str,
        pairs: &[(String, String)],
    ) -> RemoteResult<BatchOutcome> {
        self.observe("attach_ad_labels")?;
        let mut state = self.accounts.entry(account_id.to_string()).or_default();
        let mut resources = Vec::with_capacity(pairs.len());
        for (ad, label) in pairs {
            state.ad_labels.push((ad.clone(), label.clone()));
            resources.push(format!("{ad}~{label}"));
        }
        Ok(BatchOutcome::created(resources))
    }

    fn attach_ad_group_labels(
        &self,
        account_id: &str,
        pairs: &[(String, String)],
    ) -> RemoteResult<BatchOutcome> {
        self.observe("attach_ad_group_labels")?;
        let mut state = self.accounts.entry(account_id.to_string()).or_default();
        let mut resources = Vec::with_capacity(pairs.len());
        for (ad_group, label) in pairs {
            state.ad_group_labels.push(AdGroupLabelRecord {
                ad_group: ad_group.clone(),
                label: label.clone(),
            });
            resources.push(format!("{ad_group}~{label}"));
        }
        Ok(BatchOutcome::created(resources))
    }
}
