//! Idempotent label bookkeeping: ensure names exist, attach in batches.
//!
//! Attachment failures are logged and counted, never propagated. The
//! primary ad was already created by the time labels are applied, so a
//! failed label must not flip the target's outcome.

use std::collections::HashMap;

use thema_core::ads::MutateOutcome;
use thema_core::RemoteResult;
use thema_remote::RemoteExecutor;
use tracing::{debug, info, warn};

#[derive(Clone)]
pub struct LabelRegistry {
    remote: RemoteExecutor,
}

impl LabelRegistry {
    pub fn new(remote: RemoteExecutor) -> Self {
        Self { remote }
    }

    /// Ensure every name in `names` resolves to a label resource, creating
    /// only the subset missing from `known` in one batched mutation.
    ///
    /// Names already present in `known` are never re-created. The remote
    /// create is get-or-create by name, so a concurrent first use of the
    /// same name elsewhere resolves to one shared label instead of a
    /// duplicate.
    pub async fn ensure_labels_exist(
        &self,
        account_id: &str,
        names: &[String],
        known: &HashMap<String, String>,
    ) -> RemoteResult<HashMap<String, String>> {
        let mut map = known.clone();
        let missing: Vec<String> = names
            .iter()
            .filter(|name| !map.contains_key(*name))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(map);
        }

        let account = account_id.to_string();
        let batch = missing.clone();
        let outcome = self
            .remote
            .run("create_labels", move |api| {
                api.create_labels(&account, &batch)
            })
            .await?;

        let mut created = 0;
        for (name, result) in missing.iter().zip(outcome.results) {
            match result {
                MutateOutcome::Created { resource_name } => {
                    map.insert(name.clone(), resource_name);
                    created += 1;
                }
                MutateOutcome::Failed { error } => {
                    warn!(account_id, name, error, "label creation failed");
                }
            }
        }

        info!(account_id, created, "ensured labels exist");
        Ok(map)
    }

    /// Attach `(ad resource, label resource)` pairs in one mutation.
    /// Returns the number of assignments actually applied.
    pub async fn label_ads_batch(&self, account_id: &str, pairs: Vec<(String, String)>) -> usize {
        self.attach("attach_ad_labels", account_id, pairs, |api, account, pairs| {
            api.attach_ad_labels(account, pairs)
        })
        .await
    }

    /// Attach `(ad group resource, label resource)` pairs in one mutation.
    /// Returns the number of assignments actually applied.
    pub async fn label_ad_groups_batch(
        &self,
        account_id: &str,
        pairs: Vec<(String, String)>,
    ) -> usize {
        self.attach(
            "attach_ad_group_labels",
            account_id,
            pairs,
            |api, account, pairs| api.attach_ad_group_labels(account, pairs),
        )
        .await
    }

    async fn attach<F>(
        &self,
        op: &'static str,
        account_id: &str,
        pairs: Vec<(String, String)>,
        call: F,
    ) -> usize
    where
        F: Fn(
                &dyn thema_remote::AdsApi,
                &str,
                &[(String, String)],
            ) -> RemoteResult<thema_core::ads::BatchOutcome>
            + Send
            + Sync
            + 'static,
    {
        if pairs.is_empty() {
            return 0;
        }
        let submitted = pairs.len();
        let account = account_id.to_string();

        match self
            .remote
            .run(op, move |api| call(api, &account, &pairs))
            .await
        {
            Ok(outcome) => {
                let applied = outcome.applied_count();
                if applied < submitted {
                    warn!(account_id, op, submitted, applied, "some label assignments failed");
                } else {
                    debug!(account_id, op, applied, "labels attached");
                }
                applied
            }
            Err(e) => {
                warn!(account_id, op, submitted, error = %e, "label batch failed");
                0
            }
        }
    }
}
