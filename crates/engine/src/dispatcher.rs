//! Per-account processing pass: prefetch → ensure labels → build → batched
//! mutate → label. Strictly sequential within the account so the snapshot
//! and label map stay coherent; accounts run concurrently above this layer.

use std::sync::Arc;

use thema_core::ads::MutateOutcome;
use thema_core::config::AppConfig;
use thema_core::types::{AdGroupTarget, ProcessingResult, SkipReason};
use thema_core::RemoteResult;
use thema_remote::RemoteExecutor;
use tracing::{debug, error, info};

use crate::builder::build_refresh_ad;
use crate::content::ContentGenerator;
use crate::labels::LabelRegistry;
use crate::prefetch::prefetch_account_data;

/// Where each target landed relative to the submitted operation batch.
enum Slot {
    /// Index into the submitted operations.
    Built(usize),
    Skipped(SkipReason),
}

#[derive(Clone)]
pub struct AccountDispatcher {
    remote: RemoteExecutor,
    registry: LabelRegistry,
    generator: Arc<dyn ContentGenerator>,
    config: Arc<AppConfig>,
}

impl AccountDispatcher {
    pub fn new(
        remote: RemoteExecutor,
        generator: Arc<dyn ContentGenerator>,
        config: Arc<AppConfig>,
    ) -> Self {
        let registry = LabelRegistry::new(remote.clone());
        Self {
            remote,
            registry,
            generator,
            config,
        }
    }

    /// Process every target of one account, returning one result per target
    /// in input order. Never returns an error: an account-wide precondition
    /// failure (prefetch or label-ensure) marks every target failed with
    /// that error instead.
    pub async fn process_account(
        &self,
        account_id: &str,
        targets: &[AdGroupTarget],
    ) -> Vec<ProcessingResult> {
        match self.refresh_account(account_id, targets).await {
            Ok(results) => results,
            Err(e) => {
                error!(account_id, error = %e, "account pass failed");
                metrics::counter!("accounts.failed").increment(1);
                targets
                    .iter()
                    .map(|t| ProcessingResult::failed(account_id, &t.ad_group_id, e.to_string()))
                    .collect()
            }
        }
    }

    async fn refresh_account(
        &self,
        account_id: &str,
        targets: &[AdGroupTarget],
    ) -> RemoteResult<Vec<ProcessingResult>> {
        info!(account_id, targets = targets.len(), "processing account");

        let ad_group_resources: Vec<String> = targets
            .iter()
            .map(|t| thema_core::ads::ad_group_resource(account_id, &t.ad_group_id))
            .collect();

        let mut cached = prefetch_account_data(
            &self.remote,
            account_id,
            &ad_group_resources,
            &self.config.labels.done_label,
        )
        .await?;

        let required = self.config.labels.required_names(&self.config.theme);
        cached.labels = self
            .registry
            .ensure_labels_exist(account_id, &required, &cached.labels)
            .await?;

        // Build all operations in memory; no remote calls in this loop.
        let mut slots: Vec<Slot> = Vec::with_capacity(targets.len());
        let mut operations = Vec::new();
        let mut superseded = Vec::new();
        for (target, resource) in targets.iter().zip(&ad_group_resources) {
            if cached.done_ad_groups.contains(resource) {
                debug!(account_id, ad_group = %target.ad_group_id, "already processed");
                slots.push(Slot::Skipped(SkipReason::AlreadyProcessed));
                continue;
            }

            let existing = cached.existing_ads.get(resource);
            let base_headlines: Vec<String> = existing
                .map(|ad| ad.headlines.iter().take(3).cloned().collect())
                .unwrap_or_default();
            let base_description = existing
                .and_then(|ad| ad.descriptions.first().cloned())
                .unwrap_or_default();
            let content =
                self.generator
                    .generate(&self.config.theme, &base_headlines, &base_description);

            match build_refresh_ad(target, &cached, &content) {
                Some(build) => {
                    slots.push(Slot::Built(operations.len()));
                    operations.push(build.operation);
                    superseded.push(build.superseded_ad);
                }
                None => {
                    let reason = if existing.is_none() {
                        SkipReason::NoExistingAd
                    } else {
                        SkipReason::NoFinalUrl
                    };
                    debug!(account_id, ad_group = %target.ad_group_id, reason = %reason, "skipping target");
                    slots.push(Slot::Skipped(reason));
                }
            }
        }

        info!(
            account_id,
            ads = operations.len(),
            skipped = targets.len() - operations.len(),
            "prepared operations"
        );

        if operations.is_empty() {
            return Ok(self.compose_results(account_id, targets, &slots, &[], &cached.campaigns));
        }

        if self.config.dry_run {
            info!(account_id, ads = operations.len(), "dry run, skipping mutations");
            return Ok(self.compose_results(
                account_id,
                targets,
                &slots,
                &vec![Ok(None); operations.len()],
                &cached.campaigns,
            ));
        }

        // One batched mutation creates every new ad for this account.
        let account = account_id.to_string();
        let batch = operations.clone();
        let op_results: Vec<Result<Option<String>, String>> = match self
            .remote
            .run("create_ads", move |api| api.create_ads(&account, &batch))
            .await
        {
            Ok(outcome) => {
                let mut results: Vec<Result<Option<String>, String>> = outcome
                    .results
                    .into_iter()
                    .map(|r| match r {
                        MutateOutcome::Created { resource_name } => Ok(Some(resource_name)),
                        MutateOutcome::Failed { error } => Err(error),
                    })
                    .collect();
                // An operation the response does not cover cannot be assumed
                // to have been applied.
                while results.len() < operations.len() {
                    results.push(Err("missing from batch response".to_string()));
                }
                results
            }
            Err(e) => vec![Err(e.to_string()); operations.len()],
        };

        let created = op_results.iter().filter(|r| r.is_ok()).count();
        metrics::counter!("ads.created").increment(created as u64);

        // Two follow-up label passes: superseded originals, then the new
        // ads and their ad groups.
        let theme_label = cached.labels.get(&self.config.labels.theme_label(&self.config.theme));
        let ad_label = cached.labels.get(&self.config.labels.ad_label);
        let original_label = cached.labels.get(&self.config.labels.original_label);
        let done_label = cached.labels.get(&self.config.labels.done_label);

        let mut original_pairs = Vec::new();
        let mut new_ad_pairs = Vec::new();
        let mut ad_group_pairs = Vec::new();
        for (index, result) in op_results.iter().enumerate() {
            let Ok(Some(new_ad)) = result else { continue };
            if let Some(label) = original_label {
                original_pairs.push((superseded[index].clone(), label.clone()));
            }
            if let Some(label) = theme_label {
                new_ad_pairs.push((new_ad.clone(), label.clone()));
            }
            if let Some(label) = ad_label {
                new_ad_pairs.push((new_ad.clone(), label.clone()));
            }
            if let Some(label) = done_label {
                ad_group_pairs.push((operations[index].ad_group.clone(), label.clone()));
            }
        }

        self.registry
            .label_ads_batch(account_id, original_pairs)
            .await;
        self.registry.label_ads_batch(account_id, new_ad_pairs).await;
        self.registry
            .label_ad_groups_batch(account_id, ad_group_pairs)
            .await;

        Ok(self.compose_results(account_id, targets, &slots, &op_results, &cached.campaigns))
    }

    fn compose_results(
        &self,
        account_id: &str,
        targets: &[AdGroupTarget],
        slots: &[Slot],
        op_results: &[Result<Option<String>, String>],
        campaigns: &std::collections::HashMap<String, String>,
    ) -> Vec<ProcessingResult> {
        targets
            .iter()
            .zip(slots)
            .map(|(target, slot)| {
                let mut result = match slot {
                    Slot::Skipped(reason) => {
                        ProcessingResult::skipped(account_id, &target.ad_group_id, *reason)
                    }
                    Slot::Built(index) => match &op_results[*index] {
                        Ok(resource) => ProcessingResult::success(
                            account_id,
                            &target.ad_group_id,
                            resource.clone(),
                        ),
                        Err(error) => {
                            ProcessingResult::failed(account_id, &target.ad_group_id, error.clone())
                        }
                    },
                };
                // Backfill the campaign id from the prefetched map when the
                // input only carried a name.
                result.campaign_id = target.campaign_id.clone().or_else(|| {
                    target
                        .campaign_name
                        .as_ref()
                        .and_then(|name| campaigns.get(name).cloned())
                });
                result
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_core::ads::{ad_group_resource, AdRecord, AdStatus};
    use thema_core::types::TargetOutcome;
    use thema_core::RemoteError;
    use thema_remote::{AccountState, InMemoryAdsApi};

    fn config() -> Arc<AppConfig> {
        Arc::new(AppConfig::default())
    }

    fn dispatcher(api: Arc<InMemoryAdsApi>, config: Arc<AppConfig>) -> AccountDispatcher {
        let remote = RemoteExecutor::new(api, {
            let mut retry = thema_core::config::RetryConfig::default();
            retry.initial_backoff_ms = 1;
            retry.max_backoff_ms = 2;
            retry
        });
        AccountDispatcher::new(remote, Arc::new(crate::content::ThemeTemplates::new()), config)
    }

    fn target(account: &str, ad_group: &str) -> AdGroupTarget {
        AdGroupTarget {
            account_id: account.to_string(),
            ad_group_id: ad_group.to_string(),
            campaign_id: None,
            campaign_name: None,
        }
    }

    fn seeded_ad(account: &str, ad_group_id: &str) -> AdRecord {
        let ad_group = ad_group_resource(account, ad_group_id);
        AdRecord {
            resource_name: format!("{ad_group}~existing"),
            ad_group,
            status: AdStatus::Enabled,
            headlines: vec!["One".into(), "Two".into(), "Three".into()],
            descriptions: vec!["Base description".into()],
            final_urls: vec!["https://example.com/p".into()],
            path1: None,
            path2: None,
        }
    }

    #[tokio::test]
    async fn test_labels_ads_and_ad_groups_after_publish() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.seed_account(
            "111",
            AccountState {
                ads: vec![seeded_ad("111", "1")],
                ..AccountState::default()
            },
        );

        let results = dispatcher(api.clone(), config())
            .process_account("111", &[target("111", "1")])
            .await;

        assert_eq!(results.len(), 1);
        assert!(results[0].is_success());

        let state = api.account("111").unwrap();
        // the superseded original plus the new ad's theme + bookkeeping labels
        assert_eq!(state.ad_labels.len(), 3);
        // ad group marked done
        assert_eq!(state.ad_group_labels.len(), 1);
        // new ad exists next to the original
        assert_eq!(state.ads.len(), 2);
    }

    #[tokio::test]
    async fn test_prefetch_failure_fails_whole_account() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.seed_account(
            "111",
            AccountState {
                ads: vec![seeded_ad("111", "1"), seeded_ad("111", "2")],
                ..AccountState::default()
            },
        );
        api.inject_fault("list_labels", RemoteError::Permanent("AUTH".into()));

        let results = dispatcher(api, config())
            .process_account("111", &[target("111", "1"), target("111", "2")])
            .await;

        assert_eq!(results.len(), 2);
        for result in &results {
            match &result.outcome {
                TargetOutcome::Failed { error } => assert!(error.contains("AUTH")),
                other => panic!("expected failure, got {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn test_create_failure_attributed_to_batch_only() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.seed_account(
            "111",
            AccountState {
                ads: vec![seeded_ad("111", "1")],
                ..AccountState::default()
            },
        );
        api.inject_fault("create_ads", RemoteError::Permanent("QUOTA".into()));

        let results = dispatcher(api, config())
            .process_account("111", &[target("111", "1"), target("111", "2")])
            .await;

        // target 2 has no existing ad: its skip outcome survives the batch failure
        assert!(matches!(
            results[0].outcome,
            TargetOutcome::Failed { .. }
        ));
        assert!(matches!(
            results[1].outcome,
            TargetOutcome::Skipped {
                reason: SkipReason::NoExistingAd
            }
        ));
    }

    #[tokio::test]
    async fn test_label_failure_does_not_change_success() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.seed_account(
            "111",
            AccountState {
                ads: vec![seeded_ad("111", "1")],
                ..AccountState::default()
            },
        );
        api.inject_fault(
            "attach_ad_labels",
            RemoteError::Permanent("LABEL_SERVICE_DOWN".into()),
        );
        api.inject_fault(
            "attach_ad_labels",
            RemoteError::Permanent("LABEL_SERVICE_DOWN".into()),
        );

        let results = dispatcher(api, config())
            .process_account("111", &[target("111", "1")])
            .await;
        assert!(results[0].is_success());
    }

    #[tokio::test]
    async fn test_dry_run_makes_no_mutations() {
        let api = Arc::new(InMemoryAdsApi::new());
        api.seed_account(
            "111",
            AccountState {
                ads: vec![seeded_ad("111", "1")],
                ..AccountState::default()
            },
        );

        let mut cfg = AppConfig::default();
        cfg.dry_run = true;
        let results = dispatcher(api.clone(), Arc::new(cfg))
            .process_account("111", &[target("111", "1")])
            .await;

        assert!(results[0].is_success());
        assert_eq!(api.calls("create_ads"), 0);
        assert_eq!(api.calls("attach_ad_labels"), 0);
        // labels are still ensured up front
        assert_eq!(api.calls("create_labels"), 1);
        assert_eq!(api.account("111").unwrap().ads.len(), 1);
    }
}
