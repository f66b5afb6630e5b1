//! Per-account prefetch: a fixed number of bulk reads regardless of how
//! many targets the account carries. Everything a pass needs afterwards is
//! answered from the returned snapshot, never by per-target reads.

use std::collections::HashMap;

use thema_core::ads::{AdStatus, CachedAccountData, ExistingCreative};
use thema_core::RemoteResult;
use thema_remote::RemoteExecutor;
use tracing::debug;

/// Build the account snapshot with four bulk reads: labels, ads for the
/// target ad groups, campaigns, and ad-group label assignments (the source
/// of the already-done set).
pub async fn prefetch_account_data(
    remote: &RemoteExecutor,
    account_id: &str,
    ad_group_resources: &[String],
    done_label: &str,
) -> RemoteResult<CachedAccountData> {
    let account = account_id.to_string();
    let label_rows = remote
        .run("list_labels", move |api| api.list_labels(&account))
        .await?;

    let account = account_id.to_string();
    let ad_groups = ad_group_resources.to_vec();
    let ad_rows = remote
        .run("list_ads", move |api| api.list_ads(&account, &ad_groups))
        .await?;

    let account = account_id.to_string();
    let campaign_rows = remote
        .run("list_campaigns", move |api| api.list_campaigns(&account))
        .await?;

    let account = account_id.to_string();
    let assignment_rows = remote
        .run("list_ad_group_labels", move |api| {
            api.list_ad_group_labels(&account)
        })
        .await?;

    let labels: HashMap<String, String> = label_rows
        .into_iter()
        .map(|label| (label.name, label.resource_name))
        .collect();

    // One creative per ad group: prefer the first enabled ad, otherwise the
    // first one seen.
    let mut existing_ads: HashMap<String, ExistingCreative> = HashMap::new();
    for ad in ad_rows {
        let key = ad.ad_group.clone();
        match existing_ads.get(&key) {
            None => {
                existing_ads.insert(key, ad.into());
            }
            Some(current)
                if current.status != AdStatus::Enabled && ad.status == AdStatus::Enabled =>
            {
                existing_ads.insert(key, ad.into());
            }
            Some(_) => {}
        }
    }

    let campaigns: HashMap<String, String> = campaign_rows
        .into_iter()
        .map(|campaign| (campaign.name, campaign.id))
        .collect();

    let done_ad_groups = match labels.get(done_label) {
        Some(done_resource) => assignment_rows
            .into_iter()
            .filter(|assignment| &assignment.label == done_resource)
            .map(|assignment| assignment.ad_group)
            .collect(),
        None => Default::default(),
    };

    let cached = CachedAccountData {
        labels,
        existing_ads,
        campaigns,
        done_ad_groups,
    };
    debug!(
        account_id,
        labels = cached.labels.len(),
        ads = cached.existing_ads.len(),
        campaigns = cached.campaigns.len(),
        done_ad_groups = cached.done_ad_groups.len(),
        "prefetched account data"
    );
    Ok(cached)
}
