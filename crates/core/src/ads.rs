//! Remote advertising platform entities: read rows, the per-account prefetch
//! snapshot, and the mutation payloads built from it.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

/// Slot limits for a responsive search ad on the remote platform.
pub const MAX_HEADLINES: usize = 15;
pub const MAX_DESCRIPTIONS: usize = 4;
pub const MAX_HEADLINE_LEN: usize = 30;
pub const MAX_DESCRIPTION_LEN: usize = 90;
pub const MAX_PATH_LEN: usize = 15;

/// Resource name of an ad group within an account.
pub fn ad_group_resource(account_id: &str, ad_group_id: &str) -> String {
    format!("customers/{account_id}/adGroups/{ad_group_id}")
}

/// A label row returned by a bulk label read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LabelRecord {
    pub resource_name: String,
    pub name: String,
}

/// A campaign row returned by a bulk campaign read.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CampaignRecord {
    pub resource_name: String,
    pub id: String,
    pub name: String,
}

/// Serving status of an ad as reported by the platform.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdStatus {
    Enabled,
    Paused,
    Removed,
}

/// One ad row returned by the bulk ad read, keyed back to its ad group.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdRecord {
    pub resource_name: String,
    pub ad_group: String,
    pub status: AdStatus,
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub final_urls: Vec<String>,
    #[serde(default)]
    pub path1: Option<String>,
    #[serde(default)]
    pub path2: Option<String>,
}

/// An ad-group → label assignment row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdGroupLabelRecord {
    pub ad_group: String,
    pub label: String,
}

/// Snapshot of the creative an ad group currently serves, used as the
/// template for the themed variant. Read-only for the duration of one
/// account pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExistingCreative {
    pub resource_name: String,
    pub status: AdStatus,
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub final_urls: Vec<String>,
    pub path1: Option<String>,
    pub path2: Option<String>,
}

impl From<AdRecord> for ExistingCreative {
    fn from(ad: AdRecord) -> Self {
        Self {
            resource_name: ad.resource_name,
            status: ad.status,
            headlines: ad.headlines,
            descriptions: ad.descriptions,
            final_urls: ad.final_urls,
            path1: ad.path1,
            path2: ad.path2,
        }
    }
}

/// Everything one account pass needs, built once by the prefetch step and
/// owned exclusively by that account's dispatch task.
#[derive(Debug, Clone, Default)]
pub struct CachedAccountData {
    /// label name → label resource name
    pub labels: HashMap<String, String>,
    /// ad group resource name → existing creative
    pub existing_ads: HashMap<String, ExistingCreative>,
    /// campaign name → campaign id
    pub campaigns: HashMap<String, String>,
    /// ad groups already carrying the done label
    pub done_ad_groups: HashSet<String>,
}

/// Create-operation payload for one themed responsive search ad.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAdOperation {
    pub ad_group: String,
    pub final_url: String,
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub path1: Option<String>,
    pub path2: Option<String>,
}

/// Result of one operation within a batched mutation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MutateOutcome {
    Created { resource_name: String },
    Failed { error: String },
}

/// Per-operation results of a batched mutation, order-aligned with the
/// submitted operations.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BatchOutcome {
    pub results: Vec<MutateOutcome>,
}

impl BatchOutcome {
    pub fn created(resources: Vec<String>) -> Self {
        Self {
            results: resources
                .into_iter()
                .map(|resource_name| MutateOutcome::Created { resource_name })
                .collect(),
        }
    }

    pub fn applied_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, MutateOutcome::Created { .. }))
            .count()
    }
}

/// Themed copy produced by a content generator for one target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedContent {
    pub headlines: Vec<String>,
    pub descriptions: Vec<String>,
    pub path1: String,
}

/// Output of the operation builder for one target: the publish payload plus
/// the creative it supersedes.
#[derive(Debug, Clone)]
pub struct BuildResult {
    pub operation: CreateAdOperation,
    pub superseded_ad: String,
}
