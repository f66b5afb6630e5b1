//! Pure composition of the publish payload for one target. No I/O, no
//! suspension points: everything comes from the prefetched account snapshot
//! and the generated copy.

use thema_core::ads::{
    ad_group_resource, BuildResult, CachedAccountData, CreateAdOperation, GeneratedContent,
    MAX_DESCRIPTIONS, MAX_DESCRIPTION_LEN, MAX_HEADLINES, MAX_HEADLINE_LEN, MAX_PATH_LEN,
};
use thema_core::types::AdGroupTarget;

/// Build the refresh operation for one target.
///
/// Returns `None` when there is no reason to act: the ad group has no
/// cached creative, or the creative has no landing URL. Otherwise the new
/// ad keeps the first three existing headlines and the first existing
/// description as its stable base and appends the generated themed copy.
pub fn build_refresh_ad(
    target: &AdGroupTarget,
    cached: &CachedAccountData,
    content: &GeneratedContent,
) -> Option<BuildResult> {
    let resource = ad_group_resource(&target.account_id, &target.ad_group_id);
    let existing = cached.existing_ads.get(&resource)?;
    let final_url = existing.final_urls.first()?.clone();

    let mut headlines: Vec<String> = existing
        .headlines
        .iter()
        .filter(|h| h.chars().count() <= MAX_HEADLINE_LEN)
        .take(3)
        .cloned()
        .collect();
    for headline in &content.headlines {
        if headlines.len() >= MAX_HEADLINES {
            break;
        }
        if headline.chars().count() <= MAX_HEADLINE_LEN && !headlines.contains(headline) {
            headlines.push(headline.clone());
        }
    }

    let mut descriptions: Vec<String> = existing
        .descriptions
        .iter()
        .filter(|d| d.chars().count() <= MAX_DESCRIPTION_LEN)
        .take(1)
        .cloned()
        .collect();
    for description in &content.descriptions {
        if descriptions.len() >= MAX_DESCRIPTIONS {
            break;
        }
        if description.chars().count() <= MAX_DESCRIPTION_LEN
            && !descriptions.contains(description)
        {
            descriptions.push(description.clone());
        }
    }

    // The themed segment becomes path1; the creative keeps its own path2,
    // falling back to its path1 when it never had a second segment.
    let path1 = clamp_path(&content.path1);
    let path2 = existing
        .path2
        .as_deref()
        .and_then(clamp_path)
        .or_else(|| existing.path1.as_deref().and_then(clamp_path));

    Some(BuildResult {
        operation: CreateAdOperation {
            ad_group: resource,
            final_url,
            headlines,
            descriptions,
            path1,
            path2,
        },
        superseded_ad: existing.resource_name.clone(),
    })
}

fn clamp_path(segment: &str) -> Option<String> {
    let trimmed = segment.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.chars().take(MAX_PATH_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thema_core::ads::{AdStatus, ExistingCreative};

    fn target() -> AdGroupTarget {
        AdGroupTarget {
            account_id: "111".to_string(),
            ad_group_id: "42".to_string(),
            campaign_id: None,
            campaign_name: None,
        }
    }

    fn creative(final_urls: Vec<&str>) -> ExistingCreative {
        ExistingCreative {
            resource_name: "customers/111/adGroupAds/42~1".to_string(),
            status: AdStatus::Enabled,
            headlines: vec![
                "One".to_string(),
                "Two".to_string(),
                "Three".to_string(),
                "Four".to_string(),
            ],
            descriptions: vec!["First description".to_string(), "Second".to_string()],
            final_urls: final_urls.into_iter().map(String::from).collect(),
            path1: Some("shoes".to_string()),
            path2: None,
        }
    }

    fn content() -> GeneratedContent {
        GeneratedContent {
            headlines: vec!["Singles Day Deals".to_string()],
            descriptions: vec!["Themed description.".to_string()],
            path1: "singles-day".to_string(),
        }
    }

    fn cached_with(creative: Option<ExistingCreative>) -> CachedAccountData {
        let mut cached = CachedAccountData::default();
        if let Some(creative) = creative {
            cached
                .existing_ads
                .insert(ad_group_resource("111", "42"), creative);
        }
        cached
    }

    #[test]
    fn test_no_existing_creative_returns_none() {
        assert!(build_refresh_ad(&target(), &cached_with(None), &content()).is_none());
    }

    #[test]
    fn test_no_landing_url_returns_none() {
        let cached = cached_with(Some(creative(vec![])));
        assert!(build_refresh_ad(&target(), &cached, &content()).is_none());
    }

    #[test]
    fn test_composes_base_plus_themed_copy() {
        let cached = cached_with(Some(creative(vec!["https://example.com/p"])));
        let build = build_refresh_ad(&target(), &cached, &content()).unwrap();

        let op = &build.operation;
        assert_eq!(op.final_url, "https://example.com/p");
        // first three existing headlines, then the themed one
        assert_eq!(op.headlines[..3], ["One", "Two", "Three"]);
        assert!(op.headlines.contains(&"Singles Day Deals".to_string()));
        // first existing description, then the themed one
        assert_eq!(op.descriptions[0], "First description");
        assert_eq!(op.descriptions[1], "Themed description.");
        assert_eq!(op.path1.as_deref(), Some("singles-day"));
        // path2 falls back to the creative's path1
        assert_eq!(op.path2.as_deref(), Some("shoes"));
        assert_eq!(build.superseded_ad, "customers/111/adGroupAds/42~1");
    }

    #[test]
    fn test_slot_limits_enforced() {
        let mut existing = creative(vec!["https://example.com/p"]);
        existing.headlines = (0..20).map(|i| format!("Headline {i}")).collect();
        let cached = cached_with(Some(existing));

        let generated = GeneratedContent {
            headlines: (0..20).map(|i| format!("Generated {i}")).collect(),
            descriptions: (0..10).map(|i| format!("Generated description {i}")).collect(),
            path1: "a-very-long-path-segment".to_string(),
        };

        let build = build_refresh_ad(&target(), &cached, &generated).unwrap();
        assert!(build.operation.headlines.len() <= MAX_HEADLINES);
        assert!(build.operation.descriptions.len() <= MAX_DESCRIPTIONS);
        assert_eq!(build.operation.path1.as_deref(), Some("a-very-long-pat"));
    }
}
