//! Downloadable report of non-success items: one CSV row per failed or
//! skipped target with its reason.

use thema_core::types::{ItemStatus, JobItem};

/// Render the failure/skip report for a job's items.
pub fn render(items: &[JobItem]) -> String {
    let mut out =
        String::from("account_id,campaign_id,campaign_name,ad_group_id,status,reason\n");
    for item in items {
        if !matches!(item.status, ItemStatus::Failed | ItemStatus::Skipped) {
            continue;
        }
        out.push_str(&format!(
            "{},{},{},{},{},{}\n",
            field(&item.account_id),
            field(item.campaign_id.as_deref().unwrap_or("")),
            field(item.campaign_name.as_deref().unwrap_or("")),
            field(&item.ad_group_id),
            item.status.as_str(),
            field(item.error_message.as_deref().unwrap_or("")),
        ));
    }
    out
}

fn field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}
