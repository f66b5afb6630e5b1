//! Capability trait for the remote advertising platform.
//!
//! Methods are blocking: implementations wrap a synchronous transport and
//! are only ever invoked through [`crate::RemoteExecutor`], which moves the
//! call onto the blocking worker pool so one slow account cannot stall the
//! cooperative scheduler.

use thema_core::ads::{
    AdGroupLabelRecord, AdRecord, BatchOutcome, CampaignRecord, CreateAdOperation, LabelRecord,
};
use thema_core::RemoteResult;

pub trait AdsApi: Send + Sync + 'static {
    /// All labels defined in the account.
    fn list_labels(&self, account_id: &str) -> RemoteResult<Vec<LabelRecord>>;

    /// All ads belonging to the given ad groups, one bulk read regardless of
    /// how many ad groups are asked for.
    fn list_ads(&self, account_id: &str, ad_groups: &[String]) -> RemoteResult<Vec<AdRecord>>;

    /// All campaigns in the account.
    fn list_campaigns(&self, account_id: &str) -> RemoteResult<Vec<CampaignRecord>>;

    /// All ad-group → label assignments in the account.
    fn list_ad_group_labels(&self, account_id: &str) -> RemoteResult<Vec<AdGroupLabelRecord>>;

    /// Create the given ads in one batched mutation. The returned outcome
    /// holds one entry per operation, in submission order.
    fn create_ads(
        &self,
        account_id: &str,
        operations: &[CreateAdOperation],
    ) -> RemoteResult<BatchOutcome>;

    /// Get-or-create the given label names in one batched mutation: a name
    /// that already exists must resolve to its existing resource instead of
    /// creating a duplicate. One outcome entry per name, in order.
    fn create_labels(&self, account_id: &str, names: &[String]) -> RemoteResult<BatchOutcome>;

    /// Attach labels to ads: one `(ad resource, label resource)` pair per
    /// operation.
    fn attach_ad_labels(
        &self,
        account_id: &str,
        pairs: &[(String, String)],
    ) -> RemoteResult<BatchOutcome>;

    /// Attach labels to ad groups: one `(ad group resource, label resource)`
    /// pair per operation.
    fn attach_ad_group_labels(
        &self,
        account_id: &str,
        pairs: &[(String, String)],
    ) -> RemoteResult<BatchOutcome>;
}
