//! Remote protocol client seam

use anyhow::Result;

use super::STATUS_PROVISION_REQUIRED;
use super::api::Sync;
use crate::error::ProvisionRequiredError;

/// Synchronous request/response client for the Sync command
///
/// Implementations own the transport: HTTP, WBXML encoding, request
/// deadlines, and attaching the current policy key. Transport failures are
/// returned as errors. A transport that sees HTTP 449 should return
/// [`ProvisionRequiredError`].
pub trait EasClient: Send + std::marker::Sync {
    fn sync(&self, request: &Sync) -> Result<Sync>;
}

/// Turn provisioning status codes in a response into [`ProvisionRequiredError`]
///
/// Checks both the top-level and the collection status.
pub fn check_provisioning(response: &Sync) -> Result<()> {
    let collection_status = response.collection().and_then(|c| c.status);

    for status in [response.status, collection_status].into_iter().flatten() {
        if STATUS_PROVISION_REQUIRED.contains(&status) {
            return Err(ProvisionRequiredError { status }.into());
        }
    }

    Ok(())
}
