//! Typed error conditions
//!
//! Operations return `anyhow::Result`. The conditions callers need to tell
//! apart are concrete types here and can be recovered with
//! `err.downcast_ref::<T>()`.

/// The server refused the request because the device is not (or no longer)
/// provisioned.
#[derive(Debug, thiserror::Error)]
#[error("Device provisioning required (status {status})")]
pub struct ProvisionRequiredError {
    pub status: u32,
}

/// A bulk sync exchange returned a non-OK collection status
#[derive(Debug, thiserror::Error)]
#[error("Sync of folder {folder} failed with status {status}")]
pub struct SyncFailedError {
    pub folder: String,
    pub status: u32,
}

/// A single-message fetch returned a non-OK collection status
#[derive(Debug, thiserror::Error)]
#[error("Couldn't fetch message {server_id} (status {status:?})")]
pub struct FetchFailedError {
    pub server_id: String,
    pub status: Option<u32>,
}

/// The server accepted a fetch but returned no result for the message
#[derive(Debug, thiserror::Error)]
#[error("Message not found: {server_id}")]
pub struct MessageNotFoundError {
    pub server_id: String,
}

/// Another operation is already running against this folder
#[derive(Debug, thiserror::Error)]
#[error("Folder {folder} already has an operation in flight")]
pub struct FolderBusyError {
    pub folder: String,
}

/// An OK response arrived without the collection or sync key it must carry
#[derive(Debug, thiserror::Error)]
#[error("Malformed sync response for folder {folder}: {reason}")]
pub struct MalformedResponseError {
    pub folder: String,
    pub reason: &'static str,
}

/// Check whether an error chain carries a provisioning-required signal
pub fn is_provision_required(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|cause| cause.downcast_ref::<ProvisionRequiredError>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_provision_required_detected_through_context() {
        let err: anyhow::Result<()> =
            Err(ProvisionRequiredError { status: 142 }.into());
        let err = err.context("Sync request failed").unwrap_err();
        assert!(is_provision_required(&err));
    }

    #[test]
    fn test_other_errors_are_not_provisioning() {
        let err = anyhow::anyhow!("connection reset");
        assert!(!is_provision_required(&err));

        let err: anyhow::Error = SyncFailedError {
            folder: "inbox".into(),
            status: 3,
        }
        .into();
        assert!(!is_provision_required(&err));
    }
}
