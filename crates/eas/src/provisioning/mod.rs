//! Device provisioning gate
//!
//! Every network round-trip runs through [`ProvisionManager::ensure_provisioned`].
//! The gate provisions on demand and retries the gated action at most once.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::is_provision_required;

/// Performs the provisioning handshake with the server
///
/// Returns the policy key the server issued. The policy itself (which
/// settings to accept) is the implementor's concern.
pub trait Provisioner: Send + Sync {
    fn provision(&self) -> Result<String>;
}

/// Per-account provisioning state
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProvisionState {
    /// Policy key accepted by the server, None until provisioned
    pub policy_key: Option<String>,
    /// When the current policy key was obtained
    pub provisioned_at: Option<DateTime<Utc>>,
}

impl ProvisionState {
    /// State for a device that already holds a policy key
    pub fn provisioned(policy_key: impl Into<String>) -> Self {
        Self {
            policy_key: Some(policy_key.into()),
            provisioned_at: Some(Utc::now()),
        }
    }

    pub fn is_provisioned(&self) -> bool {
        self.policy_key.is_some()
    }
}

/// Where the gate is in its run → provision → retry sequence
///
/// `Retry` always returns, so the action runs at most twice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GateStage {
    Run,
    Provision,
    Retry,
}

/// Owns one account's provisioning state and gates work behind it
pub struct ProvisionManager {
    provisioner: Arc<dyn Provisioner>,
    state: Mutex<ProvisionState>,
    /// Held for the whole handshake; `state` is only locked to read or store
    provisioning: Mutex<()>,
}

impl ProvisionManager {
    /// Create a manager for a device that has not been provisioned yet
    pub fn new(provisioner: Arc<dyn Provisioner>) -> Self {
        Self::with_state(provisioner, ProvisionState::default())
    }

    /// Create a manager resuming from previously persisted state
    pub fn with_state(provisioner: Arc<dyn Provisioner>, state: ProvisionState) -> Self {
        Self {
            provisioner,
            state: Mutex::new(state),
            provisioning: Mutex::new(()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ProvisionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot of the current state (for persisting or attaching the policy key)
    pub fn state(&self) -> ProvisionState {
        self.lock_state().clone()
    }

    pub fn is_provisioned(&self) -> bool {
        self.lock_state().is_provisioned()
    }

    /// Current policy key, if any
    pub fn policy_key(&self) -> Option<String> {
        self.lock_state().policy_key.clone()
    }

    /// Forget the policy key so the next gated call provisions first
    pub fn invalidate(&self) {
        let mut state = self.lock_state();
        state.policy_key = None;
        state.provisioned_at = None;
    }

    /// Run the provisioning handshake and store the resulting key
    ///
    /// Concurrent callers on the same account never provision in parallel.
    /// The provisioner and the client may read [`ProvisionManager::state`]
    /// while the handshake runs.
    pub fn provision(&self) -> Result<()> {
        let _provisioning = self
            .provisioning
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        info!("Provisioning device");

        let policy_key = self
            .provisioner
            .provision()
            .context("Device provisioning failed")?;

        *self.lock_state() = ProvisionState::provisioned(policy_key);
        info!("Device provisioned");
        Ok(())
    }

    /// Run `action` once the device is provisioned
    ///
    /// If the device is not provisioned, provisions first. If `action` fails
    /// with a provisioning-required error, re-provisions and runs it exactly
    /// once more. Every other failure, a provisioning failure, or a failure
    /// of the retried action is returned as-is.
    pub fn ensure_provisioned<T, F>(&self, mut action: F) -> Result<T>
    where
        F: FnMut() -> Result<T>,
    {
        let mut stage = if self.is_provisioned() {
            GateStage::Run
        } else {
            GateStage::Provision
        };

        loop {
            stage = match stage {
                GateStage::Run => match action() {
                    Ok(value) => return Ok(value),
                    Err(e) if is_provision_required(&e) => {
                        warn!("Server requires provisioning: {}", e);
                        self.invalidate();
                        GateStage::Provision
                    }
                    Err(e) => return Err(e),
                },
                GateStage::Provision => {
                    self.provision()?;
                    GateStage::Retry
                }
                GateStage::Retry => {
                    debug!("Running gated action after provisioning");
                    return action();
                }
            };
        }
    }
}
