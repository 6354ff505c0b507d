//! Boundary to the hypervisor's command interface.
//!
//! Everything snapkeep does to a VM goes through [`HypervisorGateway`]. Calls
//! are awaited one at a time and never retried; a failure is returned as
//! [`SnapError::Gateway`](crate::error::SnapError::Gateway) with the tool's own
//! message.

mod qm;

pub use qm::QmGateway;

use crate::error::Result;
use crate::types::{Resource, VmId};
use async_trait::async_trait;

/// Operations snapkeep needs from the hypervisor.
#[async_trait]
pub trait HypervisorGateway: Send + Sync {
    /// All VMs known to the cluster.
    async fn list_resources(&self) -> Result<Vec<Resource>>;

    /// Raw snapshot listing text for one VM, in whatever shape the tool prints.
    async fn list_snapshots(&self, vmid: VmId) -> Result<String>;

    async fn create_snapshot(&self, vmid: VmId, name: &str, description: &str) -> Result<()>;

    /// Delete a snapshot; `force` also drops it when the storage side fails.
    async fn delete_snapshot(&self, vmid: VmId, name: &str, force: bool) -> Result<()>;

    /// Stored description of one snapshot, if it has one.
    async fn snapshot_description(&self, vmid: VmId, name: &str) -> Result<Option<String>>;
}
