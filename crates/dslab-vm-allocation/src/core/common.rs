use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Tolerance used when comparing MIPS amounts and scaling amounts.
pub const EPSILON: f64 = 1e-9;

/// Kind of resource that a host provides to VMs.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Cpu,
    Ram,
    Bandwidth,
    Storage,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ResourceKind::Cpu => write!(f, "cpu"),
            ResourceKind::Ram => write!(f, "ram"),
            ResourceKind::Bandwidth => write!(f, "bw"),
            ResourceKind::Storage => write!(f, "storage"),
        }
    }
}

/// Snapshot of VM resource requirements used during host search.
///
/// It is a plain value, so it can be sent to worker threads during parallel search.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct VmRequirements {
    pub vm_id: u32,
    pub pes: u64,
    pub mips: f64,
    pub ram: u64,
    pub bw: u64,
    pub storage: u64,
    /// MIPS currently requested by VM workload (`pes * mips * cpu utilization`).
    pub requested_mips: f64,
}

impl VmRequirements {
    pub fn total_mips(&self) -> f64 {
        self.pes as f64 * self.mips
    }
}

/// Result of checking whether a host can run a VM.
///
/// Stores a verdict per resource kind. It is produced by every placement attempt and is never an error.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct HostSuitability {
    pub vm_id: u32,
    pub host_id: Option<u32>,
    pub for_pes: bool,
    pub for_ram: bool,
    pub for_bw: bool,
    pub for_storage: bool,
}

impl HostSuitability {
    /// Creates suitability of the specified host with all verdicts set to `false`.
    pub fn new(vm_id: u32, host_id: u32) -> Self {
        Self {
            vm_id,
            host_id: Some(host_id),
            for_pes: false,
            for_ram: false,
            for_bw: false,
            for_storage: false,
        }
    }

    /// Result of a search which has not found any suitable host.
    pub fn not_found(vm_id: u32) -> Self {
        Self {
            vm_id,
            host_id: None,
            for_pes: false,
            for_ram: false,
            for_bw: false,
            for_storage: false,
        }
    }

    /// Returns true only if all requested resources can be provided.
    pub fn fully(&self) -> bool {
        self.for_pes && self.for_ram && self.for_bw && self.for_storage
    }

    pub fn for_resource(&self, kind: ResourceKind) -> bool {
        match kind {
            ResourceKind::Cpu => self.for_pes,
            ResourceKind::Ram => self.for_ram,
            ResourceKind::Bandwidth => self.for_bw,
            ResourceKind::Storage => self.for_storage,
        }
    }
}

impl Display for HostSuitability {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let host_id = match self.host_id {
            Some(host_id) => host_id,
            None => return write!(f, "no suitable host for vm #{}", self.vm_id),
        };
        if self.fully() {
            return write!(f, "host #{} is suitable for vm #{}", host_id, self.vm_id);
        }
        let missing = [
            (self.for_pes, "PEs"),
            (self.for_ram, "RAM"),
            (self.for_bw, "BW"),
            (self.for_storage, "storage"),
        ]
        .iter()
        .filter(|(ok, _)| !ok)
        .map(|(_, name)| *name)
        .collect::<Vec<_>>()
        .join(", ");
        write!(f, "host #{} lacks {} for vm #{}", host_id, missing, self.vm_id)
    }
}
