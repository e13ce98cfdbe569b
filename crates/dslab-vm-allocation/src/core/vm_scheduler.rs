//! Multiplexing of host PEs among VMs.

use std::collections::BTreeMap;

use dyn_clone::{clone_trait_object, DynClone};
use serde::Serialize;

use crate::core::config::parse_config_value;
use crate::core::pe::Pe;
use crate::core::vm_schedulers::space_shared::SpaceSharedVmScheduler;
use crate::core::vm_schedulers::time_shared::TimeSharedVmScheduler;

/// Request for `pes` virtual PEs with `mips` each.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MipsShare {
    pub pes: u64,
    pub mips: f64,
}

impl MipsShare {
    pub fn new(pes: u64, mips: f64) -> Self {
        Self { pes, mips }
    }

    pub fn total_mips(&self) -> f64 {
        self.pes as f64 * self.mips
    }
}

/// Per-host component which decides how host PEs are shared among the resident VMs.
///
/// PEs are owned by the host and passed to the scheduler, the scheduler remembers which parts of PEs
/// are granted to each VM. Suitability checks are pure, so they can run concurrently during host search.
pub trait VmScheduler: DynClone + Send + Sync {
    /// Checks whether the share can currently be granted, used both for placement and vertical scaling.
    fn is_suitable_for_vm(&self, pes: &[Pe], share: &MipsShare) -> bool;

    /// Grants the share to the VM (in addition to already granted shares), fails without side effects.
    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm_id: u32, share: &MipsShare) -> bool;

    /// Releases all shares granted to the VM.
    fn deallocate_pes_from_vm(&mut self, pes: &mut [Pe], vm_id: u32) -> bool;

    /// Returns the total MIPS granted to the VM.
    fn allocated_mips_for_vm(&self, vm_id: u32) -> f64;

    fn name(&self) -> &'static str;
}

clone_trait_object!(VmScheduler);

pub fn vm_scheduler_resolver(config_str: &str) -> Box<dyn VmScheduler> {
    let (name, _) = parse_config_value(config_str);
    match name.as_str() {
        "TimeShared" => Box::new(TimeSharedVmScheduler::new()),
        "SpaceShared" => Box::new(SpaceSharedVmScheduler::new()),
        _ => panic!("Can't resolve VM scheduler: {}", config_str),
    }
}

/// Parts of host PEs granted to VMs: VM id -> list of (PE index, MIPS).
#[derive(Clone, Debug, Default)]
pub(crate) struct PeAllocations {
    granted: BTreeMap<u32, Vec<(usize, f64)>>,
}

impl PeAllocations {
    pub fn grant(&mut self, pes: &mut [Pe], vm_id: u32, parts: Vec<(usize, f64)>) {
        for (idx, mips) in &parts {
            pes[*idx].allocate(*mips);
        }
        self.granted.entry(vm_id).or_default().extend(parts);
    }

    pub fn release(&mut self, pes: &mut [Pe], vm_id: u32) -> bool {
        match self.granted.remove(&vm_id) {
            Some(parts) => {
                for (idx, mips) in parts {
                    pes[idx].deallocate(mips);
                }
                true
            }
            None => false,
        }
    }

    pub fn total_mips(&self, vm_id: u32) -> f64 {
        self.granted
            .get(&vm_id)
            .map(|parts| parts.iter().map(|(_, mips)| mips).sum())
            .unwrap_or(0.)
    }
}
