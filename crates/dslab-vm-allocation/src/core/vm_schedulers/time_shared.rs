//! Time-shared VM scheduler.

use crate::core::common::EPSILON;
use crate::core::pe::Pe;
use crate::core::vm_scheduler::{MipsShare, PeAllocations, VmScheduler};

/// Multiplexes PEs among VMs: a request is accepted while the requested MIPS fit into MIPS of working PEs
/// not yet promised to other VMs. A virtual PE may be spread over several physical PEs.
#[derive(Clone, Default)]
pub struct TimeSharedVmScheduler {
    allocations: PeAllocations,
}

impl TimeSharedVmScheduler {
    pub fn new() -> Self {
        Default::default()
    }
}

impl VmScheduler for TimeSharedVmScheduler {
    fn is_suitable_for_vm(&self, pes: &[Pe], share: &MipsShare) -> bool {
        let working = pes.iter().filter(|pe| pe.is_working());
        let working_count = working.clone().count() as u64;
        let max_pe_mips = working.clone().map(|pe| pe.mips()).fold(0., f64::max);
        let available_mips: f64 = working.map(|pe| pe.available_mips()).sum();
        working_count >= share.pes
            && share.mips <= max_pe_mips + EPSILON
            && share.total_mips() <= available_mips + EPSILON
    }

    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm_id: u32, share: &MipsShare) -> bool {
        if !self.is_suitable_for_vm(pes, share) {
            return false;
        }
        let mut available: Vec<f64> = pes.iter().map(|pe| pe.available_mips()).collect();
        let mut parts = Vec::new();
        for _ in 0..share.pes {
            let mut remaining = share.mips;
            for (idx, free) in available.iter_mut().enumerate() {
                if remaining <= EPSILON {
                    break;
                }
                let take = free.min(remaining);
                if take > EPSILON {
                    *free -= take;
                    remaining -= take;
                    parts.push((idx, take));
                }
            }
        }
        self.allocations.grant(pes, vm_id, parts);
        true
    }

    fn deallocate_pes_from_vm(&mut self, pes: &mut [Pe], vm_id: u32) -> bool {
        self.allocations.release(pes, vm_id)
    }

    fn allocated_mips_for_vm(&self, vm_id: u32) -> f64 {
        self.allocations.total_mips(vm_id)
    }

    fn name(&self) -> &'static str {
        "TimeShared"
    }
}
