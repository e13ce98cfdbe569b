//! Space-shared VM scheduler.

use crate::core::common::EPSILON;
use crate::core::pe::Pe;
use crate::core::vm_scheduler::{MipsShare, PeAllocations, VmScheduler};

/// Gives each virtual PE an exclusive free physical PE, so a request is rejected
/// when there are fewer free PEs (fast enough for the requested MIPS) than requested virtual PEs.
#[derive(Clone, Default)]
pub struct SpaceSharedVmScheduler {
    allocations: PeAllocations,
}

impl SpaceSharedVmScheduler {
    pub fn new() -> Self {
        Default::default()
    }

    fn free_pes_for(pes: &[Pe], mips: f64) -> impl Iterator<Item = usize> + '_ {
        pes.iter()
            .enumerate()
            .filter(move |(_, pe)| pe.is_free() && pe.mips() + EPSILON >= mips)
            .map(|(idx, _)| idx)
    }
}

impl VmScheduler for SpaceSharedVmScheduler {
    fn is_suitable_for_vm(&self, pes: &[Pe], share: &MipsShare) -> bool {
        Self::free_pes_for(pes, share.mips).count() as u64 >= share.pes
    }

    fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm_id: u32, share: &MipsShare) -> bool {
        let selected: Vec<usize> = Self::free_pes_for(pes, share.mips).take(share.pes as usize).collect();
        if (selected.len() as u64) < share.pes {
            return false;
        }
        let parts = selected.into_iter().map(|idx| (idx, share.mips)).collect();
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
        "SpaceShared"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partially_used_pe_is_not_shared() {
        let mut pes = Pe::list(2, 1000.);
        let mut scheduler = SpaceSharedVmScheduler::new();
        assert!(scheduler.allocate_pes_for_vm(&mut pes, 1, &MipsShare::new(1, 300.)));
        assert!(scheduler.is_suitable_for_vm(&pes, &MipsShare::new(1, 1000.)));
        assert!(!scheduler.is_suitable_for_vm(&pes, &MipsShare::new(2, 100.)));
    }

    #[test]
    fn rejected_request_leaves_pes_untouched() {
        let mut pes = Pe::list(3, 1000.);
        let mut scheduler = SpaceSharedVmScheduler::new();
        assert!(scheduler.allocate_pes_for_vm(&mut pes, 1, &MipsShare::new(2, 1000.)));
        assert!(!scheduler.allocate_pes_for_vm(&mut pes, 2, &MipsShare::new(2, 1000.)));
        assert_eq!(pes.iter().filter(|pe| pe.is_free()).count(), 1);
        assert_eq!(scheduler.allocated_mips_for_vm(2), 0.);
        assert!(scheduler.deallocate_pes_from_vm(&mut pes, 1));
        assert!(!scheduler.deallocate_pes_from_vm(&mut pes, 1));
        assert_eq!(pes.iter().filter(|pe| pe.is_free()).count(), 3);
    }
}
