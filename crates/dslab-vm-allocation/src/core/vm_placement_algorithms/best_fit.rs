//! Best Fit algorithm.

use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};

/// Uses the suitable host with the fewest free PEs, ties are broken by the lowest host ID.
pub struct BestFit;

impl BestFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementAlgorithm for BestFit {
    fn select_host(&mut self, _vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        let mut result: Option<u32> = None;
        let mut min_free_pes = usize::MAX;

        for idx in candidates.suitable_indices() {
            let host = candidates.host(idx);
            let free_pes = host.free_pes_number();
            let better =
                free_pes < min_free_pes || (free_pes == min_free_pes && result.map_or(true, |id| host.id() < id));
            if better {
                min_free_pes = free_pes;
                result = Some(host.id());
            }
        }
        result
    }
}
