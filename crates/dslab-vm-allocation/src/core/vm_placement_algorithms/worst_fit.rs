//! Worst Fit algorithm.

use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};

/// Uses the suitable host with the most free PEs, ties are broken by the highest host ID.
pub struct WorstFit;

impl WorstFit {
    pub fn new() -> Self {
        Self {}
    }
}

impl VmPlacementAlgorithm for WorstFit {
    fn select_host(&mut self, _vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        candidates
            .suitable_indices()
            .map(|idx| candidates.host(idx))
            .max_by_key(|host| (host.free_pes_number(), host.id()))
            .map(|host| host.id())
    }
}
