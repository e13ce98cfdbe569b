//! Round Robin algorithm.

use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};

/// Scans hosts like First Fit, but moves the starting host by one position on every call
/// regardless of the result, so that VMs are spread over hosts.
#[derive(Default)]
pub struct RoundRobin {
    last_host_index: usize,
}

impl RoundRobin {
    pub fn new() -> Self {
        Self { last_host_index: 0 }
    }

    pub fn last_host_index(&self) -> usize {
        self.last_host_index
    }
}

impl VmPlacementAlgorithm for RoundRobin {
    fn select_host(&mut self, _vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        let count = candidates.len();
        if count == 0 {
            return None;
        }
        let start = self.last_host_index % count;
        self.last_host_index = (start + 1) % count;
        (0..count)
            .map(|i| (start + i) % count)
            .find(|&idx| candidates.is_suitable(idx))
            .map(|idx| candidates.host(idx).id())
    }
}
