//! First Fit algorithm.

use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};

/// Uses the first suitable host, starting the scan from the host following the last tried one.
///
/// After a successful selection the scan of the next call starts right after the chosen host, so repeated
/// queries for the same VM rotate among suitable hosts instead of returning the same one each time.
/// After a failed search the start position is kept.
#[derive(Default)]
pub struct FirstFit {
    last_host_index: usize,
}

impl FirstFit {
    pub fn new() -> Self {
        Self { last_host_index: 0 }
    }

    /// Returns the index of host where the next scan starts.
    pub fn last_host_index(&self) -> usize {
        self.last_host_index
    }
}

impl VmPlacementAlgorithm for FirstFit {
    fn select_host(&mut self, _vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        let count = candidates.len();
        if count == 0 {
            return None;
        }
        let start = self.last_host_index % count;
        for i in 0..count {
            let idx = (start + i) % count;
            if candidates.is_suitable(idx) {
                self.last_host_index = (idx + 1) % count;
                return Some(candidates.host(idx).id());
            }
        }
        self.last_host_index = start;
        None
    }
}
