//! Random algorithm.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::config::{parse_option_value, parse_options};
use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};

/// Samples uniformly random hosts, at most as many times as there are hosts,
/// and uses the first suitable one.
pub struct Random {
    rng: Pcg64,
}

impl Random {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Creates algorithm from options string like "seed=42", seed is 0 if absent.
    pub fn from_str(s: &str) -> Self {
        let options = parse_options(s);
        Self::new(parse_option_value(&options, "seed", s).unwrap_or(0))
    }
}

impl VmPlacementAlgorithm for Random {
    fn select_host(&mut self, _vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        let count = candidates.len();
        if count == 0 {
            return None;
        }
        for _ in 0..count {
            let idx = self.rng.gen_range(0..count);
            if candidates.is_suitable(idx) {
                return Some(candidates.host(idx).id());
            }
        }
        None
    }
}
