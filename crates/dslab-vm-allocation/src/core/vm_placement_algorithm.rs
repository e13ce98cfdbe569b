//! Virtual machine placement algorithms.

use crate::core::common::VmRequirements;
use crate::core::config::parse_config_value;
use crate::core::host::Host;
use crate::core::vm::Vm;
use crate::core::vm_placement_algorithms::best_fit::BestFit;
use crate::core::vm_placement_algorithms::first_fit::FirstFit;
use crate::core::vm_placement_algorithms::migration_worst_fit::MigrationWorstFit;
use crate::core::vm_placement_algorithms::random::Random;
use crate::core::vm_placement_algorithms::round_robin::RoundRobin;
use crate::core::vm_placement_algorithms::worst_fit::WorstFit;

/// Read-only view of datacenter hosts for a single VM placement decision.
///
/// Host suitability is either precomputed (e.g. by parallel search) or checked lazily on demand.
pub struct HostCandidates<'a> {
    hosts: &'a [Host],
    requirements: VmRequirements,
    suitable: Option<Vec<bool>>,
}

impl<'a> HostCandidates<'a> {
    pub fn new(hosts: &'a [Host], requirements: VmRequirements, suitable: Option<Vec<bool>>) -> Self {
        if let Some(mask) = &suitable {
            assert_eq!(mask.len(), hosts.len(), "Suitability mask doesn't match host list");
        }
        Self {
            hosts,
            requirements,
            suitable,
        }
    }

    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    pub fn host(&self, idx: usize) -> &'a Host {
        &self.hosts[idx]
    }

    pub fn hosts(&self) -> &'a [Host] {
        self.hosts
    }

    pub fn requirements(&self) -> &VmRequirements {
        &self.requirements
    }

    /// Checks whether the host with the specified index can run the VM.
    pub fn is_suitable(&self, idx: usize) -> bool {
        match &self.suitable {
            Some(mask) => mask[idx],
            None => self.hosts[idx].get_suitability_for(&self.requirements, true).fully(),
        }
    }

    /// Returns indices of suitable hosts in the host list order.
    pub fn suitable_indices(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.hosts.len()).filter(move |&idx| self.is_suitable(idx))
    }
}

/// Trait for implementation of VM placement algorithms.
///
/// The algorithm is defined as a function of VM and current state of datacenter hosts, which returns an
/// ID of host selected for VM placement or `None` if there is not suitable host.
/// The algorithm can keep its own selection bookkeeping, e.g. the position of the last used host.
pub trait VmPlacementAlgorithm {
    fn select_host(&mut self, vm: &Vm, candidates: &HostCandidates) -> Option<u32>;
}

/// Closed set of supported placement algorithms.
pub enum PlacementAlgorithm {
    FirstFit(FirstFit),
    RoundRobin(RoundRobin),
    BestFit(BestFit),
    WorstFit(WorstFit),
    Random(Random),
    MigrationWorstFit(MigrationWorstFit),
}

impl PlacementAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            PlacementAlgorithm::FirstFit(_) => "FirstFit",
            PlacementAlgorithm::RoundRobin(_) => "RoundRobin",
            PlacementAlgorithm::BestFit(_) => "BestFit",
            PlacementAlgorithm::WorstFit(_) => "WorstFit",
            PlacementAlgorithm::Random(_) => "Random",
            PlacementAlgorithm::MigrationWorstFit(_) => "MigrationWorstFit",
        }
    }

    /// Returns migration-aware algorithm, if this is one.
    pub fn as_migration(&self) -> Option<&MigrationWorstFit> {
        match self {
            PlacementAlgorithm::MigrationWorstFit(algorithm) => Some(algorithm),
            _ => None,
        }
    }
}

impl VmPlacementAlgorithm for PlacementAlgorithm {
    fn select_host(&mut self, vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        match self {
            PlacementAlgorithm::FirstFit(algorithm) => algorithm.select_host(vm, candidates),
            PlacementAlgorithm::RoundRobin(algorithm) => algorithm.select_host(vm, candidates),
            PlacementAlgorithm::BestFit(algorithm) => algorithm.select_host(vm, candidates),
            PlacementAlgorithm::WorstFit(algorithm) => algorithm.select_host(vm, candidates),
            PlacementAlgorithm::Random(algorithm) => algorithm.select_host(vm, candidates),
            PlacementAlgorithm::MigrationWorstFit(algorithm) => algorithm.select_host(vm, candidates),
        }
    }
}

pub fn placement_algorithm_resolver(config_str: &str) -> PlacementAlgorithm {
    let (algorithm_name, options) = parse_config_value(config_str);
    match algorithm_name.as_str() {
        "FirstFit" => PlacementAlgorithm::FirstFit(FirstFit::new()),
        "RoundRobin" => PlacementAlgorithm::RoundRobin(RoundRobin::new()),
        "BestFit" => PlacementAlgorithm::BestFit(BestFit::new()),
        "WorstFit" => PlacementAlgorithm::WorstFit(WorstFit::new()),
        "Random" => PlacementAlgorithm::Random(Random::from_str(options.as_deref().unwrap_or(""))),
        "MigrationWorstFit" => {
            PlacementAlgorithm::MigrationWorstFit(MigrationWorstFit::from_str(options.as_deref().unwrap_or("")))
        }
        _ => panic!("Can't resolve: {}", config_str),
    }
}
