//! Migration-aware Worst Fit algorithm with CPU utilization thresholds.

use std::collections::BTreeSet;

use crate::core::config::{parse_option_value, parse_options};
use crate::core::host::Host;
use crate::core::utilization_threshold::{OverUtilizationThreshold, ThresholdMethod};
use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, VmPlacementAlgorithm};
use crate::core::vm_selection_policy::VmSelectionPolicy;

pub const DEFAULT_OVER_UTILIZATION_THRESHOLD: f64 = 0.9;
pub const DEFAULT_UNDER_UTILIZATION_THRESHOLD: f64 = 0.35;

/// Scans hosts in ascending order of CPU utilization and uses the first suitable host
/// which does not become over-utilized after placing the VM.
///
/// Also classifies hosts as over- or under-utilized, which drives migration planning.
pub struct MigrationWorstFit {
    over_utilization_threshold: OverUtilizationThreshold,
    under_utilization_threshold: f64,
    vm_selection_policy: VmSelectionPolicy,
}

impl MigrationWorstFit {
    pub fn new(over_utilization_threshold: OverUtilizationThreshold, under_utilization_threshold: f64) -> Self {
        assert!(
            (0. ..=1.).contains(&under_utilization_threshold),
            "Under-utilization threshold must be in [0, 1], got {}",
            under_utilization_threshold
        );
        match over_utilization_threshold {
            OverUtilizationThreshold::Static(value) => assert!(
                (0. ..=1.).contains(&value) && under_utilization_threshold < value,
                "Over-utilization threshold must be in [0, 1] and above the under-utilization one, got {}",
                value
            ),
            OverUtilizationThreshold::Dynamic {
                safety_parameter,
                fallback,
                ..
            } => {
                assert!(safety_parameter >= 0., "Safety parameter must be non-negative");
                assert!(
                    (0. ..=1.).contains(&fallback),
                    "Fallback threshold must be in [0, 1], got {}",
                    fallback
                );
            }
        }
        Self {
            over_utilization_threshold,
            under_utilization_threshold,
            vm_selection_policy: VmSelectionPolicy::default(),
        }
    }

    pub fn with_vm_selection_policy(mut self, policy: VmSelectionPolicy) -> Self {
        self.vm_selection_policy = policy;
        self
    }

    /// Creates algorithm from options string.
    ///
    /// Supported options: `over` (static threshold) or `safety`, `method` (Mad or Iqr) and `fallback`
    /// (dynamic threshold), `under` and `selection` (MinimumUtilization or MinimumSize).
    pub fn from_str(s: &str) -> Self {
        let options = parse_options(s);
        let under = parse_option_value(&options, "under", s).unwrap_or(DEFAULT_UNDER_UTILIZATION_THRESHOLD);
        let over = match parse_option_value::<f64>(&options, "safety", s) {
            Some(safety_parameter) => OverUtilizationThreshold::Dynamic {
                safety_parameter,
                method: match options.get("method").map(|m| m.as_str()) {
                    None | Some("Mad") => ThresholdMethod::Mad,
                    Some("Iqr") => ThresholdMethod::Iqr,
                    Some(method) => panic!("Unknown threshold method {} in {}", method, s),
                },
                fallback: parse_option_value(&options, "fallback", s).unwrap_or(DEFAULT_OVER_UTILIZATION_THRESHOLD),
            },
            None => OverUtilizationThreshold::Static(
                parse_option_value(&options, "over", s).unwrap_or(DEFAULT_OVER_UTILIZATION_THRESHOLD),
            ),
        };
        let selection = match options.get("selection").map(|m| m.as_str()) {
            None | Some("MinimumUtilization") => VmSelectionPolicy::MinimumUtilization,
            Some("MinimumSize") => VmSelectionPolicy::MinimumSize,
            Some(selection) => panic!("Unknown VM selection policy {} in {}", selection, s),
        };
        Self::new(over, under).with_vm_selection_policy(selection)
    }

    pub fn over_utilization_threshold(&self) -> OverUtilizationThreshold {
        self.over_utilization_threshold
    }

    pub fn under_utilization_threshold(&self) -> f64 {
        self.under_utilization_threshold
    }

    pub fn vm_selection_policy(&self) -> VmSelectionPolicy {
        self.vm_selection_policy
    }

    /// Returns the current over-utilization threshold of the host.
    pub fn host_over_utilization_threshold(&self, host: &Host) -> f64 {
        self.over_utilization_threshold.value(host.utilization_history())
    }

    pub fn is_host_over_utilized(&self, host: &Host) -> bool {
        host.cpu_utilization() > self.host_over_utilization_threshold(host)
    }

    pub fn is_host_under_utilized(&self, host: &Host) -> bool {
        host.cpu_utilization() < self.under_utilization_threshold
    }

    /// Checks whether the host becomes over-utilized after adding the workload of the VM.
    pub fn is_host_over_utilized_after_allocation(&self, host: &Host, vm: &Vm) -> bool {
        let total_mips = host.total_mips();
        if total_mips == 0. {
            return true;
        }
        let utilization = (host.requested_mips() + vm.requested_mips()) / total_mips;
        utilization > self.host_over_utilization_threshold(host)
    }

    fn indices_by_utilization(hosts: &[Host]) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..hosts.len()).collect();
        indices.sort_by(|&a, &b| {
            hosts[a]
                .cpu_utilization()
                .total_cmp(&hosts[b].cpu_utilization())
                .then(hosts[a].id().cmp(&hosts[b].id()))
        });
        indices
    }

    /// Selects host for the VM skipping hosts with the specified IDs.
    pub(crate) fn select_host_excluding(
        &self,
        vm: &Vm,
        candidates: &HostCandidates,
        excluded: &BTreeSet<u32>,
    ) -> Option<u32> {
        Self::indices_by_utilization(candidates.hosts())
            .into_iter()
            .map(|idx| (idx, candidates.host(idx)))
            .find(|(idx, host)| {
                !excluded.contains(&host.id())
                    && candidates.is_suitable(*idx)
                    && !self.is_host_over_utilized_after_allocation(host, vm)
            })
            .map(|(_, host)| host.id())
    }

    /// Returns the least utilized active host below the under-utilization threshold
    /// which runs VMs and is not already engaged in migrations.
    pub fn get_under_utilized_host(&self, hosts: &[Host], excluded: &BTreeSet<u32>) -> Option<u32> {
        Self::indices_by_utilization(hosts)
            .into_iter()
            .map(|idx| &hosts[idx])
            .find(|host| {
                host.is_active()
                    && !excluded.contains(&host.id())
                    && !host.vms().is_empty()
                    && host.vms_migrating_in().is_empty()
                    && host.vms_migrating_out().len() < host.vms().len()
                    && self.is_host_under_utilized(host)
            })
            .map(|host| host.id())
    }
}

impl VmPlacementAlgorithm for MigrationWorstFit {
    fn select_host(&mut self, vm: &Vm, candidates: &HostCandidates) -> Option<u32> {
        self.select_host_excluding(vm, candidates, &BTreeSet::new())
    }
}
