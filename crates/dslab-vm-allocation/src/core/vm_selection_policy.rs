//! Selection of VMs to migrate out of over-utilized host.

use serde::Serialize;

use crate::core::vm::Vm;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub enum VmSelectionPolicy {
    /// VM with the lowest CPU utilization first.
    #[default]
    MinimumUtilization,
    /// VM requesting the fewest MIPS first.
    MinimumSize,
}

impl VmSelectionPolicy {
    /// Returns the first VM to migrate among the candidates, ties are broken by VM id.
    pub fn select<'a>(&self, candidates: &[&'a Vm]) -> Option<&'a Vm> {
        let key = |vm: &Vm| match self {
            VmSelectionPolicy::MinimumUtilization => vm.cpu_utilization(),
            VmSelectionPolicy::MinimumSize => vm.requested_mips(),
        };
        candidates
            .iter()
            .copied()
            .min_by(|a, b| key(a).total_cmp(&key(b)).then(a.id().cmp(&b.id())))
    }
}
