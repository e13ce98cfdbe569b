//! Planning of VM migrations for migration-aware placement.

use std::collections::{BTreeMap, BTreeSet};

use crate::core::host::Host;
use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::HostCandidates;
use crate::core::vm_placement_algorithms::migration_worst_fit::MigrationWorstFit;

fn position(hosts: &[Host], host_id: u32) -> Option<usize> {
    hosts.iter().position(|host| host.id() == host_id)
}

/// Returns VMs to move out of the host so that it stops being over-utilized.
fn select_vms_to_migrate<'a>(
    algorithm: &MigrationWorstFit,
    host: &Host,
    vms: &BTreeMap<u32, &'a Vm>,
) -> Vec<&'a Vm> {
    let mut candidates: Vec<&Vm> = host
        .vms()
        .iter()
        .filter(|vm_id| !host.vms_migrating_out().contains(vm_id))
        .filter_map(|vm_id| vms.get(vm_id).copied())
        .collect();
    let total_mips = host.total_mips();
    let threshold = algorithm.host_over_utilization_threshold(host);
    let mut requested_mips = host.requested_mips();
    let mut selected = Vec::new();
    while total_mips > 0. && requested_mips / total_mips > threshold {
        let vm = match algorithm.vm_selection_policy().select(&candidates) {
            Some(vm) => vm,
            None => break,
        };
        candidates.retain(|candidate| candidate.id() != vm.id());
        requested_mips -= host.vm_requested_mips(vm.id());
        selected.push(vm);
    }
    selected
}

/// Places VMs temporarily on target hosts, the most demanding VMs first.
///
/// Returns VM ID -> target host ID for VMs which found a target.
fn place_temporarily(
    algorithm: &MigrationWorstFit,
    hosts: &mut [Host],
    mut vms: Vec<&Vm>,
    excluded: &BTreeSet<u32>,
    temporary: &mut Vec<(usize, u32)>,
) -> BTreeMap<u32, u32> {
    vms.sort_by(|a, b| b.requested_mips().total_cmp(&a.requested_mips()).then(a.id().cmp(&b.id())));
    let mut targets = BTreeMap::new();
    for vm in vms {
        let mut excluded = excluded.clone();
        excluded.extend(vm.host());
        let candidates = HostCandidates::new(hosts, vm.requirements(), None);
        let host_id = match algorithm.select_host_excluding(vm, &candidates, &excluded) {
            Some(host_id) => host_id,
            None => continue,
        };
        if let Some(idx) = position(hosts, host_id) {
            if hosts[idx].create_temporary_vm(vm).fully() {
                temporary.push((idx, vm.id()));
                targets.insert(vm.id(), host_id);
            }
        }
    }
    targets
}

/// Builds migration plan: VM ID -> target host ID.
///
/// VMs are moved out of over-utilized hosts until these hosts stop being over-utilized,
/// then the least utilized under-utilized host is emptied if all its VMs can be moved.
/// Hosts are left unchanged, all temporary placements are reverted.
pub(crate) fn plan_migrations(algorithm: &MigrationWorstFit, hosts: &mut [Host], vms: &[&Vm]) -> BTreeMap<u32, u32> {
    let vms: BTreeMap<u32, &Vm> = vms.iter().map(|vm| (vm.id(), *vm)).collect();
    let over_utilized: BTreeSet<u32> = hosts
        .iter()
        .filter(|host| algorithm.is_host_over_utilized(host))
        .map(|host| host.id())
        .collect();
    let mut temporary = Vec::new();
    let mut plan = BTreeMap::new();

    for &host_id in &over_utilized {
        let selected = match position(hosts, host_id) {
            Some(idx) => select_vms_to_migrate(algorithm, &hosts[idx], &vms),
            None => continue,
        };
        plan.extend(place_temporarily(algorithm, hosts, selected, &over_utilized, &mut temporary));
    }

    if let Some(host_id) = algorithm.get_under_utilized_host(hosts, &over_utilized) {
        if let Some(idx) = position(hosts, host_id) {
            let resident: Vec<&Vm> = hosts[idx]
                .vms()
                .iter()
                .filter_map(|vm_id| vms.get(vm_id).copied())
                .filter(|vm| !plan.contains_key(&vm.id()))
                .collect();
            if resident.len() == hosts[idx].vms().len() {
                let mut excluded = over_utilized.clone();
                excluded.insert(host_id);
                let mut host_temporary = Vec::new();
                let targets = place_temporarily(algorithm, hosts, resident.clone(), &excluded, &mut host_temporary);
                temporary.extend(host_temporary);
                if targets.len() == resident.len() {
                    plan.extend(targets);
                }
            }
        }
    }

    for (idx, vm_id) in temporary {
        hosts[idx].destroy_temporary_vm(vm_id);
    }
    plan
}
