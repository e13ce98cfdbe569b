use std::collections::{BTreeMap, BTreeSet};

use sugars::boxed;

use dslab_vm_allocation::core::context::Clock;
use dslab_vm_allocation::core::host::Host;
use dslab_vm_allocation::core::load_model::ConstantLoadModel;
use dslab_vm_allocation::core::pe::Pe;
use dslab_vm_allocation::core::utilization_threshold::{OverUtilizationThreshold, ThresholdMethod};
use dslab_vm_allocation::core::vm::Vm;
use dslab_vm_allocation::core::vm_placement_algorithm::{placement_algorithm_resolver, PlacementAlgorithm};
use dslab_vm_allocation::core::vm_placement_algorithms::migration_worst_fit::MigrationWorstFit;
use dslab_vm_allocation::core::vm_schedulers::time_shared::TimeSharedVmScheduler;
use dslab_vm_allocation::datacenter::Datacenter;

fn host(id: u32) -> Host {
    Host::new(
        id,
        &format!("h{}", id),
        Pe::list(4, 1000.),
        4096,
        10000,
        1_000_000,
        Box::new(TimeSharedVmScheduler::new()),
    )
}

fn vm(id: u32, load: f64) -> Vm {
    Vm::new(id, 1, 1000., 512, 1000, 10000).with_cpu_load_model(boxed!(ConstantLoadModel::new(load)))
}

fn migration_worst_fit() -> PlacementAlgorithm {
    PlacementAlgorithm::MigrationWorstFit(MigrationWorstFit::new(OverUtilizationThreshold::Static(0.8), 0.3))
}

// Host 0 is fully loaded by 4 VMs, host 1 is empty and host 2 runs one VM with 20% load.
fn datacenter(algorithm: PlacementAlgorithm) -> Datacenter {
    let _ = env_logger::builder().is_test(true).try_init();
    let mut dc = Datacenter::new(0, vec![host(0), host(1), host(2)], algorithm, Clock::new());
    for id in 0..4 {
        assert!(dc.submit_vm_on_host(vm(id, 1.), 0).fully());
    }
    assert!(dc.submit_vm_on_host(vm(4, 0.2), 2).fully());
    dc.update_utilization(0.);
    dc
}

#[test]
fn utilization_of_hosts() {
    let dc = datacenter(migration_worst_fit());
    assert_eq!(dc.host(0).unwrap().vms().len(), 4);
    assert_eq!(dc.host(0).unwrap().cpu_utilization(), 1.);
    assert_eq!(dc.host(1).unwrap().cpu_utilization(), 0.);
    assert!((dc.host(2).unwrap().cpu_utilization() - 0.05).abs() < 1e-9);
    assert_eq!(dc.host(2).unwrap().utilization_history().len(), 1);
}

#[test]
fn migration_plan() {
    let mut dc = datacenter(migration_worst_fit());
    let plan = dc.get_optimized_allocation_map();
    assert_eq!(plan, BTreeMap::from([(0, 1), (4, 1)]));

    for host in dc.hosts() {
        assert!(host.vms_migrating_in().is_empty());
    }
    assert_eq!(dc.host(1).unwrap().free_pes_number(), 4);
    assert!(dc.host(1).unwrap().vms().is_empty());
    assert_eq!(dc.host(1).unwrap().requested_mips(), 0.);

    for (vm_id, host_id) in plan {
        assert!(dc.migrate_vm(vm_id, host_id).fully());
    }
    dc.update_utilization(1.);
    assert_eq!(dc.host(0).unwrap().vms().len(), 3);
    assert!(dc.host(2).unwrap().vms().is_empty());
    assert!((dc.host(1).unwrap().cpu_utilization() - 0.3).abs() < 1e-9);
    assert!(dc.get_optimized_allocation_map().is_empty());
}

#[test]
fn no_plan_without_migration_aware_algorithm() {
    let mut dc = datacenter(placement_algorithm_resolver("WorstFit"));
    assert!(dc.get_optimized_allocation_map().is_empty());
    assert_eq!(dc.policy().get_under_utilized_host(&BTreeSet::new()), None);
}

#[test]
fn under_utilized_host() {
    let dc = datacenter(migration_worst_fit());
    assert_eq!(dc.policy().get_under_utilized_host(&BTreeSet::new()), Some(2));
    assert_eq!(dc.policy().get_under_utilized_host(&BTreeSet::from([2])), None);
}

#[test]
// Host whose every VM is already leaving it is not offered for consolidation.
fn under_utilized_host_with_all_vms_migrating_out() {
    let mut dc = datacenter(migration_worst_fit());
    let host = dc.policy_mut().host_mut(2).unwrap();
    assert!(!host.add_vm_migrating_out(0));
    assert!(host.add_vm_migrating_out(4));
    assert!(!host.add_vm_migrating_out(4));
    assert_eq!(host.vms_migrating_out().len(), 1);
    assert_eq!(dc.policy().get_under_utilized_host(&BTreeSet::new()), None);

    assert!(dc.policy_mut().host_mut(2).unwrap().remove_vm_migrating_out(4));
    assert!(dc.host(2).unwrap().vms_migrating_out().is_empty());
    assert_eq!(dc.policy().get_under_utilized_host(&BTreeSet::new()), Some(2));
}

#[test]
// Least utilized host is used unless the VM would overload it.
fn placement_by_utilization() {
    let mut dc = datacenter(migration_worst_fit());
    let mut placed = Vec::new();
    for (time, id) in (10..17).enumerate() {
        placed.push(dc.submit_vm(vm(id, 1.)).host_id);
        dc.update_utilization(time as f64 + 1.);
    }
    // host 2 reaches exactly 80% with the 7th VM, after that both hosts would be over-utilized
    assert_eq!(placed, vec![Some(1), Some(2), Some(1), Some(2), Some(1), Some(2), None]);
    assert!((dc.host(1).unwrap().cpu_utilization() - 0.75).abs() < 1e-9);
    assert!((dc.host(2).unwrap().cpu_utilization() - 0.8).abs() < 1e-9);
}

#[test]
fn dynamic_threshold_uses_fallback_on_short_history() {
    let algorithm = placement_algorithm_resolver("MigrationWorstFit[safety=1.5,method=Iqr,fallback=0.7,under=0.2]");
    let migration = algorithm.as_migration().unwrap();
    assert_eq!(
        migration.over_utilization_threshold(),
        OverUtilizationThreshold::Dynamic {
            safety_parameter: 1.5,
            method: ThresholdMethod::Iqr,
            fallback: 0.7
        }
    );
    assert_eq!(migration.under_utilization_threshold(), 0.2);
    assert_eq!(migration.host_over_utilization_threshold(&host(0)), 0.7);
}

#[test]
fn dynamic_threshold_follows_history() {
    let mut dc = datacenter(placement_algorithm_resolver("MigrationWorstFit[safety=2,method=Mad]"));
    for time in 1..10 {
        dc.update_utilization(time as f64);
    }
    // constant utilization has zero deviation
    let migration = dc.policy().algorithm().as_migration().unwrap();
    assert_eq!(migration.host_over_utilization_threshold(dc.host(0).unwrap()), 1.);
    assert!(!migration.is_host_over_utilized(dc.host(0).unwrap()));
}

#[test]
#[should_panic]
fn over_threshold_below_under_threshold() {
    MigrationWorstFit::new(OverUtilizationThreshold::Static(0.3), 0.5);
}
