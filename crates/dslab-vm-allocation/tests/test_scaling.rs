use sugars::{boxed, rc, refcell};

use dslab_vm_allocation::core::common::ResourceKind;
use dslab_vm_allocation::core::context::Clock;
use dslab_vm_allocation::core::horizontal_scaling::HorizontalVmScaling;
use dslab_vm_allocation::core::host::Host;
use dslab_vm_allocation::core::load_model::{ConstantLoadModel, StepLoadModel};
use dslab_vm_allocation::core::pe::Pe;
use dslab_vm_allocation::core::vertical_scaling::{
    ResourceScaling, VerticalScalingRequest, VerticalVmScaling, VmLoadState,
};
use dslab_vm_allocation::core::vm::Vm;
use dslab_vm_allocation::core::vm_allocation_policy::VmAllocationPolicy;
use dslab_vm_allocation::core::vm_placement_algorithm::PlacementAlgorithm;
use dslab_vm_allocation::core::vm_placement_algorithms::first_fit::FirstFit;
use dslab_vm_allocation::core::vm_schedulers::space_shared::SpaceSharedVmScheduler;
use dslab_vm_allocation::core::vm_schedulers::time_shared::TimeSharedVmScheduler;
use dslab_vm_allocation::datacenter::Datacenter;

fn host(id: u32, pes: u32) -> Host {
    Host::new(
        id,
        &format!("h{}", id),
        Pe::list(pes, 1000.),
        2048,
        10000,
        1_000_000,
        Box::new(TimeSharedVmScheduler::new()),
    )
}

fn policy(pes: u32) -> VmAllocationPolicy {
    VmAllocationPolicy::new(0, vec![host(0, pes)], PlacementAlgorithm::FirstFit(FirstFit::new()), Clock::new())
}

fn datacenter(hosts: Vec<Host>, clock: Clock) -> Datacenter {
    let _ = env_logger::builder().is_test(true).try_init();
    Datacenter::new(0, hosts, PlacementAlgorithm::FirstFit(FirstFit::new()), clock)
}

fn placed_vm(policy: &mut VmAllocationPolicy, pes: u64) -> Vm {
    let mut vm = Vm::new(0, pes, 1000., 512, 1000, 10000);
    assert!(policy.allocate_host_for_vm(&mut vm).fully());
    vm
}

fn request(resource: ResourceKind, state: VmLoadState, amount: f64) -> VerticalScalingRequest {
    VerticalScalingRequest {
        vm_id: 0,
        resource,
        state,
        amount,
    }
}

#[test]
// VM with 10 PEs gets one more PE once its CPU utilization rises above 0.7.
fn cpu_upscale_on_overload() {
    let clock = Clock::new();
    let mut dc = datacenter(vec![host(0, 16)], clock.clone());
    let vm = Vm::new(0, 10, 1000., 512, 1000, 10000)
        .with_cpu_load_model(boxed!(StepLoadModel::new(vec![
            (0., 0.5),
            (1., 0.6),
            (2., 0.8),
            (3., 0.6)
        ])))
        .with_vertical_scaling(VerticalVmScaling::new(ResourceKind::Cpu, 0.1).with_thresholds(0.4, 0.7));
    assert!(dc.submit_vm(vm).fully());

    let mut upscales = 0;
    for time in 0..4 {
        clock.set_time(time as f64);
        let report = dc.process_autoscaling(time as f64);
        assert!(report.rejected.is_empty());
        for request in &report.scaled {
            assert_eq!(request.state, VmLoadState::Overloaded);
            assert_eq!(request.resource, ResourceKind::Cpu);
            upscales += 1;
        }
    }
    assert_eq!(upscales, 1);
    assert_eq!(dc.vm(0).unwrap().pes(), 11);
    assert_eq!(dc.host(0).unwrap().free_pes_number(), 5);
}

#[test]
fn scaling_is_evaluated_once_per_time() {
    let clock = Clock::new();
    let mut dc = datacenter(vec![host(0, 16)], clock);
    let vm = Vm::new(0, 2, 1000., 512, 1000, 10000)
        .with_vertical_scaling(VerticalVmScaling::new(ResourceKind::Cpu, 0.5).with_thresholds(0.2, 0.9));
    assert!(dc.submit_vm(vm).fully());

    assert_eq!(dc.process_autoscaling(1.).scaled.len(), 1);
    assert_eq!(dc.process_autoscaling(1.).scaled.len(), 0);
    assert_eq!(dc.vm(0).unwrap().pes(), 3);
    assert_eq!(dc.process_autoscaling(2.).scaled.len(), 1);
    assert_eq!(dc.vm(0).unwrap().pes(), 4);
}

#[test]
fn cpu_downscale_cannot_remove_all_pes() {
    let mut policy = policy(4);
    let mut vm = placed_vm(&mut policy, 1);
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Underloaded, 5.)));
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Underloaded, 1.)));
    assert_eq!(vm.pes(), 1);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 3);
}

#[test]
fn cpu_scaling_below_one_pe_is_noop() {
    let mut policy = policy(4);
    let mut vm = placed_vm(&mut policy, 2);
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Overloaded, 0.6)));
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Normal, 1.)));
    assert_eq!(vm.pes(), 2);
}

#[test]
fn cpu_upscale_requires_host_headroom() {
    let mut policy = policy(4);
    let mut vm = placed_vm(&mut policy, 3);
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Overloaded, 2.)));
    assert_eq!(vm.pes(), 3);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 1);

    assert!(policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Overloaded, 1.)));
    assert_eq!(vm.pes(), 4);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 0);
}

#[test]
// Each virtual PE holds an exclusive physical PE, so upscaling needs free PEs on the host.
fn cpu_scaling_on_space_shared_host() {
    let host = Host::new(
        0,
        "h0",
        Pe::list(4, 1000.),
        2048,
        10000,
        1_000_000,
        Box::new(SpaceSharedVmScheduler::new()),
    );
    let mut policy =
        VmAllocationPolicy::new(0, vec![host], PlacementAlgorithm::FirstFit(FirstFit::new()), Clock::new());
    let mut first = Vm::new(0, 2, 1000., 512, 1000, 10000);
    let mut second = Vm::new(1, 1, 1000., 512, 1000, 10000);
    assert!(policy.allocate_host_for_vm(&mut first).fully());
    assert!(policy.allocate_host_for_vm(&mut second).fully());
    let second_upscale = VerticalScalingRequest {
        vm_id: 1,
        resource: ResourceKind::Cpu,
        state: VmLoadState::Overloaded,
        amount: 1.,
    };

    assert!(policy.scale_vm_vertically(&mut first, &request(ResourceKind::Cpu, VmLoadState::Overloaded, 1.)));
    assert_eq!(first.pes(), 3);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 0);
    assert!(!policy.scale_vm_vertically(&mut second, &second_upscale));
    assert_eq!(second.pes(), 1);

    assert!(policy.scale_vm_vertically(&mut first, &request(ResourceKind::Cpu, VmLoadState::Underloaded, 2.)));
    assert_eq!(first.pes(), 1);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 2);
    assert_eq!(policy.host(0).unwrap().vm_scheduler().allocated_mips_for_vm(0), 1000.);

    assert!(policy.scale_vm_vertically(&mut second, &second_upscale));
    assert_eq!(second.pes(), 2);
    assert_eq!(policy.host(0).unwrap().free_pes_number(), 1);
}

#[test]
fn cpu_downscale_releases_pes() {
    let mut policy = policy(4);
    let mut vm = placed_vm(&mut policy, 4);
    assert!(policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Underloaded, 2.)));
    assert_eq!(vm.pes(), 2);
    let host = policy.host(0).unwrap();
    assert_eq!(host.free_pes_number(), 2);
    assert_eq!(host.vm_scheduler().allocated_mips_for_vm(0), 2000.);
}

#[test]
fn ram_and_bandwidth_scaling() {
    let mut policy = policy(4);
    let mut vm = placed_vm(&mut policy, 1);

    assert!(policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Ram, VmLoadState::Overloaded, 512.)));
    assert_eq!(vm.ram().capacity(), 1024);
    assert_eq!(policy.host(0).unwrap().ram().available(), 1024);

    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Ram, VmLoadState::Overloaded, 2000.)));
    assert_eq!(vm.ram().capacity(), 1024);
    assert_eq!(policy.host(0).unwrap().ram().available(), 1024);

    assert!(policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Ram, VmLoadState::Underloaded, 256.7)));
    assert_eq!(vm.ram().capacity(), 768);
    assert_eq!(policy.host(0).unwrap().ram().available(), 1280);

    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Ram, VmLoadState::Underloaded, 5000.)));
    assert_eq!(vm.ram().capacity(), 768);

    assert!(policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Bandwidth, VmLoadState::Overloaded, 1000.)));
    assert_eq!(vm.bw().capacity(), 2000);
    assert_eq!(policy.host(0).unwrap().bw().available(), 8000);
}

#[test]
fn unplaced_vm_is_not_scaled() {
    let mut policy = policy(4);
    let mut vm = Vm::new(0, 1, 1000., 512, 1000, 10000);
    assert!(!policy.scale_vm_vertically(&mut vm, &request(ResourceKind::Cpu, VmLoadState::Overloaded, 1.)));
    assert_eq!(vm.pes(), 1);
}

#[test]
// RAM is resized at once so that the usage of 900 MB is at the upper threshold.
fn instantaneous_ram_scaling() {
    let clock = Clock::new();
    let mut dc = datacenter(vec![host(0, 4)], clock);
    let vm = Vm::new(0, 1, 1000., 1000, 1000, 10000)
        .with_ram_load_model(boxed!(ConstantLoadModel::new(0.9)))
        .with_vertical_scaling(
            VerticalVmScaling::new(ResourceKind::Ram, 0.5)
                .with_thresholds(0.2, 0.8)
                .with_resource_scaling(ResourceScaling::Instantaneous),
        );
    assert!(dc.submit_vm(vm).fully());

    let report = dc.process_autoscaling(0.);
    assert_eq!(report.scaled.len(), 1);
    assert_eq!(dc.vm(0).unwrap().ram().capacity(), 1125);
    assert_eq!(dc.host(0).unwrap().ram().available(), 2048 - 1125);
}

#[test]
fn gradual_scaling_amount() {
    let vm = Vm::new(0, 8, 1000., 1000, 1000, 10000).with_cpu_load_model(boxed!(ConstantLoadModel::new(0.1)));
    let scaling = VerticalVmScaling::new(ResourceKind::Cpu, 0.25).with_thresholds(0.3, 0.9);
    assert_eq!(scaling.load_state(&vm), VmLoadState::Underloaded);
    assert_eq!(scaling.resource_amount_to_scale(&vm, VmLoadState::Underloaded), 2.);
    assert_eq!(scaling.resource_amount_to_scale(&vm, VmLoadState::Normal), 0.);
}

#[test]
fn scaling_ignores_vm_which_is_not_created() {
    let vm = Vm::new(0, 8, 1000., 1000, 1000, 10000);
    let mut scaling = VerticalVmScaling::new(ResourceKind::Cpu, 0.25).with_thresholds(0.3, 0.5);
    assert_eq!(scaling.check(&vm, 0.), None);
}

#[test]
fn horizontal_scaling_adds_vms() {
    let clock = Clock::new();
    let mut dc = datacenter(vec![host(0, 4), host(1, 4)], clock);
    let next_id = rc!(refcell!(100));
    let next_id_in_supplier = next_id.clone();
    let scaling = HorizontalVmScaling::new(
        boxed!(move || {
            let mut next_id = next_id_in_supplier.borrow_mut();
            *next_id += 1;
            Vm::new(*next_id - 1, 2, 1000., 512, 1000, 10000)
        }),
        boxed!(|vm: &Vm| vm.cpu_utilization() > 0.8),
    );
    let vm = Vm::new(0, 2, 1000., 512, 1000, 10000).with_horizontal_scaling(scaling);
    assert!(dc.submit_vm(vm).fully());

    let report = dc.process_autoscaling(1.);
    assert_eq!(report.new_vms.len(), 1);
    assert!(report.new_vms[0].fully());
    assert_eq!(report.new_vms[0].vm_id, 100);
    assert!(dc.vm(100).unwrap().is_created());
    assert_eq!(dc.vm(0).unwrap().pes(), 2);

    assert!(dc.process_autoscaling(1.).new_vms.is_empty());
    assert_eq!(*next_id.borrow(), 101);

    let report = dc.process_autoscaling(2.);
    assert_eq!(report.new_vms.len(), 1);
    assert_eq!(dc.vms().len(), 3);
}

#[test]
fn horizontal_scaling_skips_normal_load() {
    let scaling = HorizontalVmScaling::new(
        boxed!(|| Vm::new(1, 1, 1000., 512, 1000, 10000)),
        boxed!(|vm: &Vm| vm.cpu_utilization() > 0.8),
    );
    let vm = Vm::new(0, 1, 1000., 512, 1000, 10000).with_cpu_load_model(boxed!(ConstantLoadModel::new(0.5)));
    assert!(!scaling.is_overloaded(&vm));
}

#[test]
#[should_panic]
fn zero_scaling_factor() {
    VerticalVmScaling::new(ResourceKind::Cpu, 0.);
}

#[test]
#[should_panic]
fn inverted_thresholds() {
    VerticalVmScaling::new(ResourceKind::Ram, 0.1).with_thresholds(0.8, 0.2);
}

#[test]
#[should_panic]
fn storage_scaling() {
    VerticalVmScaling::new(ResourceKind::Storage, 0.1);
}
