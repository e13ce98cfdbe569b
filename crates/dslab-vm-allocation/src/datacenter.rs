//! Datacenter: hosts, submitted VMs and their allocation policy.

use std::collections::BTreeMap;

use crate::core::common::HostSuitability;
use crate::core::config::DatacenterConfig;
use crate::core::context::{AllocationContext, Clock};
use crate::core::host::Host;
use crate::core::pe::Pe;
use crate::core::vertical_scaling::VerticalScalingRequest;
use crate::core::vm::Vm;
use crate::core::vm_allocation_policy::VmAllocationPolicy;
use crate::core::vm_placement_algorithm::{placement_algorithm_resolver, PlacementAlgorithm};
use crate::core::vm_scheduler::vm_scheduler_resolver;
use crate::{log_debug, log_info};

/// Outcome of a single autoscaling round.
#[derive(Debug, Default)]
pub struct AutoscalingReport {
    /// Vertical scaling requests executed by the allocation policy.
    pub scaled: Vec<VerticalScalingRequest>,
    /// Vertical scaling requests which were degenerate or didn't fit the host.
    pub rejected: Vec<VerticalScalingRequest>,
    /// Placement results of VMs supplied by horizontal scaling.
    pub new_vms: Vec<HostSuitability>,
}

/// Datacenter owns hosts (through the allocation policy) and the registry of submitted VMs.
pub struct Datacenter {
    id: u32,
    policy: VmAllocationPolicy,
    vms: BTreeMap<u32, Vm>,
    ctx: AllocationContext,
}

impl Datacenter {
    pub fn new(id: u32, hosts: Vec<Host>, algorithm: PlacementAlgorithm, clock: Clock) -> Self {
        Self {
            id,
            policy: VmAllocationPolicy::new(id, hosts, algorithm, clock.clone()),
            vms: BTreeMap::new(),
            ctx: AllocationContext::new(&format!("datacenter_{}", id), clock),
        }
    }

    /// Creates datacenter with hosts and allocation policy described by the config.
    ///
    /// Hosts get sequential IDs starting from 0 in the order of appearance in the config.
    pub fn from_config(id: u32, config: &DatacenterConfig, clock: Clock) -> Self {
        let mut hosts = Vec::new();
        for host_config in &config.hosts {
            let count = host_config.count.unwrap_or(1);
            for i in 0..count {
                let name = if count == 1 {
                    host_config.name.clone().or_else(|| host_config.name_prefix.clone())
                } else {
                    host_config.name_prefix.as_ref().map(|prefix| format!("{}{}", prefix, i + 1))
                };
                let host_id = hosts.len() as u32;
                let name = name.unwrap_or_else(|| format!("host{}", host_id));
                let vm_scheduler = vm_scheduler_resolver(host_config.vm_scheduler.as_deref().unwrap_or("TimeShared"));
                hosts.push(Host::new(
                    host_id,
                    &name,
                    Pe::list(host_config.pes, host_config.pe_mips),
                    host_config.ram,
                    host_config.bw,
                    host_config.storage,
                    vm_scheduler,
                ));
            }
        }
        let mut datacenter = Self::new(id, hosts, placement_algorithm_resolver(&config.allocation_policy), clock);
        datacenter
            .policy
            .set_host_count_for_parallel_search(config.host_count_for_parallel_search);
        datacenter.policy.set_parallel_search_workers(config.parallel_search_workers);
        datacenter
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn policy(&self) -> &VmAllocationPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut VmAllocationPolicy {
        &mut self.policy
    }

    pub fn hosts(&self) -> &[Host] {
        self.policy.host_list()
    }

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.policy.host(host_id)
    }

    pub fn host_by_name(&self, name: &str) -> Option<&Host> {
        self.hosts().iter().find(|host| host.name() == name)
    }

    pub fn vms(&self) -> &BTreeMap<u32, Vm> {
        &self.vms
    }

    pub fn vm(&self, vm_id: u32) -> Option<&Vm> {
        self.vms.get(&vm_id)
    }

    /// Registers the VM and tries to place it on some host.
    ///
    /// VM stays registered even if there is no suitable host, so that its placement can be retried.
    pub fn submit_vm(&mut self, mut vm: Vm) -> HostSuitability {
        let vm_id = vm.id();
        assert!(
            !self.vms.contains_key(&vm_id),
            "VM with id {} is already submitted to datacenter {}",
            vm_id,
            self.id
        );
        let suitability = self.policy.allocate_host_for_vm(&mut vm);
        self.vms.insert(vm_id, vm);
        suitability
    }

    /// Registers the VM and places it on the specified host bypassing the placement algorithm.
    pub fn submit_vm_on_host(&mut self, mut vm: Vm, host_id: u32) -> HostSuitability {
        let vm_id = vm.id();
        assert!(
            !self.vms.contains_key(&vm_id),
            "VM with id {} is already submitted to datacenter {}",
            vm_id,
            self.id
        );
        let suitability = self.policy.allocate_host_for_vm_on(&mut vm, host_id);
        self.vms.insert(vm_id, vm);
        suitability
    }

    /// Tries to place registered VM which is not running yet.
    pub fn retry_vm(&mut self, vm_id: u32) -> HostSuitability {
        match self.vms.get_mut(&vm_id) {
            Some(vm) => self.policy.allocate_host_for_vm(vm),
            None => HostSuitability::not_found(vm_id),
        }
    }

    /// Removes the VM from datacenter releasing its host resources.
    pub fn destroy_vm(&mut self, vm_id: u32) -> Option<Vm> {
        let mut vm = self.vms.remove(&vm_id)?;
        self.policy.deallocate_host_for_vm(&mut vm);
        log_debug!(self.ctx, "vm #{} destroyed", vm_id);
        Some(vm)
    }

    /// Moves running VM to the specified host.
    pub fn migrate_vm(&mut self, vm_id: u32, host_id: u32) -> HostSuitability {
        match self.vms.get_mut(&vm_id) {
            Some(vm) if vm.is_created() => self.policy.allocate_host_for_vm_on(vm, host_id),
            _ => HostSuitability::new(vm_id, host_id),
        }
    }

    /// Returns migration plan for all running VMs: VM ID -> target host ID.
    pub fn get_optimized_allocation_map(&mut self) -> BTreeMap<u32, u32> {
        let vms: Vec<&Vm> = self.vms.values().filter(|vm| vm.is_created()).collect();
        self.policy.get_optimized_allocation_map(&vms)
    }

    /// Samples load models of running VMs and refreshes host utilization.
    pub fn update_utilization(&mut self, time: f64) {
        for vm in self.vms.values_mut().filter(|vm| vm.is_created()) {
            vm.update_utilization(time);
        }
        self.policy.update_utilization(&self.vms);
    }

    /// Updates utilization at the specified time and evaluates scaling descriptors of running VMs.
    ///
    /// Vertical scaling requests are executed by the allocation policy,
    /// VMs supplied by horizontal scaling are submitted to the datacenter.
    pub fn process_autoscaling(&mut self, time: f64) -> AutoscalingReport {
        self.update_utilization(time);
        let mut report = AutoscalingReport::default();
        let mut new_vms = Vec::new();
        for vm in self.vms.values_mut().filter(|vm| vm.is_created()) {
            for request in vm.check_vertical_scaling(time) {
                if self.policy.scale_vm_vertically(vm, &request) {
                    report.scaled.push(request);
                } else {
                    report.rejected.push(request);
                }
            }
            if let Some(new_vm) = vm.check_horizontal_scaling(time) {
                log_info!(self.ctx, "vm #{} is overloaded, adding vm #{}", vm.id(), new_vm.id());
                new_vms.push(new_vm);
            }
        }
        for vm in new_vms {
            report.new_vms.push(self.submit_vm(vm));
        }
        report
    }
}
