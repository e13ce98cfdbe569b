//! VM allocation policy: host selection and placement commit.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::mpsc::channel;
use std::sync::Arc;

use threadpool::ThreadPool;

use crate::core::common::{HostSuitability, ResourceKind, VmRequirements, EPSILON};
use crate::core::context::{AllocationContext, Clock};
use crate::core::host::{Host, PesResizing};
use crate::core::migration::plan_migrations;
use crate::core::vertical_scaling::{VerticalScalingRequest, VmLoadState};
use crate::core::vm::Vm;
use crate::core::vm_placement_algorithm::{HostCandidates, PlacementAlgorithm, VmPlacementAlgorithm};
use crate::{log_debug, log_error, log_info, log_trace, log_warn};

pub const DEFAULT_HOST_COUNT_FOR_PARALLEL_SEARCH: usize = 20_000;
pub const DEFAULT_PARALLEL_SEARCH_WORKERS: usize = 4;

/// External function which replaces the placement algorithm in host selection.
pub type FindHostFn = Box<dyn Fn(&VmAllocationPolicy, &Vm) -> Option<u32>>;

/// Places VMs on datacenter hosts using the configured placement algorithm.
///
/// Policy owns the datacenter hosts. Selection is read-only and can run in parallel over large host lists,
/// while all mutations (placement, release, scaling) go through the policy methods one at a time.
pub struct VmAllocationPolicy {
    datacenter_id: u32,
    hosts: Arc<Vec<Host>>,
    host_index: BTreeMap<u32, usize>,
    algorithm: PlacementAlgorithm,
    find_host_fn: Option<FindHostFn>,
    host_count_for_parallel_search: usize,
    parallel_search_workers: usize,
    search_pool: Option<ThreadPool>,
    ctx: AllocationContext,
}

impl VmAllocationPolicy {
    pub fn new(datacenter_id: u32, hosts: Vec<Host>, algorithm: PlacementAlgorithm, clock: Clock) -> Self {
        let mut host_index = BTreeMap::new();
        for (idx, host) in hosts.iter().enumerate() {
            if host_index.insert(host.id(), idx).is_some() {
                panic!("Duplicate host id {} in datacenter {}", host.id(), datacenter_id);
            }
        }
        Self {
            datacenter_id,
            hosts: Arc::new(hosts),
            host_index,
            algorithm,
            find_host_fn: None,
            host_count_for_parallel_search: DEFAULT_HOST_COUNT_FOR_PARALLEL_SEARCH,
            parallel_search_workers: DEFAULT_PARALLEL_SEARCH_WORKERS,
            search_pool: None,
            ctx: AllocationContext::new(&format!("allocation_policy_{}", datacenter_id), clock),
        }
    }

    pub fn datacenter_id(&self) -> u32 {
        self.datacenter_id
    }

    pub fn context(&self) -> &AllocationContext {
        &self.ctx
    }

    pub fn algorithm(&self) -> &PlacementAlgorithm {
        &self.algorithm
    }

    pub fn host_list(&self) -> &[Host] {
        &self.hosts
    }

    pub fn host(&self, host_id: u32) -> Option<&Host> {
        self.host_index.get(&host_id).map(|&idx| &self.hosts[idx])
    }

    /// Returns mutable host, e.g. to change its PE status or power state.
    pub fn host_mut(&mut self, host_id: u32) -> Option<&mut Host> {
        let idx = *self.host_index.get(&host_id)?;
        Some(&mut Arc::make_mut(&mut self.hosts)[idx])
    }

    fn host_position(&self, host_id: u32) -> usize {
        match self.host_index.get(&host_id) {
            Some(&idx) => idx,
            None => panic!("Host {} doesn't exist in datacenter {}", host_id, self.datacenter_id),
        }
    }

    /// Sets function replacing the placement algorithm in host selection, `None` restores the algorithm.
    pub fn set_find_host_for_vm_function(&mut self, find_host_fn: Option<FindHostFn>) {
        self.find_host_fn = find_host_fn;
    }

    pub fn host_count_for_parallel_search(&self) -> usize {
        self.host_count_for_parallel_search
    }

    /// Sets the minimal number of hosts starting from which host suitability is checked in parallel.
    pub fn set_host_count_for_parallel_search(&mut self, host_count: usize) {
        assert!(host_count > 0, "Host count for parallel search must be positive");
        self.host_count_for_parallel_search = host_count;
    }

    pub fn set_parallel_search_workers(&mut self, workers: usize) {
        assert!(workers > 0, "Number of parallel search workers must be positive");
        self.parallel_search_workers = workers;
        self.search_pool = None;
    }

    /// Checks suitability of all hosts using the thread pool.
    ///
    /// Each worker gets a shared read-only copy of the host list and returns indices of suitable hosts in its chunk.
    fn parallel_suitability(&mut self, req: &VmRequirements) -> Vec<bool> {
        let count = self.hosts.len();
        let workers = self.parallel_search_workers.min(count).max(1);
        let chunk_size = (count + workers - 1) / workers;
        let pool = self.search_pool.get_or_insert_with(|| ThreadPool::new(workers));
        let (tx, rx) = channel();
        for start in (0..count).step_by(chunk_size.max(1)) {
            let hosts = Arc::clone(&self.hosts);
            let tx = tx.clone();
            let req = *req;
            pool.execute(move || {
                let end = (start + chunk_size).min(hosts.len());
                let suitable: Vec<usize> = (start..end)
                    .filter(|&idx| hosts[idx].get_suitability_for(&req, true).fully())
                    .collect();
                drop(hosts);
                tx.send(suitable).unwrap();
            });
        }
        drop(tx);
        let mut mask = vec![false; count];
        for suitable in rx.iter() {
            for idx in suitable {
                mask[idx] = true;
            }
        }
        mask
    }

    /// Selects host for the VM without placing it.
    ///
    /// Uses the external function if it is set, otherwise the placement algorithm.
    pub fn find_host_for_vm(&mut self, vm: &Vm) -> Option<u32> {
        if let Some(find_host_fn) = &self.find_host_fn {
            return find_host_fn(self, vm);
        }
        let req = vm.requirements();
        let suitable = if self.hosts.len() >= self.host_count_for_parallel_search {
            log_trace!(self.ctx, "parallel search of host for vm #{} among {} hosts", vm.id(), self.hosts.len());
            Some(self.parallel_suitability(&req))
        } else {
            None
        };
        let candidates = HostCandidates::new(&self.hosts, req, suitable);
        self.algorithm.select_host(vm, &candidates)
    }

    /// Finds suitable host for the VM and places the VM there.
    pub fn allocate_host_for_vm(&mut self, vm: &mut Vm) -> HostSuitability {
        if vm.is_created() {
            log_warn!(self.ctx, "vm #{} is already placed on host #{}", vm.id(), vm.host().unwrap_or_default());
            return HostSuitability::not_found(vm.id());
        }
        match self.find_host_for_vm(vm) {
            Some(host_id) => self.allocate_host_for_vm_on(vm, host_id),
            None => {
                log_debug!(self.ctx, "no suitable host for vm #{}", vm.id());
                HostSuitability::not_found(vm.id())
            }
        }
    }

    /// Places the VM on the specified host, activating the host if needed.
    ///
    /// If the VM already runs on another host, it is moved to the specified one and
    /// the resources on the previous host are released. Panics if the host doesn't exist.
    pub fn allocate_host_for_vm_on(&mut self, vm: &mut Vm, host_id: u32) -> HostSuitability {
        let idx = self.host_position(host_id);
        let previous_host = vm.host();
        if previous_host == Some(host_id) {
            log_warn!(self.ctx, "vm #{} is already placed on host #{}", vm.id(), host_id);
            return HostSuitability::new(vm.id(), host_id);
        }
        let host = &mut Arc::make_mut(&mut self.hosts)[idx];
        let suitability = host.get_suitability_for(&vm.requirements(), false);
        if !suitability.fully() {
            log_debug!(self.ctx, "{}", suitability);
            return suitability;
        }
        if host.set_active(true) {
            log_debug!(self.ctx, "host #{} activated", host_id);
        }
        let suitability = host.create_vm(vm);
        if !suitability.fully() {
            log_debug!(self.ctx, "{}", suitability);
            return suitability;
        }
        vm.set_start_time(self.ctx.time());
        match previous_host {
            Some(previous_id) => {
                let previous_idx = self.host_position(previous_id);
                Arc::make_mut(&mut self.hosts)[previous_idx].remove_vm(vm.id());
                log_debug!(self.ctx, "vm #{} migrated from host #{} to host #{}", vm.id(), previous_id, host_id);
            }
            None => {
                log_debug!(self.ctx, "vm #{} allocated on host #{}", vm.id(), host_id);
            }
        }
        suitability
    }

    /// Removes the VM from its host and releases the host resources.
    pub fn deallocate_host_for_vm(&mut self, vm: &mut Vm) -> bool {
        let host_id = match vm.host() {
            Some(host_id) => host_id,
            None => return false,
        };
        let idx = self.host_position(host_id);
        let released = Arc::make_mut(&mut self.hosts)[idx].destroy_vm(vm);
        if released {
            log_debug!(self.ctx, "release resources from vm #{} on host #{}", vm.id(), host_id);
        }
        released
    }

    /// Executes vertical scaling request for the VM running on one of the datacenter hosts.
    ///
    /// Returns false if the request is degenerate or the host has no capacity for it, nothing is changed then.
    pub fn scale_vm_vertically(&mut self, vm: &mut Vm, request: &VerticalScalingRequest) -> bool {
        assert_eq!(vm.id(), request.vm_id, "Scaling request doesn't belong to vm #{}", vm.id());
        if request.state == VmLoadState::Normal {
            return false;
        }
        let host_id = match vm.host() {
            Some(host_id) => host_id,
            None => {
                log_warn!(self.ctx, "vm #{} is not placed, can't scale its {}", vm.id(), request.resource);
                return false;
            }
        };
        match request.resource {
            ResourceKind::Cpu => self.scale_vm_pes(vm, host_id, request),
            kind => self.scale_vm_resource(vm, host_id, kind, request),
        }
    }

    fn scale_vm_pes(&mut self, vm: &mut Vm, host_id: u32, request: &VerticalScalingRequest) -> bool {
        let delta = (request.amount + EPSILON).floor();
        if delta < 1. {
            log_debug!(self.ctx, "nothing to scale for cpu of vm #{}", vm.id());
            return false;
        }
        let delta = delta as u64;
        let pes = vm.pes();
        let new_pes = if request.state == VmLoadState::Overloaded {
            pes + delta
        } else if delta < pes {
            pes - delta
        } else {
            log_warn!(self.ctx, "can't remove {} PEs from vm #{} which has {} PEs", delta, vm.id(), pes);
            return false;
        };
        let idx = self.host_position(host_id);
        let host = &mut Arc::make_mut(&mut self.hosts)[idx];
        if new_pes > pes && !host.is_suitable_for_extra_pes(vm, delta) {
            log_warn!(
                self.ctx,
                "host #{} has no {} more PEs of {} MIPS for vm #{}",
                host_id,
                delta,
                vm.mips(),
                vm.id()
            );
            return false;
        }
        match host.resize_vm_pes(vm, new_pes) {
            PesResizing::Resized => {}
            PesResizing::Rejected => {
                log_warn!(self.ctx, "can't resize vm #{} to {} PEs on host #{}", vm.id(), new_pes, host_id);
                return false;
            }
            PesResizing::Lost => {
                log_error!(
                    self.ctx,
                    "vm #{} lost its {} PEs on host #{} while resizing to {} PEs",
                    vm.id(),
                    pes,
                    host_id,
                    new_pes
                );
                return false;
            }
        }
        log_info!(self.ctx, "vm #{} cpu scaled from {} to {} PEs on host #{}", vm.id(), pes, new_pes, host_id);
        true
    }

    fn scale_vm_resource(
        &mut self,
        vm: &mut Vm,
        host_id: u32,
        kind: ResourceKind,
        request: &VerticalScalingRequest,
    ) -> bool {
        let amount = (request.amount + EPSILON).floor();
        if amount < 1. {
            log_debug!(self.ctx, "nothing to scale for {} of vm #{}", kind, vm.id());
            return false;
        }
        let amount = amount as u64;
        let capacity = vm.resource(kind).capacity();
        let idx = self.host_position(host_id);
        let host = &mut Arc::make_mut(&mut self.hosts)[idx];
        let new_capacity = if request.state == VmLoadState::Overloaded {
            if !host.provisioner(kind).is_amount_available(amount) {
                log_warn!(
                    self.ctx,
                    "host #{} has only {} of {} available, vm #{} requested {} more",
                    host_id,
                    host.provisioner(kind).available(),
                    kind,
                    vm.id(),
                    amount
                );
                return false;
            }
            capacity + amount
        } else {
            match capacity.checked_sub(amount) {
                Some(new_capacity) if new_capacity > 0 => new_capacity,
                Some(_) => {
                    log_warn!(self.ctx, "can't remove all {} of vm #{}", kind, vm.id());
                    return false;
                }
                None => {
                    log_error!(
                        self.ctx,
                        "can't remove {} of {} from vm #{} which has only {}",
                        amount,
                        kind,
                        vm.id(),
                        capacity
                    );
                    return false;
                }
            }
        };
        if !host.allocate_resource_for_vm(kind, vm, new_capacity) {
            log_error!(
                self.ctx,
                "{} provisioner of host #{} failed to set {} for vm #{}",
                kind,
                host_id,
                new_capacity,
                vm.id()
            );
            return false;
        }
        log_info!(
            self.ctx,
            "vm #{} {} scaled from {} to {} on host #{}",
            vm.id(),
            kind,
            capacity,
            new_capacity,
            host_id
        );
        true
    }

    /// Refreshes host utilization using the current state of datacenter VMs.
    pub fn update_utilization(&mut self, vms: &BTreeMap<u32, Vm>) {
        for host in Arc::make_mut(&mut self.hosts).iter_mut() {
            let resident: Vec<&Vm> = host.vms().iter().filter_map(|vm_id| vms.get(vm_id)).collect();
            host.update_utilization(resident);
        }
    }

    /// Returns the least utilized host which can be emptied by migration,
    /// available only for migration-aware algorithm.
    pub fn get_under_utilized_host(&self, excluded: &BTreeSet<u32>) -> Option<u32> {
        self.algorithm
            .as_migration()
            .and_then(|algorithm| algorithm.get_under_utilized_host(&self.hosts, excluded))
    }

    /// Proposes migrations of the VMs which improve host utilization: VM ID -> target host ID.
    ///
    /// Only migration-aware algorithm proposes migrations, the plan is empty for other ones.
    /// Migrations themselves are executed by the caller via [`allocate_host_for_vm_on`](Self::allocate_host_for_vm_on).
    pub fn get_optimized_allocation_map(&mut self, vms: &[&Vm]) -> BTreeMap<u32, u32> {
        let algorithm = match self.algorithm.as_migration() {
            Some(algorithm) => algorithm,
            None => return BTreeMap::new(),
        };
        let plan = plan_migrations(algorithm, Arc::make_mut(&mut self.hosts).as_mut_slice(), vms);
        for (vm_id, host_id) in &plan {
            log_debug!(self.ctx, "vm #{} is proposed to migrate to host #{}", vm_id, host_id);
        }
        plan
    }
}
