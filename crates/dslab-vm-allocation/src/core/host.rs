//! Physical host and its resource accounting.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::core::common::{HostSuitability, ResourceKind, VmRequirements};
use crate::core::pe::{Pe, PeStatus};
use crate::core::resource_provisioner::ResourceProvisioner;
use crate::core::vm::Vm;
use crate::core::vm_scheduler::{MipsShare, VmScheduler};

/// Number of CPU utilization samples kept in host history.
pub const MAX_UTILIZATION_HISTORY: usize = 30;

/// Physical host which runs VMs.
///
/// Host owns its PEs, the VM scheduler sharing PEs among VMs and the provisioners of RAM, bandwidth and storage.
/// The sum of resources granted to resident VMs never exceeds the host capacity.
///
/// Besides resident VMs, host can hold temporary VMs which are placed during migration planning
/// to project the host state. Such VMs are reported as migrating in.
/// Outcome of changing the number of PEs of a resident VM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PesResizing {
    Resized,
    /// The new share can't be granted, the previous one is restored.
    Rejected,
    /// Neither the new nor the previous share could be granted, the VM is left without PEs.
    Lost,
}

impl PesResizing {
    pub fn is_resized(&self) -> bool {
        *self == PesResizing::Resized
    }
}

#[derive(Clone)]
pub struct Host {
    id: u32,
    name: String,
    pes: Vec<Pe>,
    vm_scheduler: Box<dyn VmScheduler>,
    ram: ResourceProvisioner,
    bw: ResourceProvisioner,
    storage: ResourceProvisioner,
    active: bool,
    vms: BTreeSet<u32>,
    vms_migrating_in: BTreeSet<u32>,
    vms_migrating_out: BTreeSet<u32>,
    requested_mips: BTreeMap<u32, f64>,
    utilization_history: VecDeque<f64>,
}

impl Host {
    /// Creates active host with the specified PEs, RAM (MB), bandwidth (Mbps) and storage (MB) capacity.
    pub fn new(
        id: u32,
        name: &str,
        pes: Vec<Pe>,
        ram: u64,
        bw: u64,
        storage: u64,
        vm_scheduler: Box<dyn VmScheduler>,
    ) -> Self {
        assert!(!pes.is_empty(), "Host {} must have at least one PE", name);
        Self {
            id,
            name: name.to_string(),
            pes,
            vm_scheduler,
            ram: ResourceProvisioner::new(ResourceKind::Ram, ram),
            bw: ResourceProvisioner::new(ResourceKind::Bandwidth, bw),
            storage: ResourceProvisioner::new(ResourceKind::Storage, storage),
            active: true,
            vms: BTreeSet::new(),
            vms_migrating_in: BTreeSet::new(),
            vms_migrating_out: BTreeSet::new(),
            requested_mips: BTreeMap::new(),
            utilization_history: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pes(&self) -> &[Pe] {
        &self.pes
    }

    /// Returns the number of PEs which have not failed.
    pub fn working_pes_number(&self) -> usize {
        self.pes.iter().filter(|pe| pe.is_working()).count()
    }

    /// Returns the number of working PEs without any MIPS granted to VMs.
    pub fn free_pes_number(&self) -> usize {
        self.pes.iter().filter(|pe| pe.is_free()).count()
    }

    /// Returns total MIPS of working PEs.
    pub fn total_mips(&self) -> f64 {
        self.pes.iter().filter(|pe| pe.is_working()).map(|pe| pe.mips()).sum()
    }

    /// Returns MIPS of working PEs not granted to VMs.
    pub fn available_mips(&self) -> f64 {
        self.pes.iter().map(|pe| pe.available_mips()).sum()
    }

    pub fn vm_scheduler(&self) -> &dyn VmScheduler {
        self.vm_scheduler.as_ref()
    }

    /// Returns provisioner of the specified non-CPU resource kind.
    pub fn provisioner(&self, kind: ResourceKind) -> &ResourceProvisioner {
        match kind {
            ResourceKind::Ram => &self.ram,
            ResourceKind::Bandwidth => &self.bw,
            ResourceKind::Storage => &self.storage,
            ResourceKind::Cpu => panic!("CPU of host {} is not provisioned by resource provisioner", self.name),
        }
    }

    fn provisioner_mut(&mut self, kind: ResourceKind) -> &mut ResourceProvisioner {
        match kind {
            ResourceKind::Ram => &mut self.ram,
            ResourceKind::Bandwidth => &mut self.bw,
            ResourceKind::Storage => &mut self.storage,
            ResourceKind::Cpu => panic!("CPU of host {} is not provisioned by resource provisioner", self.name),
        }
    }

    pub fn ram(&self) -> &ResourceProvisioner {
        &self.ram
    }

    pub fn bw(&self) -> &ResourceProvisioner {
        &self.bw
    }

    pub fn storage(&self) -> &ResourceProvisioner {
        &self.storage
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Sets host power state. Returns true if the state was changed.
    pub fn set_active(&mut self, active: bool) -> bool {
        let changed = self.active != active;
        self.active = active;
        changed
    }

    /// Host is failed when none of its PEs works. Failed host can't be activated.
    pub fn is_failed(&self) -> bool {
        self.working_pes_number() == 0
    }

    /// Changes the status of PE with the specified id. Returns false if there is no such PE.
    ///
    /// Only failure is set explicitly, `Free` and `Busy` both mean that PE works
    /// and the actual one is derived from MIPS granted to VMs.
    pub fn set_pe_status(&mut self, pe_id: u32, status: PeStatus) -> bool {
        match self.pes.iter_mut().find(|pe| pe.id() == pe_id) {
            Some(pe) => {
                pe.set_failed(status == PeStatus::Failed);
                true
            }
            None => false,
        }
    }

    /// Returns IDs of resident VMs.
    pub fn vms(&self) -> &BTreeSet<u32> {
        &self.vms
    }

    pub fn vms_migrating_in(&self) -> &BTreeSet<u32> {
        &self.vms_migrating_in
    }

    pub fn vms_migrating_out(&self) -> &BTreeSet<u32> {
        &self.vms_migrating_out
    }

    /// Marks resident VM as migrating out of this host.
    pub fn add_vm_migrating_out(&mut self, vm_id: u32) -> bool {
        self.vms.contains(&vm_id) && self.vms_migrating_out.insert(vm_id)
    }

    pub fn remove_vm_migrating_out(&mut self, vm_id: u32) -> bool {
        self.vms_migrating_out.remove(&vm_id)
    }

    /// Checks whether the host can run a VM with the specified requirements.
    ///
    /// Resources are checked in the following order: PEs, RAM, bandwidth, storage.
    /// In lazy mode the check stops at the first unsatisfied resource, leaving the rest verdicts `false`.
    pub fn get_suitability_for(&self, req: &VmRequirements, lazy: bool) -> HostSuitability {
        let mut suitability = HostSuitability::new(req.vm_id, self.id);
        if self.is_failed() {
            return suitability;
        }
        suitability.for_pes = self
            .vm_scheduler
            .is_suitable_for_vm(&self.pes, &MipsShare::new(req.pes, req.mips));
        if lazy && !suitability.for_pes {
            return suitability;
        }
        suitability.for_ram = self.ram.is_amount_available(req.ram);
        if lazy && !suitability.for_ram {
            return suitability;
        }
        suitability.for_bw = self.bw.is_amount_available(req.bw);
        if lazy && !suitability.for_bw {
            return suitability;
        }
        suitability.for_storage = self.storage.is_amount_available(req.storage);
        suitability
    }

    pub fn is_suitable_for_vm(&self, vm: &Vm) -> bool {
        self.get_suitability_for(&vm.requirements(), true).fully()
    }

    /// Checks whether the resident VM can get `extra_pes` more PEs at its MIPS rate.
    pub fn is_suitable_for_extra_pes(&self, vm: &Vm, extra_pes: u64) -> bool {
        self.vms.contains(&vm.id())
            && vm.pes() + extra_pes <= self.working_pes_number() as u64
            && self
                .vm_scheduler
                .is_suitable_for_vm(&self.pes, &MipsShare::new(extra_pes, vm.mips()))
    }

    fn hosts_vm(&self, vm_id: u32) -> bool {
        self.vms.contains(&vm_id) || self.vms_migrating_in.contains(&vm_id)
    }

    fn reserve(&mut self, req: &VmRequirements) -> bool {
        let share = MipsShare::new(req.pes, req.mips);
        if !self.vm_scheduler.allocate_pes_for_vm(&mut self.pes, req.vm_id, &share) {
            return false;
        }
        let reserved = self.ram.reserve(req.vm_id, req.ram)
            && self.bw.reserve(req.vm_id, req.bw)
            && self.storage.reserve(req.vm_id, req.storage);
        if !reserved {
            self.release(req.vm_id);
        }
        reserved
    }

    fn release(&mut self, vm_id: u32) {
        self.vm_scheduler.deallocate_pes_from_vm(&mut self.pes, vm_id);
        self.ram.deallocate_resource_for_vm(vm_id);
        self.bw.deallocate_resource_for_vm(vm_id);
        self.storage.deallocate_resource_for_vm(vm_id);
        self.requested_mips.remove(&vm_id);
    }

    /// Places VM on this host and reserves all requested resources.
    ///
    /// On failure nothing is changed and the returned suitability tells which resources are missing.
    pub fn create_vm(&mut self, vm: &mut Vm) -> HostSuitability {
        let req = vm.requirements();
        if self.hosts_vm(req.vm_id) {
            return HostSuitability::new(req.vm_id, self.id);
        }
        let suitability = self.get_suitability_for(&req, false);
        if !suitability.fully() {
            return suitability;
        }
        if !self.reserve(&req) {
            return HostSuitability::new(req.vm_id, self.id);
        }
        self.vms.insert(req.vm_id);
        self.requested_mips.insert(req.vm_id, req.requested_mips);
        vm.set_placement(Some(self.id));
        suitability
    }

    /// Removes VM from this host and releases its resources.
    pub fn destroy_vm(&mut self, vm: &mut Vm) -> bool {
        if !self.remove_vm(vm.id()) {
            return false;
        }
        vm.set_placement(None);
        true
    }

    /// Releases resources of resident VM which has already been placed on another host.
    pub(crate) fn remove_vm(&mut self, vm_id: u32) -> bool {
        if !self.vms.remove(&vm_id) {
            return false;
        }
        self.release(vm_id);
        self.vms_migrating_out.remove(&vm_id);
        true
    }

    /// Reserves resources for VM without changing the VM itself.
    pub fn create_temporary_vm(&mut self, vm: &Vm) -> HostSuitability {
        let req = vm.requirements();
        if self.hosts_vm(req.vm_id) {
            return HostSuitability::new(req.vm_id, self.id);
        }
        let suitability = self.get_suitability_for(&req, false);
        if !suitability.fully() {
            return suitability;
        }
        if !self.reserve(&req) {
            return HostSuitability::new(req.vm_id, self.id);
        }
        self.vms_migrating_in.insert(req.vm_id);
        self.requested_mips.insert(req.vm_id, req.requested_mips);
        suitability
    }

    pub fn destroy_temporary_vm(&mut self, vm_id: u32) -> bool {
        if !self.vms_migrating_in.remove(&vm_id) {
            return false;
        }
        self.release(vm_id);
        true
    }

    /// Changes the number of PEs of resident VM, granting its PEs anew.
    ///
    /// If the new share can't be granted, the previous processor capacity and share are restored.
    pub fn resize_vm_pes(&mut self, vm: &mut Vm, new_pes: u64) -> PesResizing {
        if new_pes == 0 || !self.vms.contains(&vm.id()) {
            return PesResizing::Rejected;
        }
        let old_pes = vm.pes();
        self.vm_scheduler.deallocate_pes_from_vm(&mut self.pes, vm.id());
        vm.processor_mut().set_capacity(new_pes);
        if self
            .vm_scheduler
            .allocate_pes_for_vm(&mut self.pes, vm.id(), &MipsShare::new(new_pes, vm.mips()))
        {
            self.requested_mips.insert(vm.id(), vm.requested_mips());
            return PesResizing::Resized;
        }
        vm.processor_mut().set_capacity(old_pes);
        if self
            .vm_scheduler
            .allocate_pes_for_vm(&mut self.pes, vm.id(), &MipsShare::new(old_pes, vm.mips()))
        {
            PesResizing::Rejected
        } else {
            PesResizing::Lost
        }
    }

    /// Changes the amount of non-CPU resource granted to resident VM.
    pub fn allocate_resource_for_vm(&mut self, kind: ResourceKind, vm: &mut Vm, new_total: u64) -> bool {
        if !self.vms.contains(&vm.id()) {
            return false;
        }
        self.provisioner_mut(kind).allocate_resource_for_vm(vm, new_total)
    }

    /// Returns MIPS currently requested by workloads of resident and temporary VMs.
    pub fn requested_mips(&self) -> f64 {
        self.requested_mips.values().sum()
    }

    pub fn vm_requested_mips(&self, vm_id: u32) -> f64 {
        self.requested_mips.get(&vm_id).copied().unwrap_or(0.)
    }

    pub fn set_vm_requested_mips(&mut self, vm_id: u32, mips: f64) {
        if let Some(requested) = self.requested_mips.get_mut(&vm_id) {
            *requested = mips;
        }
    }

    /// Returns the fraction of host MIPS requested by VM workloads.
    pub fn cpu_utilization(&self) -> f64 {
        let total = self.total_mips();
        if total == 0. {
            return 0.;
        }
        self.requested_mips() / total
    }

    /// Refreshes MIPS requested by the resident VMs among `vms` and records the resulting CPU utilization.
    pub fn update_utilization<'a>(&mut self, vms: impl IntoIterator<Item = &'a Vm>) {
        for vm in vms {
            if self.vms.contains(&vm.id()) {
                self.set_vm_requested_mips(vm.id(), vm.requested_mips());
            }
        }
        self.record_utilization();
    }

    /// Appends the current CPU utilization to the host history.
    pub fn record_utilization(&mut self) {
        if self.utilization_history.len() == MAX_UTILIZATION_HISTORY {
            self.utilization_history.pop_front();
        }
        self.utilization_history.push_back(self.cpu_utilization());
    }

    pub fn utilization_history(&self) -> &VecDeque<f64> {
        &self.utilization_history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::vm_schedulers::time_shared::TimeSharedVmScheduler;

    /// Time-shared scheduler which refuses grants once the budget is spent.
    #[derive(Clone)]
    struct LimitedScheduler {
        inner: TimeSharedVmScheduler,
        grants_left: u32,
    }

    impl VmScheduler for LimitedScheduler {
        fn is_suitable_for_vm(&self, pes: &[Pe], share: &MipsShare) -> bool {
            self.inner.is_suitable_for_vm(pes, share)
        }

        fn allocate_pes_for_vm(&mut self, pes: &mut [Pe], vm_id: u32, share: &MipsShare) -> bool {
            if self.grants_left == 0 {
                return false;
            }
            self.grants_left -= 1;
            self.inner.allocate_pes_for_vm(pes, vm_id, share)
        }

        fn deallocate_pes_from_vm(&mut self, pes: &mut [Pe], vm_id: u32) -> bool {
            self.inner.deallocate_pes_from_vm(pes, vm_id)
        }

        fn allocated_mips_for_vm(&self, vm_id: u32) -> f64 {
            self.inner.allocated_mips_for_vm(vm_id)
        }

        fn name(&self) -> &'static str {
            "Limited"
        }
    }

    fn host() -> Host {
        Host::new(0, "h", Pe::list(4, 1000.), 2048, 1000, 10000, Box::new(TimeSharedVmScheduler::new()))
    }

    #[test]
    fn temporary_vm_is_migrating_in() {
        let mut host = host();
        let vm = Vm::new(1, 2, 1000., 1024, 100, 100);
        assert!(host.create_temporary_vm(&vm).fully());
        assert!(host.vms_migrating_in().contains(&1));
        assert!(host.vms().is_empty());
        assert!(!vm.is_created());
        assert_eq!(host.free_pes_number(), 2);
        assert_eq!(host.cpu_utilization(), 0.5);

        assert!(host.destroy_temporary_vm(1));
        assert!(!host.destroy_temporary_vm(1));
        assert_eq!(host.free_pes_number(), 4);
        assert_eq!(host.ram().available(), 2048);
        assert_eq!(host.requested_mips(), 0.);
    }

    #[test]
    fn failed_resize_restores_vm() {
        let mut host = host();
        let mut vm = Vm::new(1, 2, 1000., 1024, 100, 100);
        assert!(host.create_vm(&mut vm).fully());
        assert_eq!(host.resize_vm_pes(&mut vm, 6), PesResizing::Rejected);
        assert_eq!(vm.pes(), 2);
        assert_eq!(host.vm_scheduler().allocated_mips_for_vm(1), 2000.);
        assert!(host.resize_vm_pes(&mut vm, 3).is_resized());
        assert_eq!(host.free_pes_number(), 1);
        assert_eq!(host.vm_requested_mips(1), 3000.);
    }

    #[test]
    fn resize_reports_lost_share() {
        let scheduler = LimitedScheduler {
            inner: TimeSharedVmScheduler::new(),
            grants_left: 1,
        };
        let mut host = Host::new(0, "h", Pe::list(4, 1000.), 2048, 1000, 10000, Box::new(scheduler));
        let mut vm = Vm::new(1, 2, 1000., 1024, 100, 100);
        assert!(host.create_vm(&mut vm).fully());
        assert_eq!(host.resize_vm_pes(&mut vm, 3), PesResizing::Lost);
        assert_eq!(vm.pes(), 2);
        assert_eq!(host.vm_scheduler().allocated_mips_for_vm(1), 0.);
        assert_eq!(host.free_pes_number(), 4);
    }

    #[test]
    fn partial_allocation_is_rolled_back() {
        let mut host = host();
        let mut vm = Vm::new(1, 1, 1000., 4096, 100, 100);
        let suitability = host.create_vm(&mut vm);
        assert!(suitability.for_resource(ResourceKind::Cpu));
        assert!(!suitability.for_resource(ResourceKind::Ram));
        assert!(!suitability.for_resource(ResourceKind::Bandwidth));
        assert!(!vm.is_created());
        assert_eq!(host.free_pes_number(), 4);
        assert_eq!(host.bw().available(), 1000);
    }

    #[test]
    fn utilization_history_is_bounded() {
        let mut host = host();
        for _ in 0..MAX_UTILIZATION_HISTORY + 5 {
            host.record_utilization();
        }
        assert_eq!(host.utilization_history().len(), MAX_UTILIZATION_HISTORY);
    }
}
