//! Provisioning of host resources to VMs.

use std::collections::BTreeMap;

use crate::core::common::ResourceKind;
use crate::core::resource::Resource;
use crate::core::vm::Vm;

/// Maps VM requests for a single resource kind (RAM or bandwidth) to the host physical capacity.
///
/// The provisioner owns the host-side resource and remembers the amount granted to each VM.
#[derive(Clone, Debug)]
pub struct ResourceProvisioner {
    kind: ResourceKind,
    resource: Resource,
    allocations: BTreeMap<u32, u64>,
}

impl ResourceProvisioner {
    pub fn new(kind: ResourceKind, capacity: u64) -> Self {
        Self {
            kind,
            resource: Resource::new(capacity),
            allocations: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Returns the host-side resource.
    pub fn resource(&self) -> &Resource {
        &self.resource
    }

    pub fn capacity(&self) -> u64 {
        self.resource.capacity()
    }

    pub fn available(&self) -> u64 {
        self.resource.available()
    }

    pub fn is_amount_available(&self, amount: u64) -> bool {
        self.resource.is_amount_available(amount)
    }

    /// Returns the amount currently granted to the specified VM.
    pub fn allocated_for_vm(&self, vm_id: u32) -> u64 {
        self.allocations.get(&vm_id).copied().unwrap_or(0)
    }

    /// Checks whether the allocation of the specified VM can be changed to `new_total`.
    pub fn is_suitable_for_vm(&self, vm_id: u32, new_total: u64) -> bool {
        let current = self.allocated_for_vm(vm_id);
        new_total <= current || self.resource.is_amount_available(new_total - current)
    }

    /// Sets the total amount granted to the VM and updates the capacity of VM resource accordingly.
    ///
    /// Fails without side effects if the host does not have enough available resource.
    pub fn allocate_resource_for_vm(&mut self, vm: &mut Vm, new_total: u64) -> bool {
        if !self.reserve(vm.id(), new_total) {
            return false;
        }
        vm.resource_mut(self.kind).set_capacity(new_total);
        true
    }

    /// Sets the host-side amount reserved for the VM id without touching VM itself.
    pub(crate) fn reserve(&mut self, vm_id: u32, new_total: u64) -> bool {
        if new_total > self.resource.capacity() || !self.is_suitable_for_vm(vm_id, new_total) {
            return false;
        }
        let current = self.allocated_for_vm(vm_id);
        self.resource.deallocate(current);
        self.resource.allocate(new_total);
        self.allocations.insert(vm_id, new_total);
        true
    }

    /// Releases the whole amount granted to the VM id and returns it.
    pub fn deallocate_resource_for_vm(&mut self, vm_id: u32) -> u64 {
        match self.allocations.remove(&vm_id) {
            Some(amount) => {
                self.resource.deallocate(amount);
                amount
            }
            None => 0,
        }
    }
}
