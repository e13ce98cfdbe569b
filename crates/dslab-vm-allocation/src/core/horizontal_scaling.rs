//! Horizontal VM scaling: adding new VM instances when a VM is overloaded.

use crate::core::vm::Vm;

/// Horizontal scaling descriptor attached to VM.
///
/// It does not change the resources of the scaled VM, it supplies a brand-new VM
/// which should be placed through the regular placement path.
pub struct HorizontalVmScaling {
    vm_supplier: Box<dyn FnMut() -> Vm>,
    overload_predicate: Box<dyn Fn(&Vm) -> bool>,
    last_processing_time: Option<f64>,
}

impl HorizontalVmScaling {
    pub fn new(vm_supplier: Box<dyn FnMut() -> Vm>, overload_predicate: Box<dyn Fn(&Vm) -> bool>) -> Self {
        Self {
            vm_supplier,
            overload_predicate,
            last_processing_time: None,
        }
    }

    pub fn is_overloaded(&self, vm: &Vm) -> bool {
        (self.overload_predicate)(vm)
    }

    /// Returns a new VM if the created VM is overloaded, at most once for each simulation time.
    pub fn check(&mut self, vm: &Vm, time: f64) -> Option<Vm> {
        if !vm.is_created() || self.last_processing_time.map_or(false, |last| time <= last) {
            return None;
        }
        self.last_processing_time = Some(time);
        if self.is_overloaded(vm) {
            Some((self.vm_supplier)())
        } else {
            None
        }
    }
}
