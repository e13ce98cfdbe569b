//! Vertical VM scaling: in-place resizing of a resource of a running VM.

use serde::Serialize;

use crate::core::common::ResourceKind;
use crate::core::vm::Vm;

/// Function computing the amount of resource to add or remove.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub enum ResourceScaling {
    /// Scales by `capacity * scaling_factor` at each step.
    Gradual,
    /// Scales at once to the capacity which brings the utilization back to the crossed threshold.
    Instantaneous,
}

/// Load state of VM resource relative to scaling thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum VmLoadState {
    Underloaded,
    Normal,
    Overloaded,
}

/// Request to resize VM resource, executed by the allocation policy.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VerticalScalingRequest {
    pub vm_id: u32,
    pub resource: ResourceKind,
    pub state: VmLoadState,
    /// Amount of resource units (PEs for CPU) to add when overloaded or remove when underloaded.
    pub amount: f64,
}

type ThresholdFn = Box<dyn Fn(&Vm) -> f64>;

/// Vertical scaling descriptor attached to VM for a single resource kind.
///
/// VM is overloaded when its resource utilization is above the upper threshold
/// and underloaded when it is below the lower threshold.
pub struct VerticalVmScaling {
    resource: ResourceKind,
    scaling_factor: f64,
    resource_scaling: ResourceScaling,
    lower_threshold: ThresholdFn,
    upper_threshold: ThresholdFn,
    last_processing_time: Option<f64>,
}

impl VerticalVmScaling {
    /// Creates scaling of the resource kind with the specified scaling factor.
    ///
    /// Thresholds are 0 and 1, i.e. the scaling never triggers until they are configured.
    pub fn new(resource: ResourceKind, scaling_factor: f64) -> Self {
        assert!(
            scaling_factor > 0.,
            "Scaling factor must be positive, got {}",
            scaling_factor
        );
        assert!(
            resource != ResourceKind::Storage,
            "Vertical scaling of storage is not supported"
        );
        Self {
            resource,
            scaling_factor,
            resource_scaling: ResourceScaling::Gradual,
            lower_threshold: Box::new(|_| 0.),
            upper_threshold: Box::new(|_| 1.),
            last_processing_time: None,
        }
    }

    pub fn with_thresholds(self, lower: f64, upper: f64) -> Self {
        assert!(
            (0. ..=1.).contains(&lower) && (0. ..=1.).contains(&upper) && lower < upper,
            "Invalid scaling thresholds: lower = {}, upper = {}",
            lower,
            upper
        );
        self.with_threshold_functions(Box::new(move |_| lower), Box::new(move |_| upper))
    }

    /// Sets thresholds computed from the current VM state.
    pub fn with_threshold_functions(mut self, lower: ThresholdFn, upper: ThresholdFn) -> Self {
        self.lower_threshold = lower;
        self.upper_threshold = upper;
        self
    }

    pub fn with_resource_scaling(mut self, resource_scaling: ResourceScaling) -> Self {
        self.resource_scaling = resource_scaling;
        self
    }

    pub fn resource_kind(&self) -> ResourceKind {
        self.resource
    }

    pub fn scaling_factor(&self) -> f64 {
        self.scaling_factor
    }

    pub fn resource_scaling(&self) -> ResourceScaling {
        self.resource_scaling
    }

    pub fn load_state(&self, vm: &Vm) -> VmLoadState {
        let utilization = vm.utilization(self.resource);
        if utilization > (self.upper_threshold)(vm) {
            VmLoadState::Overloaded
        } else if utilization < (self.lower_threshold)(vm) {
            VmLoadState::Underloaded
        } else {
            VmLoadState::Normal
        }
    }

    fn capacity(&self, vm: &Vm) -> f64 {
        match self.resource {
            ResourceKind::Cpu => vm.pes() as f64,
            kind => vm.resource(kind).capacity() as f64,
        }
    }

    /// Returns the amount of resource to scale for VM in the specified state.
    pub fn resource_amount_to_scale(&self, vm: &Vm, state: VmLoadState) -> f64 {
        let capacity = self.capacity(vm);
        let gradual = capacity * self.scaling_factor;
        match (self.resource_scaling, state) {
            (_, VmLoadState::Normal) => 0.,
            (ResourceScaling::Gradual, _) => gradual,
            (ResourceScaling::Instantaneous, state) => {
                let threshold = if state == VmLoadState::Overloaded {
                    (self.upper_threshold)(vm)
                } else {
                    (self.lower_threshold)(vm)
                };
                if threshold <= 0. {
                    return gradual;
                }
                let used = vm.utilization(self.resource) * capacity;
                (used / threshold - capacity).abs()
            }
        }
    }

    /// Checks scaling thresholds for the created VM, at most once for each simulation time.
    pub fn check(&mut self, vm: &Vm, time: f64) -> Option<VerticalScalingRequest> {
        if !vm.is_created() || self.last_processing_time.map_or(false, |last| time <= last) {
            return None;
        }
        self.last_processing_time = Some(time);
        let state = self.load_state(vm);
        if state == VmLoadState::Normal {
            return None;
        }
        Some(VerticalScalingRequest {
            vm_id: vm.id(),
            resource: self.resource,
            state,
            amount: self.resource_amount_to_scale(vm, state),
        })
    }
}
