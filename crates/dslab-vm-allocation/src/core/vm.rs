//! Virtual machine.

use std::collections::BTreeMap;
use std::mem;

use crate::core::common::{ResourceKind, VmRequirements};
use crate::core::horizontal_scaling::HorizontalVmScaling;
use crate::core::load_model::{ConstantLoadModel, LoadModel};
use crate::core::processor::Processor;
use crate::core::resource::Resource;
use crate::core::vertical_scaling::{VerticalScalingRequest, VerticalVmScaling};

/// Represents virtual machine (VM).
///
// VM is characterized by its ID, requested resources (processor, RAM, bandwidth, storage) and load models.
// The capacity of VM resources is the share granted by the host, while the allocated amount of RAM and
// bandwidth and the CPU utilization reflect the actual usage reported by load models.
pub struct Vm {
    id: u32,
    processor: Processor,
    ram: Resource,
    bw: Resource,
    storage: Resource,
    created: bool,
    host: Option<u32>,
    start_time: f64,
    cpu_utilization: f64,
    cpu_load_model: Box<dyn LoadModel>,
    ram_load_model: Box<dyn LoadModel>,
    bw_load_model: Box<dyn LoadModel>,
    vertical_scalings: BTreeMap<ResourceKind, VerticalVmScaling>,
    horizontal_scaling: Option<HorizontalVmScaling>,
}

impl Vm {
    /// Creates VM requesting `pes` virtual PEs of `mips` each, RAM (MB), bandwidth (Mbps) and storage (MB).
    ///
    /// By default the VM fully uses all its resources.
    pub fn new(id: u32, pes: u64, mips: f64, ram: u64, bw: u64, storage: u64) -> Self {
        let mut storage = Resource::new(storage);
        storage.set_allocated(storage.capacity());
        Self {
            id,
            processor: Processor::new(mips, pes),
            ram: Resource::new(ram),
            bw: Resource::new(bw),
            storage,
            created: false,
            host: None,
            start_time: 0.,
            cpu_utilization: 1.,
            cpu_load_model: Box::new(ConstantLoadModel::new(1.)),
            ram_load_model: Box::new(ConstantLoadModel::new(1.)),
            bw_load_model: Box::new(ConstantLoadModel::new(1.)),
            vertical_scalings: BTreeMap::new(),
            horizontal_scaling: None,
        }
    }

    pub fn with_cpu_load_model(mut self, model: Box<dyn LoadModel>) -> Self {
        self.cpu_load_model = model;
        self.update_utilization(0.);
        self
    }

    pub fn with_ram_load_model(mut self, model: Box<dyn LoadModel>) -> Self {
        self.ram_load_model = model;
        self.update_utilization(0.);
        self
    }

    pub fn with_bw_load_model(mut self, model: Box<dyn LoadModel>) -> Self {
        self.bw_load_model = model;
        self.update_utilization(0.);
        self
    }

    /// Attaches vertical scaling of the resource kind, replacing the previous one.
    pub fn with_vertical_scaling(mut self, scaling: VerticalVmScaling) -> Self {
        self.vertical_scalings.insert(scaling.resource_kind(), scaling);
        self
    }

    pub fn with_horizontal_scaling(mut self, scaling: HorizontalVmScaling) -> Self {
        self.horizontal_scaling = Some(scaling);
        self
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn processor(&self) -> &Processor {
        &self.processor
    }

    pub(crate) fn processor_mut(&mut self) -> &mut Processor {
        &mut self.processor
    }

    pub fn pes(&self) -> u64 {
        self.processor.capacity()
    }

    pub fn mips(&self) -> f64 {
        self.processor.mips()
    }

    pub fn total_mips(&self) -> f64 {
        self.processor.total_mips()
    }

    pub fn ram(&self) -> &Resource {
        &self.ram
    }

    pub fn bw(&self) -> &Resource {
        &self.bw
    }

    pub fn storage(&self) -> &Resource {
        &self.storage
    }

    /// Returns VM resource of the specified non-CPU kind.
    pub fn resource(&self, kind: ResourceKind) -> &Resource {
        match kind {
            ResourceKind::Ram => &self.ram,
            ResourceKind::Bandwidth => &self.bw,
            ResourceKind::Storage => &self.storage,
            ResourceKind::Cpu => panic!("CPU of vm #{} is a processor, not a resource", self.id),
        }
    }

    pub(crate) fn resource_mut(&mut self, kind: ResourceKind) -> &mut Resource {
        match kind {
            ResourceKind::Ram => &mut self.ram,
            ResourceKind::Bandwidth => &mut self.bw,
            ResourceKind::Storage => &mut self.storage,
            ResourceKind::Cpu => panic!("CPU of vm #{} is a processor, not a resource", self.id),
        }
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    /// Returns ID of the host running the VM.
    pub fn host(&self) -> Option<u32> {
        self.host
    }

    pub(crate) fn set_placement(&mut self, host: Option<u32>) {
        self.created = host.is_some();
        self.host = host;
    }

    /// Returns the time when VM was placed on its current host.
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    pub(crate) fn set_start_time(&mut self, time: f64) {
        self.start_time = time;
    }

    /// Returns the last sampled fraction of VM processor capacity in use.
    pub fn cpu_utilization(&self) -> f64 {
        self.cpu_utilization
    }

    /// Returns the last sampled utilization of the resource kind.
    pub fn utilization(&self, kind: ResourceKind) -> f64 {
        match kind {
            ResourceKind::Cpu => self.cpu_utilization,
            _ => self.resource(kind).utilization(),
        }
    }

    /// Returns MIPS currently requested by VM workload.
    pub fn requested_mips(&self) -> f64 {
        self.total_mips() * self.cpu_utilization
    }

    /// Samples load models and updates the usage of VM resources.
    pub fn update_utilization(&mut self, time: f64) {
        let since_start = time - self.start_time;
        self.cpu_utilization = self.cpu_load_model.get_resource_load(time, since_start).clamp(0., 1.);
        let ram_load = self.ram_load_model.get_resource_load(time, since_start).clamp(0., 1.);
        self.ram.set_allocated((ram_load * self.ram.capacity() as f64).round() as u64);
        let bw_load = self.bw_load_model.get_resource_load(time, since_start).clamp(0., 1.);
        self.bw.set_allocated((bw_load * self.bw.capacity() as f64).round() as u64);
    }

    pub fn requirements(&self) -> VmRequirements {
        VmRequirements {
            vm_id: self.id,
            pes: self.processor.capacity(),
            mips: self.processor.mips(),
            ram: self.ram.capacity(),
            bw: self.bw.capacity(),
            storage: self.storage.capacity(),
            requested_mips: self.requested_mips(),
        }
    }

    pub fn vertical_scaling(&self, kind: ResourceKind) -> Option<&VerticalVmScaling> {
        self.vertical_scalings.get(&kind)
    }

    pub fn horizontal_scaling(&self) -> Option<&HorizontalVmScaling> {
        self.horizontal_scaling.as_ref()
    }

    /// Evaluates attached vertical scalings and returns the resulting scaling requests.
    pub fn check_vertical_scaling(&mut self, time: f64) -> Vec<VerticalScalingRequest> {
        let mut scalings = mem::take(&mut self.vertical_scalings);
        let requests = scalings
            .values_mut()
            .filter_map(|scaling| scaling.check(self, time))
            .collect();
        self.vertical_scalings = scalings;
        requests
    }

    /// Evaluates attached horizontal scaling and returns a new VM if the current one is overloaded.
    pub fn check_horizontal_scaling(&mut self, time: f64) -> Option<Vm> {
        let mut scaling = self.horizontal_scaling.take()?;
        let new_vm = scaling.check(self, time);
        self.horizontal_scaling = Some(scaling);
        new_vm
    }
}
