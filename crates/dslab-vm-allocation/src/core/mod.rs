pub mod common;
pub mod config;
pub mod context;
pub mod horizontal_scaling;
pub mod host;
pub mod load_model;
mod migration;
pub mod pe;
pub mod processor;
pub mod resource;
pub mod resource_provisioner;
pub mod utilization_threshold;
pub mod vertical_scaling;
pub mod vm;
pub mod vm_allocation_policy;
pub mod vm_placement_algorithm;
pub mod vm_placement_algorithms;
pub mod vm_scheduler;
pub mod vm_schedulers;
pub mod vm_selection_policy;
