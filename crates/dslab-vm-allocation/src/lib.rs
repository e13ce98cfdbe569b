//! VM placement and host resource allocation for cloud simulations.
//!
//! The crate decides which host runs each virtual machine, keeps per-host accounting of PEs, RAM, bandwidth
//! and storage while VMs are created, destroyed and resized, and performs vertical scaling of running VMs on
//! behalf of their hosts. Time is driven by an external simulation engine through [`core::context::Clock`].

pub mod core;
pub mod datacenter;
pub mod log;
