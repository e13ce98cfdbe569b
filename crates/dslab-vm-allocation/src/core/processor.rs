//! Virtual processor of a VM.

use serde::Serialize;

/// A VM-side aggregate of virtual PE count and per-PE speed.
///
/// The PE count is the capacity changed by vertical CPU scaling.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Processor {
    mips: f64,
    capacity: u64,
}

impl Processor {
    pub fn new(mips: f64, capacity: u64) -> Self {
        assert!(mips > 0., "VM PE capacity must be positive, got {}", mips);
        assert!(capacity > 0, "VM must have at least one PE");
        Self { mips, capacity }
    }

    /// MIPS of each virtual PE.
    pub fn mips(&self) -> f64 {
        self.mips
    }

    /// Number of virtual PEs.
    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn total_mips(&self) -> f64 {
        self.mips * self.capacity as f64
    }

    /// Changes the number of PEs, zero is not allowed.
    pub(crate) fn set_capacity(&mut self, capacity: u64) -> bool {
        if capacity == 0 {
            return false;
        }
        self.capacity = capacity;
        true
    }
}
