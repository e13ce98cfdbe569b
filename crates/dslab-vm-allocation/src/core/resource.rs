//! Capacity-bounded resource.

use serde::Serialize;

/// A resource with finite capacity and allocated amount, such as host RAM or VM bandwidth share.
///
/// Invariant: `allocated <= capacity`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Resource {
    capacity: u64,
    allocated: u64,
}

impl Resource {
    pub fn new(capacity: u64) -> Self {
        Self { capacity, allocated: 0 }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn allocated(&self) -> u64 {
        self.allocated
    }

    pub fn available(&self) -> u64 {
        self.capacity - self.allocated
    }

    pub fn is_amount_available(&self, amount: u64) -> bool {
        amount <= self.available()
    }

    /// Returns the ratio of allocated amount to capacity.
    pub fn utilization(&self) -> f64 {
        if self.capacity == 0 {
            return 0.;
        }
        self.allocated as f64 / self.capacity as f64
    }

    /// Allocates the specified amount, fails if it is not available.
    pub fn allocate(&mut self, amount: u64) -> bool {
        if !self.is_amount_available(amount) {
            return false;
        }
        self.allocated += amount;
        true
    }

    /// Releases the specified amount, fails if more than the allocated amount is requested.
    pub fn deallocate(&mut self, amount: u64) -> bool {
        if amount > self.allocated {
            return false;
        }
        self.allocated -= amount;
        true
    }

    /// Sets allocated amount, which is truncated to capacity.
    pub fn set_allocated(&mut self, amount: u64) {
        self.allocated = amount.min(self.capacity);
    }

    /// Changes capacity. The allocated amount is truncated if it exceeds the new capacity.
    pub fn set_capacity(&mut self, capacity: u64) {
        self.capacity = capacity;
        self.allocated = self.allocated.min(capacity);
    }
}
