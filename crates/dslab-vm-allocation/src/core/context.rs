//! Simulation time access for logging.

use std::cell::Cell;
use std::rc::Rc;

/// Shared simulation clock.
///
/// The clock is advanced by the simulation engine which drives the allocation core,
/// all clones observe the same time.
#[derive(Clone, Debug, Default)]
pub struct Clock {
    time: Rc<Cell<f64>>,
}

impl Clock {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn time(&self) -> f64 {
        self.time.get()
    }

    pub fn set_time(&self, time: f64) {
        self.time.set(time);
    }
}

/// Named context of a component, used as the first argument of logging macros.
#[derive(Clone, Debug)]
pub struct AllocationContext {
    name: String,
    clock: Clock,
}

impl AllocationContext {
    pub fn new(name: &str, clock: Clock) -> Self {
        Self {
            name: name.to_string(),
            clock,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn time(&self) -> f64 {
        self.clock.time()
    }

    pub fn clock(&self) -> &Clock {
        &self.clock
    }
}
