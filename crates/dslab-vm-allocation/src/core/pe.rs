//! Processing elements of a host.

use std::fmt::{Display, Formatter};

use serde::Serialize;

use crate::core::common::EPSILON;

/// Status of processing element.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeStatus {
    Free,
    Busy,
    Failed,
}

impl Display for PeStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            PeStatus::Free => write!(f, "free"),
            PeStatus::Busy => write!(f, "busy"),
            PeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Physical processing element (CPU core) of a host, rated in MIPS.
///
/// PE is busy while some MIPS of it are allocated to VMs.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Pe {
    id: u32,
    mips: f64,
    allocated_mips: f64,
    failed: bool,
}

impl Pe {
    pub fn new(id: u32, mips: f64) -> Self {
        assert!(mips > 0., "PE capacity must be positive, got {}", mips);
        Self {
            id,
            mips,
            allocated_mips: 0.,
            failed: false,
        }
    }

    /// Creates a list of identical PEs with ids `0..count`.
    pub fn list(count: u32, mips: f64) -> Vec<Pe> {
        (0..count).map(|id| Pe::new(id, mips)).collect()
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn mips(&self) -> f64 {
        self.mips
    }

    pub fn allocated_mips(&self) -> f64 {
        self.allocated_mips
    }

    /// Returns MIPS which can still be allocated (zero for failed PE).
    pub fn available_mips(&self) -> f64 {
        if self.failed {
            return 0.;
        }
        (self.mips - self.allocated_mips).max(0.)
    }

    pub fn status(&self) -> PeStatus {
        if self.failed {
            PeStatus::Failed
        } else if self.allocated_mips > EPSILON {
            PeStatus::Busy
        } else {
            PeStatus::Free
        }
    }

    pub fn is_working(&self) -> bool {
        !self.failed
    }

    pub fn is_free(&self) -> bool {
        self.status() == PeStatus::Free
    }

    pub(crate) fn set_failed(&mut self, failed: bool) {
        self.failed = failed;
    }

    pub(crate) fn allocate(&mut self, mips: f64) -> bool {
        if mips > self.available_mips() + EPSILON {
            return false;
        }
        self.allocated_mips = (self.allocated_mips + mips).min(self.mips);
        true
    }

    pub(crate) fn deallocate(&mut self, mips: f64) {
        self.allocated_mips = (self.allocated_mips - mips).max(0.);
        if self.allocated_mips < EPSILON {
            self.allocated_mips = 0.;
        }
    }
}
