//! Resource load models.

use dyn_clone::{clone_trait_object, DynClone};

/// A resource load model is a function, which defines the fraction of VM resource capacity used at the moment.
/// time - current simulation time, time_from_start - time since VM was placed on its current host.
pub trait LoadModel: DynClone {
    fn get_resource_load(&self, time: f64, time_from_start: f64) -> f64;
}

clone_trait_object!(LoadModel);

/// The simplest load model, the constant load.
#[derive(Clone)]
pub struct ConstantLoadModel {
    load: f64,
}

impl ConstantLoadModel {
    pub fn new(load: f64) -> Self {
        Self { load }
    }
}

impl LoadModel for ConstantLoadModel {
    fn get_resource_load(&self, _time: f64, _time_from_start: f64) -> f64 {
        self.load
    }
}

/// Piecewise-constant load defined by a trace of `(time, load)` points.
///
/// The load at time `t` is the load of the last point with time `<= t`, or the first point's load before it.
#[derive(Clone)]
pub struct StepLoadModel {
    points: Vec<(f64, f64)>,
}

impl StepLoadModel {
    pub fn new(mut points: Vec<(f64, f64)>) -> Self {
        assert!(!points.is_empty(), "Step load model requires at least one point");
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { points }
    }
}

impl LoadModel for StepLoadModel {
    fn get_resource_load(&self, time: f64, _time_from_start: f64) -> f64 {
        let idx = self.points.partition_point(|(t, _)| *t <= time);
        if idx == 0 {
            self.points[0].1
        } else {
            self.points[idx - 1].1
        }
    }
}
