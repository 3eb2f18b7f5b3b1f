//! The curvature model shared between the sensing front-end and the shape
//! reconstructor, and the one-slot latch that carries it between threads.

use std::sync::{Arc, Mutex};

/// Linear fit parameters of bending curvature against arc length, one
/// slope/intercept pair per bending plane. `(ax, bx)` describe the x–z
/// plane and `(ay, by)` the y–z plane. Produced by the sensing front-end
/// once per sensor frame and consumed whole; plain `Copy` data.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CurvatureModel {
    /// Curvature slope in the x–z plane, 1/m per m of arc length.
    pub ax: f64,
    /// Curvature intercept in the x–z plane, 1/m.
    pub bx: f64,
    /// Curvature slope in the y–z plane.
    pub ay: f64,
    /// Curvature intercept in the y–z plane.
    pub by: f64,
}

impl CurvatureModel {
    /// True when every coefficient is a normal, representable number.
    pub fn is_finite(&self) -> bool {
        self.ax.is_finite() && self.bx.is_finite() && self.ay.is_finite() && self.by.is_finite()
    }
}

/// Anything that can hand the control loop a fresh [`CurvatureModel`].
///
/// The contract is edge-triggered: `take()` returns `Some` exactly once per
/// sensor frame and `None` until the next frame arrives. Callers must not
/// poll the same frame twice; consuming it clears the ready flag.
pub trait CoefficientSource {
    /// Takes the latest unconsumed model, if one has arrived.
    fn take(&mut self) -> Option<CurvatureModel>;
}

/// A thread-safe single-slot latch implementing [`CoefficientSource`].
///
/// The producer side (a socket reader, a replay thread, a synthetic
/// generator) calls [`publish`](LatchedCoefficients::publish); the control
/// loop calls `take()`. Publishing over an unconsumed frame overwrites it,
/// so a slow consumer always sees the latest sensor state rather than a
/// backlog.
#[derive(Debug, Clone, Default)]
pub struct LatchedCoefficients {
    slot: Arc<Mutex<Option<CurvatureModel>>>,
}

impl LatchedCoefficients {
    /// Instantiates an empty latch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the latched model and marks it fresh.
    pub fn publish(&self, model: CurvatureModel) {
        *self.slot.lock().unwrap() = Some(model);
    }
}

impl CoefficientSource for LatchedCoefficients {
    fn take(&mut self) -> Option<CurvatureModel> {
        self.slot.lock().unwrap().take()
    }
}
