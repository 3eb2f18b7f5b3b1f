//! Reconstructs the needle's 3-D centerline from a fitted curvature model.
//!
//! The sensing side fits bending curvature against arc length as a straight
//! line, independently in two orthogonal planes. This module integrates
//! those two linear models into a chain of equal-arc-length segments: per
//! segment, curvature is evaluated at the segment midpoint, accumulated
//! into a per-plane bend angle, and the two bend angles are coupled into a
//! single unit step direction. The result is a polyline whose consecutive
//! points are separated by exactly one segment of arc length.

use glam::DVec3;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::coefficients::CurvatureModel;

/// The step direction is undefined once the y–z bend angle reaches a
/// quarter turn, where `cos(theta_y)` hits zero.
const MAX_BEND_Y: f64 = std::f64::consts::FRAC_PI_2;

/// Physical and sampling parameters of the tracked needle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NeedleGeometry {
    /// Total needle length in meters.
    pub length: f64,
    /// Number of arc-length segments the centerline is sampled into.
    pub num_segments: usize,
    /// Needle radius in meters, forwarded to the mesh builder.
    pub radius: f64,
    /// Length of the conical tip in meters, forwarded to the mesh builder.
    pub tip_length: f64,
    /// Number of radial segments per tube ring, forwarded to the mesh builder.
    pub radial_segments: usize,
}

impl Default for NeedleGeometry {
    fn default() -> Self {
        // the 18G biopsy needle on the bench rig: 145.12 mm long, 1 mm diameter
        NeedleGeometry {
            length: 0.14512,
            num_segments: 80,
            radius: 0.001,
            tip_length: 0.002,
            radial_segments: 10,
        }
    }
}

impl NeedleGeometry {
    /// Arc length of one segment.
    pub fn segment_length(&self) -> f64 {
        self.length / self.num_segments as f64
    }
}

/// An ordered polyline approximating the physical needle shape, with a
/// smoothed tangent direction per point. `points[0]` is the needle base,
/// pinned at the local origin.
#[derive(Debug, Clone, PartialEq)]
pub struct Centerline {
    /// The chained points, base first.
    pub points: Vec<DVec3>,
    /// One unit tangent per point.
    pub tangents: Vec<DVec3>,
}

impl Centerline {
    /// The tip point (last point of the chain).
    pub fn tip(&self) -> DVec3 {
        *self.points.last().expect("centerline is never empty")
    }

    /// The tangent direction at the tip.
    pub fn tip_tangent(&self) -> DVec3 {
        *self.tangents.last().expect("centerline is never empty")
    }

    /// Number of points in the chain.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// A centerline always has at least two points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Raised when the curvature model cannot be integrated into a valid shape.
#[derive(Debug)]
pub enum ReconstructError {
    /// The accumulated y–z bend angle reached a quarter turn, where the
    /// step direction is undefined. `segment` is the 1-based segment at
    /// which integration stopped.
    NumericalSingularity {
        /// Segment index where the singularity was hit.
        segment: usize,
    },
    /// A computed step came out NaN or infinite, e.g. from non-finite
    /// input coefficients.
    NonFinite {
        /// Segment index where the bad value appeared.
        segment: usize,
    },
    /// The geometry is not integrable: zero segments or non-positive length.
    InvalidGeometry,
}

impl fmt::Display for ReconstructError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconstructError::NumericalSingularity { segment } => {
                write!(f, "bend angle reached a quarter turn at segment {segment}")
            }
            ReconstructError::NonFinite { segment } => {
                write!(f, "non-finite step at segment {segment}")
            }
            ReconstructError::InvalidGeometry => {
                write!(f, "geometry must have at least one segment and positive length")
            }
        }
    }
}

impl std::error::Error for ReconstructError {}

/// Integrates the curvature model into a [`Centerline`].
///
/// Pure: equal inputs produce bitwise-equal output, and nothing is cached
/// between calls. Each segment contributes a step of exactly
/// [`segment_length`](NeedleGeometry::segment_length) in arc length *and*
/// in Euclidean length, since the coupled direction vector is normalized
/// before scaling.
pub fn reconstruct(
    model: CurvatureModel,
    geometry: &NeedleGeometry,
) -> Result<Centerline, ReconstructError> {
    if geometry.num_segments < 1 || geometry.length <= 0.0 {
        return Err(ReconstructError::InvalidGeometry);
    }

    let n = geometry.num_segments;
    let d_l = geometry.segment_length();

    let mut points = Vec::with_capacity(n + 1);
    points.push(DVec3::ZERO);

    let mut theta_x: f64 = 0.0;
    let mut theta_y: f64 = 0.0;

    for i in 1..=n {
        let z = i as f64 * d_l;

        // evaluate the linear model at the segment midpoint, not its end
        let kx = z * model.ax + model.bx - model.ax / 2.0 * d_l;
        let ky = z * model.ay + model.by - model.ay / 2.0 * d_l;

        // running integral of curvature, plane by plane
        theta_x += kx * d_l;
        theta_y += ky * d_l;

        if theta_y.abs() >= MAX_BEND_Y {
            return Err(ReconstructError::NumericalSingularity { segment: i });
        }
        let cos_ty = theta_y.cos();

        // couple the two bend angles into one direction. The calibration
        // frame is right-handed while the display frame swaps the lateral
        // axes, so the x-plane angle drives the y component and vice versa.
        let a = theta_x.cos() / cos_ty;
        let dir = DVec3::new(a * theta_y.sin(), theta_x.sin(), theta_x.cos());
        let step = dir * (d_l / dir.length());

        if !step.is_finite() {
            return Err(ReconstructError::NonFinite { segment: i });
        }

        points.push(points[i - 1] + step);
    }

    let tangents = chain_tangents(&points);
    Ok(Centerline { points, tangents })
}

/// Tangent directions along the chain: zero-slope `(0, 0, 1)` at the base,
/// the final segment's direction at the tip, and the normalized average of
/// the incoming and outgoing segment directions in between, so that mesh
/// rings do not facet at the joints.
fn chain_tangents(points: &[DVec3]) -> Vec<DVec3> {
    let last = points.len() - 1;
    (0..points.len())
        .map(|i| {
            if i == 0 {
                DVec3::Z
            } else if i == last {
                (points[i] - points[i - 1]).normalize()
            } else {
                let incoming = (points[i] - points[i - 1]).normalize();
                let outgoing = (points[i + 1] - points[i]).normalize();
                (incoming + outgoing).normalize()
            }
        })
        .collect()
}
