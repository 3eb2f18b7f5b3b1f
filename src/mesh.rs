//! The seam between shape reconstruction and rendering.
//!
//! Ring and tip construction live on the renderer side; this module only
//! defines the capability contract ([`TubeMeshBuilder`]) and the two
//! assembly flavors the display state machine selects between: a plain
//! tube, and a tube that also carries the pose for the projection
//! indicator at the needle tip.

use glam::DVec3;

use crate::reconstructor::{Centerline, NeedleGeometry};

/// The external mesh-builder contract: given an ordered chain of points
/// and matching tangents, produce a drawable tube mesh. Implementations
/// own the ring/tip primitives and the mesh representation.
pub trait TubeMeshBuilder {
    /// Whatever the renderer considers a drawable mesh.
    type Mesh;

    /// Builds a tube along the chain.
    fn build_tube(
        &mut self,
        points: &[DVec3],
        tangents: &[DVec3],
        radial_segments: usize,
        radius: f64,
        tip_length: f64,
    ) -> Self::Mesh;
}

/// Position and direction for the projection indicator, anchored at the
/// needle tip and aimed along the tip tangent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionPose {
    /// Tip point of the centerline.
    pub position: DVec3,
    /// Unit direction of the final segment.
    pub direction: DVec3,
}

/// A built mesh plus, when the display mode calls for it, the projection
/// indicator pose derived from the same centerline.
pub struct AssembledShape<M> {
    /// The tube mesh from the external builder.
    pub mesh: M,
    /// Present only when assembled by [`ProjectedTubeAssembler`].
    pub projection: Option<ProjectionPose>,
}

/// Assembles a plain needle tube.
pub struct TubeAssembler;

impl TubeAssembler {
    /// Feeds the centerline through the builder.
    pub fn assemble<B: TubeMeshBuilder>(
        builder: &mut B,
        centerline: &Centerline,
        geometry: &NeedleGeometry,
    ) -> AssembledShape<B::Mesh> {
        AssembledShape {
            mesh: builder.build_tube(
                &centerline.points,
                &centerline.tangents,
                geometry.radial_segments,
                geometry.radius,
                geometry.tip_length,
            ),
            projection: None,
        }
    }
}

/// Assembles a needle tube and re-poses the projection indicator at the
/// tip, oriented along the tip tangent.
pub struct ProjectedTubeAssembler;

impl ProjectedTubeAssembler {
    /// Feeds the centerline through the builder and derives the pose.
    pub fn assemble<B: TubeMeshBuilder>(
        builder: &mut B,
        centerline: &Centerline,
        geometry: &NeedleGeometry,
    ) -> AssembledShape<B::Mesh> {
        let mut shape = TubeAssembler::assemble(builder, centerline, geometry);
        shape.projection = Some(ProjectionPose {
            position: centerline.tip(),
            direction: centerline.tip_tangent(),
        });
        shape
    }
}

/// Summary of one build call, for renderers that only need bookkeeping
/// (the demo binary) and for tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeshSummary {
    /// Number of rings the tube would carry, one per centerline point.
    pub rings: usize,
    /// Radial segments per ring.
    pub radial_segments: usize,
}

/// A [`TubeMeshBuilder`] that builds nothing and reports what it was
/// asked for. Stands in for the real renderer.
#[derive(Debug, Default)]
pub struct NullMeshBuilder {
    /// Build calls so far.
    pub builds: usize,
}

impl TubeMeshBuilder for NullMeshBuilder {
    type Mesh = MeshSummary;

    fn build_tube(
        &mut self,
        points: &[DVec3],
        _tangents: &[DVec3],
        radial_segments: usize,
        _radius: f64,
        _tip_length: f64,
    ) -> MeshSummary {
        self.builds += 1;
        MeshSummary {
            rings: points.len(),
            radial_segments,
        }
    }
}
