//! The needle display state machine.
//!
//! Owns the current curvature model, the last good centerline and the
//! visibility of the auxiliary objects (tip marker, projection indicator),
//! and decides per tick whether the shape is rebuilt. `Straight` rebuilds
//! unconditionally with zeroed coefficients; `Shape`, `Project` and `Tip`
//! rebuild only when the coefficient source has a fresh frame; `WaitTip`
//! does nothing. A failed reconstruction keeps the previous centerline so
//! a corrupt shape never reaches the renderer.

use glam::DVec3;
use log::{error, info};

use crate::coefficients::{CoefficientSource, CurvatureModel};
use crate::mesh::{AssembledShape, ProjectedTubeAssembler, TubeAssembler, TubeMeshBuilder};
use crate::reconstructor::{reconstruct, Centerline, NeedleGeometry, ReconstructError};

/// Manual tip-offset increment per nudge, in meters.
const OFFSET_STEP: f64 = 0.0002;

/// The five display modes of the tracked needle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeedleState {
    /// Only the tip marker follows the reconstructed tip point.
    Tip,
    /// Placeholder while awaiting explicit activation; nothing updates.
    WaitTip,
    /// A straight reference line, rebuilt every tick from zeroed
    /// coefficients regardless of sensor state.
    Straight,
    /// Full shape, rebuilt on fresh sensor frames.
    Shape,
    /// Full shape plus the projection indicator posed at the tip.
    Project,
}

/// What a call to [`NeedleDisplay::tick`] produced.
pub enum TickOutcome<M> {
    /// Nothing changed this tick.
    Idle,
    /// The shape was rebuilt; hand the mesh to the renderer.
    Rebuilt(AssembledShape<M>),
    /// Tip mode: the tip marker moved to this position.
    TipMoved(DVec3),
}

/// Display-side owner of the reconstruction loop.
pub struct NeedleDisplay<B: TubeMeshBuilder> {
    geometry: NeedleGeometry,
    builder: B,
    state: NeedleState,
    model: CurvatureModel,
    centerline: Centerline,
    offset: DVec3,
    tip_visible: bool,
    projection_visible: bool,
}

impl<B: TubeMeshBuilder> NeedleDisplay<B> {
    /// Creates the display in the `Straight` state with an initial
    /// straight centerline, auxiliary objects hidden.
    pub fn new(geometry: NeedleGeometry, builder: B) -> Result<Self, ReconstructError> {
        let centerline = reconstruct(CurvatureModel::default(), &geometry)?;
        Ok(NeedleDisplay {
            geometry,
            builder,
            state: NeedleState::Straight,
            model: CurvatureModel::default(),
            centerline,
            offset: DVec3::ZERO,
            tip_visible: false,
            projection_visible: false,
        })
    }

    /// Advances one control-loop tick.
    pub fn tick(&mut self, source: &mut dyn CoefficientSource) -> TickOutcome<B::Mesh> {
        match self.state {
            NeedleState::WaitTip => TickOutcome::Idle,
            NeedleState::Straight => {
                // forced to zero every tick so a stale sensor can never
                // bend the reference line
                self.model = CurvatureModel::default();
                if self.rebuild() {
                    TickOutcome::Rebuilt(TubeAssembler::assemble(
                        &mut self.builder,
                        &self.centerline,
                        &self.geometry,
                    ))
                } else {
                    TickOutcome::Idle
                }
            }
            NeedleState::Tip => match source.take() {
                Some(model) => {
                    self.model = model;
                    if self.rebuild() {
                        TickOutcome::TipMoved(self.offset + self.centerline.tip())
                    } else {
                        TickOutcome::Idle
                    }
                }
                None => TickOutcome::Idle,
            },
            NeedleState::Shape => match source.take() {
                Some(model) => {
                    self.model = model;
                    if self.rebuild() {
                        TickOutcome::Rebuilt(TubeAssembler::assemble(
                            &mut self.builder,
                            &self.centerline,
                            &self.geometry,
                        ))
                    } else {
                        TickOutcome::Idle
                    }
                }
                None => TickOutcome::Idle,
            },
            NeedleState::Project => match source.take() {
                Some(model) => {
                    self.model = model;
                    if self.rebuild() {
                        TickOutcome::Rebuilt(ProjectedTubeAssembler::assemble(
                            &mut self.builder,
                            &self.centerline,
                            &self.geometry,
                        ))
                    } else {
                        TickOutcome::Idle
                    }
                }
                None => TickOutcome::Idle,
            },
        }
    }

    /// Reconstructs from the current model, keeping the last good
    /// centerline if integration fails. Returns whether the shape changed.
    fn rebuild(&mut self) -> bool {
        match reconstruct(self.model, &self.geometry) {
            Ok(centerline) => {
                self.centerline = centerline;
                true
            }
            Err(err) => {
                error!("reconstruction failed, keeping previous shape: {err}");
                false
            }
        }
    }

    /// Tip mode: projection hidden, tip marker shown, offset reset. The
    /// renderer should hide the tube until fresh data arrives.
    pub fn set_state_tip(&mut self) {
        self.projection_visible = false;
        self.tip_visible = true;
        self.offset = DVec3::ZERO;
        self.state = NeedleState::Tip;
        info!("current state: tip");
    }

    /// Placeholder mode: both auxiliary objects hidden, nothing updates.
    pub fn set_state_wait_tip(&mut self) {
        self.projection_visible = false;
        self.tip_visible = false;
        self.state = NeedleState::WaitTip;
        info!("current state: wait tip");
    }

    /// Straight reference mode: both auxiliary objects hidden.
    pub fn set_state_straight(&mut self) {
        self.projection_visible = false;
        self.tip_visible = false;
        self.state = NeedleState::Straight;
        info!("current state: straight");
    }

    /// Shape mode: both auxiliary objects hidden.
    pub fn set_state_shape(&mut self) {
        self.projection_visible = false;
        self.tip_visible = false;
        self.state = NeedleState::Shape;
        info!("current state: shape");
    }

    /// Projection mode: indicator shown, tip marker hidden, and the shape
    /// is rebuilt immediately from the current model so the indicator is
    /// posed before the next sensor frame.
    pub fn set_state_project(&mut self) -> Option<AssembledShape<B::Mesh>> {
        self.projection_visible = true;
        self.tip_visible = false;
        self.state = NeedleState::Project;
        info!("current state: project");
        if self.rebuild() {
            Some(ProjectedTubeAssembler::assemble(
                &mut self.builder,
                &self.centerline,
                &self.geometry,
            ))
        } else {
            None
        }
    }

    /// Nudges the manual tip offset one step along +x.
    pub fn offset_up_x(&mut self) {
        self.offset += DVec3::new(OFFSET_STEP, 0.0, 0.0);
    }

    /// Nudges the manual tip offset one step along -x.
    pub fn offset_down_x(&mut self) {
        self.offset -= DVec3::new(OFFSET_STEP, 0.0, 0.0);
    }

    /// Nudges the manual tip offset one step along +y.
    pub fn offset_up_y(&mut self) {
        self.offset += DVec3::new(0.0, OFFSET_STEP, 0.0);
    }

    /// Nudges the manual tip offset one step along -y.
    pub fn offset_down_y(&mut self) {
        self.offset -= DVec3::new(0.0, OFFSET_STEP, 0.0);
    }

    /// Nudges the manual tip offset one step along +z.
    pub fn offset_up_z(&mut self) {
        self.offset += DVec3::new(0.0, 0.0, OFFSET_STEP);
    }

    /// Nudges the manual tip offset one step along -z.
    pub fn offset_down_z(&mut self) {
        self.offset -= DVec3::new(0.0, 0.0, OFFSET_STEP);
    }

    /// Clears the manual tip offset.
    pub fn reset_offset(&mut self) {
        self.offset = DVec3::ZERO;
    }

    /// The manual tip offset currently applied.
    pub fn offset(&self) -> DVec3 {
        self.offset
    }

    /// Current display mode.
    pub fn state(&self) -> NeedleState {
        self.state
    }

    /// The most recent good centerline.
    pub fn centerline(&self) -> &Centerline {
        &self.centerline
    }

    /// Whether the tip marker is shown.
    pub fn tip_visible(&self) -> bool {
        self.tip_visible
    }

    /// Whether the projection indicator is shown.
    pub fn projection_visible(&self) -> bool {
        self.projection_visible
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coefficients::LatchedCoefficients;
    use crate::mesh::NullMeshBuilder;

    fn display() -> NeedleDisplay<NullMeshBuilder> {
        NeedleDisplay::new(NeedleGeometry::default(), NullMeshBuilder::default()).unwrap()
    }

    #[test]
    fn straight_rebuilds_with_a_stale_source() {
        let mut display = display();
        let mut source = LatchedCoefficients::new();

        for _ in 0..3 {
            match display.tick(&mut source) {
                TickOutcome::Rebuilt(shape) => assert!(shape.projection.is_none()),
                _ => panic!("straight must rebuild every tick"),
            }
        }
    }

    #[test]
    fn shape_waits_for_fresh_data() {
        let mut display = display();
        display.set_state_shape();
        let mut source = LatchedCoefficients::new();

        assert!(matches!(display.tick(&mut source), TickOutcome::Idle));

        source.publish(CurvatureModel {
            bx: 2.0,
            ..Default::default()
        });
        assert!(matches!(
            display.tick(&mut source),
            TickOutcome::Rebuilt(_)
        ));

        // the frame was consumed; the next tick idles again
        assert!(matches!(display.tick(&mut source), TickOutcome::Idle));
    }

    #[test]
    fn project_poses_the_indicator() {
        let mut display = display();
        display.set_state_project();
        let mut source = LatchedCoefficients::new();

        source.publish(CurvatureModel {
            bx: 1.0,
            by: 0.5,
            ..Default::default()
        });
        match display.tick(&mut source) {
            TickOutcome::Rebuilt(shape) => {
                let pose = shape.projection.expect("project mode carries a pose");
                assert_eq!(pose.position, display.centerline().tip());
                assert_eq!(pose.direction, display.centerline().tip_tangent());
            }
            _ => panic!("fresh data must rebuild in project mode"),
        }
    }

    #[test]
    fn tip_moves_with_offset_applied() {
        let mut display = display();
        display.set_state_tip();
        display.offset_up_x();
        display.offset_up_x();
        display.offset_down_y();

        let mut source = LatchedCoefficients::new();
        source.publish(CurvatureModel::default());

        match display.tick(&mut source) {
            TickOutcome::TipMoved(pos) => {
                let expected =
                    DVec3::new(2.0 * 0.0002, -0.0002, 0.0) + display.centerline().tip();
                assert!((pos - expected).length() < 1e-12);
            }
            _ => panic!("fresh data must move the tip marker"),
        }
    }

    #[test]
    fn wait_tip_never_updates() {
        let mut display = display();
        display.set_state_wait_tip();
        let mut source = LatchedCoefficients::new();
        source.publish(CurvatureModel::default());

        assert!(matches!(display.tick(&mut source), TickOutcome::Idle));
        // the frame was not consumed either
        let mut direct = source.clone();
        assert!(crate::coefficients::CoefficientSource::take(&mut direct).is_some());
    }

    #[test]
    fn transitions_reset_visibility_deterministically() {
        let mut display = display();

        display.set_state_tip();
        assert_eq!(display.state(), NeedleState::Tip);
        assert!(display.tip_visible());
        assert!(!display.projection_visible());
        assert_eq!(display.offset(), DVec3::ZERO);

        let _ = display.set_state_project();
        assert!(!display.tip_visible());
        assert!(display.projection_visible());

        display.set_state_straight();
        assert!(!display.tip_visible());
        assert!(!display.projection_visible());

        display.set_state_shape();
        assert!(!display.tip_visible());
        assert!(!display.projection_visible());

        display.set_state_wait_tip();
        assert!(!display.tip_visible());
        assert!(!display.projection_visible());
    }

    #[test]
    fn failed_reconstruction_keeps_the_last_good_shape() {
        let mut display = display();
        display.set_state_shape();
        let mut source = LatchedCoefficients::new();

        source.publish(CurvatureModel {
            bx: 3.0,
            ..Default::default()
        });
        assert!(matches!(
            display.tick(&mut source),
            TickOutcome::Rebuilt(_)
        ));
        let good = display.centerline().clone();

        // a bend past a quarter turn in the y plane cannot integrate
        source.publish(CurvatureModel {
            by: 50.0,
            ..Default::default()
        });
        assert!(matches!(display.tick(&mut source), TickOutcome::Idle));
        assert_eq!(display.centerline(), &good);
    }

    #[test]
    fn tip_entry_resets_a_dialed_offset() {
        let mut display = display();
        display.set_state_tip();
        display.offset_up_z();
        assert!(display.offset().length() > 0.0);

        display.set_state_tip();
        assert_eq!(display.offset(), DVec3::ZERO);
    }
}
