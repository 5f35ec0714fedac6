//! Replays a sequence of step commands to find out what the plotter draws.
//!
//! The simulation keeps track of the two cable lengths and whether the pen is
//! touching the paper. Every time a step leaves the pen down, we triangulate
//! the pen position from the cable lengths and record it.

use polarsim_geom::{CableLengths, GeometryParams, GeometryViolation, Len, ParamsError, Point};
use polarsim_protocol::{StepCommand, StepSequence, Symbol};
use serde::{Deserialize, Serialize};

/// What to do when a step leaves the pen where the previous point was recorded.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dedup {
    /// Record a point for every step that leaves the pen down.
    #[default]
    EmitAll,
    /// Skip points that are exactly equal to the previous one.
    SkipIdentical,
    /// Skip points that land in the same unit square (a "pixel") as the
    /// previous one.
    SkipSamePixel,
}

impl Dedup {
    fn is_repeat(self, prev: &Point, p: &Point) -> bool {
        match self {
            Dedup::EmitAll => false,
            Dedup::SkipIdentical => prev == p,
            Dedup::SkipSamePixel => prev.floor() == p.floor(),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Options {
    pub dedup: Dedup,
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum IntegrateError {
    #[error("invalid geometry")]
    Params(#[from] ParamsError),
    /// The cable lengths stopped making sense at the step with this (0-based) index.
    #[error("impossible cable lengths at step {step}")]
    Geometry {
        step: usize,
        #[source]
        violation: GeometryViolation,
    },
}

/// The state of the plotter partway through a run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct KinematicState {
    pub lengths: CableLengths,
    pub pen_down: bool,
}

fn step_length(len: &mut Len, symbol: Symbol, step_distance: Len) {
    match symbol {
        Symbol::Pos => *len += step_distance,
        Symbol::Neg => *len -= step_distance,
        Symbol::Nop => {}
    }
}

impl KinematicState {
    /// The state before any steps are taken: pen up, cables at their starting lengths.
    pub fn new(params: &GeometryParams) -> KinematicState {
        KinematicState {
            lengths: params.start_lengths,
            pen_down: false,
        }
    }

    pub fn apply(&mut self, step: StepCommand, step_distance: Len) {
        step_length(&mut self.lengths.left, step.left(), step_distance);
        step_length(&mut self.lengths.right, step.right(), step_distance);
        match step.pen() {
            Symbol::Pos => self.pen_down = true,
            Symbol::Neg => self.pen_down = false,
            Symbol::Nop => {}
        }
    }

    pub fn position(&self, params: &GeometryParams) -> Result<Point, GeometryViolation> {
        params.cable_lengths_to_point(&self.lengths)
    }
}

/// The points visited by the pen while it was down, in order.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    points: Vec<Point>,
}

impl Trajectory {
    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn into_points(self) -> Vec<Point> {
        self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

/// Runs through all the steps, recording a point for every step that leaves
/// the pen down.
pub fn integrate(
    steps: &StepSequence,
    params: &GeometryParams,
) -> Result<Trajectory, IntegrateError> {
    integrate_with(steps, params, &Options::default())
}

pub fn integrate_with(
    steps: &StepSequence,
    params: &GeometryParams,
    options: &Options,
) -> Result<Trajectory, IntegrateError> {
    params.validate()?;

    let mut state = KinematicState::new(params);
    let mut points: Vec<Point> = Vec::with_capacity(steps.len());

    for (idx, step) in steps.iter().enumerate() {
        state.apply(*step, params.step_distance);
        if !state.pen_down {
            continue;
        }

        let p = state
            .position(params)
            .map_err(|violation| IntegrateError::Geometry { step: idx, violation })?;
        if !points.last().is_some_and(|prev| options.dedup.is_repeat(prev, &p)) {
            points.push(p);
        }
    }

    log::debug!(
        "integrated {} steps into {} points (final lengths {:?}, {:?})",
        steps.len(),
        points.len(),
        state.lengths.left.get(),
        state.lengths.right.get(),
    );
    Ok(Trajectory { points })
}

/// The inputs to a simulation, together with the last trajectory that we
/// managed to compute from them.
///
/// If recomputing fails, the old trajectory sticks around so that there's
/// still something to look at while the parameters get fixed.
#[derive(Clone, Debug, Default)]
pub struct Simulation {
    pub params: GeometryParams,
    pub steps: StepSequence,
    pub options: Options,
    trajectory: Trajectory,
}

impl Simulation {
    pub fn new(params: GeometryParams, steps: StepSequence, options: Options) -> Simulation {
        Simulation {
            params,
            steps,
            options,
            trajectory: Trajectory::default(),
        }
    }

    pub fn trajectory(&self) -> &Trajectory {
        &self.trajectory
    }

    pub fn recompute(&mut self) -> Result<&Trajectory, IntegrateError> {
        self.trajectory = integrate_with(&self.steps, &self.params, &self.options)?;
        Ok(&self.trajectory)
    }
}
