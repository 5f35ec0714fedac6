//! Turns drawings into step commands.
//!
//! This is the inverse of the simulator: given a path on the paper, we
//! produce a sequence of steps that moves the pen along it. Curves are
//! flattened, the resulting lines are cut into pieces no longer than a
//! single step, and then each cable is stepped towards the length it needs
//! to reach the end of each piece. A step moves each motor at most once, so
//! diagonal moves (in cable-length space) interleave the two motors.

use std::cmp::Ordering;

use kurbo::{BezPath, PathEl};
use polarsim_geom::{FromKurbo as _, GeometryParams, LeftRight, Len, ParamsError, Point};
use polarsim_protocol::{StepCommand, StepSequence, Symbol};

#[derive(Clone, Debug)]
pub struct PlannerConfig {
    /// How far (in paper units) the flattened path may stray from the curves.
    pub accuracy: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        PlannerConfig { accuracy: 0.5 }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum PlanError {
    #[error("invalid geometry")]
    Params(#[from] ParamsError),
    #[error("can't plan with a step distance of zero")]
    ZeroStep,
    #[error("there's nothing to draw")]
    Empty,
    #[error("({x}, {y}) is above the spools")]
    OutOfReach { x: f32, y: f32 },
}

/// Steps that draw a path, and the parameters they should be replayed with.
///
/// The parameters are the ones that the plan was made with, except that the
/// start lengths put the pen at the beginning of the path.
#[derive(Clone, Debug, PartialEq)]
pub struct Plan {
    pub params: GeometryParams,
    pub steps: StepSequence,
}

/// How many steps each motor has taken away from the start lengths.
type StepCounts = LeftRight<i64>;

fn direction(from: i64, to: i64) -> Symbol {
    match to.cmp(&from) {
        Ordering::Greater => Symbol::Pos,
        Ordering::Less => Symbol::Neg,
        Ordering::Equal => Symbol::Nop,
    }
}

fn advance(count: &mut i64, symbol: Symbol) {
    match symbol {
        Symbol::Pos => *count += 1,
        Symbol::Neg => *count -= 1,
        Symbol::Nop => {}
    }
}

struct Stepper {
    params: GeometryParams,
    counts: StepCounts,
    pen_down: bool,
    steps: Vec<StepCommand>,
}

impl Stepper {
    fn set_pen(&mut self, down: bool) {
        if self.pen_down != down {
            let pen = if down { Symbol::Pos } else { Symbol::Neg };
            self.steps.push(StepCommand::new(Symbol::Nop, Symbol::Nop, pen));
            self.pen_down = down;
        }
    }

    // The nearest step counts to the cable lengths that reach `p`.
    fn point_to_steps(&self, p: &Point) -> StepCounts {
        let target = self.params.point_to_cable_lengths(p);
        let start = self.params.start_lengths;
        let step = self.params.step_distance.get() as f64;
        let count = |target: Len, start: Len| {
            ((target.get() as f64 - start.get() as f64) / step).round() as i64
        };
        StepCounts {
            left: count(target.left, start.left),
            right: count(target.right, start.right),
        }
    }

    fn move_to(&mut self, p: &Point) {
        let target = self.point_to_steps(p);
        loop {
            let left = direction(self.counts.left, target.left);
            let right = direction(self.counts.right, target.right);
            if left == Symbol::Nop && right == Symbol::Nop {
                break;
            }
            advance(&mut self.counts.left, left);
            advance(&mut self.counts.right, right);
            self.steps.push(StepCommand::new(left, right, Symbol::Nop));
        }
    }

    fn line_to(&mut self, from: &Point, to: &Point) {
        let step = self.params.step_distance.get();
        let pieces = ((*to - *from).length() / step).ceil().max(1.0) as usize;
        for i in 1..=pieces {
            self.move_to(&from.lerp(*to, i as f32 / pieces as f32));
        }
    }
}

/// Splits a path into polylines, one per subpath, in paper coordinates.
pub fn flatten(path: &BezPath, accuracy: f64) -> Vec<Vec<Point>> {
    let mut ret: Vec<Vec<Point>> = Vec::new();
    path.flatten(accuracy, |el| match el {
        PathEl::MoveTo(p) => ret.push(vec![Point::from_kurbo(p)]),
        PathEl::LineTo(p) => {
            if let Some(sub) = ret.last_mut() {
                sub.push(Point::from_kurbo(p));
            }
        }
        PathEl::ClosePath => {
            if let Some(sub) = ret.last_mut() {
                if let Some(&start) = sub.first() {
                    sub.push(start);
                }
            }
        }
        // Flattening only produces lines.
        PathEl::QuadTo(..) | PathEl::CurveTo(..) => {}
    });
    ret
}

/// Plans steps that draw `path`, which is given in paper coordinates.
///
/// The pen goes down at the start of every subpath and comes up at the end.
pub fn plan(
    path: &BezPath,
    params: &GeometryParams,
    config: &PlannerConfig,
) -> Result<Plan, PlanError> {
    params.validate()?;
    if params.step_distance.get() <= 0.0 {
        return Err(PlanError::ZeroStep);
    }

    let polylines: Vec<Vec<Point>> = flatten(path, config.accuracy)
        .into_iter()
        .map(|line| line.into_iter().map(|p| params.to_machine(p)).collect())
        .collect();

    if let Some(p) = polylines.iter().flatten().find(|p| p.y < 0.0) {
        return Err(PlanError::OutOfReach { x: p.x, y: p.y });
    }
    let start = *polylines.first().and_then(|l| l.first()).ok_or(PlanError::Empty)?;

    let mut params = *params;
    params.start_lengths = params.point_to_cable_lengths(&start);
    let mut stepper = Stepper {
        params,
        counts: StepCounts { left: 0, right: 0 },
        pen_down: false,
        steps: Vec::new(),
    };

    for line in &polylines {
        let Some(first) = line.first() else {
            continue;
        };
        stepper.set_pen(false);
        stepper.move_to(first);
        stepper.set_pen(true);
        for pair in line.windows(2) {
            stepper.line_to(&pair[0], &pair[1]);
        }
    }
    stepper.set_pen(false);

    log::debug!(
        "planned {} subpaths as {} steps",
        polylines.len(),
        stepper.steps.len()
    );
    Ok(Plan {
        params,
        steps: StepSequence::new(stepper.steps),
    })
}
