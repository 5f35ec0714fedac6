//! Basic geometry of a two-cable plotter: the parameters describing the
//! machine, and the conversion between cable lengths and positions on the
//! drawing plane.
//!
//! The two cables hang from spools that are `spool_distance` apart, with
//! the left spool at the origin and the right spool at `(spool_distance, 0)`.
//! The y axis points down, so every reachable position has `y >= 0`.
//!
//! This crate supports `no_std` and uses `libm` for the square roots, so
//! that the same kinematics can be shared with code running on a
//! microcontroller.

#![cfg_attr(not(feature = "std"), no_std)]

use libm::{fabsf, sqrtf};

/// Unit marker for lengths and positions on the drawing plane.
///
/// Step files don't say what their units are; everything is measured in
/// whatever unit the step distance was given in.
pub struct Plane;

pub type Point = euclid::Point2D<f32, Plane>;
pub type Vector = euclid::Vector2D<f32, Plane>;
pub type Len = euclid::Length<f32, Plane>;

fn square<T: core::ops::Mul<T> + Copy>(x: T) -> <T as core::ops::Mul<T>>::Output {
    x * x
}

pub trait LenExt {
    fn units(self) -> Len;
}

impl LenExt for f32 {
    fn units(self) -> Len {
        Len::new(self)
    }
}

pub trait FromKurbo {
    type Input;
    fn from_kurbo(p: Self::Input) -> Self;
}

#[cfg(feature = "kurbo")]
impl FromKurbo for Point {
    type Input = kurbo::Point;
    fn from_kurbo(p: kurbo::Point) -> Self {
        Point::new(p.x as f32, p.y as f32)
    }
}

#[cfg(feature = "kurbo")]
pub trait ToKurbo {
    fn to_kurbo(&self) -> kurbo::Point;
}

#[cfg(feature = "kurbo")]
impl ToKurbo for Point {
    fn to_kurbo(&self) -> kurbo::Point {
        kurbo::Point::new(self.x.into(), self.y.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LeftRight<T> {
    pub left: T,
    pub right: T,
}

/// Lengths of the cables, from the spools to the pen carriage.
///
/// Left and right are measured from the point of view of the person
/// looking at the drawing.
pub type CableLengths = LeftRight<Len>;

/// Ways in which the machine parameters can be nonsensical.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum ParamsError {
    #[error("spool distance must be positive, got {0}")]
    SpoolDistance(f32),
    #[error("step distance must not be negative, got {0}")]
    StepDistance(f32),
    #[error("{0} is not a finite number")]
    NotFinite(&'static str),
}

/// A pair of cable lengths that doesn't correspond to any position of the
/// pen carriage.
#[derive(Clone, Copy, Debug, PartialEq, thiserror::Error)]
pub enum GeometryViolation {
    /// The cables together are shorter than the distance between the spools,
    /// which could only happen if one of them snapped.
    #[error("cable snapped: left {left} + right {right} is less than the spool distance {spool}")]
    Snapped { left: f32, right: f32, spool: f32 },
    /// One cable is longer than the other one plus the spool distance, so the
    /// cables can't meet.
    #[error("unreachable: left {left} and right {right} differ by more than {spool}")]
    Unreachable { left: f32, right: f32, spool: f32 },
}

impl GeometryViolation {
    pub fn lengths(&self) -> CableLengths {
        match *self {
            GeometryViolation::Snapped { left, right, .. }
            | GeometryViolation::Unreachable { left, right, .. } => CableLengths {
                left: left.units(),
                right: right.units(),
            },
        }
    }
}

pub struct ParamsBuilder {
    step_distance: Len,
    spool_distance: Len,
    paper_offset: Vector,
    start_lengths: CableLengths,
}

impl Default for ParamsBuilder {
    fn default() -> Self {
        let defaults = GeometryParams::default();
        Self {
            step_distance: defaults.step_distance,
            spool_distance: defaults.spool_distance,
            paper_offset: defaults.paper_offset,
            start_lengths: defaults.start_lengths,
        }
    }
}

impl ParamsBuilder {
    pub fn build(&self) -> Result<GeometryParams, ParamsError> {
        let params = GeometryParams {
            step_distance: self.step_distance,
            spool_distance: self.spool_distance,
            paper_offset: self.paper_offset,
            start_lengths: self.start_lengths,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn with_step_distance(&mut self, step_distance: Len) -> &mut Self {
        self.step_distance = step_distance;
        self
    }

    pub fn with_spool_distance(&mut self, spool_distance: Len) -> &mut Self {
        self.spool_distance = spool_distance;
        self
    }

    pub fn with_paper_offset(&mut self, offset: Vector) -> &mut Self {
        self.paper_offset = offset;
        self
    }

    pub fn with_start_lengths(&mut self, lengths: CableLengths) -> &mut Self {
        self.start_lengths = lengths;
        self
    }
}

/// The geometric configuration of the plotter.
///
/// These are owned by whoever is driving the simulation (usually a UI, or
/// the header of a step file); the kinematics only ever read them.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct GeometryParams {
    /// How much a cable lengthens or shortens on a single motor step.
    pub step_distance: Len,
    /// The horizontal distance between the spools. (We assume that the
    /// spools are aligned vertically.)
    pub spool_distance: Len,
    /// Where the paper's corner sits, relative to the left spool.
    pub paper_offset: Vector,
    /// The cable lengths before the first step is taken.
    pub start_lengths: CableLengths,
}

impl Default for GeometryParams {
    fn default() -> Self {
        GeometryParams {
            step_distance: 0.25.units(),
            spool_distance: 200.0.units(),
            paper_offset: Vector::zero(),
            start_lengths: CableLengths {
                left: 150.0.units(),
                right: 150.0.units(),
            },
        }
    }
}

impl GeometryParams {
    pub fn validate(&self) -> Result<(), ParamsError> {
        let fields = [
            ("step distance", self.step_distance.get()),
            ("spool distance", self.spool_distance.get()),
            ("paper offset x", self.paper_offset.x),
            ("paper offset y", self.paper_offset.y),
            ("start length left", self.start_lengths.left.get()),
            ("start length right", self.start_lengths.right.get()),
        ];
        if let Some((name, _)) = fields.iter().find(|(_, v)| !v.is_finite()) {
            return Err(ParamsError::NotFinite(*name));
        }

        if self.spool_distance.get() <= 0.0 {
            return Err(ParamsError::SpoolDistance(self.spool_distance.get()));
        }
        if self.step_distance.get() < 0.0 {
            return Err(ParamsError::StepDistance(self.step_distance.get()));
        }
        Ok(())
    }

    /// Finds the pen position by treating the two cables and the bar between
    /// the spools as a triangle.
    pub fn cable_lengths_to_point(
        &self,
        lengths: &CableLengths,
    ) -> Result<Point, GeometryViolation> {
        let d = self.spool_distance.get();
        let l = lengths.left.get();
        let r = lengths.right.get();

        if l + r < d {
            return Err(GeometryViolation::Snapped {
                left: l,
                right: r,
                spool: d,
            });
        }
        if fabsf(l - r) > d {
            return Err(GeometryViolation::Unreachable {
                left: l,
                right: r,
                spool: d,
            });
        }

        let x = (square(d) + square(l) - square(r)) / (2.0 * d);
        // The triangle inequalities hold, so anything negative here is rounding error.
        let y = sqrtf((square(l) - square(x)).max(0.0));
        Ok(Point::new(x, y))
    }

    pub fn point_to_cable_lengths(&self, p: &Point) -> CableLengths {
        let d = self.spool_distance.get();
        CableLengths {
            left: sqrtf(square(p.x) + square(p.y)).units(),
            right: sqrtf(square(d - p.x) + square(p.y)).units(),
        }
    }

    /// Where the pen sits before any steps are taken.
    pub fn start_point(&self) -> Result<Point, GeometryViolation> {
        self.cable_lengths_to_point(&self.start_lengths)
    }

    /// Converts a position relative to the left spool into a position on the paper.
    pub fn to_paper(&self, p: Point) -> Point {
        p - self.paper_offset
    }

    /// Converts a position on the paper into a position relative to the left spool.
    pub fn to_machine(&self, p: Point) -> Point {
        p + self.paper_offset
    }
}
