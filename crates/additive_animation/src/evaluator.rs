//! Value evaluators
//!
//! A value evaluator replaces linear interpolation for the interpolated
//! timing branch. Path evaluators sample a [`Path`] instead and are shared
//! between the X, Y and rotation contributions of one path animation.

use std::cell::{Cell, OnceCell};
use std::rc::Rc;

use additive_core::{Path, PathMeasure, Point};

/// Custom interpolation between a start and an end value
pub trait ValueEvaluator {
    fn evaluate(&self, fraction: f32, start: f32, end: f32) -> f32;
}

/// Channel-wise interpolation of packed ARGB colors.
///
/// Accepts colors packed as signed (`0xff000000 as i32 as f32`) or unsigned
/// (`0xff000000u32 as f32`) integers and answers in the packing of its
/// inputs. Colors travel through the accumulator as `f32`, so only values
/// that fit the 24-bit mantissa round-trip exactly.
#[derive(Clone, Copy, Debug, Default)]
pub struct ColorEvaluator;

impl ColorEvaluator {
    fn unpack(value: f32) -> u32 {
        value as i64 as u32
    }
}

impl ValueEvaluator for ColorEvaluator {
    fn evaluate(&self, fraction: f32, start: f32, end: f32) -> f32 {
        let signed = start < 0.0 || end < 0.0;
        let from_color = Self::unpack(start);
        let to_color = Self::unpack(end);

        let mut packed = 0u32;
        for shift in [24, 16, 8, 0] {
            let from = ((from_color >> shift) & 0xff) as i32;
            let to = ((to_color >> shift) & 0xff) as i32;
            let channel = (from + (fraction * (to - from) as f32) as i32).clamp(0, 0xff);
            packed |= (channel as u32) << shift;
        }

        if signed {
            packed as i32 as f32
        } else {
            packed as f32
        }
    }
}

/// Rotation in degrees along the shortest arc
#[derive(Clone, Copy, Debug, Default)]
pub struct ShortestAngleEvaluator;

impl ValueEvaluator for ShortestAngleEvaluator {
    fn evaluate(&self, fraction: f32, start: f32, end: f32) -> f32 {
        start + shortest_angle_between(start, end) * fraction
    }
}

/// Signed angular distance in degrees from `start` to `dest`, in `[-180, 180]`
pub fn shortest_angle_between(start: f32, dest: f32) -> f32 {
    let diff = (dest - start) % 360.0;
    if diff > 180.0 {
        diff - 360.0
    } else if diff < -180.0 {
        diff + 360.0
    } else {
        diff
    }
}

/// Which component of a path sample a contribution animates
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum PathMode {
    #[default]
    X,
    Y,
    /// Tangent angle in degrees
    Rotation,
}

impl PathMode {
    /// Decode a numeric mode; unknown codes fall back to `X`
    pub fn from_code(code: i32) -> Self {
        match code {
            1 => PathMode::Y,
            2 => PathMode::Rotation,
            _ => PathMode::X,
        }
    }
}

/// Samples one path for several contributions.
///
/// The X, Y and rotation contributions of a path animation all evaluate the
/// same fraction each frame; the last sample is cached so the path is only
/// measured once per fraction.
#[derive(Debug)]
pub struct PathEvaluator {
    path: Rc<Path>,
    measure: OnceCell<PathMeasure>,
    last_fraction: Cell<Option<f32>>,
    last_point: Cell<Point>,
    last_angle: Cell<f32>,
}

impl PathEvaluator {
    pub fn new(path: Rc<Path>) -> Self {
        Self {
            path,
            measure: OnceCell::new(),
            last_fraction: Cell::new(None),
            last_point: Cell::new(Point::ZERO),
            last_angle: Cell::new(0.0),
        }
    }

    pub fn path(&self) -> &Rc<Path> {
        &self.path
    }

    /// Value of `mode` at `fraction` of the path's length.
    ///
    /// An empty path evaluates to zero in every mode.
    pub fn evaluate(&self, fraction: f32, mode: PathMode) -> f32 {
        if self.last_fraction.get() != Some(fraction) {
            self.sample(fraction);
        }
        match mode {
            PathMode::X => self.last_point.get().x,
            PathMode::Y => self.last_point.get().y,
            PathMode::Rotation => self.last_angle.get(),
        }
    }

    fn sample(&self, fraction: f32) {
        let measure = self
            .measure
            .get_or_init(|| PathMeasure::new(&self.path, false));

        let (point, angle) = match measure.pos_tan(measure.length() * fraction) {
            Some((point, tangent)) => (point, tangent.y.atan2(tangent.x).to_degrees()),
            None => (Point::ZERO, 0.0),
        };

        self.last_point.set(point);
        self.last_angle.set(angle);
        self.last_fraction.set(Some(fraction));
    }
}
