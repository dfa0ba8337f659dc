//! Animation timing
//!
//! How progress becomes motion: either remapped through an easing curve and
//! interpolated, or treated as a time fraction of a spring's settling
//! duration and fed to the closed-form solver.

use crate::easing::Easing;
use crate::spring::{SpringSolver, DEFAULT_SETTLING_THRESHOLD, MIN_EFFECTIVE_DAMPING};
use additive_core::{AnimationError, Result};

/// Validated spring parameters (unit mass)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringParams {
    stiffness: f32,
    damping_ratio: f32,
}

impl SpringParams {
    pub fn new(stiffness: f32, damping_ratio: f32) -> Result<Self> {
        if stiffness.is_nan() || stiffness <= 0.0 {
            return Err(AnimationError::InvalidStiffness(stiffness));
        }
        if damping_ratio.is_nan() || damping_ratio < 0.0 {
            return Err(AnimationError::InvalidDampingRatio(damping_ratio));
        }
        Ok(Self {
            stiffness,
            damping_ratio,
        })
    }

    /// Derive the stiffness so that the spring settles in about `duration_ms`.
    ///
    /// Inverts the settling-duration estimate: `ω₀ = τ(ζ) / duration`,
    /// `stiffness = ω₀²`, where `τ(ζ)` is the dimensionless settling time.
    pub fn with_duration(duration_ms: i64, damping_ratio: f32) -> Result<Self> {
        if duration_ms <= 0 {
            return Err(AnimationError::InvalidDuration(duration_ms));
        }
        if damping_ratio.is_nan() || damping_ratio < 0.0 {
            return Err(AnimationError::InvalidDampingRatio(damping_ratio));
        }

        let duration_seconds = duration_ms as f64 / 1000.0;
        let omega0 =
            settling_time_constant(damping_ratio, DEFAULT_SETTLING_THRESHOLD) / duration_seconds;

        Self::new((omega0 * omega0) as f32, damping_ratio)
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    /// Natural angular frequency `ω₀ = √stiffness`
    pub fn natural_frequency(&self) -> f32 {
        self.stiffness.sqrt()
    }

    /// Settling duration for the default threshold
    pub fn settling_duration_ms(&self) -> u64 {
        self.settling_duration_ms_with(DEFAULT_SETTLING_THRESHOLD)
    }

    /// Time after which position and `velocity / ω₀` both stay within
    /// `threshold` of the travel distance, plus a 10% margin, floored at 1 ms.
    pub fn settling_duration_ms_with(&self, threshold: f32) -> u64 {
        let omega0 = (self.stiffness as f64).sqrt();
        let seconds = settling_time_constant(self.damping_ratio, threshold) / omega0;
        ((seconds * 1.1 * 1000.0) as u64).max(1)
    }

    /// Solver for a motion from `start_value` to `target_value`
    pub fn create_solver(&self, start_value: f32, target_value: f32) -> SpringSolver {
        SpringSolver::from_valid(
            self.stiffness,
            self.damping_ratio,
            start_value,
            target_value,
            0.0,
        )
    }
}

fn effective_damping(damping_ratio: f32) -> f64 {
    (damping_ratio as f64).max(MIN_EFFECTIVE_DAMPING)
}

const MAX_SETTLING_TIME_CONSTANT: f64 = 1.0e12;

/// Upper bound on `|x(τ)|` and `|x'(τ)|` for a unit displacement released
/// from rest, with `τ = ω₀t`.
///
/// Decays at `ζ` when underdamped and at the slow root `ζ - √(ζ² - 1)` when
/// overdamped. The prefactor is capped by `1 + ζτ`, which keeps the bound
/// finite near critical damping where it becomes `(1 + τ)·e^(-τ)`.
fn settling_envelope(zeta: f64, tau: f64) -> f64 {
    if zeta < 1.0 {
        let prefactor = (1.0 / (1.0 - zeta * zeta).sqrt()).min(1.0 + tau);
        prefactor * (-zeta * tau).exp()
    } else {
        let root = (zeta * zeta - 1.0).sqrt();
        // ζ - √(ζ² - 1) without cancellation
        let slow_rate = 1.0 / (zeta + root);
        let prefactor = ((zeta + root) / (2.0 * root)).min(1.0 + zeta * tau);
        prefactor * (-slow_rate * tau).exp()
    }
}

/// Dimensionless time `ω₀t` at which [`settling_envelope`] falls to `threshold`.
///
/// The envelope starts at 1, rises at most once and then decays, so the
/// crossing is found by bisection.
fn settling_time_constant(damping_ratio: f32, threshold: f32) -> f64 {
    let zeta = effective_damping(damping_ratio);
    let threshold = (threshold as f64).max(f64::EPSILON);
    if threshold >= 1.0 {
        return 0.0;
    }

    let mut hi = 1.0;
    while settling_envelope(zeta, hi) > threshold && hi < MAX_SETTLING_TIME_CONSTANT {
        hi *= 2.0;
    }
    let mut lo = 0.0;
    for _ in 0..64 {
        let mid = 0.5 * (lo + hi);
        if settling_envelope(zeta, mid) > threshold {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    hi
}

/// How an animation's progress is turned into a value
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AnimationTiming {
    /// Progress remapped through an optional easing curve, then interpolated
    Interpolated(Option<Easing>),
    /// Progress is a linear time fraction of the spring's settling duration
    Spring(SpringParams),
}

impl AnimationTiming {
    pub fn interpolated(easing: Easing) -> Self {
        AnimationTiming::Interpolated(Some(easing))
    }

    pub fn spring(stiffness: f32, damping_ratio: f32) -> Result<Self> {
        SpringParams::new(stiffness, damping_ratio).map(AnimationTiming::Spring)
    }

    pub fn spring_with_duration(duration_ms: i64, damping_ratio: f32) -> Result<Self> {
        SpringParams::with_duration(duration_ms, damping_ratio).map(AnimationTiming::Spring)
    }

    pub fn is_spring(&self) -> bool {
        matches!(self, AnimationTiming::Spring(_))
    }

    /// Settling duration if this is a spring
    pub fn settling_duration_ms(&self) -> Option<u64> {
        match self {
            AnimationTiming::Spring(params) => Some(params.settling_duration_ms()),
            AnimationTiming::Interpolated(_) => None,
        }
    }

    /// Duration an animator should run with this timing
    pub fn effective_duration_ms(&self, configured_ms: u64) -> u64 {
        self.settling_duration_ms().unwrap_or(configured_ms)
    }
}

impl Default for AnimationTiming {
    fn default() -> Self {
        AnimationTiming::Interpolated(None)
    }
}
