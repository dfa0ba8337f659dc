//! Spring physics
//!
//! Closed-form damped harmonic oscillator. Unlike a numerically integrated
//! spring, the position is a pure function of elapsed time, so a frame can
//! be evaluated at any progress without stepping through the ones before it.

use additive_core::{AnimationError, Result};

/// Default fraction of the travel distance under which a spring counts as settled
pub const DEFAULT_SETTLING_THRESHOLD: f32 = 0.001;

/// Damping ratios below this are treated as this value wherever the ratio divides
pub(crate) const MIN_EFFECTIVE_DAMPING: f64 = 0.001;

/// Analytical solver for `x'' + 2ζω₀x' + ω₀²x = ω₀²·target` (unit mass).
///
/// Handles the underdamped (`ζ < 1`), critically damped (`ζ = 1`) and
/// overdamped (`ζ > 1`) regimes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpringSolver {
    stiffness: f32,
    damping_ratio: f32,
    start_value: f32,
    target_value: f32,
    initial_velocity: f32,
    omega0: f64,
    displacement: f64,
}

impl SpringSolver {
    /// Create a solver, rejecting non-physical parameters
    pub fn new(
        stiffness: f32,
        damping_ratio: f32,
        start_value: f32,
        target_value: f32,
    ) -> Result<Self> {
        Self::with_velocity(stiffness, damping_ratio, start_value, target_value, 0.0)
    }

    /// Create a solver with an initial velocity (units per second)
    pub fn with_velocity(
        stiffness: f32,
        damping_ratio: f32,
        start_value: f32,
        target_value: f32,
        initial_velocity: f32,
    ) -> Result<Self> {
        if stiffness.is_nan() || stiffness <= 0.0 {
            return Err(AnimationError::InvalidStiffness(stiffness));
        }
        if damping_ratio.is_nan() || damping_ratio < 0.0 {
            return Err(AnimationError::InvalidDampingRatio(damping_ratio));
        }
        Ok(Self::from_valid(
            stiffness,
            damping_ratio,
            start_value,
            target_value,
            initial_velocity,
        ))
    }

    /// Construct from parameters that were already validated
    pub(crate) fn from_valid(
        stiffness: f32,
        damping_ratio: f32,
        start_value: f32,
        target_value: f32,
        initial_velocity: f32,
    ) -> Self {
        Self {
            stiffness,
            damping_ratio,
            start_value,
            target_value,
            initial_velocity,
            omega0: (stiffness as f64).sqrt(),
            displacement: (start_value - target_value) as f64,
        }
    }

    pub fn stiffness(&self) -> f32 {
        self.stiffness
    }

    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn start_value(&self) -> f32 {
        self.start_value
    }

    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    pub fn initial_velocity(&self) -> f32 {
        self.initial_velocity
    }

    /// Position at `elapsed_seconds` after the start
    pub fn solve(&self, elapsed_seconds: f32) -> f32 {
        let t = elapsed_seconds as f64;
        if t <= 0.0 {
            return self.start_value;
        }

        let zeta = self.damping_ratio as f64;
        let omega0 = self.omega0;
        let a = self.displacement;
        let v0 = self.initial_velocity as f64;
        let target = self.target_value as f64;

        let position = if zeta < 1.0 {
            let omega_d = omega0 * (1.0 - zeta * zeta).sqrt();
            let gamma = zeta * omega0;
            let b = (v0 + gamma * a) / omega_d;
            target + (-gamma * t).exp() * (a * (omega_d * t).cos() + b * (omega_d * t).sin())
        } else if zeta == 1.0 {
            let b = v0 + omega0 * a;
            target + (a + b * t) * (-omega0 * t).exp()
        } else {
            let (c1, r1, c2, r2) = self.overdamped_terms(zeta);
            target + c1 * (r1 * t).exp() + c2 * (r2 * t).exp()
        };

        position as f32
    }

    /// Velocity (units per second) at `elapsed_seconds` after the start
    pub fn velocity(&self, elapsed_seconds: f32) -> f32 {
        let t = elapsed_seconds as f64;
        if t <= 0.0 {
            return self.initial_velocity;
        }

        let zeta = self.damping_ratio as f64;
        let omega0 = self.omega0;
        let a = self.displacement;
        let v0 = self.initial_velocity as f64;

        let velocity = if zeta < 1.0 {
            let omega_d = omega0 * (1.0 - zeta * zeta).sqrt();
            let gamma = zeta * omega0;
            let b = (v0 + gamma * a) / omega_d;
            let (sin, cos) = (omega_d * t).sin_cos();
            (-gamma * t).exp() * (-gamma * (a * cos + b * sin) + omega_d * (-a * sin + b * cos))
        } else if zeta == 1.0 {
            let b = v0 + omega0 * a;
            (b - omega0 * (a + b * t)) * (-omega0 * t).exp()
        } else {
            let (c1, r1, c2, r2) = self.overdamped_terms(zeta);
            c1 * r1 * (r1 * t).exp() + c2 * r2 * (r2 * t).exp()
        };

        velocity as f32
    }

    /// Constants and roots of the overdamped solution `c1·e^(r1·t) + c2·e^(r2·t)`
    fn overdamped_terms(&self, zeta: f64) -> (f64, f64, f64, f64) {
        let sqrt_term = (zeta * zeta - 1.0).sqrt();
        let r1 = -self.omega0 * (zeta - sqrt_term);
        let r2 = -self.omega0 * (zeta + sqrt_term);
        let v0 = self.initial_velocity as f64;
        let c2 = (v0 - r1 * self.displacement) / (r2 - r1);
        let c1 = self.displacement - c2;
        (c1, r1, c2, r2)
    }

    /// Whether both the distance to the target and the velocity are below
    /// `threshold` times the travel distance.
    ///
    /// Velocity is compared as `velocity / ω₀`, the distance it would carry
    /// the value over one radian of the natural period, so both criteria are
    /// in value units. A spring with no travel distance is always settled.
    pub fn is_settled(&self, elapsed_seconds: f32, threshold: f32) -> bool {
        let total_distance = (self.target_value - self.start_value).abs() as f64;
        if total_distance == 0.0 {
            return true;
        }
        let limit = threshold as f64 * total_distance;
        let offset = (self.solve(elapsed_seconds) - self.target_value).abs() as f64;
        let scaled_velocity = (self.velocity(elapsed_seconds) as f64 / self.omega0).abs();
        offset < limit && scaled_velocity < limit
    }
}
