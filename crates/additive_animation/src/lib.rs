//! Additive Animation System
//!
//! Several animations may drive the same property of the same target at
//! once. Each contributes only the change of its own value since the last
//! frame, so a new animation blends into a running one instead of cutting it.
//!
//! # Features
//!
//! - **Additive Blending**: per `(target, tag)` accumulators, one write per frame
//! - **Chaining**: `then()` links with start-relative delays and repeat modes
//! - **Timing**: eased interpolation or damped springs with settling durations
//! - **Evaluators**: colors, shortest-path angles and path sampling
//! - **States**: declarative animation states with start/end actions
//! - **Sequences**: play together, one after another, or staggered
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use additive_animation::{AdditiveAnimator, AnimationScheduler, Easing};
//! use additive_core::ClosureProperty;
//!
//! struct Knob { x: Cell<f32> }
//!
//! let knob = Rc::new(Knob { x: Cell::new(0.0) });
//! let x = ClosureProperty::shared("x", |k: &Knob| k.x.get(), |k: &Knob, v| k.x.set(v));
//!
//! let mut scheduler = AnimationScheduler::new();
//! let to_100 = AdditiveAnimator::new()
//!     .target(knob.clone())
//!     .set_duration(100)
//!     .set_easing(Easing::Linear)
//!     .property(x.clone(), 100.0);
//! scheduler.start(to_100).unwrap();
//! scheduler.tick(50);
//!
//! // Retarget halfway: both animations keep contributing
//! let to_0 = AdditiveAnimator::new()
//!     .target(knob.clone())
//!     .set_duration(100)
//!     .set_easing(Easing::Linear)
//!     .property(x.clone(), 0.0);
//! scheduler.start(to_0).unwrap();
//! scheduler.tick(50);
//! assert_eq!(knob.x.get(), 50.0);
//!
//! scheduler.tick(50);
//! assert_eq!(knob.x.get(), 0.0);
//! ```

pub mod accumulator;
pub mod animation;
pub mod animator;
pub mod config;
pub mod easing;
pub mod evaluator;
pub mod scheduler;
pub mod sequence;
pub mod spring;
pub mod state;
pub mod timing;

pub use accumulator::{
    AccumulatedAnimationValue, AccumulatedAnimationValues, Contribution, ContributionId,
};
pub use animation::AdditiveAnimation;
pub use animator::{AdditiveAnimator, Repeat, RepeatMode};
pub use config::AnimatorConfig;
pub use easing::Easing;
pub use evaluator::{
    shortest_angle_between, ColorEvaluator, PathEvaluator, PathMode, ShortestAngleEvaluator,
    ValueEvaluator,
};
pub use scheduler::{AnimationScheduler, AnimatorId};
pub use sequence::AnimationSequence;
pub use spring::{SpringSolver, DEFAULT_SETTLING_THRESHOLD};
pub use state::{
    Animation, AnimationAction, AnimationState, AnimationStateBuilder, EndAction, StartAction,
    Visibility, VisibilityStateBuilder,
};
pub use timing::{AnimationTiming, SpringParams};
