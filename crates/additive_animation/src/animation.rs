//! A single additive contribution
//!
//! An [`AdditiveAnimation`] knows how to produce the value of one property
//! at a given progress. It never writes the property itself: the scheduler
//! turns successive values into deltas and folds them into the shared
//! accumulator for the animation's key.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use additive_core::{AnimationKey, PropertyRef, TargetId};

use crate::evaluator::{PathEvaluator, PathMode, ValueEvaluator};
use crate::spring::SpringSolver;
use crate::state::AnimationState;
use crate::timing::AnimationTiming;

/// Path sampled by an animation, with the component it animates
#[derive(Clone, Debug)]
struct PathSampling {
    mode: PathMode,
    evaluator: Rc<PathEvaluator>,
}

/// One animated property on one target
pub struct AdditiveAnimation<T> {
    target: Rc<T>,
    property: Option<PropertyRef<T>>,
    tag: Rc<str>,
    start_value: f32,
    target_value: f32,
    by_value: Option<f32>,
    path: Option<PathSampling>,
    evaluator: Option<Rc<dyn ValueEvaluator>>,
    timing: AnimationTiming,
    solver: Option<SpringSolver>,
    state: Option<Rc<AnimationState<T>>>,
}

impl<T> AdditiveAnimation<T> {
    /// Animate `property` from `start_value` to `target_value`
    pub fn new(target: Rc<T>, property: PropertyRef<T>, start_value: f32, target_value: f32) -> Self {
        let tag = Rc::from(property.name());
        Self::build(target, Some(property), tag, start_value, target_value)
    }

    /// Animate a value that has no property accessor.
    ///
    /// The scheduler hands accumulated values of such animations to its
    /// custom property applier.
    pub fn custom(target: Rc<T>, tag: &str, start_value: f32, target_value: f32) -> Self {
        Self::build(target, None, Rc::from(tag), start_value, target_value)
    }

    /// Animate `property` along a path; the target value is the path's end
    pub fn along_path(
        target: Rc<T>,
        property: PropertyRef<T>,
        start_value: f32,
        mode: PathMode,
        evaluator: Rc<PathEvaluator>,
    ) -> Self {
        let end = evaluator.evaluate(1.0, mode);
        let mut animation = Self::new(target, property, start_value, end);
        animation.path = Some(PathSampling { mode, evaluator });
        animation
    }

    fn build(
        target: Rc<T>,
        property: Option<PropertyRef<T>>,
        tag: Rc<str>,
        start_value: f32,
        target_value: f32,
    ) -> Self {
        Self {
            target,
            property,
            tag,
            start_value,
            target_value,
            by_value: None,
            path: None,
            evaluator: None,
            timing: AnimationTiming::default(),
            solver: None,
            state: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Rc<dyn ValueEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn with_state(mut self, state: Option<Rc<AnimationState<T>>>) -> Self {
        self.state = state;
        self
    }

    /// Treat the current target value as a relative offset.
    ///
    /// Must be called before the animation is evaluated. The absolute target
    /// is resolved once the real start value is known.
    pub fn set_by(&mut self, is_by: bool) {
        self.by_value = is_by.then_some(self.target_value);
    }

    pub fn is_by(&self) -> bool {
        self.by_value.is_some()
    }

    pub fn by_value(&self) -> Option<f32> {
        self.by_value
    }

    /// Anchor the animation at its real start value
    pub fn set_start_value(&mut self, start_value: f32) {
        self.start_value = start_value;
        if let Some(by) = self.by_value {
            self.target_value = start_value + by;
        }
        self.solver = None;
    }

    pub fn set_target_value(&mut self, target_value: f32) {
        self.target_value = target_value;
        self.solver = None;
    }

    /// Replace the timing, dropping any solver built for the previous one
    pub fn set_timing(&mut self, timing: AnimationTiming) {
        self.timing = timing;
        self.solver = None;
    }

    pub fn set_state(&mut self, state: Option<Rc<AnimationState<T>>>) {
        self.state = state;
    }

    /// Value at `progress` in `[0, 1]`
    pub fn evaluate_at(&mut self, progress: f32) -> f32 {
        match self.timing {
            AnimationTiming::Spring(params) => {
                let (start, target) = (self.start_value, self.target_value);
                let solver = self
                    .solver
                    .get_or_insert_with(|| params.create_solver(start, target));
                let elapsed_seconds = progress * params.settling_duration_ms() as f32 / 1000.0;
                solver.solve(elapsed_seconds)
            }
            AnimationTiming::Interpolated(easing) => {
                let progress = easing.map_or(progress, |easing| easing.apply(progress));
                self.interpolate(progress)
            }
        }
    }

    fn interpolate(&self, progress: f32) -> f32 {
        if let Some(path) = &self.path {
            path.evaluator.evaluate(progress, path.mode)
        } else if let Some(evaluator) = &self.evaluator {
            evaluator.evaluate(progress, self.start_value, self.target_value)
        } else {
            self.start_value + (self.target_value - self.start_value) * progress
        }
    }

    /// Copy onto another target, re-anchored at `start_value`.
    ///
    /// A "by" animation keeps its offset instead of the old absolute target.
    pub fn clone_with_target(&self, target: Rc<T>, start_value: f32) -> Self {
        let mut animation = Self {
            target,
            property: self.property.clone(),
            tag: self.tag.clone(),
            start_value,
            target_value: self.target_value,
            by_value: self.by_value,
            path: self.path.clone(),
            evaluator: self.evaluator.clone(),
            timing: self.timing,
            solver: None,
            state: self.state.clone(),
        };
        animation.set_start_value(start_value);
        animation
    }

    pub fn key(&self) -> AnimationKey {
        AnimationKey::new(TargetId::of(&self.target), self.tag.clone())
    }

    pub fn target(&self) -> &Rc<T> {
        &self.target
    }

    pub fn target_id(&self) -> TargetId {
        TargetId::of(&self.target)
    }

    pub fn property(&self) -> Option<&PropertyRef<T>> {
        self.property.as_ref()
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn start_value(&self) -> f32 {
        self.start_value
    }

    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    pub fn timing(&self) -> &AnimationTiming {
        &self.timing
    }

    pub fn state(&self) -> Option<&Rc<AnimationState<T>>> {
        self.state.as_ref()
    }

    /// Live value of the animated property, if it has an accessor
    pub fn read_property(&self) -> Option<f32> {
        self.property
            .as_ref()
            .map(|property| property.get(&self.target))
    }
}

impl<T> PartialEq for AdditiveAnimation<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.target, &other.target) && self.tag == other.tag
    }
}

impl<T> Eq for AdditiveAnimation<T> {}

impl<T> Hash for AdditiveAnimation<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl<T> fmt::Debug for AdditiveAnimation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdditiveAnimation")
            .field("target", &self.target_id())
            .field("tag", &self.tag)
            .field("start_value", &self.start_value)
            .field("target_value", &self.target_value)
            .field("by_value", &self.by_value)
            .field("timing", &self.timing)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::easing::Easing;
    use crate::evaluator::ShortestAngleEvaluator;
    use additive_core::{ClosureProperty, Path};
    use std::cell::Cell;

    struct Sprite {
        x: Cell<f32>,
    }

    fn sprite(x: f32) -> Rc<Sprite> {
        Rc::new(Sprite { x: Cell::new(x) })
    }

    fn x_prop() -> PropertyRef<Sprite> {
        ClosureProperty::shared("x", |s: &Sprite| s.x.get(), |s: &Sprite, v| s.x.set(v))
    }

    #[test]
    fn test_linear_interpolation_without_easing() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 10.0, 20.0);
        assert_eq!(animation.evaluate_at(0.0), 10.0);
        assert_eq!(animation.evaluate_at(0.5), 15.0);
        assert_eq!(animation.evaluate_at(1.0), 20.0);
    }

    #[test]
    fn test_easing_remaps_progress_before_interpolation() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 100.0);
        animation.set_timing(AnimationTiming::interpolated(Easing::EaseInQuad));
        assert!((animation.evaluate_at(0.5) - 25.0).abs() < 1e-4);
    }

    #[test]
    fn test_custom_evaluator_replaces_lerp() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 350.0, 10.0)
            .with_evaluator(Rc::new(ShortestAngleEvaluator));
        assert!((animation.evaluate_at(0.5) - 360.0).abs() < 1e-4);
    }

    #[test]
    fn test_spring_timing_ignores_easing_and_uses_solver() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 100.0);
        animation.set_timing(AnimationTiming::spring(200.0, 0.5).unwrap());

        assert_eq!(animation.evaluate_at(0.0), 0.0);
        assert!((animation.evaluate_at(1.0) - 100.0).abs() < 1.0);

        let params = match animation.timing() {
            AnimationTiming::Spring(params) => *params,
            AnimationTiming::Interpolated(_) => unreachable!(),
        };
        let seconds = 0.3 * params.settling_duration_ms() as f32 / 1000.0;
        let expected = params.create_solver(0.0, 100.0).solve(seconds);
        assert_eq!(animation.evaluate_at(0.3), expected);
    }

    #[test]
    fn test_replacing_timing_discards_cached_solver() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 100.0);
        animation.set_timing(AnimationTiming::spring(50.0, 0.2).unwrap());
        let springy = animation.evaluate_at(0.2);

        animation.set_timing(AnimationTiming::Interpolated(None));
        assert_eq!(animation.evaluate_at(0.2), 20.0);
        assert_ne!(springy, 20.0);
    }

    #[test]
    fn test_by_value_resolves_against_discovered_start() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 20.0);
        animation.set_by(true);
        assert_eq!(animation.by_value(), Some(20.0));

        animation.set_target_value(999.0);
        animation.set_start_value(10.0);
        assert_eq!(animation.target_value(), 30.0);
    }

    #[test]
    fn test_clone_with_target_reapplies_by_delta() {
        let mut animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 5.0);
        animation.set_by(true);
        animation.set_start_value(100.0);
        assert_eq!(animation.target_value(), 105.0);

        let other = sprite(40.0);
        let cloned = animation.clone_with_target(other.clone(), 40.0);
        assert_eq!(cloned.target_value(), 45.0);
        assert!(Rc::ptr_eq(cloned.target(), &other));
        assert!(cloned.is_by());
    }

    #[test]
    fn test_clone_with_target_keeps_absolute_target() {
        let animation = AdditiveAnimation::new(sprite(0.0), x_prop(), 0.0, 5.0);
        let cloned = animation.clone_with_target(sprite(1.0), 3.0);
        assert_eq!(cloned.start_value(), 3.0);
        assert_eq!(cloned.target_value(), 5.0);
    }

    #[test]
    fn test_equality_is_tag_value_and_target_identity() {
        let a = sprite(0.0);
        let b = sprite(0.0);
        let first = AdditiveAnimation::new(a.clone(), x_prop(), 0.0, 1.0);
        let second = AdditiveAnimation::custom(a.clone(), "x", 5.0, 6.0);
        let other_target = AdditiveAnimation::new(b, x_prop(), 0.0, 1.0);
        let other_tag = AdditiveAnimation::custom(a, "y", 0.0, 1.0);

        assert_eq!(first, second);
        assert_eq!(first.key(), second.key());
        assert_ne!(first, other_target);
        assert_ne!(first, other_tag);
    }

    #[test]
    fn test_path_animation_targets_path_end() {
        let path = Path::builder().move_to(0.0, 0.0).line_to(0.0, 80.0).build();
        let evaluator = Rc::new(PathEvaluator::new(Rc::new(path)));
        let y = ClosureProperty::shared("y", |_: &Sprite| 0.0, |_: &Sprite, _| {});

        let mut animation =
            AdditiveAnimation::along_path(sprite(0.0), y, 0.0, PathMode::Y, evaluator);
        assert!((animation.target_value() - 80.0).abs() < 1e-3);
        assert!((animation.evaluate_at(0.5) - 40.0).abs() < 1e-3);
    }

    #[test]
    fn test_read_property() {
        let target = sprite(7.0);
        let animation = AdditiveAnimation::new(target.clone(), x_prop(), 0.0, 1.0);
        assert_eq!(animation.read_property(), Some(7.0));
        assert_eq!(AdditiveAnimation::custom(target, "z", 0.0, 1.0).read_property(), None);
    }
}
