//! Animation chains
//!
//! An [`AdditiveAnimator`] collects contributions for one or more targets
//! and the timing they share. `then*` methods append a new link that starts
//! relative to the previous one; the whole chain is handed to the scheduler
//! in one `start` call.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use additive_animation::{AdditiveAnimator, AnimationScheduler, Easing};
//! use additive_core::ClosureProperty;
//!
//! struct Card { y: Cell<f32> }
//!
//! let card = Rc::new(Card { y: Cell::new(0.0) });
//! let y = ClosureProperty::shared("y", |c: &Card| c.y.get(), |c: &Card, v| c.y.set(v));
//!
//! let mut scheduler = AnimationScheduler::new();
//! let animator = AdditiveAnimator::new()
//!     .target(card.clone())
//!     .set_duration(200)
//!     .set_easing(Easing::Linear)
//!     .property(y.clone(), 100.0)
//!     .then()
//!     .property(y, 0.0);
//! scheduler.start(animator).unwrap();
//!
//! scheduler.tick(100);
//! assert_eq!(card.y.get(), 50.0);
//! scheduler.tick(200);
//! assert_eq!(card.y.get(), 50.0);
//! scheduler.tick(100);
//! assert_eq!(card.y.get(), 0.0);
//! ```

use std::fmt;
use std::rc::Rc;

use additive_core::{AnimationError, Path, PropertyRef, Result};
use tracing::warn;

use crate::animation::AdditiveAnimation;
use crate::config::AnimatorConfig;
use crate::easing::Easing;
use crate::evaluator::{PathEvaluator, PathMode, ValueEvaluator};
use crate::state::{AnimationAction, AnimationState};
use crate::timing::AnimationTiming;

/// How often an animator runs its animations
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Repeat {
    /// Number of extra cycles after the first
    Count(u32),
    Infinite,
}

impl Repeat {
    /// Cycles counted for duration queries; infinite repetition counts one
    pub fn cycles_in_sequence(self) -> u64 {
        match self {
            Repeat::Count(count) => count as u64 + 1,
            Repeat::Infinite => 1,
        }
    }
}

impl Default for Repeat {
    fn default() -> Self {
        Repeat::Count(0)
    }
}

/// What a repeated cycle does after reaching the end
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RepeatMode {
    #[default]
    Restart,
    /// Every other cycle runs backwards
    Reverse,
}

pub(crate) type StartListener = Box<dyn FnMut()>;
pub(crate) type EndListener = Box<dyn FnMut(bool)>;

/// Builder for one link of an animation chain
pub struct AdditiveAnimator<T> {
    pub(crate) parent: Option<Box<AdditiveAnimator<T>>>,
    pub(crate) current_target: Option<Rc<T>>,
    pub(crate) animations: Vec<AdditiveAnimation<T>>,
    pub(crate) states: Vec<(Rc<T>, Rc<AnimationState<T>>)>,
    pub(crate) duration_ms: u64,
    pub(crate) start_delay_ms: u64,
    pub(crate) delay_in_sequence_ms: u64,
    pub(crate) timing: AnimationTiming,
    pub(crate) repeat: Repeat,
    pub(crate) repeat_mode: RepeatMode,
    pub(crate) start_listeners: Vec<StartListener>,
    pub(crate) end_listeners: Vec<EndListener>,
    pub(crate) pending_error: Option<AnimationError>,
    /// Links created by one `targets`/`add_target` call, ending at this one
    pub(crate) group_size: usize,
    /// Offset of this link within its group, kept when the start delay changes
    pub(crate) stagger_offset_ms: u64,
}

impl<T: 'static> AdditiveAnimator<T> {
    pub fn new() -> Self {
        Self::with_config(&AnimatorConfig::default())
    }

    pub fn with_config(config: &AnimatorConfig) -> Self {
        Self {
            parent: None,
            current_target: None,
            animations: Vec::new(),
            states: Vec::new(),
            duration_ms: config.default_duration_ms,
            start_delay_ms: 0,
            delay_in_sequence_ms: 0,
            timing: AnimationTiming::interpolated(config.default_easing),
            repeat: Repeat::default(),
            repeat_mode: RepeatMode::default(),
            start_listeners: Vec::new(),
            end_listeners: Vec::new(),
            pending_error: None,
            group_size: 1,
            stagger_offset_ms: 0,
        }
    }

    /// Switch the target that following calls animate.
    ///
    /// Leaving a group of targets starts a new link at the same start delay,
    /// so later settings do not change the group.
    pub fn target(mut self, target: Rc<T>) -> Self {
        if self.group_size > 1 {
            let delay = self.start_delay_ms;
            self = self.chain(delay);
        }
        self.current_target = Some(target);
        self
    }

    /// Animate several targets with the same calls, each one starting
    /// `stagger_ms` after the previous one.
    ///
    /// Every target gets its own link. Following property, duration, easing
    /// and repeat calls apply to all of them, and `then*` chains the whole
    /// group. An empty list is reported as [`AnimationError::MissingTarget`].
    pub fn targets(mut self, targets: impl IntoIterator<Item = Rc<T>>, stagger_ms: u64) -> Self {
        let mut targets = targets.into_iter();
        let Some(first) = targets.next() else {
            return self.fail(AnimationError::MissingTarget);
        };
        self = self.target(first);
        let origin = self.start_delay_ms;

        for target in targets {
            let offset = self.stagger_offset_ms.saturating_add(stagger_ms);
            let size = self.group_size + 1;
            self = self.chain(origin.saturating_add(offset));
            self.current_target = Some(target);
            self.group_size = size;
            self.stagger_offset_ms = offset;
        }
        self
    }

    /// Add `target` to the current group; following calls animate it
    /// together with the targets already in the group
    pub fn add_target(self, target: Rc<T>) -> Self {
        let size = self.group_size + 1;
        let offset = self.stagger_offset_ms;
        let delay = self.start_delay_ms;

        let mut link = self.chain(delay);
        link.current_target = Some(target);
        link.group_size = size;
        link.stagger_offset_ms = offset;
        link
    }

    pub fn current_target(&self) -> Option<&Rc<T>> {
        self.current_target.as_ref()
    }

    /// Animate `property` of the current target to `value`
    pub fn property(self, property: PropertyRef<T>, value: f32) -> Self {
        self.push_property(property, value, None, false)
    }

    /// Animate `property` of the current target by `delta` relative to its
    /// value when the animation starts
    pub fn property_by(self, property: PropertyRef<T>, delta: f32) -> Self {
        self.push_property(property, delta, None, true)
    }

    pub fn property_with_evaluator(
        self,
        property: PropertyRef<T>,
        value: f32,
        evaluator: Rc<dyn ValueEvaluator>,
    ) -> Self {
        self.push_property(property, value, Some(evaluator), false)
    }

    /// Animate a value that has no property accessor.
    ///
    /// Accumulated values are delivered to the scheduler's custom property
    /// applier under `tag`.
    pub fn custom(mut self, tag: &str, start_value: f32, target_value: f32) -> Self {
        self.for_each_grouped(|link| {
            if let Some(target) = link.require_target() {
                link.push(AdditiveAnimation::custom(target, tag, start_value, target_value));
            }
        });
        self
    }

    /// Move the current target along `path`.
    ///
    /// Each given property animates one component of the path sample. All of
    /// them share a single path evaluator per target.
    pub fn animate_along_path(
        mut self,
        x: Option<PropertyRef<T>>,
        y: Option<PropertyRef<T>>,
        rotation: Option<PropertyRef<T>>,
        path: Rc<Path>,
    ) -> Self {
        let components = [(x, PathMode::X), (y, PathMode::Y), (rotation, PathMode::Rotation)];
        self.for_each_grouped(|link| {
            let Some(target) = link.require_target() else {
                return;
            };
            let evaluator = Rc::new(PathEvaluator::new(path.clone()));
            for (property, mode) in &components {
                if let Some(property) = property {
                    let start = property.get(&target);
                    let animation = AdditiveAnimation::along_path(
                        target.clone(),
                        property.clone(),
                        start,
                        *mode,
                        evaluator.clone(),
                    );
                    link.push(animation);
                }
            }
        });
        self
    }

    /// Animate the current target into `state`.
    ///
    /// The state becomes the target's current state when the chain is
    /// started; contributions of an older state that have not begun yet are
    /// dropped at that point.
    pub fn state(mut self, state: Rc<AnimationState<T>>) -> Self {
        self.for_each_grouped(|link| {
            let Some(target) = link.require_target() else {
                return;
            };
            for animation in state.animations() {
                let contribution = link
                    .build_property(
                        &target,
                        animation.property().clone(),
                        animation.target_value(),
                        animation.evaluator().cloned(),
                        false,
                    )
                    .with_state(Some(state.clone()));
                link.push(contribution);
            }
            link.states.push((target, state.clone()));
        });
        self
    }

    /// Animate every animation of `action` without associating a state
    pub fn action(mut self, action: &dyn AnimationAction<T>) -> Self {
        for animation in action.animations() {
            self = self.push_property(
                animation.property().clone(),
                animation.target_value(),
                animation.evaluator().cloned(),
                false,
            );
        }
        self
    }

    /// Duration of interpolated animations; springs run for their settling
    /// duration instead
    pub fn set_duration(mut self, duration_ms: u64) -> Self {
        self.for_each_grouped(|link| link.duration_ms = duration_ms);
        self
    }

    /// Continue with a link that starts together with this one and uses
    /// `duration_ms`; animations added before keep their duration
    pub fn switch_duration(self, duration_ms: u64) -> Self {
        self.then_with_delay(0).set_duration(duration_ms)
    }

    /// Start delay relative to the chain start; grouped targets keep their
    /// stagger on top of it
    pub fn set_start_delay(mut self, delay_ms: u64) -> Self {
        self.for_each_grouped(|link| {
            link.start_delay_ms = delay_ms.saturating_add(link.stagger_offset_ms);
        });
        self
    }

    /// Use `easing` for all animations of this link, existing and future
    pub fn set_easing(self, easing: Easing) -> Self {
        self.set_timing(AnimationTiming::interpolated(easing))
    }

    /// Use `easing` only for animations added after this call
    pub fn switch_easing(mut self, easing: Easing) -> Self {
        let timing = AnimationTiming::interpolated(easing);
        self.for_each_grouped(|link| link.timing = timing);
        self
    }

    /// Use `timing` for all animations of this link, existing and future
    pub fn set_timing(mut self, timing: AnimationTiming) -> Self {
        self.for_each_grouped(|link| {
            link.timing = timing;
            for animation in &mut link.animations {
                animation.set_timing(timing);
            }
        });
        self
    }

    /// Spring timing from stiffness and damping ratio.
    ///
    /// Invalid parameters are reported when the chain is started.
    pub fn set_spring(self, stiffness: f32, damping_ratio: f32) -> Self {
        match AnimationTiming::spring(stiffness, damping_ratio) {
            Ok(timing) => self.set_timing(timing),
            Err(error) => self.fail(error),
        }
    }

    /// Spring timing that settles in about `duration_ms`
    pub fn set_spring_with_duration(self, duration_ms: i64, damping_ratio: f32) -> Self {
        match AnimationTiming::spring_with_duration(duration_ms, damping_ratio) {
            Ok(timing) => self.set_timing(timing),
            Err(error) => self.fail(error),
        }
    }

    /// Number of extra cycles after the first
    pub fn set_repeat_count(mut self, count: u32) -> Self {
        self.for_each_grouped(|link| link.repeat = Repeat::Count(count));
        self
    }

    pub fn set_repeat_infinite(mut self) -> Self {
        self.for_each_grouped(|link| link.repeat = Repeat::Infinite);
        self
    }

    pub fn set_repeat_mode(mut self, mode: RepeatMode) -> Self {
        self.for_each_grouped(|link| link.repeat_mode = mode);
        self
    }

    /// Run `action` once when this link begins
    pub fn add_start_action(mut self, action: impl FnMut() + 'static) -> Self {
        self.start_listeners.push(Box::new(action));
        self
    }

    /// Run `action` once when this link ends; the flag is `true` when the
    /// link was cancelled
    pub fn add_end_action(mut self, action: impl FnMut(bool) + 'static) -> Self {
        self.end_listeners.push(Box::new(action));
        self
    }

    /// Next link, starting when this one has finished
    pub fn then(self) -> Self {
        self.chain_group(|link| link.own_total_ms())
    }

    /// Next link, starting `delay_ms` after this one started
    pub fn then_with_delay(self, delay_ms: u64) -> Self {
        self.chain_group(|link| link.start_delay_ms.saturating_add(delay_ms))
    }

    /// Next link, starting `delay_ms` after this one has finished
    pub fn then_delay_after_end(self, delay_ms: u64) -> Self {
        self.chain_group(|link| link.own_total_ms().saturating_add(delay_ms))
    }

    /// Next link, starting `before_end_ms` before this one finishes
    pub fn then_before_end(self, before_end_ms: u64) -> Self {
        self.chain_group(|link| {
            let total = link.own_total_ms();
            if before_end_ms > total {
                warn!(
                    before_end_ms,
                    total,
                    "chained link would start before the chain; starting at 0"
                );
            }
            total.saturating_sub(before_end_ms)
        })
    }

    /// Chain one new link per member of the current group, keeping each
    /// member's target and placing it at `start_of(member)`
    fn chain_group(self, start_of: impl Fn(&Self) -> u64) -> Self {
        let members: Vec<_> = self
            .group_members()
            .into_iter()
            .map(|member| {
                (
                    member.current_target.clone(),
                    start_of(member),
                    member.stagger_offset_ms,
                )
            })
            .collect();

        let mut link = self;
        for (index, (target, start_delay_ms, offset)) in members.into_iter().enumerate() {
            link = link.chain(start_delay_ms);
            link.current_target = target;
            link.group_size = index + 1;
            link.stagger_offset_ms = offset;
        }
        link
    }

    fn chain(self, start_delay_ms: u64) -> Self {
        Self {
            current_target: self.current_target.clone(),
            animations: Vec::new(),
            states: Vec::new(),
            duration_ms: self.duration_ms,
            start_delay_ms,
            delay_in_sequence_ms: 0,
            timing: self.timing,
            repeat: self.repeat,
            repeat_mode: self.repeat_mode,
            start_listeners: Vec::new(),
            end_listeners: Vec::new(),
            pending_error: None,
            group_size: 1,
            stagger_offset_ms: 0,
            parent: Some(Box::new(self)),
        }
    }

    /// Links of the current group, first to last
    fn group_members(&self) -> Vec<&Self> {
        let mut members = Vec::with_capacity(self.group_size);
        let mut link = Some(self);
        while let Some(current) = link {
            if members.len() == self.group_size {
                break;
            }
            members.push(current);
            link = current.parent.as_deref();
        }
        members.reverse();
        members
    }

    fn for_each_grouped(&mut self, mut f: impl FnMut(&mut Self)) {
        let mut remaining = self.group_size;
        let mut link = Some(self);
        while let Some(current) = link {
            if remaining == 0 {
                break;
            }
            f(current);
            remaining -= 1;
            link = current.parent.as_deref_mut();
        }
    }

    /// Duration this link runs for, honoring spring timing
    pub fn effective_duration_ms(&self) -> u64 {
        self.timing.effective_duration_ms(self.duration_ms)
    }

    /// End of this link relative to the chain start
    fn own_total_ms(&self) -> u64 {
        self.start_delay_ms.saturating_add(
            self.effective_duration_ms()
                .saturating_mul(self.repeat.cycles_in_sequence()),
        )
    }

    pub fn delay_in_sequence(&self) -> u64 {
        self.delay_in_sequence_ms
    }

    /// Offset applied to every link of the chain when it is started
    pub fn set_delay_in_sequence(&mut self, delay_ms: u64) {
        self.delay_in_sequence_ms = delay_ms;
    }

    /// Sequence delay plus the end of the latest-ending link
    pub fn total_duration_in_sequence(&self) -> u64 {
        let mut end = self.own_total_ms();
        let mut link = self.parent.as_deref();
        while let Some(parent) = link {
            end = end.max(parent.own_total_ms());
            link = parent.parent.as_deref();
        }
        self.delay_in_sequence_ms.saturating_add(end)
    }

    /// First construction error of any link, if there is one
    pub fn error(&self) -> Option<&AnimationError> {
        self.pending_error
            .as_ref()
            .or_else(|| self.parent.as_deref().and_then(AdditiveAnimator::error))
    }

    /// Links from the first to this one
    pub(crate) fn into_links(mut self) -> Vec<AdditiveAnimator<T>> {
        let mut links = Vec::new();
        let mut parent = self.parent.take();
        links.push(self);
        while let Some(mut link) = parent {
            parent = link.parent.take();
            links.push(*link);
        }
        links.reverse();
        links
    }

    fn require_target(&mut self) -> Option<Rc<T>> {
        match &self.current_target {
            Some(target) => Some(target.clone()),
            None => {
                self.fail_in_place(AnimationError::MissingTarget);
                None
            }
        }
    }

    fn fail(mut self, error: AnimationError) -> Self {
        self.fail_in_place(error);
        self
    }

    fn fail_in_place(&mut self, error: AnimationError) {
        if self.pending_error.is_none() {
            self.pending_error = Some(error);
        }
    }

    fn push_property(
        mut self,
        property: PropertyRef<T>,
        value: f32,
        evaluator: Option<Rc<dyn ValueEvaluator>>,
        is_by: bool,
    ) -> Self {
        self.for_each_grouped(|link| {
            if let Some(target) = link.require_target() {
                let animation =
                    link.build_property(&target, property.clone(), value, evaluator.clone(), is_by);
                link.push(animation);
            }
        });
        self
    }

    fn build_property(
        &self,
        target: &Rc<T>,
        property: PropertyRef<T>,
        value: f32,
        evaluator: Option<Rc<dyn ValueEvaluator>>,
        is_by: bool,
    ) -> AdditiveAnimation<T> {
        let start = property.get(target);
        let mut animation = AdditiveAnimation::new(target.clone(), property, start, value);
        animation.set_by(is_by);
        if is_by {
            animation.set_start_value(start);
        }
        match evaluator {
            Some(evaluator) => animation.with_evaluator(evaluator),
            None => animation,
        }
    }

    fn push(&mut self, mut animation: AdditiveAnimation<T>) {
        animation.set_timing(self.timing);
        self.animations.push(animation);
    }
}

impl<T: 'static> Default for AdditiveAnimator<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AdditiveAnimator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdditiveAnimator")
            .field("animations", &self.animations)
            .field("duration_ms", &self.duration_ms)
            .field("start_delay_ms", &self.start_delay_ms)
            .field("delay_in_sequence_ms", &self.delay_in_sequence_ms)
            .field("timing", &self.timing)
            .field("repeat", &self.repeat)
            .field("repeat_mode", &self.repeat_mode)
            .field("group_size", &self.group_size)
            .field("has_parent", &self.parent.is_some())
            .finish_non_exhaustive()
    }
}
