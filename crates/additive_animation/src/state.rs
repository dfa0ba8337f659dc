//! Declarative animation states
//!
//! An [`AnimationState`] bundles target values for several properties with
//! optional start and end actions. The scheduler remembers which state is
//! current for each target; contributions started for an older state are
//! dropped and its actions stop firing once a newer state replaces it.

use std::fmt;
use std::rc::Rc;

use additive_core::{AnimationError, PropertyRef, Result};

use crate::evaluator::ValueEvaluator;

/// Runs when a state's animations begin
pub type StartAction<T> = Rc<dyn Fn(&T)>;

/// Runs when a state's animations end; the flag is `true` when cancelled
pub type EndAction<T> = Rc<dyn Fn(&T, bool)>;

/// One property target inside a declarative state
pub struct Animation<T> {
    property: PropertyRef<T>,
    target_value: f32,
    evaluator: Option<Rc<dyn ValueEvaluator>>,
}

impl<T> Animation<T> {
    pub fn new(property: PropertyRef<T>, target_value: f32) -> Self {
        Self {
            property,
            target_value,
            evaluator: None,
        }
    }

    pub fn with_evaluator(mut self, evaluator: Rc<dyn ValueEvaluator>) -> Self {
        self.evaluator = Some(evaluator);
        self
    }

    pub fn property(&self) -> &PropertyRef<T> {
        &self.property
    }

    pub fn target_value(&self) -> f32 {
        self.target_value
    }

    pub fn evaluator(&self) -> Option<&Rc<dyn ValueEvaluator>> {
        self.evaluator.as_ref()
    }
}

impl<T> Clone for Animation<T> {
    fn clone(&self) -> Self {
        Self {
            property: self.property.clone(),
            target_value: self.target_value,
            evaluator: self.evaluator.clone(),
        }
    }
}

impl<T> fmt::Debug for Animation<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Animation")
            .field("property", &self.property.name())
            .field("target_value", &self.target_value)
            .field("has_evaluator", &self.evaluator.is_some())
            .finish()
    }
}

/// Anything that can describe a set of property animations
pub trait AnimationAction<T> {
    fn animations(&self) -> &[Animation<T>];
}

impl<T> AnimationAction<T> for Vec<Animation<T>> {
    fn animations(&self) -> &[Animation<T>] {
        self
    }
}

impl<T> AnimationAction<T> for Animation<T> {
    fn animations(&self) -> &[Animation<T>] {
        std::slice::from_ref(self)
    }
}

/// A named group of target values with optional side effects
pub struct AnimationState<T> {
    animations: Vec<Animation<T>>,
    start_action: Option<StartAction<T>>,
    end_action: Option<EndAction<T>>,
}

impl<T> AnimationState<T> {
    pub fn builder() -> AnimationStateBuilder<T> {
        AnimationStateBuilder::new()
    }

    pub fn start_action(&self) -> Option<&StartAction<T>> {
        self.start_action.as_ref()
    }

    pub fn end_action(&self) -> Option<&EndAction<T>> {
        self.end_action.as_ref()
    }

    /// Whether animations of this state may run given the target's current
    /// state: true iff there is none or it is this very instance.
    pub fn should_run(self: &Rc<Self>, current: Option<&Rc<AnimationState<T>>>) -> bool {
        current.map_or(true, |current| Rc::ptr_eq(self, current))
    }

    /// Same identity check, applied when end actions are about to fire
    pub fn should_run_end_listener(self: &Rc<Self>, current: Option<&Rc<AnimationState<T>>>) -> bool {
        self.should_run(current)
    }
}

impl<T> AnimationAction<T> for AnimationState<T> {
    fn animations(&self) -> &[Animation<T>] {
        &self.animations
    }
}

impl<T> fmt::Debug for AnimationState<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationState")
            .field("animations", &self.animations)
            .field("has_start_action", &self.start_action.is_some())
            .field("has_end_action", &self.end_action.is_some())
            .finish()
    }
}

/// Builder for [`AnimationState`]
pub struct AnimationStateBuilder<T> {
    animations: Vec<Animation<T>>,
    start_action: Option<StartAction<T>>,
    end_action: Option<EndAction<T>>,
}

impl<T> AnimationStateBuilder<T> {
    pub fn new() -> Self {
        Self {
            animations: Vec::new(),
            start_action: None,
            end_action: None,
        }
    }

    pub fn animation(mut self, animation: Animation<T>) -> Self {
        self.animations.push(animation);
        self
    }

    pub fn animations(mut self, animations: impl IntoIterator<Item = Animation<T>>) -> Self {
        self.animations.extend(animations);
        self
    }

    pub fn on_start(mut self, action: impl Fn(&T) + 'static) -> Self {
        self.start_action = Some(Rc::new(action));
        self
    }

    pub fn on_end(mut self, action: impl Fn(&T, bool) + 'static) -> Self {
        self.end_action = Some(Rc::new(action));
        self
    }

    pub fn build(self) -> Rc<AnimationState<T>> {
        Rc::new(AnimationState {
            animations: self.animations,
            start_action: self.start_action,
            end_action: self.end_action,
        })
    }
}

impl<T> Default for AnimationStateBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Host-agnostic visibility, encoded like common UI toolkits
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Visibility {
    Visible,
    Invisible,
    Gone,
}

impl Visibility {
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Visibility::Visible),
            4 => Ok(Visibility::Invisible),
            8 => Ok(Visibility::Gone),
            other => Err(AnimationError::InvalidVisibility(other)),
        }
    }

    pub fn code(self) -> i32 {
        match self {
            Visibility::Visible => 0,
            Visibility::Invisible => 4,
            Visibility::Gone => 8,
        }
    }
}

/// Builds a state that switches a target's visibility around its animations.
///
/// Becoming visible happens when the animations start; becoming invisible
/// or gone happens when they end, cancelled or not. Actions passed to
/// [`on_start`](Self::on_start) and [`on_end`](Self::on_end) run after the
/// visibility change on the same side.
pub struct VisibilityStateBuilder<T> {
    visibility: Visibility,
    setter: Rc<dyn Fn(&T, Visibility)>,
    animations: Vec<Animation<T>>,
    start_action: Option<StartAction<T>>,
    end_action: Option<EndAction<T>>,
}

impl<T: 'static> VisibilityStateBuilder<T> {
    pub fn new(visibility: Visibility, setter: impl Fn(&T, Visibility) + 'static) -> Self {
        Self {
            visibility,
            setter: Rc::new(setter),
            animations: Vec::new(),
            start_action: None,
            end_action: None,
        }
    }

    /// Builder from a raw toolkit visibility code
    pub fn from_code(code: i32, setter: impl Fn(&T, Visibility) + 'static) -> Result<Self> {
        Ok(Self::new(Visibility::from_code(code)?, setter))
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn animation(mut self, animation: Animation<T>) -> Self {
        self.animations.push(animation);
        self
    }

    pub fn animations(mut self, animations: impl IntoIterator<Item = Animation<T>>) -> Self {
        self.animations.extend(animations);
        self
    }

    pub fn on_start(mut self, action: impl Fn(&T) + 'static) -> Self {
        self.start_action = Some(Rc::new(action));
        self
    }

    pub fn on_end(mut self, action: impl Fn(&T, bool) + 'static) -> Self {
        self.end_action = Some(Rc::new(action));
        self
    }

    pub fn build(self) -> Rc<AnimationState<T>> {
        let visibility = self.visibility;
        let setter = self.setter;
        let mut start_action = self.start_action;
        let mut end_action = self.end_action;

        match visibility {
            Visibility::Visible => {
                let user = start_action.take();
                start_action = Some(Rc::new(move |target: &T| {
                    setter(target, visibility);
                    if let Some(action) = &user {
                        action(target);
                    }
                }));
            }
            Visibility::Invisible | Visibility::Gone => {
                let user = end_action.take();
                end_action = Some(Rc::new(move |target: &T, cancelled: bool| {
                    setter(target, visibility);
                    if let Some(action) = &user {
                        action(target, cancelled);
                    }
                }));
            }
        }

        Rc::new(AnimationState {
            animations: self.animations,
            start_action,
            end_action,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use additive_core::ClosureProperty;
    use std::cell::Cell;

    struct Panel {
        alpha: Cell<f32>,
        visibility: Cell<Visibility>,
    }

    fn panel() -> Panel {
        Panel {
            alpha: Cell::new(1.0),
            visibility: Cell::new(Visibility::Visible),
        }
    }

    fn alpha() -> PropertyRef<Panel> {
        ClosureProperty::shared("alpha", |p: &Panel| p.alpha.get(), |p: &Panel, v| p.alpha.set(v))
    }

    #[test]
    fn test_should_run_only_for_no_state_or_same_instance() {
        let a: Rc<AnimationState<Panel>> = AnimationState::builder().build();
        let b: Rc<AnimationState<Panel>> = AnimationState::builder().build();

        assert!(a.should_run(None));
        assert!(a.should_run(Some(&a)));
        assert!(a.should_run(Some(&a.clone())));
        assert!(!a.should_run(Some(&b)));
        assert!(!a.should_run_end_listener(Some(&b)));
        assert!(a.should_run_end_listener(None));
    }

    #[test]
    fn test_states_with_equal_content_are_still_distinct() {
        let first = AnimationState::builder()
            .animation(Animation::new(alpha(), 0.0))
            .build();
        let second = AnimationState::builder()
            .animation(Animation::new(alpha(), 0.0))
            .build();
        assert!(!first.should_run(Some(&second)));
    }

    #[test]
    fn test_builder_collects_animations_and_actions() {
        let state = AnimationState::builder()
            .animation(Animation::new(alpha(), 0.5))
            .on_start(|p: &Panel| p.alpha.set(0.0))
            .on_end(|p: &Panel, _| p.alpha.set(2.0))
            .build();

        assert_eq!(state.animations().len(), 1);
        assert_eq!(state.animations()[0].target_value(), 0.5);
        assert_eq!(state.animations()[0].property().name(), "alpha");

        let target = panel();
        (state.start_action().unwrap())(&target);
        assert_eq!(target.alpha.get(), 0.0);
        (state.end_action().unwrap())(&target, false);
        assert_eq!(target.alpha.get(), 2.0);
    }

    #[test]
    fn test_visibility_codes() {
        assert_eq!(Visibility::from_code(0), Ok(Visibility::Visible));
        assert_eq!(Visibility::from_code(4), Ok(Visibility::Invisible));
        assert_eq!(Visibility::from_code(8), Ok(Visibility::Gone));
        assert_eq!(
            Visibility::from_code(3),
            Err(AnimationError::InvalidVisibility(3))
        );
        assert_eq!(Visibility::Gone.code(), 8);
    }

    #[test]
    fn test_visible_state_sets_visibility_on_start() {
        let state = VisibilityStateBuilder::new(Visibility::Visible, |p: &Panel, v| {
            p.visibility.set(v)
        })
        .animation(Animation::new(alpha(), 1.0))
        .build();

        assert!(state.end_action().is_none());
        let target = panel();
        target.visibility.set(Visibility::Gone);
        (state.start_action().unwrap())(&target);
        assert_eq!(target.visibility.get(), Visibility::Visible);
    }

    #[test]
    fn test_gone_state_sets_visibility_on_end() {
        let state = VisibilityStateBuilder::from_code(8, |p: &Panel, v| p.visibility.set(v))
            .unwrap()
            .animation(Animation::new(alpha(), 0.0))
            .build();

        assert!(state.start_action().is_none());
        let target = panel();
        (state.end_action().unwrap())(&target, true);
        assert_eq!(target.visibility.get(), Visibility::Gone);
    }

    #[test]
    fn test_visibility_change_runs_before_user_actions() {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let (on_start, on_end) = (seen.clone(), seen.clone());
        let state = VisibilityStateBuilder::new(Visibility::Invisible, |p: &Panel, v| {
            p.visibility.set(v)
        })
        .animation(Animation::new(alpha(), 0.0))
        .on_start(move |p: &Panel| on_start.borrow_mut().push(("start", p.visibility.get())))
        .on_end(move |p: &Panel, cancelled| {
            assert!(!cancelled);
            on_end.borrow_mut().push(("end", p.visibility.get()));
        })
        .build();

        let target = panel();
        (state.start_action().unwrap())(&target);
        (state.end_action().unwrap())(&target, false);
        assert_eq!(
            *seen.borrow(),
            vec![("start", Visibility::Visible), ("end", Visibility::Invisible)]
        );

        let shown = Rc::new(Cell::new(None));
        let log = shown.clone();
        let state = VisibilityStateBuilder::new(Visibility::Visible, |p: &Panel, v| {
            p.visibility.set(v)
        })
        .on_start(move |p: &Panel| log.set(Some(p.visibility.get())))
        .build();
        assert!(state.end_action().is_none());

        target.visibility.set(Visibility::Gone);
        (state.start_action().unwrap())(&target);
        assert_eq!(shown.get(), Some(Visibility::Visible));
    }

    #[test]
    fn test_unknown_visibility_code_fails() {
        let result = VisibilityStateBuilder::from_code(1, |p: &Panel, v| p.visibility.set(v));
        assert!(matches!(result, Err(AnimationError::InvalidVisibility(1))));
    }
}
