//! Additive accumulation
//!
//! Every `(target, tag)` key that has live animations owns one
//! [`AccumulatedAnimationValue`]. Each tick, every contribution adds the
//! difference between its current and its previous evaluated value; the
//! sum is written to the property once. Removing a contribution only stops
//! its future deltas, the displacement it already produced stays.

use std::fmt;
use std::rc::Rc;

use additive_core::{AnimationKey, PropertyRef, TargetId};
use rustc_hash::FxHashMap;
use slotmap::new_key_type;
use smallvec::SmallVec;
use tracing::debug;

use crate::animation::AdditiveAnimation;

new_key_type! {
    /// Handle of a registered contribution
    pub struct ContributionId;
}

/// An animation registered with an accumulator, plus its last evaluated value
pub struct Contribution<T> {
    animation: AdditiveAnimation<T>,
    previous_value: f32,
}

impl<T> Contribution<T> {
    pub fn new(animation: AdditiveAnimation<T>) -> Self {
        let previous_value = animation.start_value();
        Self {
            animation,
            previous_value,
        }
    }

    pub fn animation(&self) -> &AdditiveAnimation<T> {
        &self.animation
    }

    pub fn animation_mut(&mut self) -> &mut AdditiveAnimation<T> {
        &mut self.animation
    }

    pub fn previous_value(&self) -> f32 {
        self.previous_value
    }

    /// Restart delta tracking from the animation's start value
    pub fn reset(&mut self) {
        self.previous_value = self.animation.start_value();
    }

    /// Change since the last call, evaluated at `progress`
    pub fn delta_at(&mut self, progress: f32) -> f32 {
        let value = self.animation.evaluate_at(progress);
        let delta = value - self.previous_value;
        self.previous_value = value;
        delta
    }
}

impl<T> fmt::Debug for Contribution<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Contribution")
            .field("animation", &self.animation)
            .field("previous_value", &self.previous_value)
            .finish()
    }
}

/// Shared running value of one `(target, tag)` key
pub struct AccumulatedAnimationValue<T> {
    target: Rc<T>,
    property: Option<PropertyRef<T>>,
    tag: Rc<str>,
    value: f32,
    contributions: SmallVec<[ContributionId; 4]>,
    dirty: bool,
}

impl<T> AccumulatedAnimationValue<T> {
    fn new(animation: &AdditiveAnimation<T>, value: f32) -> Self {
        Self {
            target: animation.target().clone(),
            property: animation.property().cloned(),
            tag: Rc::from(animation.tag()),
            value,
            contributions: SmallVec::new(),
            dirty: false,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }

    pub fn contributions(&self) -> &[ContributionId] {
        &self.contributions
    }

    pub fn add_delta(&mut self, delta: f32) {
        self.value += delta;
        self.dirty = true;
    }

    /// Write the running value if it changed since the last write.
    ///
    /// Values without a property accessor go to `custom`. Returns whether
    /// anything was written.
    fn apply(&mut self, custom: &mut dyn FnMut(&T, &str, f32)) -> bool {
        if !self.dirty {
            return false;
        }
        self.dirty = false;
        match &self.property {
            Some(property) => property.set(&self.target, self.value),
            None => custom(&self.target, &self.tag, self.value),
        }
        true
    }
}

impl<T> fmt::Debug for AccumulatedAnimationValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccumulatedAnimationValue")
            .field("tag", &self.tag)
            .field("value", &self.value)
            .field("contributions", &self.contributions)
            .field("dirty", &self.dirty)
            .finish_non_exhaustive()
    }
}

/// Registry of accumulators, keyed by `(target identity, tag)`
pub struct AccumulatedAnimationValues<T> {
    entries: FxHashMap<AnimationKey, AccumulatedAnimationValue<T>>,
}

impl<T> AccumulatedAnimationValues<T> {
    pub fn new() -> Self {
        Self {
            entries: FxHashMap::default(),
        }
    }

    /// Register a contribution under its animation's key.
    ///
    /// A key without an entry starts at `baseline`. An existing entry keeps
    /// its running value unless `baseline` is given and the entry has no
    /// other contributions.
    pub fn register(&mut self, id: ContributionId, animation: &AdditiveAnimation<T>, baseline: Option<f32>) {
        let key = animation.key();
        let entry = self.entries.entry(key).or_insert_with(|| {
            debug!(tag = animation.tag(), "accumulator created");
            AccumulatedAnimationValue::new(animation, baseline.unwrap_or(animation.start_value()))
        });
        if let Some(baseline) = baseline {
            if entry.contributions.is_empty() {
                entry.value = baseline;
            }
        }
        entry.contributions.push(id);
    }

    /// Unregister a contribution; the entry is dropped once it has none left.
    ///
    /// Returns whether the key is now free of contributions.
    pub fn unregister(&mut self, id: ContributionId, key: &AnimationKey) -> bool {
        let Some(entry) = self.entries.get_mut(key) else {
            return true;
        };
        entry.contributions.retain(|c| *c != id);
        if entry.contributions.is_empty() && !entry.dirty {
            self.entries.remove(key);
            debug!(tag = key.tag(), "accumulator removed");
            return true;
        }
        entry.contributions.is_empty()
    }

    pub fn add_delta(&mut self, key: &AnimationKey, delta: f32) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.add_delta(delta);
        }
    }

    /// Write every changed value once, then drop entries with no
    /// contributions left. Returns the number of values written.
    pub fn flush(&mut self, custom: &mut dyn FnMut(&T, &str, f32)) -> usize {
        let mut written = 0;
        for entry in self.entries.values_mut() {
            if entry.apply(custom) {
                written += 1;
            }
        }
        self.entries.retain(|_, entry| !entry.contributions.is_empty());
        written
    }

    pub fn get(&self, key: &AnimationKey) -> Option<&AccumulatedAnimationValue<T>> {
        self.entries.get(key)
    }

    pub fn value(&self, key: &AnimationKey) -> Option<f32> {
        self.entries.get(key).map(AccumulatedAnimationValue::value)
    }

    /// Number of live contributions across every key of `target`
    pub fn contribution_count(&self, target: TargetId) -> usize {
        self.entries
            .iter()
            .filter(|(key, _)| key.target == target)
            .map(|(_, entry)| entry.contributions.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for AccumulatedAnimationValues<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use additive_core::ClosureProperty;
    use slotmap::SlotMap;
    use std::cell::Cell;

    struct Slider {
        offset: Cell<f32>,
    }

    fn offset() -> PropertyRef<Slider> {
        ClosureProperty::shared(
            "offset",
            |s: &Slider| s.offset.get(),
            |s: &Slider, v| s.offset.set(v),
        )
    }

    fn no_custom() -> impl FnMut(&Slider, &str, f32) {
        |_: &Slider, tag: &str, _: f32| panic!("unexpected custom value for {tag}")
    }

    struct Harness {
        target: Rc<Slider>,
        contributions: SlotMap<ContributionId, Contribution<Slider>>,
        values: AccumulatedAnimationValues<Slider>,
    }

    impl Harness {
        fn new(baseline: f32) -> Self {
            Self {
                target: Rc::new(Slider {
                    offset: Cell::new(baseline),
                }),
                contributions: SlotMap::with_key(),
                values: AccumulatedAnimationValues::new(),
            }
        }

        fn add(&mut self, start: f32, end: f32) -> ContributionId {
            let animation = AdditiveAnimation::new(self.target.clone(), offset(), start, end);
            let baseline = Some(self.target.offset.get());
            let id = self.contributions.insert(Contribution::new(animation));
            self.values
                .register(id, self.contributions[id].animation(), baseline);
            id
        }

        fn tick(&mut self, order: &[(ContributionId, f32)]) {
            for &(id, progress) in order {
                let contribution = &mut self.contributions[id];
                let delta = contribution.delta_at(progress);
                let key = contribution.animation().key();
                self.values.add_delta(&key, delta);
            }
            self.values.flush(&mut no_custom());
        }

        fn key(&self) -> AnimationKey {
            AnimationKey::new(TargetId::of(&self.target), Rc::from("offset"))
        }
    }

    #[test]
    fn test_contribution_reports_incremental_deltas() {
        let target = Rc::new(Slider {
            offset: Cell::new(0.0),
        });
        let mut contribution = Contribution::new(AdditiveAnimation::new(target, offset(), 0.0, 100.0));

        assert_eq!(contribution.delta_at(0.25), 25.0);
        assert_eq!(contribution.delta_at(0.5), 25.0);
        assert_eq!(contribution.delta_at(0.5), 0.0);
        assert_eq!(contribution.previous_value(), 50.0);

        contribution.reset();
        assert_eq!(contribution.delta_at(1.0), 100.0);
    }

    #[test]
    fn test_single_contribution_reaches_target() {
        let mut harness = Harness::new(10.0);
        let id = harness.add(10.0, 50.0);

        harness.tick(&[(id, 0.5)]);
        assert_eq!(harness.target.offset.get(), 30.0);
        harness.tick(&[(id, 1.0)]);
        assert_eq!(harness.target.offset.get(), 50.0);
    }

    #[test]
    fn test_concurrent_contributions_sum_their_deltas() {
        let mut harness = Harness::new(0.0);
        let first = harness.add(0.0, 100.0);
        harness.tick(&[(first, 0.5)]);
        assert_eq!(harness.target.offset.get(), 50.0);

        // Second animation starts from the first one's target
        let second = harness.add(100.0, 200.0);
        harness.tick(&[(first, 0.75), (second, 0.5)]);
        assert_eq!(harness.target.offset.get(), 50.0 + 25.0 + 50.0);

        harness.tick(&[(first, 1.0), (second, 1.0)]);
        assert_eq!(harness.target.offset.get(), 200.0);
    }

    #[test]
    fn test_tick_order_does_not_change_result() {
        let run = |reversed: bool| {
            let mut harness = Harness::new(5.0);
            let a = harness.add(5.0, 45.0);
            let b = harness.add(45.0, 20.0);
            for &progress in &[0.25f32, 0.5, 0.75, 1.0] {
                let mut order = vec![(a, progress), (b, progress * 0.5)];
                if reversed {
                    order.reverse();
                }
                harness.tick(&order);
            }
            harness.target.offset.get()
        };

        assert_eq!(run(false), run(true));
    }

    #[test]
    fn test_removing_contribution_keeps_applied_displacement() {
        let mut harness = Harness::new(0.0);
        let first = harness.add(0.0, 100.0);
        let second = harness.add(100.0, 140.0);
        let key = harness.key();

        harness.tick(&[(first, 0.5), (second, 0.5)]);
        assert_eq!(harness.target.offset.get(), 70.0);

        assert!(!harness.values.unregister(first, &key));
        harness.tick(&[(second, 1.0)]);
        assert_eq!(harness.target.offset.get(), 90.0);
        assert_eq!(harness.values.value(&key), Some(90.0));
    }

    #[test]
    fn test_entry_dropped_after_last_contribution() {
        let mut harness = Harness::new(0.0);
        let id = harness.add(0.0, 10.0);
        let key = harness.key();
        assert_eq!(harness.values.len(), 1);
        assert_eq!(harness.values.contribution_count(TargetId::of(&harness.target)), 1);

        assert!(harness.values.unregister(id, &key));
        assert!(harness.values.is_empty());
        assert_eq!(harness.values.value(&key), None);
    }

    #[test]
    fn test_pending_write_survives_unregister_until_flush() {
        let mut harness = Harness::new(0.0);
        let id = harness.add(0.0, 10.0);
        let key = harness.key();

        let delta = harness.contributions[id].delta_at(1.0);
        harness.values.add_delta(&key, delta);
        assert!(harness.values.unregister(id, &key));
        assert_eq!(harness.values.len(), 1);

        assert_eq!(harness.values.flush(&mut no_custom()), 1);
        assert_eq!(harness.target.offset.get(), 10.0);
        assert!(harness.values.is_empty());
    }

    #[test]
    fn test_custom_values_go_to_custom_applier() {
        let target = Rc::new(Slider {
            offset: Cell::new(0.0),
        });
        let mut contributions: SlotMap<ContributionId, Contribution<Slider>> = SlotMap::with_key();
        let mut values = AccumulatedAnimationValues::new();

        let id = contributions.insert(Contribution::new(AdditiveAnimation::custom(
            target.clone(),
            "glow",
            0.0,
            1.0,
        )));
        values.register(id, contributions[id].animation(), None);

        let delta = contributions[id].delta_at(0.5);
        values.add_delta(&contributions[id].animation().key(), delta);

        let mut seen = Vec::new();
        let written = values.flush(&mut |_: &Slider, tag: &str, value: f32| {
            seen.push((tag.to_string(), value))
        });
        assert_eq!(written, 1);
        assert_eq!(seen, vec![("glow".to_string(), 0.5)]);
    }
}
