//! Animation scheduler
//!
//! Drives every started animation chain from the host's frame loop. Each
//! `tick` advances the clock, lets every running contribution add its delta
//! to the accumulator of its `(target, tag)` key, writes every touched key
//! exactly once and then notifies the host.

use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use additive_core::{AnimationError, AnimationKey, Result, TargetId};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;
use tracing::{debug, trace};

use crate::accumulator::{AccumulatedAnimationValues, Contribution, ContributionId};
use crate::animation::AdditiveAnimation;
use crate::animator::{AdditiveAnimator, EndListener, Repeat, RepeatMode, StartListener};
use crate::config::AnimatorConfig;
use crate::state::{AnimationAction, AnimationState};

new_key_type! {
    /// Handle of a started animation chain
    pub struct AnimatorId;
}

type StatePair<T> = (Rc<T>, Rc<AnimationState<T>>);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    /// Waiting for its delay to elapse
    Pending,
    Running,
    Finished,
}

/// One link of a running chain
struct Link<T> {
    delay_ms: u64,
    duration_ms: u64,
    repeat: Repeat,
    repeat_mode: RepeatMode,
    phase: Phase,
    pending: Vec<AdditiveAnimation<T>>,
    contributions: SmallVec<[ContributionId; 4]>,
    start_listeners: Vec<StartListener>,
    end_listeners: Vec<EndListener>,
}

impl<T> Link<T> {
    fn new(animator: AdditiveAnimator<T>, delay_in_sequence_ms: u64) -> Self {
        let duration_ms = animator.timing.effective_duration_ms(animator.duration_ms);
        Self {
            delay_ms: delay_in_sequence_ms.saturating_add(animator.start_delay_ms),
            duration_ms,
            repeat: animator.repeat,
            repeat_mode: animator.repeat_mode,
            phase: Phase::Pending,
            pending: animator.animations,
            contributions: SmallVec::new(),
            start_listeners: animator.start_listeners,
            end_listeners: animator.end_listeners,
        }
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty() && self.contributions.is_empty()
    }

    /// Progress at `local_ms` after the link began, and whether it is done
    fn progress_at(&self, local_ms: u64) -> (f32, bool) {
        if self.duration_ms == 0 {
            return (self.final_progress(), true);
        }
        if let Repeat::Count(count) = self.repeat {
            let total = self.duration_ms.saturating_mul(count as u64 + 1);
            if local_ms >= total {
                return (self.final_progress(), true);
            }
        }

        let cycle = local_ms / self.duration_ms;
        let fraction = (local_ms % self.duration_ms) as f32 / self.duration_ms as f32;
        if self.repeat_mode == RepeatMode::Reverse && cycle % 2 == 1 {
            (1.0 - fraction, false)
        } else {
            (fraction, false)
        }
    }

    fn final_progress(&self) -> f32 {
        match (self.repeat, self.repeat_mode) {
            (Repeat::Count(count), RepeatMode::Reverse) if count % 2 == 1 => 0.0,
            _ => 1.0,
        }
    }
}

/// A started chain: its links share one clock origin
struct RunningAnimator<T> {
    scheduled_at_ms: u64,
    links: Vec<Link<T>>,
}

impl<T> RunningAnimator<T> {
    fn is_finished(&self) -> bool {
        self.links.iter().all(|link| link.phase == Phase::Finished)
    }
}

/// Per-tag bookkeeping of a target
#[derive(Clone, Copy, Debug, Default)]
struct TagInfo {
    /// Contributions that have begun and not ended
    live: u32,
    /// Contributions waiting for their link to begin
    queued: u32,
    last_target_value: Option<f32>,
    queued_target_value: Option<f32>,
}

/// Running state of one target
struct TargetRecord<T> {
    target: Weak<T>,
    current_state: Option<Rc<AnimationState<T>>>,
    tags: FxHashMap<Rc<str>, TagInfo>,
}

impl<T> TargetRecord<T> {
    fn new(target: &Rc<T>) -> Self {
        Self {
            target: Rc::downgrade(target),
            current_state: None,
            tags: FxHashMap::default(),
        }
    }

    fn tag_mut(&mut self, tag: &str) -> &mut TagInfo {
        self.tags.entry(Rc::from(tag)).or_default()
    }
}

/// Everything a link touches while it begins, runs and ends
struct SchedulerCore<T> {
    contributions: SlotMap<ContributionId, Contribution<T>>,
    values: AccumulatedAnimationValues<T>,
    targets: FxHashMap<TargetId, TargetRecord<T>>,
}

impl<T> SchedulerCore<T> {
    fn record_mut(&mut self, target: &Rc<T>) -> &mut TargetRecord<T> {
        self.targets
            .entry(TargetId::of(target))
            .or_insert_with(|| TargetRecord::new(target))
    }

    fn record(&self, target: &Rc<T>) -> Option<&TargetRecord<T>> {
        self.targets.get(&TargetId::of(target))
    }

    fn current_state(&self, target: &Rc<T>) -> Option<Rc<AnimationState<T>>> {
        self.record(target).and_then(|r| r.current_state.clone())
    }

    /// Account for an animation that will begin later
    fn enqueue(&mut self, animation: &AdditiveAnimation<T>) {
        let record = self.record_mut(animation.target());
        let info = record.tag_mut(animation.tag());
        info.queued += 1;

        let queued_value = match animation.by_value() {
            Some(by) => {
                let base = info
                    .queued_target_value
                    .or(info.last_target_value)
                    .or_else(|| animation.read_property())
                    .unwrap_or(animation.start_value());
                base + by
            }
            None => animation.target_value(),
        };
        info.queued_target_value = Some(queued_value);
    }

    fn dequeue(&mut self, animation: &AdditiveAnimation<T>) {
        let record = self.record_mut(animation.target());
        let info = record.tag_mut(animation.tag());
        info.queued = info.queued.saturating_sub(1);
    }

    /// Resolve the link's pending animations and register them.
    ///
    /// Returns `false` if the link had animations but all of them were
    /// superseded by a newer state.
    fn begin(&mut self, link: &mut Link<T>) -> bool {
        link.phase = Phase::Running;
        let pending = mem::take(&mut link.pending);
        let had_animations = !pending.is_empty();
        let mut started_states: SmallVec<[StatePair<T>; 2]> = SmallVec::new();

        for mut animation in pending {
            self.dequeue(&animation);
            let record = self.record_mut(animation.target());

            if let Some(state) = animation.state() {
                if !state.should_run(record.current_state.as_ref()) {
                    debug!(tag = animation.tag(), "dropping contribution of a superseded state");
                    continue;
                }
                push_unique(&mut started_states, animation.target(), state);
            }

            let info = record.tag_mut(animation.tag());
            let baseline = match info.last_target_value {
                Some(last) if info.live > 0 => {
                    animation.set_start_value(last);
                    None
                }
                _ => {
                    let start = animation.read_property().unwrap_or(animation.start_value());
                    animation.set_start_value(start);
                    Some(start)
                }
            };
            info.live += 1;
            info.last_target_value = Some(animation.target_value());

            let id = self.contributions.insert(Contribution::new(animation));
            self.values
                .register(id, self.contributions[id].animation(), baseline);
            link.contributions.push(id);
        }

        for (target, state) in &started_states {
            if let Some(action) = state.start_action() {
                action(target);
            }
        }
        for listener in &mut link.start_listeners {
            listener();
        }

        !(had_animations && link.contributions.is_empty())
    }

    /// Unregister one contribution, returning its state pair if it had one
    fn release(&mut self, id: ContributionId) -> Option<StatePair<T>> {
        let contribution = self.contributions.remove(id)?;
        let animation = contribution.animation();
        self.values.unregister(id, &animation.key());

        let record = self.record_mut(animation.target());
        let info = record.tag_mut(animation.tag());
        info.live = info.live.saturating_sub(1);

        animation
            .state()
            .map(|state| (animation.target().clone(), state.clone()))
    }

    /// End a link, firing state end actions and listeners
    fn end(&mut self, link: &mut Link<T>, cancelled: bool) {
        if link.phase == Phase::Finished {
            return;
        }
        link.phase = Phase::Finished;

        let mut states: SmallVec<[StatePair<T>; 2]> = SmallVec::new();
        for id in mem::take(&mut link.contributions) {
            if let Some((target, state)) = self.release(id) {
                push_unique(&mut states, &target, &state);
            }
        }
        for animation in mem::take(&mut link.pending) {
            self.dequeue(&animation);
        }

        self.fire_end_actions(&states, cancelled);
        for listener in &mut link.end_listeners {
            listener(cancelled);
        }
    }

    /// Run each state's end action if it is still the target's current state
    fn fire_end_actions(&self, states: &[StatePair<T>], cancelled: bool) {
        for (target, state) in states {
            let current = self.current_state(target);
            if current.is_some() && state.should_run_end_listener(current.as_ref()) {
                if let Some(action) = state.end_action() {
                    action(target, cancelled);
                }
            }
        }
    }

    /// Remove every contribution of `target` (optionally only `tag`) from
    /// `link`. Returns whether anything was removed.
    fn remove_matching(
        &mut self,
        link: &mut Link<T>,
        target: TargetId,
        tag: Option<&str>,
        states: &mut SmallVec<[StatePair<T>; 2]>,
    ) -> bool {
        let matches = |animation: &AdditiveAnimation<T>| {
            animation.target_id() == target && tag.map_or(true, |tag| animation.tag() == tag)
        };

        let mut removed = false;
        let pending = mem::take(&mut link.pending);
        for animation in pending {
            if matches(&animation) {
                self.dequeue(&animation);
                removed = true;
            } else {
                link.pending.push(animation);
            }
        }

        let contributions = mem::take(&mut link.contributions);
        for id in contributions {
            let is_match = self
                .contributions
                .get(id)
                .is_some_and(|c| matches(c.animation()));
            if is_match {
                if let Some((target, state)) = self.release(id) {
                    push_unique(states, &target, &state);
                }
                removed = true;
            } else {
                link.contributions.push(id);
            }
        }
        removed
    }

    /// Drop records of targets that no longer exist
    fn prune_targets(&mut self) {
        self.targets.retain(|_, record| record.target.strong_count() > 0);
    }
}

fn push_unique<T>(pairs: &mut SmallVec<[StatePair<T>; 2]>, target: &Rc<T>, state: &Rc<AnimationState<T>>) {
    let known = pairs
        .iter()
        .any(|(t, s)| Rc::ptr_eq(t, target) && Rc::ptr_eq(s, state));
    if !known {
        pairs.push((target.clone(), state.clone()));
    }
}

/// Frame-driven scheduler of additive animations
pub struct AnimationScheduler<T> {
    config: AnimatorConfig,
    clock_ms: u64,
    animators: SlotMap<AnimatorId, RunningAnimator<T>>,
    order: Vec<AnimatorId>,
    core: SchedulerCore<T>,
    apply_changes: Option<Box<dyn FnMut()>>,
    custom_property_applier: Option<Box<dyn FnMut(&T, &str, f32)>>,
}

impl<T: 'static> AnimationScheduler<T> {
    pub fn new() -> Self {
        Self::with_config(AnimatorConfig::default())
    }

    pub fn with_config(config: AnimatorConfig) -> Self {
        Self {
            config,
            clock_ms: 0,
            animators: SlotMap::with_key(),
            order: Vec::new(),
            core: SchedulerCore {
                contributions: SlotMap::with_key(),
                values: AccumulatedAnimationValues::new(),
                targets: FxHashMap::default(),
            },
            apply_changes: None,
            custom_property_applier: None,
        }
    }

    pub fn config(&self) -> &AnimatorConfig {
        &self.config
    }

    /// A new animator using this scheduler's defaults
    pub fn animator(&self) -> AdditiveAnimator<T> {
        AdditiveAnimator::with_config(&self.config)
    }

    /// Called once per tick after accumulated values were written
    pub fn set_apply_changes(&mut self, callback: impl FnMut() + 'static) {
        self.apply_changes = Some(Box::new(callback));
    }

    /// Receives accumulated values of animations without a property accessor
    pub fn set_custom_property_applier(&mut self, applier: impl FnMut(&T, &str, f32) + 'static) {
        self.custom_property_applier = Some(Box::new(applier));
    }

    /// Milliseconds advanced since the scheduler was created
    pub fn elapsed_ms(&self) -> u64 {
        self.clock_ms
    }

    /// Start every link of `animator`'s chain.
    ///
    /// States attached to the chain become their targets' current states
    /// now. Links without a delay begin immediately; the others begin on
    /// the first tick their delay has elapsed.
    pub fn start(&mut self, animator: AdditiveAnimator<T>) -> Result<AnimatorId> {
        if let Some(error) = animator.error() {
            return Err(error.clone());
        }

        let delay_in_sequence_ms = animator.delay_in_sequence();
        let mut links = Vec::new();
        for mut link in animator.into_links() {
            for (target, state) in mem::take(&mut link.states) {
                self.core.record_mut(&target).current_state = Some(state);
            }
            for animation in &link.animations {
                self.core.enqueue(animation);
            }
            links.push(Link::new(link, delay_in_sequence_ms));
        }

        let id = self.animators.insert(RunningAnimator {
            scheduled_at_ms: self.clock_ms,
            links,
        });
        self.order.push(id);
        debug!(animator = ?id, delay_in_sequence_ms, "animator started");

        let Self { animators, core, .. } = self;
        if let Some(running) = animators.get_mut(id) {
            for link in running.links.iter_mut().filter(|link| link.delay_ms == 0) {
                if !core.begin(link) {
                    core.end(link, true);
                }
            }
        }
        Ok(id)
    }

    /// Advance the clock by `dt_ms` and apply one frame
    pub fn tick(&mut self, dt_ms: u64) {
        self.clock_ms = self.clock_ms.saturating_add(dt_ms);
        let clock_ms = self.clock_ms;
        let Self {
            animators,
            order,
            core,
            apply_changes,
            custom_property_applier,
            ..
        } = self;

        let mut completed: SmallVec<[(AnimatorId, usize); 8]> = SmallVec::new();
        for &id in order.iter() {
            let Some(running) = animators.get_mut(id) else {
                continue;
            };
            let elapsed = clock_ms - running.scheduled_at_ms;

            for (index, link) in running.links.iter_mut().enumerate() {
                if link.phase == Phase::Pending && elapsed >= link.delay_ms && !core.begin(link) {
                    core.end(link, true);
                }
                if link.phase != Phase::Running {
                    continue;
                }

                let (progress, done) = link.progress_at(elapsed.saturating_sub(link.delay_ms));
                for &contribution_id in &link.contributions {
                    if let Some(contribution) = core.contributions.get_mut(contribution_id) {
                        let delta = contribution.delta_at(progress);
                        let key = contribution.animation().key();
                        trace!(tag = key.tag(), progress, delta, "contribution delta");
                        core.values.add_delta(&key, delta);
                    }
                }
                if done {
                    completed.push((id, index));
                }
            }
        }

        let written = match custom_property_applier {
            Some(applier) => core.values.flush(applier.as_mut()),
            None => core.values.flush(&mut |_: &T, tag: &str, _: f32| {
                trace!(tag, "no custom property applier installed");
            }),
        };
        if written > 0 {
            if let Some(callback) = apply_changes {
                callback();
            }
        }

        for (id, index) in completed {
            if let Some(link) = animators.get_mut(id).and_then(|r| r.links.get_mut(index)) {
                core.end(link, false);
            }
        }
        self.remove_finished();
    }

    /// Cancel a whole chain; its end actions see `was_cancelled = true`
    pub fn cancel(&mut self, id: AnimatorId) -> Result<()> {
        let Self { animators, core, .. } = self;
        let running = animators.get_mut(id).ok_or(AnimationError::UnknownAnimator)?;
        for link in &mut running.links {
            core.end(link, true);
        }
        debug!(animator = ?id, "animator cancelled");
        self.remove_finished();
        Ok(())
    }

    /// Cancel every animation of `target`
    pub fn cancel_target(&mut self, target: &Rc<T>) {
        self.cancel_matching(target, None);
        if let Some(record) = self.core.targets.get_mut(&TargetId::of(target)) {
            record.tags.clear();
        }
    }

    /// Cancel the animations of one property of `target`
    pub fn cancel_property(&mut self, target: &Rc<T>, tag: &str) {
        self.cancel_matching(target, Some(tag));
        if let Some(record) = self.core.targets.get_mut(&TargetId::of(target)) {
            record.tags.remove(tag);
        }
    }

    pub fn cancel_all(&mut self) {
        let Self {
            animators, core, ..
        } = self;
        for (_, running) in animators.iter_mut() {
            for link in &mut running.links {
                core.end(link, true);
            }
        }
        debug!("all animators cancelled");
        self.remove_finished();
    }

    fn cancel_matching(&mut self, target: &Rc<T>, tag: Option<&str>) {
        let target_id = TargetId::of(target);
        let Self {
            animators,
            order,
            core,
            ..
        } = self;

        let mut states: SmallVec<[StatePair<T>; 2]> = SmallVec::new();
        for &id in order.iter() {
            let Some(running) = animators.get_mut(id) else {
                continue;
            };
            for link in &mut running.links {
                if link.phase == Phase::Finished {
                    continue;
                }
                if core.remove_matching(link, target_id, tag, &mut states) && link.is_empty() {
                    core.end(link, true);
                }
            }
        }
        core.fire_end_actions(&states, true);
        debug!(?target_id, tag, "cancelled target animations");
        self.remove_finished();
    }

    fn remove_finished(&mut self) {
        let animators = &mut self.animators;
        self.order.retain(|&id| match animators.get(id) {
            Some(running) if running.is_finished() => {
                animators.remove(id);
                debug!(animator = ?id, "animator finished");
                false
            }
            Some(_) => true,
            None => false,
        });
        self.core.prune_targets();
    }

    /// Make `state` the current state of `target`, or clear it
    pub fn set_state(&mut self, target: &Rc<T>, state: Option<Rc<AnimationState<T>>>) {
        self.core.record_mut(target).current_state = state;
    }

    pub fn current_state(&self, target: &Rc<T>) -> Option<Rc<AnimationState<T>>> {
        self.core.current_state(target)
    }

    /// Set every value of `action` on each target without animating
    pub fn apply_immediately(&self, action: &dyn AnimationAction<T>, targets: &[Rc<T>]) {
        for target in targets {
            for animation in action.animations() {
                animation.property().set(target, animation.target_value());
            }
        }
    }

    /// Switch each target to `state` without animating.
    ///
    /// The state's end action runs with `was_cancelled = false`.
    pub fn apply_state_immediately(&mut self, state: &Rc<AnimationState<T>>, targets: &[Rc<T>]) {
        for target in targets {
            self.set_state(target, Some(state.clone()));
        }
        self.apply_immediately(&**state, targets);
        if let Some(action) = state.end_action() {
            for target in targets {
                action(target, false);
            }
        }
    }

    /// Whether the chain is still pending or running
    pub fn is_running(&self, id: AnimatorId) -> bool {
        self.animators.contains_key(id)
    }

    pub fn running_count(&self) -> usize {
        self.animators.len()
    }

    pub fn has_active_animations(&self) -> bool {
        !self.animators.is_empty()
    }

    /// Current accumulated value of a property with live contributions
    pub fn accumulated_value(&self, target: &Rc<T>, tag: &str) -> Option<f32> {
        self.core
            .values
            .value(&AnimationKey::new(TargetId::of(target), Rc::from(tag)))
    }

    /// Target value of the most recently begun animation of a property
    pub fn last_target_value(&self, target: &Rc<T>, tag: &str) -> Option<f32> {
        self.core
            .record(target)
            .and_then(|r| r.tags.get(tag))
            .and_then(|info| info.last_target_value)
    }

    /// Value a property ends at once every started animation has run
    pub fn queued_target_value(&self, target: &Rc<T>, tag: &str) -> Option<f32> {
        self.core
            .record(target)
            .and_then(|r| r.tags.get(tag))
            .and_then(|info| info.queued_target_value.or(info.last_target_value))
    }

    /// Number of live contributions on `target`
    pub fn contribution_count(&self, target: &Rc<T>) -> usize {
        self.core.values.contribution_count(TargetId::of(target))
    }
}

impl<T: 'static> Default for AnimationScheduler<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for AnimationScheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationScheduler")
            .field("config", &self.config)
            .field("clock_ms", &self.clock_ms)
            .field("animators", &self.animators.len())
            .field("contributions", &self.core.contributions.len())
            .field("accumulators", &self.core.values.len())
            .finish_non_exhaustive()
    }
}
