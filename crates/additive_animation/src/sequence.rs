//! Animation sequences
//!
//! A sequence is a tree over animation chains. Nodes only decide when their
//! children start: each child gets a delay in the sequence, and every chain
//! is handed to the scheduler right away with that delay applied.
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use additive_animation::{AdditiveAnimator, AnimationScheduler, AnimationSequence};
//! use additive_core::ClosureProperty;
//!
//! struct Tile { alpha: Cell<f32> }
//!
//! let tiles: Vec<Rc<Tile>> = (0..3).map(|_| Rc::new(Tile { alpha: Cell::new(0.0) })).collect();
//! let alpha = ClosureProperty::shared("alpha", |t: &Tile| t.alpha.get(), |t: &Tile, v| t.alpha.set(v));
//!
//! let mut sequence = AnimationSequence::play_with_stagger(
//!     50,
//!     tiles.iter().map(|tile| {
//!         AnimationSequence::leaf(
//!             AdditiveAnimator::new()
//!                 .target(tile.clone())
//!                 .set_duration(100)
//!                 .property(alpha.clone(), 1.0),
//!         )
//!     }),
//! );
//! assert_eq!(sequence.total_duration_in_sequence(), 200);
//!
//! let mut scheduler = AnimationScheduler::new();
//! sequence.start(&mut scheduler).unwrap();
//! scheduler.tick(200);
//! assert!(tiles.iter().all(|tile| tile.alpha.get() == 1.0));
//! ```

use additive_core::{AnimationError, Result};

use crate::animator::AdditiveAnimator;
use crate::scheduler::{AnimationScheduler, AnimatorId};

enum Node<T> {
    Leaf(Option<AdditiveAnimator<T>>),
    Together(Vec<AnimationSequence<T>>),
    Sequential(Vec<AnimationSequence<T>>),
    Staggered {
        stagger_ms: u64,
        children: Vec<AnimationSequence<T>>,
    },
}

/// A node of a sequence tree
pub struct AnimationSequence<T> {
    node: Node<T>,
    delay_in_sequence_ms: u64,
    started_total_ms: Option<u64>,
}

impl<T: 'static> AnimationSequence<T> {
    fn with_node(node: Node<T>) -> Self {
        Self {
            node,
            delay_in_sequence_ms: 0,
            started_total_ms: None,
        }
    }

    /// A single animation chain
    pub fn leaf(animator: AdditiveAnimator<T>) -> Self {
        Self::with_node(Node::Leaf(Some(animator)))
    }

    /// Start every child at the same time
    pub fn play_together(children: impl IntoIterator<Item = AnimationSequence<T>>) -> Self {
        Self::with_node(Node::Together(children.into_iter().collect()))
    }

    /// Start each child when the previous one has finished
    pub fn play_sequentially(children: impl IntoIterator<Item = AnimationSequence<T>>) -> Self {
        Self::with_node(Node::Sequential(children.into_iter().collect()))
    }

    /// Start each child `stagger_ms` after the previous one
    pub fn play_with_stagger(
        stagger_ms: u64,
        children: impl IntoIterator<Item = AnimationSequence<T>>,
    ) -> Self {
        Self::with_node(Node::Staggered {
            stagger_ms,
            children: children.into_iter().collect(),
        })
    }

    pub fn delay_in_sequence(&self) -> u64 {
        self.delay_in_sequence_ms
    }

    pub fn set_delay_in_sequence(&mut self, delay_ms: u64) {
        self.delay_in_sequence_ms = delay_ms;
        if let Node::Leaf(Some(animator)) = &mut self.node {
            animator.set_delay_in_sequence(delay_ms);
        }
    }

    pub fn children(&self) -> &[AnimationSequence<T>] {
        match &self.node {
            Node::Leaf(_) => &[],
            Node::Together(children)
            | Node::Sequential(children)
            | Node::Staggered { children, .. } => children,
        }
    }

    pub fn is_started(&self) -> bool {
        self.started_total_ms.is_some()
    }

    /// Time from the start of the enclosing sequence until this node ends.
    ///
    /// Stable across `start`: the value is frozen when the node starts.
    pub fn total_duration_in_sequence(&self) -> u64 {
        if let Some(total) = self.started_total_ms {
            return total;
        }

        let delay = self.delay_in_sequence_ms;
        match &self.node {
            Node::Leaf(Some(animator)) => animator.total_duration_in_sequence(),
            Node::Leaf(None) => delay,
            Node::Together(children) => children
                .iter()
                .map(AnimationSequence::total_duration_in_sequence)
                .max()
                .unwrap_or(0)
                .saturating_add(delay),
            Node::Sequential(children) => children
                .iter()
                .map(AnimationSequence::total_duration_in_sequence)
                .fold(delay, u64::saturating_add)
                .saturating_add(delay),
            Node::Staggered {
                stagger_ms,
                children,
            } => children
                .iter()
                .enumerate()
                .map(|(i, child)| {
                    child
                        .total_duration_in_sequence()
                        .saturating_add(stagger_ms.saturating_mul(i as u64))
                })
                .max()
                .unwrap_or(0)
                .saturating_add(delay),
        }
    }

    /// Assign delays to every child and start all chains.
    ///
    /// A sequence can only be started once.
    pub fn start(&mut self, scheduler: &mut AnimationScheduler<T>) -> Result<Vec<AnimatorId>> {
        if self.is_started() {
            return Err(AnimationError::SequenceAlreadyStarted);
        }
        self.started_total_ms = Some(self.total_duration_in_sequence());

        let delay = self.delay_in_sequence_ms;
        let mut ids = Vec::new();
        match &mut self.node {
            Node::Leaf(animator) => {
                if let Some(animator) = animator.take() {
                    ids.push(scheduler.start(animator)?);
                }
            }
            Node::Together(children) => {
                for child in children.iter_mut() {
                    child.set_delay_in_sequence(delay);
                    ids.extend(child.start(scheduler)?);
                }
            }
            Node::Sequential(children) => {
                let durations: Vec<u64> = children
                    .iter()
                    .map(AnimationSequence::total_duration_in_sequence)
                    .collect();
                let mut offset = delay;
                for (child, duration) in children.iter_mut().zip(durations) {
                    child.set_delay_in_sequence(offset);
                    offset = offset.saturating_add(duration);
                    ids.extend(child.start(scheduler)?);
                }
            }
            Node::Staggered {
                stagger_ms,
                children,
            } => {
                for (i, child) in children.iter_mut().enumerate() {
                    let offset = stagger_ms.saturating_mul(i as u64);
                    child.set_delay_in_sequence(delay.saturating_add(offset));
                    ids.extend(child.start(scheduler)?);
                }
            }
        }
        Ok(ids)
    }
}

impl<T: 'static> From<AdditiveAnimator<T>> for AnimationSequence<T> {
    fn from(animator: AdditiveAnimator<T>) -> Self {
        AnimationSequence::leaf(animator)
    }
}
