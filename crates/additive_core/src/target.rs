//! Target identity
//!
//! Animated objects are shared as `Rc<T>` and compared by identity, never by
//! value. The accumulator is keyed by `(target identity, tag)`.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

/// Identity of an animation target, derived from its `Rc` allocation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(usize);

impl TargetId {
    /// Identity of the object behind `target`
    pub fn of<T: ?Sized>(target: &Rc<T>) -> Self {
        Self(Rc::as_ptr(target) as *const () as usize)
    }

    /// Raw address, only meaningful while the target is alive
    pub fn as_raw(self) -> usize {
        self.0
    }
}

impl fmt::Debug for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TargetId({:#x})", self.0)
    }
}

/// Key of a shared accumulator: one animated property on one target.
///
/// Two keys are equal iff the tags are equal by value and the targets are
/// the same object.
#[derive(Clone, Debug)]
pub struct AnimationKey {
    pub target: TargetId,
    pub tag: Rc<str>,
}

impl AnimationKey {
    pub fn new(target: TargetId, tag: Rc<str>) -> Self {
        Self { target, tag }
    }

    pub fn tag(&self) -> &str {
        &self.tag
    }
}

impl PartialEq for AnimationKey {
    fn eq(&self, other: &Self) -> bool {
        self.target == other.target && *self.tag == *other.tag
    }
}

impl Eq for AnimationKey {}

impl Hash for AnimationKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.target.hash(state);
        self.tag.hash(state);
    }
}
