//! Float property accessors
//!
//! The host exposes animatable state through [`FloatProperty`]. The core
//! only ever reads and writes `f32` values through this contract.

use std::fmt;
use std::rc::Rc;

/// Reads and writes one named float value on a target.
///
/// `set` takes `&T`: hosts keep animatable state behind `Cell`/`RefCell`
/// since targets are shared as `Rc<T>`.
pub trait FloatProperty<T: ?Sized> {
    /// Stable name of the property, used as the accumulator tag
    fn name(&self) -> &str;

    fn get(&self, target: &T) -> f32;

    fn set(&self, target: &T, value: f32);
}

/// Shared handle to a property accessor
pub type PropertyRef<T> = Rc<dyn FloatProperty<T>>;

/// A property built from a pair of closures
pub struct ClosureProperty<T: ?Sized> {
    name: Rc<str>,
    getter: Box<dyn Fn(&T) -> f32>,
    setter: Box<dyn Fn(&T, f32)>,
}

impl<T: ?Sized + 'static> ClosureProperty<T> {
    pub fn new<G, S>(name: &str, getter: G, setter: S) -> Self
    where
        G: Fn(&T) -> f32 + 'static,
        S: Fn(&T, f32) + 'static,
    {
        Self {
            name: Rc::from(name),
            getter: Box::new(getter),
            setter: Box::new(setter),
        }
    }

    /// Build a shared property handle directly
    pub fn shared<G, S>(name: &str, getter: G, setter: S) -> PropertyRef<T>
    where
        G: Fn(&T) -> f32 + 'static,
        S: Fn(&T, f32) + 'static,
    {
        Rc::new(Self::new(name, getter, setter))
    }
}

impl<T: ?Sized> FloatProperty<T> for ClosureProperty<T> {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, target: &T) -> f32 {
        (self.getter)(target)
    }

    fn set(&self, target: &T, value: f32) {
        (self.setter)(target, value)
    }
}

impl<T: ?Sized> fmt::Debug for ClosureProperty<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClosureProperty")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
