//! Additive Core
//!
//! Host-boundary primitives shared by the additive animation system:
//!
//! - **Targets**: identity of animated objects and the `(target, tag)` key
//! - **Properties**: the float accessor contract a host implements
//! - **Paths**: 2D path geometry and arc-length measurement for path sampling
//! - **Errors**: the crate-wide error type
//!
//! # Example
//!
//! ```rust
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use additive_core::{ClosureProperty, FloatProperty, TargetId};
//!
//! struct Dot { x: Cell<f32> }
//!
//! let dot = Rc::new(Dot { x: Cell::new(1.0) });
//! let x = ClosureProperty::new("x", |d: &Dot| d.x.get(), |d: &Dot, v| d.x.set(v));
//!
//! x.set(&dot, 4.0);
//! assert_eq!(x.get(&dot), 4.0);
//! assert_eq!(TargetId::of(&dot), TargetId::of(&dot.clone()));
//! ```

pub mod error;
pub mod path;
pub mod property;
pub mod target;

pub use error::{AnimationError, Result};
pub use path::{Path, PathBuilder, PathCommand, PathMeasure, Point};
pub use property::{ClosureProperty, FloatProperty, PropertyRef};
pub use target::{AnimationKey, TargetId};
