//! Animation error types

use thiserror::Error;

/// Errors raised by the animation core.
///
/// All of these are programmer errors surfaced at construction or start
/// time; none of them are transient.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// Spring stiffness must be strictly positive
    #[error("spring stiffness must be positive, was {0}")]
    InvalidStiffness(f32),

    /// Spring damping ratio must be non-negative
    #[error("spring damping ratio must be non-negative, was {0}")]
    InvalidDampingRatio(f32),

    /// A duration-derived spring needs a positive duration
    #[error("spring duration must be positive, was {0}ms")]
    InvalidDuration(i64),

    /// Unrecognized visibility code in a declarative state
    #[error("unsupported visibility code: {0}")]
    InvalidVisibility(i32),

    /// An animation was enqueued before a target was set
    #[error("cannot enqueue an animation without a target")]
    MissingTarget,

    /// `start()` was called on a sequence that already started
    #[error("animation sequence was already started")]
    SequenceAlreadyStarted,

    /// The animator id does not refer to a running animator
    #[error("unknown animator")]
    UnknownAnimator,

    /// Invalid animator configuration
    #[error("invalid animator configuration: {0}")]
    Config(String),
}

/// Result type for animation operations
pub type Result<T> = std::result::Result<T, AnimationError>;
