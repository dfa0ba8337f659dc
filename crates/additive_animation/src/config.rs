//! Animator defaults
//!
//! Loaded from a TOML table such as:
//!
//! ```toml
//! default_duration_ms = 250
//! default_easing = "ease_out_cubic"
//! ```

use additive_core::{AnimationError, Result};
use serde::{Deserialize, Serialize};

use crate::easing::Easing;

/// Defaults applied to every animator a scheduler creates
#[derive(Clone, Copy, Debug, PartialEq, Deserialize, Serialize)]
pub struct AnimatorConfig {
    /// Duration of interpolated animations
    #[serde(default = "default_duration_ms")]
    pub default_duration_ms: u64,
    /// Easing of interpolated animations
    #[serde(default = "default_easing")]
    pub default_easing: Easing,
}

fn default_duration_ms() -> u64 {
    300
}

fn default_easing() -> Easing {
    Easing::EaseInOut
}

impl Default for AnimatorConfig {
    fn default() -> Self {
        Self {
            default_duration_ms: default_duration_ms(),
            default_easing: default_easing(),
        }
    }
}

impl AnimatorConfig {
    pub fn from_toml_str(source: &str) -> Result<Self> {
        toml::from_str(source).map_err(|e| AnimationError::Config(e.to_string()))
    }
}
