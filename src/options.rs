//! Context configuration.

#[cfg(feature = "config")]
use serde::Deserialize;

/// Default maximum depth of a single resolution call tree.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Tunables for an [`ApplicationContext`](crate::ApplicationContext).
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{ApplicationContext, ContextOptions};
///
/// let options = ContextOptions::new()
///     .max_depth(64)
///     .seal_on_first_get(true);
/// let ctx = ApplicationContext::with_options(options);
/// assert_eq!(ctx.options().max_depth, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "config", derive(Deserialize))]
#[cfg_attr(feature = "config", serde(default))]
pub struct ContextOptions {
    /// Upper bound on nested resolutions before `DepthExceeded`.
    pub max_depth: usize,
    /// Reject every registration once the first component was resolved.
    pub seal_on_first_get: bool,
    /// Log a warning when a context or scope with pending destroy hooks is
    /// dropped without being closed.
    pub warn_on_unclosed: bool,
}

impl Default for ContextOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            seal_on_first_get: false,
            warn_on_unclosed: true,
        }
    }
}

impl ContextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth.max(1);
        self
    }

    pub fn seal_on_first_get(mut self, seal: bool) -> Self {
        self.seal_on_first_get = seal;
        self
    }

    pub fn warn_on_unclosed(mut self, warn: bool) -> Self {
        self.warn_on_unclosed = warn;
        self
    }

    /// Reads options from a JSON document; missing fields keep their defaults.
    #[cfg(feature = "config")]
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
