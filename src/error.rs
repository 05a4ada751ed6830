//! Error types for the application context.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::key::ComponentKey;

/// Boxed error returned by providers, post-processors and lifecycle hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Chain of keys that led to a failing resolution, outermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionTrace(pub Vec<ComponentKey>);

impl ResolutionTrace {
    pub fn keys(&self) -> &[ComponentKey] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ResolutionTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return Ok(());
        }
        f.write_str(" (resolution trace: ")?;
        write_path(f, &self.0)?;
        f.write_str(")")
    }
}

fn write_path(f: &mut fmt::Formatter<'_>, keys: &[ComponentKey]) -> fmt::Result {
    for (i, key) in keys.iter().enumerate() {
        if i > 0 {
            f.write_str(" -> ")?;
        }
        write!(f, "{}", key)?;
    }
    Ok(())
}

struct Path<'a>(&'a [ComponentKey]);

impl fmt::Display for Path<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_path(f, self.0)
    }
}

/// Application context errors.
///
/// Every variant raised by a resolution names the requested key; resolution
/// failures additionally carry the [`ResolutionTrace`] that led to them.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::{ApplicationContext, ContainerError, Resolver};
///
/// struct Unbound;
///
/// let ctx = ApplicationContext::new();
/// match ctx.get::<Unbound>() {
///     Err(ContainerError::ComponentResolution { key, .. }) => {
///         assert!(key.type_name().ends_with("Unbound"));
///     }
///     _ => unreachable!(),
/// }
/// ```
#[derive(Debug, Error)]
pub enum ContainerError {
    /// No usable binding for a required key, or every candidate's conditions failed.
    #[error("no usable binding for {key}: {reason}{trace}")]
    ComponentResolution {
        key: ComponentKey,
        reason: String,
        trace: ResolutionTrace,
    },

    /// Two or more eligible candidates tie on qualifier rank and priority.
    #[error("ambiguous binding for {key}: {count} candidates tie ({list}){trace}", count = .candidates.len(), list = .candidates.join(", "))]
    AmbiguousBinding {
        key: ComponentKey,
        candidates: Vec<String>,
        trace: ResolutionTrace,
    },

    /// A key was requested while already being resolved on the same call
    /// tree, or two resolutions would wait on each other's construction.
    ///
    /// `path` runs from the first occurrence of the key back to itself.
    #[error("circular dependency: {}", Path(.path))]
    CircularDependency { path: Vec<ComponentKey> },

    /// Proxying was required for a target that cannot be proxied.
    #[error("cannot proxy {type_name}: {reason}")]
    ProxyConstraintViolation {
        type_name: &'static str,
        reason: String,
    },

    /// A provider, post-processor or lifecycle hook failed during construction.
    #[error("failed to construct {key}: {source}{trace}")]
    Application {
        key: ComponentKey,
        trace: ResolutionTrace,
        #[source]
        source: BoxError,
    },

    /// A named-scope binding was resolved without an active store for that scope.
    #[error("scope '{scope}' is not active while resolving {key}{trace}")]
    ScopeNotActive {
        scope: Arc<str>,
        key: ComponentKey,
        trace: ResolutionTrace,
    },

    /// The stored instance could not be viewed as the requested type.
    #[error("type mismatch for {key}: expected {expected}")]
    TypeMismatch {
        key: ComponentKey,
        expected: &'static str,
    },

    /// The resolution stack grew beyond the configured depth.
    #[error("maximum resolution depth {depth} exceeded at {key}")]
    DepthExceeded { key: ComponentKey, depth: usize },

    /// A type was rebound after it had already been resolved.
    #[error("cannot bind {key}: the type has already been resolved")]
    BindingAfterResolution { key: ComponentKey },

    /// Registration attempted after the context was sealed.
    #[error("cannot bind {key}: the context is sealed")]
    Sealed { key: ComponentKey },

    /// The application context has been closed.
    #[error("cannot resolve {key}: the application context is closed")]
    Closed { key: ComponentKey },

    /// The named scope holding the binding has been closed.
    #[error("cannot resolve {key}: scope '{scope}' is closed{trace}")]
    ScopeClosed {
        scope: Arc<str>,
        key: ComponentKey,
        trace: ResolutionTrace,
    },
}

impl ContainerError {
    /// The key the error is about, when there is one.
    pub fn key(&self) -> Option<&ComponentKey> {
        match self {
            ContainerError::ComponentResolution { key, .. }
            | ContainerError::AmbiguousBinding { key, .. }
            | ContainerError::Application { key, .. }
            | ContainerError::ScopeNotActive { key, .. }
            | ContainerError::TypeMismatch { key, .. }
            | ContainerError::DepthExceeded { key, .. }
            | ContainerError::BindingAfterResolution { key }
            | ContainerError::Sealed { key }
            | ContainerError::Closed { key }
            | ContainerError::ScopeClosed { key, .. } => Some(key),
            ContainerError::CircularDependency { path } => path.last(),
            ContainerError::ProxyConstraintViolation { .. } => None,
        }
    }

    /// The resolution trace, for errors raised during resolution.
    pub fn trace(&self) -> Option<&ResolutionTrace> {
        match self {
            ContainerError::ComponentResolution { trace, .. }
            | ContainerError::AmbiguousBinding { trace, .. }
            | ContainerError::Application { trace, .. }
            | ContainerError::ScopeNotActive { trace, .. }
            | ContainerError::ScopeClosed { trace, .. } => Some(trace),
            _ => None,
        }
    }

    /// True for a missing binding (or all conditions failing) on exactly `key`.
    pub fn is_missing(&self, key: &ComponentKey) -> bool {
        matches!(self, ContainerError::ComponentResolution { key: k, .. } if k == key)
    }

    /// Wraps a failure raised while constructing `key`.
    ///
    /// Container errors that bubble up through a provider with `?` keep their
    /// original variant.
    pub(crate) fn construction(key: &ComponentKey, trace: ResolutionTrace, err: BoxError) -> Self {
        match err.downcast::<ContainerError>() {
            Ok(inner) => *inner,
            Err(source) => ContainerError::Application {
                key: key.clone(),
                trace,
                source,
            },
        }
    }
}

/// Result type for context operations.
pub type ContainerResult<T> = Result<T, ContainerError>;
