//! Binding descriptors for introspection and diagnostics.

use crate::binding::{Binding, BindingId, BindingKind, DependencySpec};
use crate::key::ComponentKey;
use crate::scope::Scope;

/// Snapshot of one registered binding.
///
/// Descriptors carry no providers or hooks, so they can be logged, compared
/// and kept around after the context is closed.
///
/// # Examples
///
/// ```
/// use ferrous_context::{ApplicationContext, BindingKind, Scope};
/// use std::sync::Arc;
///
/// trait Repository: Send + Sync {}
/// struct Postgres;
/// impl Repository for Postgres {}
///
/// let ctx = ApplicationContext::new();
/// ctx.bind::<Postgres>()
///     .exposes::<dyn Repository, _>(|p| p as Arc<dyn Repository>)
///     .eager()
///     .to(|_| Ok(Postgres))
///     .unwrap();
/// ctx.bind::<u16>().qualifier("port").to_value(5432).unwrap();
///
/// let descriptors = ctx.descriptors();
/// assert_eq!(descriptors.len(), 2);
///
/// let repo = &descriptors[0];
/// assert!(repo.type_name().contains("Postgres"));
/// assert!(repo.eager);
/// assert_eq!(repo.scope, Scope::Singleton);
/// assert!(repo.exposed_as[0].type_name().contains("Repository"));
///
/// let port = &descriptors[1];
/// assert_eq!(port.qualifier(), Some("port"));
/// assert_eq!(port.kind, BindingKind::Instance);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingDescriptor {
    pub id: BindingId,
    pub key: ComponentKey,
    pub kind: BindingKind,
    pub scope: Scope,
    pub priority: i32,
    pub dependencies: Vec<DependencySpec>,
    /// Additional keys the binding is resolvable as.
    pub exposed_as: Vec<ComponentKey>,
    pub conditions: usize,
    /// Whether instances are wrapped in an interception proxy.
    pub intercepted: bool,
    pub eager: bool,
    pub enabled: bool,
    pub processing_priority: i32,
}

impl BindingDescriptor {
    pub fn type_name(&self) -> &'static str {
        self.key.type_name()
    }

    pub fn qualifier(&self) -> Option<&str> {
        self.key.qualifier()
    }

    pub fn is_conditional(&self) -> bool {
        self.conditions > 0
    }
}

impl From<&Binding> for BindingDescriptor {
    fn from(binding: &Binding) -> Self {
        Self {
            id: binding.id,
            key: binding.key.clone(),
            kind: binding.kind,
            scope: binding.scope.clone(),
            priority: binding.priority,
            dependencies: binding.dependencies.clone(),
            exposed_as: binding.exposed_as().cloned().collect(),
            conditions: binding.conditions.len(),
            intercepted: binding.is_intercepted(),
            eager: binding.eager,
            enabled: binding.metadata.enabled,
            processing_priority: binding.metadata.processing_priority,
        }
    }
}

impl std::fmt::Display for BindingDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} [{}", self.id, self.key, self.scope)?;
        if self.priority != 0 {
            write!(f, ", priority {}", self.priority)?;
        }
        if self.intercepted {
            f.write_str(", intercepted")?;
        }
        if self.eager {
            f.write_str(", eager")?;
        }
        f.write_str("]")
    }
}
