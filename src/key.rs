//! Component key types for the application context.

use std::any::TypeId;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Key for component storage and lookup.
///
/// A key is a `(type, qualifier)` pair. Two keys are equal iff both the type
/// and the qualifier match; the absent qualifier is its own value, the
/// "default" qualifier, and never equals a named one.
///
/// # Examples
///
/// ```rust
/// use ferrous_context::ComponentKey;
///
/// trait Clock: Send + Sync {}
///
/// let plain = ComponentKey::of::<dyn Clock>();
/// let primary = ComponentKey::of::<dyn Clock>().with_qualifier("primary");
///
/// assert_ne!(plain, primary);
/// assert!(plain.same_type(&primary));
/// assert_eq!(primary.qualifier(), Some("primary"));
/// assert!(primary.to_string().ends_with("@primary"));
/// ```
#[derive(Clone)]
pub struct ComponentKey {
    type_id: TypeId,
    type_name: &'static str,
    qualifier: Option<Arc<str>>,
}

impl ComponentKey {
    /// Key for `T` with the default qualifier.
    #[inline]
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            qualifier: None,
        }
    }

    /// Key for `T` with the given qualifier.
    pub fn qualified<T: ?Sized + 'static>(qualifier: impl Into<Arc<str>>) -> Self {
        Self::of::<T>().with_qualifier(qualifier)
    }

    /// Returns a copy of this key carrying `qualifier`.
    pub fn with_qualifier(mut self, qualifier: impl Into<Arc<str>>) -> Self {
        self.qualifier = Some(qualifier.into());
        self
    }

    pub(crate) fn with_qualifier_opt(mut self, qualifier: Option<Arc<str>>) -> Self {
        self.qualifier = qualifier;
        self
    }

    /// Returns the same type under the default qualifier.
    pub fn unqualified(&self) -> Self {
        Self {
            type_id: self.type_id,
            type_name: self.type_name,
            qualifier: None,
        }
    }

    #[inline]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Human-readable type name, as produced by `std::any::type_name`.
    #[inline]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    pub(crate) fn qualifier_arc(&self) -> Option<&Arc<str>> {
        self.qualifier.as_ref()
    }

    /// True when the key carries no qualifier.
    #[inline]
    pub fn is_default(&self) -> bool {
        self.qualifier.is_none()
    }

    /// True when both keys name the same type, whatever their qualifiers.
    #[inline]
    pub fn same_type(&self, other: &ComponentKey) -> bool {
        self.type_id == other.type_id
    }
}

impl PartialEq for ComponentKey {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id && self.qualifier == other.qualifier
    }
}

impl Eq for ComponentKey {}

// The type name is diagnostic only and stays out of the hash.
impl Hash for ComponentKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
        self.qualifier.hash(state);
    }
}

impl fmt::Debug for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentKey({})", self)
    }
}

impl fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{}@{}", self.type_name, q),
            None => f.write_str(self.type_name),
        }
    }
}
