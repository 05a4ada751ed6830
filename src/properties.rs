//! Ambient values published by external collaborators.

use std::any::Any;
use std::fmt::Display;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::internal::Map;

type AnyValue = Arc<dyn Any + Send + Sync>;

struct Property {
    value: AnyValue,
    /// Text form compared by property conditions.
    rendered: Option<Arc<str>>,
}

macro_rules! render_as {
    ($value:expr; $($ty:ty),+ $(,)?) => {
        $(
            if let Some(v) = $value.downcast_ref::<$ty>() {
                return Some(v.to_string().into());
            }
        )+
    };
}

/// Text form of the primitive and string types.
fn render(value: &(dyn Any + Send + Sync)) -> Option<Arc<str>> {
    render_as!(value;
        String, &'static str, Arc<str>, bool, char,
        i8, i16, i32, i64, i128, isize,
        u8, u16, u32, u64, u128, usize,
        f32, f64,
    );
    None
}

/// Name-keyed storage the container never interprets itself.
///
/// Configuration loaders publish values here; bindings read them back
/// through conditions or from inside their providers.
#[derive(Default)]
pub struct Properties {
    values: RwLock<Map<Arc<str>, Property>>,
}

impl Properties {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes `value`, under its type name when `name` is `None`.
    ///
    /// Strings, `bool`, `char` and the numeric primitives also get a text
    /// form for [`get_string`](Self::get_string); use
    /// [`insert_display`](Self::insert_display) for other types.
    /// Returns `true` when an earlier value with the same name was replaced.
    pub fn insert<V: Send + Sync + 'static>(&self, name: Option<&str>, value: V) -> bool {
        let value: AnyValue = Arc::new(value);
        let rendered = render(value.as_ref());
        self.store(name.unwrap_or(std::any::type_name::<V>()), value, rendered)
    }

    /// Publishes `value` together with its `Display` rendering.
    pub fn insert_display<V: Display + Send + Sync + 'static>(&self, name: Option<&str>, value: V) -> bool {
        let rendered = Some(value.to_string().into());
        self.store(name.unwrap_or(std::any::type_name::<V>()), Arc::new(value), rendered)
    }

    fn store(&self, name: &str, value: AnyValue, rendered: Option<Arc<str>>) -> bool {
        let name: Arc<str> = name.into();
        debug!(property = %name, "context value published");
        self.values.write().insert(name, Property { value, rendered }).is_some()
    }

    /// The value stored under `name`, if present and of type `V`.
    pub fn get<V: Send + Sync + 'static>(&self, name: &str) -> Option<Arc<V>> {
        let value = self.values.read().get(name)?.value.clone();
        value.downcast::<V>().ok()
    }

    /// The unnamed value published for `V`.
    pub fn get_typed<V: Send + Sync + 'static>(&self) -> Option<Arc<V>> {
        self.get::<V>(std::any::type_name::<V>())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.read().contains_key(name)
    }

    /// Text form of `name`, when it has one.
    pub fn get_string(&self, name: &str) -> Option<String> {
        self.values
            .read()
            .get(name)?
            .rendered
            .as_deref()
            .map(str::to_string)
    }

    /// Published names in no particular order.
    pub fn names(&self) -> Vec<Arc<str>> {
        self.values.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
