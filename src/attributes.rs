//! Per-request attribute map.
//!
//! Attributes thread derived data through the pipeline: route parameters,
//! the authenticated principal, filters injected by permission checks.
//! Values are type-erased behind `Arc<dyn Any>` and read back with a typed
//! lookup. Unknown keys are opaque to the core.
//!
//! Well-known keys:
//!
//! | Key | Set by | Typical type |
//! |---|---|---|
//! | [`USER`] | authentication middleware | application user type |
//! | [`TOKEN`] | authentication middleware | `String` |
//! | [`PERMISSION_FILTER`] | permission middleware | application filter type |
//! | [`CLIENT_IP`] | server adapter | `String` |
//!
//! Route parameters are stored as `String` under their placeholder name.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub const USER: &str = "user";
pub const TOKEN: &str = "token";
pub const PERMISSION_FILTER: &str = "permission_filter";
pub const CLIENT_IP: &str = "client_ip";

type Value = Arc<dyn Any + Send + Sync>;

/// Cloning is cheap: values are reference counted and never mutated.
#[derive(Clone, Default)]
pub struct Attributes {
    values: HashMap<String, Value>,
}

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    /// The value under `key` if it exists and has type `T`.
    pub fn get<T: Any + Send + Sync>(&self, key: &str) -> Option<&T> {
        self.values.get(key)?.downcast_ref::<T>()
    }

    /// The raw shared value under `key`, whatever its type.
    pub fn get_any(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub(crate) fn insert<T: Any + Send + Sync>(&mut self, key: impl Into<String>, value: T) {
        self.values.insert(key.into(), Arc::new(value));
    }

    pub(crate) fn remove(&mut self, key: &str) {
        self.values.remove(key);
    }
}

impl fmt::Debug for Attributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<_> = self.values.keys().collect();
        keys.sort();
        f.debug_set().entries(keys).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typed_lookup() {
        let mut attrs = Attributes::new();
        attrs.insert("id", "42".to_owned());
        attrs.insert(USER, 7_u64);
        assert_eq!(attrs.get::<String>("id").map(String::as_str), Some("42"));
        assert_eq!(attrs.get::<u64>(USER), Some(&7));
        assert!(attrs.get::<u32>(USER).is_none());
    }

    #[test]
    fn clones_are_independent_snapshots() {
        let mut first = Attributes::new();
        first.insert(TOKEN, "abc".to_owned());
        let mut second = first.clone();
        second.remove(TOKEN);
        assert!(first.contains(TOKEN));
        assert!(!second.contains(TOKEN));
    }
}
