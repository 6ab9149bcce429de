//! Query contract shared by every index

use crate::container::ValueContainer;
use crate::error::Result;
use crate::scope::SearchScope;
use std::sync::Arc;

/// Read side of a key to multivalue index.
///
/// Storage faults propagate as errors; they are never reported as missing
/// data.
pub trait KeyIndex<K, V> {
    /// Container of every occurrence of `key`; empty when the key is unknown
    fn get_data(&self, key: &K) -> Result<Arc<ValueContainer<V>>>;

    /// Feed `visitor` every key with at least one occurrence in a file inside
    /// `scope` and accepted by `key_filter`.
    ///
    /// Keys come from a snapshot taken when the call starts, in no particular
    /// order and each at most once. Returns `Ok(false)` as soon as `visitor`
    /// returns false. The visitor must not modify this index.
    fn process_all_keys(
        &self,
        visitor: &mut dyn FnMut(&K) -> bool,
        scope: &dyn SearchScope,
        key_filter: Option<&dyn Fn(&K) -> bool>,
    ) -> Result<bool>;
}

impl<K, V, I: KeyIndex<K, V> + ?Sized> KeyIndex<K, V> for Arc<I> {
    fn get_data(&self, key: &K) -> Result<Arc<ValueContainer<V>>> {
        (**self).get_data(key)
    }

    fn process_all_keys(
        &self,
        visitor: &mut dyn FnMut(&K) -> bool,
        scope: &dyn SearchScope,
        key_filter: Option<&dyn Fn(&K) -> bool>,
    ) -> Result<bool> {
        (**self).process_all_keys(visitor, scope, key_filter)
    }
}
