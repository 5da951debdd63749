//! Sparse keyed attribute storage

use crate::mesh::types::EntityId;
use std::marker::PhantomData;

/// Sparse attribute table keyed by an entity id
///
/// Values are stored densely by slot, with a presence flag per slot so that
/// "no value" is distinguishable from a default value. Storage grows on
/// demand when a key beyond the current length is written.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMap<K, V> {
    values: Vec<V>,
    present: Vec<bool>,
    _key: PhantomData<K>,
}

impl<K: EntityId, V: Copy + Default> PropertyMap<K, V> {
    /// Create an empty map
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            present: Vec::new(),
            _key: PhantomData,
        }
    }

    /// Create a map with `len` allocated but absent keys
    pub fn with_len(len: usize) -> Self {
        let mut map = Self::new();
        map.resize(len);
        map
    }

    /// Number of allocated key slots (present or not)
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// True when no key slot is allocated
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Number of keys that currently hold a value
    pub fn present_count(&self) -> usize {
        self.present.iter().filter(|&&p| p).count()
    }

    /// Drop every value and slot
    pub fn clear(&mut self) {
        self.values.clear();
        self.present.clear();
    }

    /// Allocate (or drop) slots so that exactly `len` keys exist
    pub fn resize(&mut self, len: usize) {
        self.values.resize(len, V::default());
        self.present.resize(len, false);
    }

    /// True when `key` holds a value
    pub fn has(&self, key: K) -> bool {
        self.present.get(key.slot()).copied().unwrap_or(false)
    }

    /// Value stored for `key`
    ///
    /// # Panics
    ///
    /// Panics when `key` holds no value. Use [`try_get`](Self::try_get)
    /// when absence is expected.
    pub fn get(&self, key: K) -> V {
        match self.try_get(key) {
            Some(value) => value,
            None => panic!("property map has no value for key {}", key),
        }
    }

    /// Value stored for `key`, if any
    pub fn try_get(&self, key: K) -> Option<V> {
        let i = key.slot();
        if self.has(key) {
            Some(self.values[i])
        } else {
            None
        }
    }

    /// Store `value` for `key`, growing storage when needed
    pub fn put(&mut self, key: K, value: V) {
        let i = key.slot();
        if self.values.len() <= i {
            self.resize(i + 1);
        }
        self.values[i] = value;
        self.present[i] = true;
    }

    /// Remove the value of `key`, keeping its slot allocated
    pub fn erase(&mut self, key: K) {
        let i = key.slot();
        if i < self.present.len() {
            self.present[i] = false;
        }
    }

    /// Set every allocated key to `value`
    pub fn fill(&mut self, value: V) {
        self.values.iter_mut().for_each(|v| *v = value);
        self.present.iter_mut().for_each(|p| *p = true);
    }

    /// Reorder values so that new key `n` receives the value of old key
    /// `old_from_new[n]`; keys past `old_from_new.len()` are dropped
    pub fn remap_keys(&mut self, old_from_new: &[K]) {
        let old_values = std::mem::take(&mut self.values);
        let old_present = std::mem::take(&mut self.present);
        self.values = Vec::with_capacity(old_from_new.len());
        self.present = Vec::with_capacity(old_from_new.len());
        for &old_key in old_from_new {
            let i = old_key.slot();
            match (old_values.get(i), old_present.get(i)) {
                (Some(&value), Some(&present)) => {
                    self.values.push(value);
                    self.present.push(present);
                }
                _ => {
                    self.values.push(V::default());
                    self.present.push(false);
                }
            }
        }
    }

    /// Drop all slots at or beyond `len`
    pub fn trim(&mut self, len: usize) {
        self.values.truncate(len);
        self.present.truncate(len);
    }

    /// Iterate over `(key, value)` for keys that hold a value
    pub fn iter(&self) -> impl Iterator<Item = (K, V)> + '_ {
        self.values
            .iter()
            .zip(self.present.iter())
            .enumerate()
            .filter(|(_, (_, &present))| present)
            .map(|(i, (&value, _))| (K::from_index(i), value))
    }

    /// Apply `f` to every present value in place
    pub fn map_values(&mut self, mut f: impl FnMut(V) -> V) {
        for (value, &present) in self.values.iter_mut().zip(self.present.iter()) {
            if present {
                *value = f(*value);
            }
        }
    }
}

impl<K: EntityId, V: Copy + Default> Default for PropertyMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::types::{PointId, Vec3};

    #[test]
    fn test_put_get_has() {
        let mut map: PropertyMap<PointId, Vec3> = PropertyMap::new();
        assert!(!map.has(PointId(3)));
        assert_eq!(map.try_get(PointId(3)), None);

        map.put(PointId(3), Vec3::new(1.0, 2.0, 3.0));
        assert!(map.has(PointId(3)));
        assert!(!map.has(PointId(2)));
        assert_eq!(map.len(), 4);
        assert_eq!(map.get(PointId(3)), Vec3::new(1.0, 2.0, 3.0));

        // Overwrite is idempotent
        map.put(PointId(3), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(map.get(PointId(3)), Vec3::new(4.0, 5.0, 6.0));
        assert_eq!(map.present_count(), 1);
    }

    #[test]
    #[should_panic(expected = "no value")]
    fn test_get_absent_panics() {
        let map: PropertyMap<PointId, Vec3> = PropertyMap::with_len(4);
        let _ = map.get(PointId(1));
    }

    #[test]
    fn test_fill_and_erase() {
        let mut map: PropertyMap<PointId, f32> = PropertyMap::with_len(3);
        map.fill(2.5);
        assert_eq!(map.present_count(), 3);
        map.erase(PointId(1));
        assert!(!map.has(PointId(1)));
        assert_eq!(map.get(PointId(2)), 2.5);
    }

    #[test]
    fn test_remap_and_trim() {
        let mut map: PropertyMap<PointId, u32> = PropertyMap::new();
        for i in 0..5 {
            map.put(PointId(i), i * 10);
        }
        map.erase(PointId(2));

        map.remap_keys(&[PointId(4), PointId(2), PointId(0)]);
        assert_eq!(map.len(), 3);
        assert_eq!(map.get(PointId(0)), 40);
        assert!(!map.has(PointId(1)));
        assert_eq!(map.get(PointId(2)), 0);

        map.trim(1);
        assert_eq!(map.len(), 1);
        let entries: Vec<_> = map.iter().collect();
        assert_eq!(entries, vec![(PointId(0), 40)]);
    }
}
