//! Primitive integer sets.
//!
//! [`IntSet`] and [`LongSet`] store 32- and 64-bit keys directly in the
//! table words, with no boxing and no per-entry allocation. The key `-1` is
//! reserved as the empty-slot marker and cannot be inserted.

use core::fmt;

use crate::DEFAULT_HEAP_CAPACITY;
use crate::DEFAULT_OFF_HEAP_CAPACITY;
use crate::array::IntArray;
use crate::array::MemoryStatsVisitor;
use crate::array::NumberArrayFactory;
use crate::hash::HashFunction;
use crate::hopscotch::EMPTY_KEY;
use crate::hopscotch::HopScotchTable;
use crate::hopscotch::TableLayout;
use crate::hopscotch::get_long;
use crate::hopscotch::put_long;

pub(crate) struct IntSetLayout;

impl TableLayout for IntSetLayout {
    type Value = ();
    const ITEMS_PER_ENTRY: usize = 2;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        array.get(abs_index) as i64
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        array.set(abs_index, key as i32);
    }

    fn write_value(
        &mut self,
        _array: &mut IntArray,
        _index: usize,
        _abs_index: usize,
        _value: (),
    ) {
    }

    fn replace_value(
        &mut self,
        _array: &mut IntArray,
        _index: usize,
        _abs_index: usize,
        _value: (),
    ) {
    }

    fn take_value(&mut self, _array: &IntArray, _index: usize, _abs_index: usize) {}

    fn rebuild_value(
        &mut self,
        _old_array: &IntArray,
        _old_storage: &mut [Option<()>],
        _index: usize,
        _abs_index: usize,
    ) {
    }
}

pub(crate) struct LongSetLayout;

impl TableLayout for LongSetLayout {
    type Value = ();
    const ITEMS_PER_ENTRY: usize = 3;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        get_long(array, abs_index)
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        put_long(array, abs_index, key);
    }

    fn write_value(
        &mut self,
        _array: &mut IntArray,
        _index: usize,
        _abs_index: usize,
        _value: (),
    ) {
    }

    fn replace_value(
        &mut self,
        _array: &mut IntArray,
        _index: usize,
        _abs_index: usize,
        _value: (),
    ) {
    }

    fn take_value(&mut self, _array: &IntArray, _index: usize, _abs_index: usize) {}

    fn rebuild_value(
        &mut self,
        _old_array: &IntArray,
        _old_storage: &mut [Option<()>],
        _index: usize,
        _abs_index: usize,
    ) {
    }
}

/// A set of 32-bit keys.
///
/// The key `-1` is reserved; inserting it panics.
pub struct IntSet {
    table: HopScotchTable<IntSetLayout>,
}

impl IntSet {
    /// A heap-backed set with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed set with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// An off-heap set with the default off-heap initial capacity.
    pub fn off_heap() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::OffHeap,
            DEFAULT_OFF_HEAP_CAPACITY,
        )
    }

    /// Full control over hash function, backing, and initial capacity.
    pub fn with(hash_function: HashFunction, factory: NumberArrayFactory, capacity: usize) -> Self {
        Self {
            table: HopScotchTable::new(IntSetLayout, hash_function, factory, capacity),
        }
    }

    /// Adds `key`, returning whether it was newly added.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i32) -> bool {
        self.table.put(key as i64, ()).is_none()
    }

    /// Whether `key` is in the set.
    pub fn contains(&self, key: i32) -> bool {
        self.table.contains(key as i64)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: i32) -> bool {
        self.table.remove(key as i64).is_some()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every key, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the keys in table order.
    pub fn iter(&self) -> IntSetIter<'_> {
        IntSetIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each key until it returns `true` or the keys
    /// run out. Returns whether the visitor stopped the walk.
    pub fn visit_keys(&self, mut visitor: impl FnMut(i32) -> bool) -> bool {
        for key in self.iter() {
            if visitor(key) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this set to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl Default for IntSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl PartialEq for IntSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|key| other.contains(key))
    }
}

impl Eq for IntSet {}

impl Extend<i32> for IntSet {
    fn extend<I: IntoIterator<Item = i32>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<i32> for IntSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a IntSet {
    type Item = i32;
    type IntoIter = IntSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the keys of an [`IntSet`].
pub struct IntSetIter<'a> {
    table: &'a HopScotchTable<IntSetLayout>,
    index: usize,
}

impl Iterator for IntSetIter<'_> {
    type Item = i32;

    fn next(&mut self) -> Option<i32> {
        while self.index < self.table.capacity() {
            let key = self.table.key_at(self.index);
            self.index += 1;
            if key != EMPTY_KEY {
                return Some(key as i32);
            }
        }
        None
    }
}

/// A set of 64-bit keys, each spanning two table words.
///
/// The key `-1` is reserved; inserting it panics.
pub struct LongSet {
    table: HopScotchTable<LongSetLayout>,
}

impl LongSet {
    /// A heap-backed set with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed set with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// An off-heap set with the default off-heap initial capacity.
    pub fn off_heap() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::OffHeap,
            DEFAULT_OFF_HEAP_CAPACITY,
        )
    }

    /// Full control over hash function, backing, and initial capacity.
    pub fn with(hash_function: HashFunction, factory: NumberArrayFactory, capacity: usize) -> Self {
        Self {
            table: HopScotchTable::new(LongSetLayout, hash_function, factory, capacity),
        }
    }

    /// Adds `key`, returning whether it was newly added.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i64) -> bool {
        self.table.put(key, ()).is_none()
    }

    /// Whether `key` is in the set.
    pub fn contains(&self, key: i64) -> bool {
        self.table.contains(key)
    }

    /// Removes `key`, returning whether it was present.
    pub fn remove(&mut self, key: i64) -> bool {
        self.table.remove(key).is_some()
    }

    /// Number of keys in the set.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the set holds no keys.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every key, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the keys in table order.
    pub fn iter(&self) -> LongSetIter<'_> {
        LongSetIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each key until it returns `true` or the keys
    /// run out. Returns whether the visitor stopped the walk.
    pub fn visit_keys(&self, mut visitor: impl FnMut(i64) -> bool) -> bool {
        for key in self.iter() {
            if visitor(key) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this set to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl Default for LongSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LongSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl PartialEq for LongSet {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|key| other.contains(key))
    }
}

impl Eq for LongSet {}

impl Extend<i64> for LongSet {
    fn extend<I: IntoIterator<Item = i64>>(&mut self, iter: I) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl FromIterator<i64> for LongSet {
    fn from_iter<I: IntoIterator<Item = i64>>(iter: I) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a> IntoIterator for &'a LongSet {
    type Item = i64;
    type IntoIter = LongSetIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the keys of a [`LongSet`].
pub struct LongSetIter<'a> {
    table: &'a HopScotchTable<LongSetLayout>,
    index: usize,
}

impl Iterator for LongSetIter<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        while self.index < self.table.capacity() {
            let key = self.table.key_at(self.index);
            self.index += 1;
            if key != EMPTY_KEY {
                return Some(key);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use hashbrown::HashSet;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::array::MemoryStats;

    #[test]
    fn test_long_set_insert_contains_remove() {
        let mut set = LongSet::with_capacity(16);
        assert!(set.insert(10));
        assert!(set.insert(42));
        assert!(set.insert(7));
        assert!(!set.insert(42));
        assert_eq!(set.len(), 3);

        assert!(set.contains(10));
        assert!(set.contains(42));
        assert!(set.contains(7));
        assert!(!set.contains(11));

        assert!(set.remove(42));
        assert!(!set.remove(42));
        assert!(!set.contains(42));
        assert_eq!(set.len(), 2);
        set.check_consistency();
    }

    #[test]
    fn test_int_set_grows_from_small_capacity() {
        let mut set = IntSet::with_capacity(16);
        for key in 0..10_000 {
            assert!(set.insert(key), "duplicate reported for fresh key {key}");
        }
        assert_eq!(set.len(), 10_000);
        set.check_consistency();
        for key in 0..10_000 {
            assert!(set.contains(key), "lost key {key} while growing");
        }
        assert!(!set.contains(10_000));
    }

    #[test]
    fn test_reverse_hop_scotching_after_collision_removal() {
        // Keys that all hash home to the same slot of a 64-entry table, so
        // removing the home entry forces neighbors to be pulled in.
        let colliding: Vec<i64> = (0..)
            .filter(|&key| HashFunction::Xorshift.hash(key) as usize & 63 == 0)
            .take(10)
            .collect();

        let mut set = LongSet::with_capacity(64);
        for &key in &colliding {
            assert!(set.insert(key));
        }
        set.check_consistency();

        for &removed in &colliding {
            let mut set = LongSet::with_capacity(64);
            for &key in &colliding {
                set.insert(key);
            }
            assert!(set.remove(removed));
            set.check_consistency();
            for &key in &colliding {
                assert_eq!(set.contains(key), key != removed);
            }
        }
    }

    #[test]
    fn test_long_set_random_ops_against_oracle() {
        let mut rng = SmallRng::seed_from_u64(0x5eed);
        let mut set = LongSet::with_capacity(2);
        let mut oracle = HashSet::new();
        for _ in 0..20_000 {
            let key = rng.random_range(0..500);
            if rng.random_bool(0.6) {
                assert_eq!(set.insert(key), oracle.insert(key));
            } else {
                assert_eq!(set.remove(key), oracle.remove(&key));
            }
        }
        set.check_consistency();
        assert_eq!(set.len(), oracle.len());
        for key in 0..500 {
            assert_eq!(set.contains(key), oracle.contains(&key));
        }
    }

    #[test]
    fn test_int_set_negative_keys() {
        let mut set = IntSet::new();
        assert!(set.insert(-2));
        assert!(set.insert(i32::MIN));
        assert!(set.contains(-2));
        assert!(set.contains(i32::MIN));
        assert!(!set.contains(-3));
        assert!(set.remove(i32::MIN));
        assert!(!set.contains(i32::MIN));
    }

    #[test]
    #[should_panic(expected = "reserved as the empty slot marker")]
    fn test_int_set_rejects_reserved_key() {
        IntSet::new().insert(-1);
    }

    #[test]
    #[should_panic(expected = "reserved as the empty slot marker")]
    fn test_long_set_rejects_reserved_key() {
        LongSet::new().insert(-1);
    }

    #[test]
    fn test_reserved_key_reads_as_absent() {
        let mut set = LongSet::new();
        assert!(!set.contains(-1));
        assert!(!set.remove(-1));
    }

    #[test]
    fn test_off_heap_set_round_trip() {
        let mut set = LongSet::with(HashFunction::default(), NumberArrayFactory::OffHeap, 16);
        for key in (0..1_000).map(|i| i * 31) {
            assert!(set.insert(key));
        }
        set.check_consistency();
        for key in (0..1_000).map(|i| i * 31) {
            assert!(set.contains(key));
        }

        let mut stats = MemoryStats::default();
        set.visit_memory_stats(&mut stats);
        assert_eq!(stats.heap, 0);
        assert!(stats.off_heap > 0);
    }

    #[test]
    fn test_off_heap_set_random_ops_against_oracle() {
        let mut rng = SmallRng::seed_from_u64(0xd1ce);
        let mut set = LongSet::with(HashFunction::Spread, NumberArrayFactory::OffHeap, 2);
        let mut oracle = HashSet::new();
        for _ in 0..40_000 {
            let key = rng.random_range(0..500);
            if rng.random_bool(0.6) {
                assert_eq!(set.insert(key), oracle.insert(key));
            } else {
                assert_eq!(set.remove(key), oracle.remove(&key));
            }
        }
        set.check_consistency();
        assert_eq!(set.len(), oracle.len());
        for key in 0..500 {
            assert_eq!(set.contains(key), oracle.contains(&key));
        }
    }

    #[test]
    fn test_off_heap_set_dense_fill_then_remove() {
        let mut set = LongSet::with(HashFunction::default(), NumberArrayFactory::OffHeap, 2);
        for key in 0..100_000 {
            assert!(set.insert(key));
        }
        for key in (0..100_000).step_by(2) {
            assert!(set.remove(key));
        }
        set.check_consistency();
        assert_eq!(set.len(), 50_000);
        for key in 0..100_000 {
            assert_eq!(set.contains(key), key % 2 == 1, "wrong membership for key {key}");
        }
    }

    #[test]
    fn test_iter_yields_each_key_once() {
        let keys = [3i64, 900, 12, 77, 1 << 40];
        let set: LongSet = keys.iter().copied().collect();
        let mut seen: Vec<i64> = set.iter().collect();
        seen.sort_unstable();
        let mut expected = keys.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_visit_keys_early_exit() {
        let set: IntSet = (0..100).collect();
        let mut visited = 0;
        let stopped = set.visit_keys(|_| {
            visited += 1;
            visited == 10
        });
        assert!(stopped);
        assert_eq!(visited, 10);
        assert!(!set.visit_keys(|_| false));
    }

    #[test]
    fn test_set_equality_ignores_layout() {
        let forward: LongSet = (0..100).collect();
        let mut backward = LongSet::with_capacity(2);
        for key in (0..100).rev() {
            backward.insert(key);
        }
        assert_eq!(forward, backward);
        backward.remove(50);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_clear_then_reuse() {
        let mut set = IntSet::with_capacity(16);
        for key in 0..1_000 {
            set.insert(key);
        }
        set.clear();
        assert!(set.is_empty());
        assert!(!set.contains(5));
        for key in 0..1_000 {
            assert!(set.insert(key));
        }
        set.check_consistency();
    }
}
