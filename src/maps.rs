//! Primitive-keyed maps.
//!
//! Three maps store their values inline in the table words next to the key:
//! [`IntLongMap`], [`LongIntMap`], and [`LongLongMap`]. Two carry arbitrary
//! owned values in side storage indexed by table slot: [`IntObjectMap`] and
//! [`LongObjectMap`]. The side storage follows every entry relocation and
//! table rebuild, so values stay attached to their keys.
//!
//! In every map the key `-1` is reserved as the empty-slot marker and
//! cannot be inserted.

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
use crate::hopscotch::table_capacity_for;

pub(crate) struct IntLongLayout;

impl TableLayout for IntLongLayout {
    type Value = i64;
    const ITEMS_PER_ENTRY: usize = 4;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        array.get(abs_index) as i64
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        array.set(abs_index, key as i32);
    }

    fn write_value(&mut self, array: &mut IntArray, _index: usize, abs_index: usize, value: i64) {
        put_long(array, abs_index + 1, value);
    }

    fn replace_value(
        &mut self,
        array: &mut IntArray,
        _index: usize,
        abs_index: usize,
        value: i64,
    ) -> i64 {
        let previous = get_long(array, abs_index + 1);
        put_long(array, abs_index + 1, value);
        previous
    }

    fn take_value(&mut self, array: &IntArray, _index: usize, abs_index: usize) -> i64 {
        get_long(array, abs_index + 1)
    }

    fn rebuild_value(
        &mut self,
        old_array: &IntArray,
        _old_storage: &mut [Option<i64>],
        _index: usize,
        abs_index: usize,
    ) -> i64 {
        get_long(old_array, abs_index + 1)
    }
}

pub(crate) struct LongIntLayout;

impl TableLayout for LongIntLayout {
    type Value = i32;
    const ITEMS_PER_ENTRY: usize = 4;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        get_long(array, abs_index)
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        put_long(array, abs_index, key);
    }

    fn write_value(&mut self, array: &mut IntArray, _index: usize, abs_index: usize, value: i32) {
        array.set(abs_index + 2, value);
    }

    fn replace_value(
        &mut self,
        array: &mut IntArray,
        _index: usize,
        abs_index: usize,
        value: i32,
    ) -> i32 {
        let previous = array.get(abs_index + 2);
        array.set(abs_index + 2, value);
        previous
    }

    fn take_value(&mut self, array: &IntArray, _index: usize, abs_index: usize) -> i32 {
        array.get(abs_index + 2)
    }

    fn rebuild_value(
        &mut self,
        old_array: &IntArray,
        _old_storage: &mut [Option<i32>],
        _index: usize,
        abs_index: usize,
    ) -> i32 {
        old_array.get(abs_index + 2)
    }
}

pub(crate) struct LongLongLayout;

impl TableLayout for LongLongLayout {
    type Value = i64;
    const ITEMS_PER_ENTRY: usize = 5;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        get_long(array, abs_index)
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        put_long(array, abs_index, key);
    }

    fn write_value(&mut self, array: &mut IntArray, _index: usize, abs_index: usize, value: i64) {
        put_long(array, abs_index + 2, value);
    }

    fn replace_value(
        &mut self,
        array: &mut IntArray,
        _index: usize,
        abs_index: usize,
        value: i64,
    ) -> i64 {
        let previous = get_long(array, abs_index + 2);
        put_long(array, abs_index + 2, value);
        previous
    }

    fn take_value(&mut self, array: &IntArray, _index: usize, abs_index: usize) -> i64 {
        get_long(array, abs_index + 2)
    }

    fn rebuild_value(
        &mut self,
        old_array: &IntArray,
        _old_storage: &mut [Option<i64>],
        _index: usize,
        abs_index: usize,
    ) -> i64 {
        get_long(old_array, abs_index + 2)
    }
}

pub(crate) struct IntObjectLayout<V> {
    values: Vec<Option<V>>,
}

impl<V> IntObjectLayout<V> {
    fn new(capacity: usize) -> Self {
        let mut values = Vec::new();
        values.resize_with(capacity, || None);
        Self { values }
    }
}

impl<V> TableLayout for IntObjectLayout<V> {
    type Value = V;
    const ITEMS_PER_ENTRY: usize = 2;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        array.get(abs_index) as i64
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        array.set(abs_index, key as i32);
    }

    fn write_value(&mut self, _array: &mut IntArray, index: usize, _abs_index: usize, value: V) {
        self.values[index] = Some(value);
    }

    fn replace_value(
        &mut self,
        _array: &mut IntArray,
        index: usize,
        _abs_index: usize,
        value: V,
    ) -> V {
        match self.values[index].replace(value) {
            Some(previous) => previous,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn take_value(&mut self, _array: &IntArray, index: usize, _abs_index: usize) -> V {
        match self.values[index].take() {
            Some(value) => value,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn move_value(&mut self, from_index: usize, to_index: usize) {
        self.values.swap(from_index, to_index);
    }

    fn replace_storage(&mut self, new_capacity: usize) -> Vec<Option<V>> {
        let mut fresh = Vec::new();
        fresh.resize_with(new_capacity, || None);
        core::mem::replace(&mut self.values, fresh)
    }

    fn rebuild_value(
        &mut self,
        _old_array: &IntArray,
        old_storage: &mut [Option<V>],
        index: usize,
        _abs_index: usize,
    ) -> V {
        match old_storage[index].take() {
            Some(value) => value,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn clear_storage(&mut self) {
        for slot in &mut self.values {
            *slot = None;
        }
    }

    fn visit_storage_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        visitor.heap_usage((self.values.capacity() * size_of::<Option<V>>()) as u64);
    }
}

pub(crate) struct LongObjectLayout<V> {
    values: Vec<Option<V>>,
}

impl<V> LongObjectLayout<V> {
    fn new(capacity: usize) -> Self {
        let mut values = Vec::new();
        values.resize_with(capacity, || None);
        Self { values }
    }
}

impl<V> TableLayout for LongObjectLayout<V> {
    type Value = V;
    const ITEMS_PER_ENTRY: usize = 3;

    fn get_key(array: &IntArray, abs_index: usize) -> i64 {
        get_long(array, abs_index)
    }

    fn put_key(array: &mut IntArray, abs_index: usize, key: i64) {
        put_long(array, abs_index, key);
    }

    fn write_value(&mut self, _array: &mut IntArray, index: usize, _abs_index: usize, value: V) {
        self.values[index] = Some(value);
    }

    fn replace_value(
        &mut self,
        _array: &mut IntArray,
        index: usize,
        _abs_index: usize,
        value: V,
    ) -> V {
        match self.values[index].replace(value) {
            Some(previous) => previous,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn take_value(&mut self, _array: &IntArray, index: usize, _abs_index: usize) -> V {
        match self.values[index].take() {
            Some(value) => value,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn move_value(&mut self, from_index: usize, to_index: usize) {
        self.values.swap(from_index, to_index);
    }

    fn replace_storage(&mut self, new_capacity: usize) -> Vec<Option<V>> {
        let mut fresh = Vec::new();
        fresh.resize_with(new_capacity, || None);
        core::mem::replace(&mut self.values, fresh)
    }

    fn rebuild_value(
        &mut self,
        _old_array: &IntArray,
        old_storage: &mut [Option<V>],
        index: usize,
        _abs_index: usize,
    ) -> V {
        match old_storage[index].take() {
            Some(value) => value,
            None => unreachable!("occupied slot {index} has no stored value"),
        }
    }

    fn clear_storage(&mut self) {
        for slot in &mut self.values {
            *slot = None;
        }
    }

    fn visit_storage_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        visitor.heap_usage((self.values.capacity() * size_of::<Option<V>>()) as u64);
    }
}

/// A map from 32-bit keys to 64-bit values, stored inline.
///
/// The key `-1` is reserved; inserting it panics.
pub struct IntLongMap {
    table: HopScotchTable<IntLongLayout>,
}

impl IntLongMap {
    /// A heap-backed map with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed map with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// An off-heap map with the default off-heap initial capacity.
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
            table: HopScotchTable::new(IntLongLayout, hash_function, factory, capacity),
        }
    }

    /// Maps `key` to `value`, returning the previous value if the key was
    /// already mapped.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i32, value: i64) -> Option<i64> {
        self.table.put(key as i64, value)
    }

    /// The value mapped to `key`.
    pub fn get(&self, key: i32) -> Option<i64> {
        self.table
            .lookup(key as i64)
            .map(|(_, abs_index)| get_long(self.table.array(), abs_index + 1))
    }

    /// Whether `key` is mapped.
    pub fn contains_key(&self, key: i32) -> bool {
        self.table.contains(key as i64)
    }

    /// Unmaps `key`, returning its value if it was mapped.
    pub fn remove(&mut self, key: i32) -> Option<i64> {
        self.table.remove(key as i64)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every entry, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> IntLongIter<'_> {
        IntLongIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each entry until it returns `true` or the
    /// entries run out. Returns whether the visitor stopped the walk.
    pub fn visit_entries(&self, mut visitor: impl FnMut(i32, i64) -> bool) -> bool {
        for (key, value) in self.iter() {
            if visitor(key, value) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this map to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl Default for IntLongMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for IntLongMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for IntLongMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for IntLongMap {}

impl Extend<(i32, i64)> for IntLongMap {
    fn extend<I: IntoIterator<Item = (i32, i64)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl FromIterator<(i32, i64)> for IntLongMap {
    fn from_iter<I: IntoIterator<Item = (i32, i64)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a> IntoIterator for &'a IntLongMap {
    type Item = (i32, i64);
    type IntoIter = IntLongIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of an [`IntLongMap`].
pub struct IntLongIter<'a> {
    table: &'a HopScotchTable<IntLongLayout>,
    index: usize,
}

impl Iterator for IntLongIter<'_> {
    type Item = (i32, i64);

    fn next(&mut self) -> Option<(i32, i64)> {
        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            let key = self.table.key_at(index);
            if key != EMPTY_KEY {
                let abs_index = index * IntLongLayout::ITEMS_PER_ENTRY;
                return Some((key as i32, get_long(self.table.array(), abs_index + 1)));
            }
        }
        None
    }
}

/// A map from 64-bit keys to 32-bit values, stored inline.
///
/// The key `-1` is reserved; inserting it panics.
pub struct LongIntMap {
    table: HopScotchTable<LongIntLayout>,
}

impl LongIntMap {
    /// A heap-backed map with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed map with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// An off-heap map with the default off-heap initial capacity.
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
            table: HopScotchTable::new(LongIntLayout, hash_function, factory, capacity),
        }
    }

    /// Maps `key` to `value`, returning the previous value if the key was
    /// already mapped.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i64, value: i32) -> Option<i32> {
        self.table.put(key, value)
    }

    /// The value mapped to `key`.
    pub fn get(&self, key: i64) -> Option<i32> {
        self.table
            .lookup(key)
            .map(|(_, abs_index)| self.table.array().get(abs_index + 2))
    }

    /// Whether `key` is mapped.
    pub fn contains_key(&self, key: i64) -> bool {
        self.table.contains(key)
    }

    /// Unmaps `key`, returning its value if it was mapped.
    pub fn remove(&mut self, key: i64) -> Option<i32> {
        self.table.remove(key)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every entry, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> LongIntIter<'_> {
        LongIntIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each entry until it returns `true` or the
    /// entries run out. Returns whether the visitor stopped the walk.
    pub fn visit_entries(&self, mut visitor: impl FnMut(i64, i32) -> bool) -> bool {
        for (key, value) in self.iter() {
            if visitor(key, value) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this map to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl Default for LongIntMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LongIntMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for LongIntMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for LongIntMap {}

impl Extend<(i64, i32)> for LongIntMap {
    fn extend<I: IntoIterator<Item = (i64, i32)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl FromIterator<(i64, i32)> for LongIntMap {
    fn from_iter<I: IntoIterator<Item = (i64, i32)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a> IntoIterator for &'a LongIntMap {
    type Item = (i64, i32);
    type IntoIter = LongIntIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`LongIntMap`].
pub struct LongIntIter<'a> {
    table: &'a HopScotchTable<LongIntLayout>,
    index: usize,
}

impl Iterator for LongIntIter<'_> {
    type Item = (i64, i32);

    fn next(&mut self) -> Option<(i64, i32)> {
        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            let key = self.table.key_at(index);
            if key != EMPTY_KEY {
                let abs_index = index * LongIntLayout::ITEMS_PER_ENTRY;
                return Some((key, self.table.array().get(abs_index + 2)));
            }
        }
        None
    }
}

/// A map from 64-bit keys to 64-bit values, stored inline.
///
/// The key `-1` is reserved; inserting it panics.
pub struct LongLongMap {
    table: HopScotchTable<LongLongLayout>,
}

impl LongLongMap {
    /// A heap-backed map with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed map with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// An off-heap map with the default off-heap initial capacity.
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
            table: HopScotchTable::new(LongLongLayout, hash_function, factory, capacity),
        }
    }

    /// Maps `key` to `value`, returning the previous value if the key was
    /// already mapped.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i64, value: i64) -> Option<i64> {
        self.table.put(key, value)
    }

    /// The value mapped to `key`.
    pub fn get(&self, key: i64) -> Option<i64> {
        self.table
            .lookup(key)
            .map(|(_, abs_index)| get_long(self.table.array(), abs_index + 2))
    }

    /// Whether `key` is mapped.
    pub fn contains_key(&self, key: i64) -> bool {
        self.table.contains(key)
    }

    /// Unmaps `key`, returning its value if it was mapped.
    pub fn remove(&mut self, key: i64) -> Option<i64> {
        self.table.remove(key)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes every entry, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> LongLongIter<'_> {
        LongLongIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each entry until it returns `true` or the
    /// entries run out. Returns whether the visitor stopped the walk.
    pub fn visit_entries(&self, mut visitor: impl FnMut(i64, i64) -> bool) -> bool {
        for (key, value) in self.iter() {
            if visitor(key, value) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this map to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl Default for LongLongMap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LongLongMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl PartialEq for LongLongMap {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl Eq for LongLongMap {}

impl Extend<(i64, i64)> for LongLongMap {
    fn extend<I: IntoIterator<Item = (i64, i64)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl FromIterator<(i64, i64)> for LongLongMap {
    fn from_iter<I: IntoIterator<Item = (i64, i64)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a> IntoIterator for &'a LongLongMap {
    type Item = (i64, i64);
    type IntoIter = LongLongIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`LongLongMap`].
pub struct LongLongIter<'a> {
    table: &'a HopScotchTable<LongLongLayout>,
    index: usize,
}

impl Iterator for LongLongIter<'_> {
    type Item = (i64, i64);

    fn next(&mut self) -> Option<(i64, i64)> {
        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            let key = self.table.key_at(index);
            if key != EMPTY_KEY {
                let abs_index = index * LongLongLayout::ITEMS_PER_ENTRY;
                return Some((key, get_long(self.table.array(), abs_index + 2)));
            }
        }
        None
    }
}

/// A map from 32-bit keys to owned values.
///
/// Keys live in the table words; values live in side storage that follows
/// entry relocations. The key `-1` is reserved; inserting it panics.
pub struct IntObjectMap<V> {
    table: HopScotchTable<IntObjectLayout<V>>,
}

impl<V> IntObjectMap<V> {
    /// A heap-backed map with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed map with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// Full control over hash function, key backing, and initial capacity.
    /// The factory governs the key table only; values always live on the
    /// heap.
    pub fn with(hash_function: HashFunction, factory: NumberArrayFactory, capacity: usize) -> Self {
        let capacity = table_capacity_for(capacity);
        Self {
            table: HopScotchTable::new(
                IntObjectLayout::new(capacity),
                hash_function,
                factory,
                capacity,
            ),
        }
    }

    /// Maps `key` to `value`, returning the previous value if the key was
    /// already mapped.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i32, value: V) -> Option<V> {
        self.table.put(key as i64, value)
    }

    /// A reference to the value mapped to `key`.
    pub fn get(&self, key: i32) -> Option<&V> {
        let (index, _) = self.table.lookup(key as i64)?;
        self.table.layout().values[index].as_ref()
    }

    /// A mutable reference to the value mapped to `key`.
    pub fn get_mut(&mut self, key: i32) -> Option<&mut V> {
        let (index, _) = self.table.lookup(key as i64)?;
        self.table.layout_mut().values[index].as_mut()
    }

    /// Whether `key` is mapped.
    pub fn contains_key(&self, key: i32) -> bool {
        self.table.contains(key as i64)
    }

    /// Unmaps `key`, returning its value if it was mapped.
    pub fn remove(&mut self, key: i32) -> Option<V> {
        self.table.remove(key as i64)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes and drops every entry, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> IntObjectIter<'_, V> {
        IntObjectIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each entry until it returns `true` or the
    /// entries run out. Returns whether the visitor stopped the walk.
    pub fn visit_entries(&self, mut visitor: impl FnMut(i32, &V) -> bool) -> bool {
        for (key, value) in self.iter() {
            if visitor(key, value) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this map to `visitor`. Only the
    /// storage owned by the map itself is counted, not memory owned by the
    /// values.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl<V> Default for IntObjectMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for IntObjectMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: PartialEq> PartialEq for IntObjectMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<V: Eq> Eq for IntObjectMap<V> {}

impl<V> Extend<(i32, V)> for IntObjectMap<V> {
    fn extend<I: IntoIterator<Item = (i32, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<V> FromIterator<(i32, V)> for IntObjectMap<V> {
    fn from_iter<I: IntoIterator<Item = (i32, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, V> IntoIterator for &'a IntObjectMap<V> {
    type Item = (i32, &'a V);
    type IntoIter = IntObjectIter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of an [`IntObjectMap`].
pub struct IntObjectIter<'a, V> {
    table: &'a HopScotchTable<IntObjectLayout<V>>,
    index: usize,
}

impl<'a, V> Iterator for IntObjectIter<'a, V> {
    type Item = (i32, &'a V);

    fn next(&mut self) -> Option<(i32, &'a V)> {
        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            let key = self.table.key_at(index);
            if key != EMPTY_KEY {
                if let Some(value) = self.table.layout().values[index].as_ref() {
                    return Some((key as i32, value));
                }
            }
        }
        None
    }
}

/// A map from 64-bit keys to owned values.
///
/// Keys live in the table words; values live in side storage that follows
/// entry relocations. The key `-1` is reserved; inserting it panics.
pub struct LongObjectMap<V> {
    table: HopScotchTable<LongObjectLayout<V>>,
}

impl<V> LongObjectMap<V> {
    /// A heap-backed map with the default initial capacity.
    pub fn new() -> Self {
        Self::with(
            HashFunction::default(),
            NumberArrayFactory::Heap,
            DEFAULT_HEAP_CAPACITY,
        )
    }

    /// A heap-backed map with at least the given initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with(HashFunction::default(), NumberArrayFactory::Heap, capacity)
    }

    /// Full control over hash function, key backing, and initial capacity.
    /// The factory governs the key table only; values always live on the
    /// heap.
    pub fn with(hash_function: HashFunction, factory: NumberArrayFactory, capacity: usize) -> Self {
        let capacity = table_capacity_for(capacity);
        Self {
            table: HopScotchTable::new(
                LongObjectLayout::new(capacity),
                hash_function,
                factory,
                capacity,
            ),
        }
    }

    /// Maps `key` to `value`, returning the previous value if the key was
    /// already mapped.
    ///
    /// # Panics
    ///
    /// Panics if `key` is `-1`.
    pub fn insert(&mut self, key: i64, value: V) -> Option<V> {
        self.table.put(key, value)
    }

    /// A reference to the value mapped to `key`.
    pub fn get(&self, key: i64) -> Option<&V> {
        let (index, _) = self.table.lookup(key)?;
        self.table.layout().values[index].as_ref()
    }

    /// A mutable reference to the value mapped to `key`.
    pub fn get_mut(&mut self, key: i64) -> Option<&mut V> {
        let (index, _) = self.table.lookup(key)?;
        self.table.layout_mut().values[index].as_mut()
    }

    /// Whether `key` is mapped.
    pub fn contains_key(&self, key: i64) -> bool {
        self.table.contains(key)
    }

    /// Unmaps `key`, returning its value if it was mapped.
    pub fn remove(&mut self, key: i64) -> Option<V> {
        self.table.remove(key)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    /// Whether the map holds no entries.
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Removes and drops every entry, keeping the current capacity.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Iterates over the entries in table order.
    pub fn iter(&self) -> LongObjectIter<'_, V> {
        LongObjectIter {
            table: &self.table,
            index: 0,
        }
    }

    /// Calls `visitor` with each entry until it returns `true` or the
    /// entries run out. Returns whether the visitor stopped the walk.
    pub fn visit_entries(&self, mut visitor: impl FnMut(i64, &V) -> bool) -> bool {
        for (key, value) in self.iter() {
            if visitor(key, value) {
                return true;
            }
        }
        false
    }

    /// Reports the backing memory of this map to `visitor`. Only the
    /// storage owned by the map itself is counted, not memory owned by the
    /// values.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.table.visit_memory_stats(visitor);
    }

    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        self.table.check_consistency();
    }
}

impl<V> Default for LongObjectMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: fmt::Debug> fmt::Debug for LongObjectMap<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<V: PartialEq> PartialEq for LongObjectMap<V> {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().all(|(key, value)| other.get(key) == Some(value))
    }
}

impl<V: Eq> Eq for LongObjectMap<V> {}

impl<V> Extend<(i64, V)> for LongObjectMap<V> {
    fn extend<I: IntoIterator<Item = (i64, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<V> FromIterator<(i64, V)> for LongObjectMap<V> {
    fn from_iter<I: IntoIterator<Item = (i64, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, V> IntoIterator for &'a LongObjectMap<V> {
    type Item = (i64, &'a V);
    type IntoIter = LongObjectIter<'a, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over the entries of a [`LongObjectMap`].
pub struct LongObjectIter<'a, V> {
    table: &'a HopScotchTable<LongObjectLayout<V>>,
    index: usize,
}

impl<'a, V> Iterator for LongObjectIter<'a, V> {
    type Item = (i64, &'a V);

    fn next(&mut self) -> Option<(i64, &'a V)> {
        while self.index < self.table.capacity() {
            let index = self.index;
            self.index += 1;
            let key = self.table.key_at(index);
            if key != EMPTY_KEY {
                if let Some(value) = self.table.layout().values[index].as_ref() {
                    return Some((key, value));
                }
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use hashbrown::HashMap;
    use rand::Rng;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    use super::*;
    use crate::array::MemoryStats;

    #[test]
    fn test_long_long_map_insert_reports_previous() {
        let mut map = LongLongMap::with_capacity(16);
        assert_eq!(map.insert(5, 100), None);
        assert_eq!(map.insert(5, 200), Some(100));
        assert_eq!(map.get(5), Some(200));
        assert_eq!(map.remove(5), Some(200));
        assert_eq!(map.get(5), None);
        assert!(map.is_empty());
        map.check_consistency();
    }

    #[test]
    fn test_int_long_map_basic() {
        let mut map = IntLongMap::with_capacity(16);
        assert_eq!(map.insert(3, 1 << 40), None);
        assert_eq!(map.insert(-7, -12), None);
        assert_eq!(map.get(3), Some(1 << 40));
        assert_eq!(map.get(-7), Some(-12));
        assert!(map.contains_key(3));
        assert!(!map.contains_key(4));
        assert_eq!(map.remove(3), Some(1 << 40));
        assert_eq!(map.len(), 1);
        map.check_consistency();
    }

    #[test]
    fn test_long_int_map_basic() {
        let mut map = LongIntMap::with_capacity(16);
        assert_eq!(map.insert(1 << 40, -3), None);
        assert_eq!(map.insert(9, i32::MIN), None);
        assert_eq!(map.get(1 << 40), Some(-3));
        assert_eq!(map.get(9), Some(i32::MIN));
        assert_eq!(map.insert(9, 5), Some(i32::MIN));
        assert_eq!(map.get(9), Some(5));
        map.check_consistency();
    }

    #[test]
    fn test_long_long_map_random_ops_against_oracle() {
        let mut rng = SmallRng::seed_from_u64(0xface);
        let mut map = LongLongMap::with_capacity(2);
        let mut oracle = HashMap::new();
        for _ in 0..20_000 {
            let key = rng.random_range(0..400);
            if rng.random_bool(0.6) {
                let value = rng.random_range(i64::MIN..i64::MAX);
                assert_eq!(map.insert(key, value), oracle.insert(key, value));
            } else {
                assert_eq!(map.remove(key), oracle.remove(&key));
            }
        }
        map.check_consistency();
        assert_eq!(map.len(), oracle.len());
        for key in 0..400 {
            assert_eq!(map.get(key), oracle.get(&key).copied());
        }
    }

    #[test]
    fn test_off_heap_map_random_ops_against_oracle() {
        let mut rng = SmallRng::seed_from_u64(0xbead);
        let mut map = LongLongMap::with(HashFunction::Spread, NumberArrayFactory::OffHeap, 2);
        let mut oracle = HashMap::new();
        for _ in 0..40_000 {
            let key = rng.random_range(0..400);
            if rng.random_bool(0.6) {
                let value = rng.random_range(i64::MIN..i64::MAX);
                assert_eq!(map.insert(key, value), oracle.insert(key, value));
            } else {
                assert_eq!(map.remove(key), oracle.remove(&key));
            }
        }
        map.check_consistency();
        assert_eq!(map.len(), oracle.len());
        for key in 0..400 {
            assert_eq!(map.get(key), oracle.get(&key).copied());
        }
    }

    #[test]
    fn test_map_growth_preserves_values() {
        let mut map = LongLongMap::with_capacity(2);
        for key in 0..5_000 {
            assert_eq!(map.insert(key, key * 7 + 1), None);
        }
        map.check_consistency();
        for key in 0..5_000 {
            assert_eq!(map.get(key), Some(key * 7 + 1), "lost value for key {key}");
        }
    }

    #[test]
    fn test_object_map_insert_get_remove() {
        let mut map = LongObjectMap::with_capacity(16);
        assert_eq!(map.insert(1, String::from("one")), None);
        assert_eq!(map.insert(2, String::from("two")), None);
        assert_eq!(map.get(1).map(String::as_str), Some("one"));
        assert_eq!(map.get(3), None);
        assert_eq!(
            map.insert(1, String::from("uno")),
            Some(String::from("one"))
        );
        assert_eq!(map.remove(1), Some(String::from("uno")));
        assert_eq!(map.get(1), None);
        assert_eq!(map.len(), 1);
        map.check_consistency();
    }

    #[test]
    fn test_object_map_get_mut() {
        let mut map = IntObjectMap::with_capacity(16);
        map.insert(7, vec![1, 2]);
        if let Some(values) = map.get_mut(7) {
            values.push(3);
        }
        assert_eq!(map.get(7), Some(&vec![1, 2, 3]));
        assert_eq!(map.get_mut(8), None);
    }

    #[test]
    fn test_object_map_growth_preserves_values() {
        let mut map = LongObjectMap::with_capacity(2);
        for key in 0..1_000 {
            assert_eq!(map.insert(key, format!("value-{key}")), None);
        }
        map.check_consistency();
        for key in 0..1_000 {
            assert_eq!(map.get(key).map(String::as_str), Some(&*format!("value-{key}")));
        }
    }

    #[test]
    fn test_object_map_values_follow_relocations() {
        // Keys all homed to one slot of a 64-entry table, so removing an
        // entry relocates its neighbors together with their side-stored
        // values.
        let colliding: Vec<i64> = (0..)
            .filter(|&key| HashFunction::Xorshift.hash(key) as usize & 63 == 0)
            .take(10)
            .collect();
        for &removed in &colliding {
            let mut map = LongObjectMap::with_capacity(64);
            for &key in &colliding {
                map.insert(key, key.to_string());
            }
            assert_eq!(map.remove(removed), Some(removed.to_string()));
            map.check_consistency();
            for &key in &colliding {
                if key == removed {
                    assert_eq!(map.get(key), None);
                } else {
                    assert_eq!(
                        map.get(key),
                        Some(&key.to_string()),
                        "value detached from key {key}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_object_map_drops_values() {
        let tracker = Rc::new(());
        let mut map = IntObjectMap::with_capacity(16);
        for key in 0..10 {
            map.insert(key, Rc::clone(&tracker));
        }
        assert_eq!(Rc::strong_count(&tracker), 11);

        let removed = map.remove(3);
        assert_eq!(Rc::strong_count(&tracker), 11);
        drop(removed);
        assert_eq!(Rc::strong_count(&tracker), 10);

        map.clear();
        assert_eq!(Rc::strong_count(&tracker), 1);

        for key in 0..5 {
            map.insert(key, Rc::clone(&tracker));
        }
        drop(map);
        assert_eq!(Rc::strong_count(&tracker), 1);
    }

    #[test]
    fn test_reserved_key_reads_as_absent() {
        let mut map = LongLongMap::new();
        assert_eq!(map.get(-1), None);
        assert_eq!(map.remove(-1), None);
        assert!(!map.contains_key(-1));
    }

    #[test]
    #[should_panic(expected = "reserved as the empty slot marker")]
    fn test_long_long_map_rejects_reserved_key() {
        LongLongMap::new().insert(-1, 0);
    }

    #[test]
    #[should_panic(expected = "reserved as the empty slot marker")]
    fn test_object_map_rejects_reserved_key() {
        LongObjectMap::new().insert(-1, "value");
    }

    #[test]
    fn test_iter_yields_all_entries() {
        let entries = [(4i64, 40i64), (900, 9_000), (77, 770)];
        let map: LongLongMap = entries.iter().copied().collect();
        let mut seen: Vec<(i64, i64)> = map.iter().collect();
        seen.sort_unstable();
        let mut expected = entries.to_vec();
        expected.sort_unstable();
        assert_eq!(seen, expected);
    }

    #[test]
    fn test_visit_entries_early_exit() {
        let map: IntLongMap = (0..100).map(|key| (key, key as i64)).collect();
        let mut visited = 0;
        let stopped = map.visit_entries(|_, _| {
            visited += 1;
            visited == 7
        });
        assert!(stopped);
        assert_eq!(visited, 7);
        assert!(!map.visit_entries(|_, _| false));
    }

    #[test]
    fn test_map_equality_ignores_layout() {
        let forward: LongLongMap = (0..100).map(|key| (key, key * 2)).collect();
        let mut backward = LongLongMap::with_capacity(2);
        for key in (0..100).rev() {
            backward.insert(key, key * 2);
        }
        assert_eq!(forward, backward);
        backward.insert(50, 0);
        assert_ne!(forward, backward);
    }

    #[test]
    fn test_off_heap_object_map_splits_stats() {
        let mut map = LongObjectMap::with(HashFunction::default(), NumberArrayFactory::OffHeap, 16);
        map.insert(1, String::from("one"));
        let mut stats = MemoryStats::default();
        map.visit_memory_stats(&mut stats);
        assert!(stats.off_heap > 0, "key table not counted off-heap");
        assert!(stats.heap > 0, "side storage not counted on-heap");
    }
}
