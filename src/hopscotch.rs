//! The hopscotch hashing core shared by every set and map in this crate.
//!
//! Entries live in one flat [`IntArray`], each occupying a fixed number of
//! 32-bit words dictated by a [`TableLayout`]: the key words first, then any
//! inline value words, then one trailing hop word. The hop word at an index
//! records which of the following `H - 1` indexes hold entries whose keys
//! hash home to this index, its neighborhood. Lookups check the home index
//! and then only the indexes its hop bits name, so a probe touches at most
//! `H` slots.
//!
//! When an insertion finds the home index and its whole neighborhood
//! occupied, a free slot further along is walked closer through a series of
//! neighborhood-preserving swaps until it lands within reach, and the entry
//! is placed there. Removal does the reverse, pulling the most distant
//! neighbor of the freed index into it and repeating from the vacated slot,
//! which keeps each neighborhood dense and cache-friendly.
//!
//! Hop words are stored bit-inverted so that the backing array's `-1`
//! default doubles as "no neighbors". Only the low `H - 1` bits of a hop
//! word are ever used; neighbor offsets run from 1 to `H - 1` and the top
//! bit stays clear.

use crate::array::IntArray;
use crate::array::MemoryStatsVisitor;
use crate::array::NumberArrayFactory;
use crate::hash::HashFunction;

/// The key value reserved as the empty-slot marker. It cannot be stored in
/// any collection in this crate; write paths panic on it and read paths
/// treat it as absent.
pub const EMPTY_KEY: i64 = -1;

/// Neighborhood size. An entry lands at most `H - 1` indexes after the
/// index its key hashes to.
const H: usize = 32;

/// Every word of the backing array starts out as this, which reads as an
/// empty key word and as an inverted all-clear hop word alike.
const EMPTY_WORD: i32 = -1;

/// Reads a 64-bit value stored across two consecutive words, low word
/// first.
pub(crate) fn get_long(array: &IntArray, abs_index: usize) -> i64 {
    let low = array.get(abs_index) as u32 as u64;
    let high = array.get(abs_index + 1) as u32 as u64;
    ((high << 32) | low) as i64
}

/// Writes a 64-bit value across two consecutive words, low word first.
pub(crate) fn put_long(array: &mut IntArray, abs_index: usize, value: i64) {
    array.set(abs_index, value as i32);
    array.set(abs_index + 1, (value as u64 >> 32) as i32);
}

/// The table capacity actually used for a requested initial capacity.
pub(crate) fn table_capacity_for(initial_capacity: usize) -> usize {
    initial_capacity.next_power_of_two().max(2)
}

/// How a concrete collection stores its keys and values in the table.
///
/// Key accessors are static because the table reads keys of tables other
/// than its own during rebuilds. Value accessors take the layout mutably so
/// implementations may keep values in side storage indexed by logical
/// table index rather than in the word array; such implementations must
/// also override the storage hooks so their side storage tracks entry
/// relocations and table rebuilds.
pub(crate) trait TableLayout {
    /// The value carried alongside each key. `()` for sets.
    type Value;

    /// Total words per entry, key and value words plus the hop word.
    const ITEMS_PER_ENTRY: usize;

    /// Reads the key of the entry at `abs_index`, widened to `i64`.
    fn get_key(array: &IntArray, abs_index: usize) -> i64;

    /// Writes the key of the entry at `abs_index`.
    fn put_key(array: &mut IntArray, abs_index: usize, key: i64);

    /// Stores the value for a newly placed entry.
    fn write_value(
        &mut self,
        array: &mut IntArray,
        index: usize,
        abs_index: usize,
        value: Self::Value,
    );

    /// Replaces the value of an existing entry, returning the previous one.
    fn replace_value(
        &mut self,
        array: &mut IntArray,
        index: usize,
        abs_index: usize,
        value: Self::Value,
    ) -> Self::Value;

    /// Takes the value out of an entry that is about to be removed.
    fn take_value(&mut self, array: &IntArray, index: usize, abs_index: usize) -> Self::Value;

    /// Called when the entry at `from_index` relocates to `to_index` during
    /// hop scotching, one of the two slots being empty.
    fn move_value(&mut self, _from_index: usize, _to_index: usize) {}

    /// Swaps in side storage sized for `new_capacity` and returns the old
    /// storage, so values survive a table rebuild. Word-backed layouts
    /// have nothing to swap.
    fn replace_storage(&mut self, _new_capacity: usize) -> Vec<Option<Self::Value>> {
        Vec::new()
    }

    /// Recovers the value of an occupied entry from the table being
    /// rebuilt, reading the old word array or the old side storage as the
    /// layout requires.
    fn rebuild_value(
        &mut self,
        old_array: &IntArray,
        old_storage: &mut [Option<Self::Value>],
        index: usize,
        abs_index: usize,
    ) -> Self::Value;

    /// Drops all side-stored values.
    fn clear_storage(&mut self) {}

    /// Reports side-storage memory to `visitor`.
    fn visit_storage_stats(&self, _visitor: &mut impl MemoryStatsVisitor) {}
}

/// The table itself: the word array, its geometry, and the entry count.
///
/// Capacity is always a power of two so home indexes and neighbor steps
/// reduce to masking.
pub(crate) struct HopScotchTable<L: TableLayout> {
    layout: L,
    hash_function: HashFunction,
    factory: NumberArrayFactory,
    array: IntArray,
    table_mask: usize,
    size: usize,
}

impl<L: TableLayout> HopScotchTable<L> {
    pub(crate) fn new(
        layout: L,
        hash_function: HashFunction,
        factory: NumberArrayFactory,
        initial_capacity: usize,
    ) -> Self {
        let capacity = table_capacity_for(initial_capacity);
        Self {
            layout,
            hash_function,
            factory,
            array: factory.new_int_array(capacity * L::ITEMS_PER_ENTRY, EMPTY_WORD),
            table_mask: capacity - 1,
            size: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.size
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub(crate) fn capacity(&self) -> usize {
        self.table_mask + 1
    }

    pub(crate) fn layout(&self) -> &L {
        &self.layout
    }

    pub(crate) fn layout_mut(&mut self) -> &mut L {
        &mut self.layout
    }

    pub(crate) fn array(&self) -> &IntArray {
        &self.array
    }

    /// The key stored at the logical index, or [`EMPTY_KEY`] for free slots.
    pub(crate) fn key_at(&self, index: usize) -> i64 {
        L::get_key(&self.array, self.abs(index))
    }

    #[inline]
    fn abs(&self, index: usize) -> usize {
        index * L::ITEMS_PER_ENTRY
    }

    #[inline]
    fn home_index(&self, key: i64) -> usize {
        self.hash_function.hash(key) as usize & self.table_mask
    }

    #[inline]
    fn next_index(&self, index: usize, delta: usize) -> usize {
        (index + delta) & self.table_mask
    }

    #[inline]
    fn prev_index(&self, index: usize, delta: usize) -> usize {
        (index + self.capacity() - delta) & self.table_mask
    }

    /// The logical hop bits of the entry at `abs_index`: bit `b` set means
    /// the slot `b + 1` indexes along holds a key homed here.
    #[inline]
    fn hop_bits(&self, abs_index: usize) -> u32 {
        !(self.array.get(abs_index + L::ITEMS_PER_ENTRY - 1) as u32)
    }

    /// Finds the entry holding `key`, returning its logical and word index.
    pub(crate) fn lookup(&self, key: i64) -> Option<(usize, usize)> {
        if key == EMPTY_KEY {
            return None;
        }
        let index = self.home_index(key);
        let abs_index = self.abs(index);
        if L::get_key(&self.array, abs_index) == key {
            return Some((index, abs_index));
        }
        let mut hop_bits = self.hop_bits(abs_index);
        while hop_bits != 0 {
            let hd = hop_bits.trailing_zeros() as usize;
            let hop_index = self.next_index(index, hd + 1);
            let abs_hop_index = self.abs(hop_index);
            if L::get_key(&self.array, abs_hop_index) == key {
                return Some((hop_index, abs_hop_index));
            }
            hop_bits &= hop_bits - 1;
        }
        None
    }

    pub(crate) fn contains(&self, key: i64) -> bool {
        self.lookup(key).is_some()
    }

    /// Inserts or updates `key`, returning the previous value if the key
    /// was already present. Grows the table as often as placement fails.
    ///
    /// # Panics
    ///
    /// Panics if `key` is [`EMPTY_KEY`]. Also panics if a rebuild cannot
    /// place every existing entry in a table of twice the capacity; a
    /// rebuild never grows again recursively.
    pub(crate) fn put(&mut self, key: i64, value: L::Value) -> Option<L::Value> {
        assert_ne!(key, EMPTY_KEY, "key {EMPTY_KEY} is reserved as the empty slot marker");
        let mut value = value;
        loop {
            match self.try_put(key, value) {
                Ok(previous) => return previous,
                Err(pending) => {
                    value = pending;
                    self.grow();
                }
            }
        }
    }

    /// One placement attempt. `Err` carries the value back out when neither
    /// the neighborhood nor hop scotching could make room.
    fn try_put(&mut self, key: i64, value: L::Value) -> Result<Option<L::Value>, L::Value> {
        let index = self.home_index(key);
        let abs_index = self.abs(index);
        let key_at_index = L::get_key(&self.array, abs_index);
        if key_at_index == EMPTY_KEY {
            // The home index is free, place it right there.
            L::put_key(&mut self.array, abs_index, key);
            self.layout.write_value(&mut self.array, index, abs_index, value);
            self.size += 1;
            return Ok(None);
        }
        if key_at_index == key {
            let previous = self
                .layout
                .replace_value(&mut self.array, index, abs_index, value);
            return Ok(Some(previous));
        }
        // Occupied by some other key, so the requested key can only be
        // among the neighbors.
        let mut hop_bits = self.hop_bits(abs_index);
        while hop_bits != 0 {
            let hd = hop_bits.trailing_zeros() as usize;
            let hop_index = self.next_index(index, hd + 1);
            let abs_hop_index = self.abs(hop_index);
            if L::get_key(&self.array, abs_hop_index) == key {
                let previous =
                    self.layout
                        .replace_value(&mut self.array, hop_index, abs_hop_index, value);
                return Ok(Some(previous));
            }
            hop_bits &= hop_bits - 1;
        }

        match self.hop_scotch_put(key, index, value) {
            Ok(()) => {
                self.size += 1;
                Ok(None)
            }
            Err(value) => Err(value),
        }
    }

    /// Finds a free slot past the neighborhood of `index` and walks it
    /// closer through neighborhood-preserving swaps until the new entry can
    /// be placed within reach of its home.
    fn hop_scotch_put(&mut self, key: i64, index: usize, value: L::Value) -> Result<(), L::Value> {
        let mut free_index = self.next_index(index, 1);
        // Distance from the first neighbor slot to the tentative free slot.
        let mut total_hd = 0;
        let mut found_free_spot = false;

        // Linear probe upward. One full round is enough, albeit unlikely.
        while free_index != index {
            if L::get_key(&self.array, self.abs(free_index)) == EMPTY_KEY {
                found_free_spot = true;
                break;
            }
            free_index = self.next_index(free_index, 1);
            total_hd += 1;
        }
        if !found_free_spot {
            return Err(value);
        }

        while total_hd >= H - 1 {
            // The free slot is out of reach. Scan the H - 1 indexes before
            // it for an entry that may legally move into it, which drags
            // the free slot that entry's distance closer to home.
            let mut neighbor_index = self.prev_index(free_index, H - 1);
            let mut swapped = false;
            for d in 0..H - 1 {
                let abs_neighbor_index = self.abs(neighbor_index);
                let mut neighbor_hop_bits = self.hop_bits(abs_neighbor_index);
                while neighbor_hop_bits != 0 {
                    let hd = neighbor_hop_bits.trailing_zeros() as usize;
                    if hd + d >= H - 2 {
                        // The candidate would land at or past the free slot.
                        break;
                    }
                    let candidate_index = self.next_index(neighbor_index, hd + 1);
                    let distance = (free_index.wrapping_sub(candidate_index)) & self.table_mask;
                    self.array.swap(
                        self.abs(candidate_index),
                        self.abs(free_index),
                        L::ITEMS_PER_ENTRY - 1,
                    );
                    self.layout.move_value(candidate_index, free_index);
                    // The candidate is still homed at the neighbor, just
                    // `distance` further out.
                    self.array.generic_xor(
                        abs_neighbor_index + L::ITEMS_PER_ENTRY - 1,
                        (1 << hd) | (1 << (hd + distance)),
                    );
                    free_index = candidate_index;
                    total_hd -= distance;
                    swapped = true;
                    break;
                }
                if swapped {
                    break;
                }
                neighbor_index = self.next_index(neighbor_index, 1);
            }
            if !swapped {
                // No entry in the window may move. The caller grows.
                return Err(value);
            }
        }

        let abs_free_index = self.abs(free_index);
        L::put_key(&mut self.array, abs_free_index, key);
        self.layout
            .write_value(&mut self.array, free_index, abs_free_index, value);
        // Record the placed entry as a neighbor of its home index.
        self.array.generic_and(
            self.abs(index) + L::ITEMS_PER_ENTRY - 1,
            !(1i64 << total_hd),
        );
        Ok(())
    }

    /// Removes `key` if present, returning its value.
    pub(crate) fn remove(&mut self, key: i64) -> Option<L::Value> {
        if key == EMPTY_KEY {
            return None;
        }
        let index = self.home_index(key);
        let abs_index = self.abs(index);
        let mut freed_index = None;
        let mut result = None;
        if L::get_key(&self.array, abs_index) == key {
            result = Some(self.layout.take_value(&self.array, index, abs_index));
            self.remove_entry(abs_index);
            self.size -= 1;
            freed_index = Some(index);
        } else {
            let mut hop_bits = self.hop_bits(abs_index);
            while hop_bits != 0 {
                let hd = hop_bits.trailing_zeros() as usize;
                let hop_index = self.next_index(index, hd + 1);
                let abs_hop_index = self.abs(hop_index);
                if L::get_key(&self.array, abs_hop_index) == key {
                    result = Some(self.layout.take_value(&self.array, hop_index, abs_hop_index));
                    self.remove_entry(abs_hop_index);
                    self.size -= 1;
                    // No longer a neighbor of its home index.
                    self.array
                        .generic_or(abs_index + L::ITEMS_PER_ENTRY - 1, 1 << hd);
                    freed_index = Some(hop_index);
                    break;
                }
                hop_bits &= hop_bits - 1;
            }
        }
        if let Some(freed_index) = freed_index {
            self.reverse_hop_scotch(freed_index);
        }
        result
    }

    fn remove_entry(&mut self, abs_index: usize) {
        self.array.remove(abs_index, L::ITEMS_PER_ENTRY - 1);
    }

    /// Pulls the most distant neighbor of the freed index into it,
    /// repeating from the slot that move vacated, so neighborhoods stay
    /// packed after removals.
    fn reverse_hop_scotch(&mut self, mut freed_index: usize) {
        loop {
            let abs_freed_index = self.abs(freed_index);
            let freed_hop_bits = self.hop_bits(abs_freed_index);
            if freed_hop_bits == 0 {
                break;
            }
            let hd = (31 - freed_hop_bits.leading_zeros()) as usize;
            let candidate_index = self.next_index(freed_index, hd + 1);
            self.array.swap(
                self.abs(candidate_index),
                abs_freed_index,
                L::ITEMS_PER_ENTRY - 1,
            );
            self.layout.move_value(candidate_index, freed_index);
            // The pulled entry now sits at its home index, so it stops
            // being a neighbor.
            self.array
                .generic_or(abs_freed_index + L::ITEMS_PER_ENTRY - 1, 1 << hd);
            freed_index = candidate_index;
        }
    }

    /// Doubles the capacity and re-inserts every entry.
    #[cold]
    fn grow(&mut self) {
        let old_capacity = self.capacity();
        let old_array = self.new_table(old_capacity * 2);
        let mut old_storage = self.layout.replace_storage(self.capacity());
        self.size = 0;
        for index in 0..old_capacity {
            let abs_index = index * L::ITEMS_PER_ENTRY;
            let key = L::get_key(&old_array, abs_index);
            if key != EMPTY_KEY {
                let value =
                    self.layout
                        .rebuild_value(&old_array, &mut old_storage, index, abs_index);
                if !matches!(self.try_put(key, value), Ok(None)) {
                    panic!("table rebuild failed to re-insert key {key} at twice the capacity");
                }
            }
        }
    }

    /// Installs a fresh word array for `capacity` entries and hands back
    /// the old one.
    fn new_table(&mut self, capacity: usize) -> IntArray {
        self.table_mask = capacity - 1;
        let fresh = self
            .factory
            .new_int_array(capacity * L::ITEMS_PER_ENTRY, EMPTY_WORD);
        core::mem::replace(&mut self.array, fresh)
    }

    /// Removes every entry, keeping the current capacity.
    pub(crate) fn clear(&mut self) {
        self.array.clear();
        self.layout.clear_storage();
        self.size = 0;
    }

    pub(crate) fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        self.array.visit_memory_stats(visitor);
        self.layout.visit_storage_stats(visitor);
    }

    /// Verifies the structural invariants of the whole table.
    #[cfg(test)]
    pub(crate) fn check_consistency(&self) {
        let capacity = self.capacity();
        let mut occupied = 0;
        for index in 0..capacity {
            let abs_index = self.abs(index);
            let hop_bits = self.hop_bits(abs_index);
            assert_eq!(hop_bits >> (H - 1), 0, "top hop bit set at index {index}");
            let key = L::get_key(&self.array, abs_index);
            if key != EMPTY_KEY {
                occupied += 1;
                let home = self.home_index(key);
                let offset = index.wrapping_sub(home) & self.table_mask;
                if offset != 0 {
                    assert!(offset < H, "key {key} is {offset} slots from home");
                    assert_ne!(
                        self.hop_bits(self.abs(home)) & (1 << (offset - 1)),
                        0,
                        "key {key} at index {index} is missing from the hop bits of {home}"
                    );
                }
            }
            let mut bits = hop_bits;
            while bits != 0 {
                let hd = bits.trailing_zeros() as usize;
                let neighbor = self.next_index(index, hd + 1);
                let neighbor_key = L::get_key(&self.array, self.abs(neighbor));
                assert_ne!(
                    neighbor_key, EMPTY_KEY,
                    "hop bit {hd} of index {index} points at a free slot"
                );
                assert_eq!(
                    self.home_index(neighbor_key),
                    index,
                    "hop bit {hd} of index {index} points at a foreign key"
                );
                bits &= bits - 1;
            }
        }
        assert_eq!(occupied, self.size, "occupied slots disagree with size");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A bare two-word-key layout carrying no value, enough to exercise
    /// the core against.
    struct BareLongLayout;

    impl TableLayout for BareLongLayout {
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

    fn bare_table(capacity: usize) -> HopScotchTable<BareLongLayout> {
        HopScotchTable::new(
            BareLongLayout,
            HashFunction::default(),
            NumberArrayFactory::Heap,
            capacity,
        )
    }

    #[test]
    fn test_put_contains_remove() {
        let mut table = bare_table(16);
        assert!(table.is_empty());
        assert_eq!(table.put(10, ()), None);
        assert_eq!(table.put(42, ()), None);
        assert_eq!(table.put(7, ()), None);
        assert_eq!(table.len(), 3);
        table.check_consistency();

        assert!(table.contains(10));
        assert!(table.contains(42));
        assert!(table.contains(7));
        assert!(!table.contains(11));

        assert_eq!(table.remove(42), Some(()));
        assert_eq!(table.remove(42), None);
        assert!(!table.contains(42));
        assert_eq!(table.len(), 2);
        table.check_consistency();
    }

    #[test]
    fn test_put_existing_key_reports_previous() {
        let mut table = bare_table(16);
        assert_eq!(table.put(5, ()), None);
        assert_eq!(table.put(5, ()), Some(()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_empty_key_reads_as_absent() {
        let table = bare_table(16);
        assert!(!table.contains(EMPTY_KEY));
        assert_eq!(table.lookup(EMPTY_KEY), None);
    }

    #[test]
    #[should_panic(expected = "reserved as the empty slot marker")]
    fn test_empty_key_rejected_on_put() {
        bare_table(16).put(EMPTY_KEY, ());
    }

    #[test]
    fn test_grows_past_initial_capacity() {
        let mut table = bare_table(4);
        for key in 0..1_000 {
            assert_eq!(table.put(key, ()), None);
        }
        assert_eq!(table.len(), 1_000);
        assert!(table.capacity() >= 1_000);
        table.check_consistency();
        for key in 0..1_000 {
            assert!(table.contains(key), "lost key {key} while growing");
        }
    }

    #[test]
    fn test_removal_keeps_neighborhoods_reachable() {
        let mut table = bare_table(64);
        for key in 0..48 {
            table.put(key, ());
        }
        for key in (0..48).step_by(3) {
            assert_eq!(table.remove(key), Some(()));
            table.check_consistency();
        }
        for key in 0..48 {
            assert_eq!(table.contains(key), key % 3 != 0);
        }
    }

    #[test]
    fn test_clear_keeps_capacity() {
        let mut table = bare_table(16);
        for key in 0..100 {
            table.put(key, ());
        }
        let capacity = table.capacity();
        table.clear();
        assert!(table.is_empty());
        assert_eq!(table.capacity(), capacity);
        assert!(!table.contains(50));
        table.check_consistency();
        table.put(50, ());
        assert!(table.contains(50));
    }
}
