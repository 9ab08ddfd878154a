//! Width-abstracted storage arrays.
//!
//! A [`NumberArray`] is a flat sequence of fixed-width signed integers with a
//! declared default value. Three backings are provided: on-heap
//! ([`HeapNumberArray`]), off-heap over a manually managed raw region
//! ([`OffHeapNumberArray`]), and chunked/dynamic ([`DynamicNumberArray`]),
//! which composes fixed chunks to cover a sparse or unbounded index space.
//! The backing is chosen at construction through [`NumberArrayFactory`].
//!
//! Besides width-typed `get`/`set`, every array offers "generic" accessors
//! that carry values as `i64` plus in-place bitwise updates, so algorithm
//! code can run unchanged over 32- and 64-bit element widths.

use core::alloc::Layout;
use core::fmt::Debug;
use core::ops::BitAnd;
use core::ops::BitOr;
use core::ops::BitXor;
use core::ptr::NonNull;
use std::alloc::dealloc;
use std::alloc::handle_alloc_error;

mod sealed {
    pub trait Sealed {}
    impl Sealed for i32 {}
    impl Sealed for i64 {}
}

/// Element type of a [`NumberArray`]: a fixed-width signed integer.
///
/// Implemented for `i32` and `i64`; the trait is sealed.
pub trait ArrayElement:
    Copy
    + Eq
    + Debug
    + BitAnd<Output = Self>
    + BitOr<Output = Self>
    + BitXor<Output = Self>
    + sealed::Sealed
    + 'static
{
    /// Size of one element in bytes.
    const STRIDE: usize;

    /// Widens the element losslessly into the 64-bit carrier.
    fn widen(self) -> i64;

    /// Narrows a 64-bit carrier value into this width.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not fit losslessly. Use [`ArrayElement::mask`]
    /// when the value is a bit pattern rather than a number.
    fn narrow(value: i64) -> Self;

    /// Truncates a 64-bit bit pattern to this width, keeping the low bits.
    fn mask(value: i64) -> Self;

    /// Whether every byte of this value is identical, enabling bulk fills.
    fn is_byte_uniform(self) -> bool;

    /// The low byte of this value, used for bulk fills.
    fn low_byte(self) -> u8;
}

impl ArrayElement for i32 {
    const STRIDE: usize = 4;

    #[inline(always)]
    fn widen(self) -> i64 {
        self as i64
    }

    #[inline(always)]
    fn narrow(value: i64) -> Self {
        assert!(
            value >= i32::MIN as i64 && value <= i32::MAX as i64,
            "value {value} does not fit in a 32-bit slot"
        );
        value as i32
    }

    #[inline(always)]
    fn mask(value: i64) -> Self {
        value as i32
    }

    #[inline(always)]
    fn is_byte_uniform(self) -> bool {
        let bytes = self.to_le_bytes();
        bytes.iter().all(|&b| b == bytes[0])
    }

    #[inline(always)]
    fn low_byte(self) -> u8 {
        self.to_le_bytes()[0]
    }
}

impl ArrayElement for i64 {
    const STRIDE: usize = 8;

    #[inline(always)]
    fn widen(self) -> i64 {
        self
    }

    #[inline(always)]
    fn narrow(value: i64) -> Self {
        value
    }

    #[inline(always)]
    fn mask(value: i64) -> Self {
        value
    }

    #[inline(always)]
    fn is_byte_uniform(self) -> bool {
        let bytes = self.to_le_bytes();
        bytes.iter().all(|&b| b == bytes[0])
    }

    #[inline(always)]
    fn low_byte(self) -> u8 {
        self.to_le_bytes()[0]
    }
}

/// A visitor for memory-usage reporting.
///
/// Anything holding backing memory accepts one of these through
/// `visit_memory_stats` and reports how many bytes it keeps on the managed
/// heap versus in off-heap regions.
pub trait MemoryStatsVisitor {
    /// Called with a number of bytes held on the managed heap.
    fn heap_usage(&mut self, bytes: u64);

    /// Called with a number of bytes held in off-heap regions.
    fn off_heap_usage(&mut self, bytes: u64);
}

/// A [`MemoryStatsVisitor`] that sums everything it is shown.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    /// Total bytes reported as heap usage.
    pub heap: u64,
    /// Total bytes reported as off-heap usage.
    pub off_heap: u64,
}

impl MemoryStats {
    /// Heap plus off-heap bytes.
    pub fn total(&self) -> u64 {
        self.heap + self.off_heap
    }
}

impl MemoryStatsVisitor for MemoryStats {
    fn heap_usage(&mut self, bytes: u64) {
        self.heap += bytes;
    }

    fn off_heap_usage(&mut self, bytes: u64) {
        self.off_heap += bytes;
    }
}

/// Selects the backing for arrays produced by the factory methods.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NumberArrayFactory {
    /// Arrays allocated on the managed heap.
    Heap,
    /// Arrays allocated in manually managed off-heap memory.
    OffHeap,
}

impl NumberArrayFactory {
    /// Creates a fixed-length array of 32-bit elements, filled with
    /// `default_value`.
    pub fn new_int_array(self, length: usize, default_value: i32) -> IntArray {
        self.new_array(length, default_value)
    }

    /// Creates a fixed-length array of 64-bit elements, filled with
    /// `default_value`.
    pub fn new_long_array(self, length: usize, default_value: i64) -> LongArray {
        self.new_array(length, default_value)
    }

    /// Creates a dynamically growing array of 32-bit elements. Chunks of
    /// `chunk_size` elements are added as indexes beyond the current length
    /// are written.
    pub fn new_dynamic_int_array(self, chunk_size: usize, default_value: i32) -> IntArray {
        NumberArray::Dynamic(DynamicNumberArray::new(self, chunk_size, default_value))
    }

    /// Creates a dynamically growing array of 64-bit elements.
    pub fn new_dynamic_long_array(self, chunk_size: usize, default_value: i64) -> LongArray {
        NumberArray::Dynamic(DynamicNumberArray::new(self, chunk_size, default_value))
    }

    fn new_array<T: ArrayElement>(self, length: usize, default_value: T) -> NumberArray<T> {
        match self {
            NumberArrayFactory::Heap => {
                NumberArray::Heap(HeapNumberArray::new(length, default_value))
            }
            NumberArrayFactory::OffHeap => {
                NumberArray::OffHeap(OffHeapNumberArray::new(length, default_value))
            }
        }
    }
}

/// An array of fixed-width integers behind one of the three backings.
///
/// All operations take plain indexes; fixed arrays panic on out-of-range
/// access, while the dynamic backing grows on writes and reads the default
/// value beyond its current length.
#[derive(Debug)]
pub enum NumberArray<T: ArrayElement> {
    /// Backed by a heap allocation.
    Heap(HeapNumberArray<T>),
    /// Backed by a manually managed off-heap region.
    OffHeap(OffHeapNumberArray<T>),
    /// Composed of fixed chunks, growing as indexes are written.
    Dynamic(DynamicNumberArray<T>),
}

/// A [`NumberArray`] of 32-bit elements.
pub type IntArray = NumberArray<i32>;

/// A [`NumberArray`] of 64-bit elements.
pub type LongArray = NumberArray<i64>;

impl<T: ArrayElement> NumberArray<T> {
    /// Current length in elements. Stable for fixed backings; grows
    /// monotonically in chunk increments for the dynamic backing.
    pub fn length(&self) -> usize {
        match self {
            Self::Heap(a) => a.length(),
            Self::OffHeap(a) => a.length(),
            Self::Dynamic(a) => a.length(),
        }
    }

    /// Reads the element at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        match self {
            Self::Heap(a) => a.get(index),
            Self::OffHeap(a) => a.get(index),
            Self::Dynamic(a) => a.get(index),
        }
    }

    /// Writes the element at `index`.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        match self {
            Self::Heap(a) => a.set(index, value),
            Self::OffHeap(a) => a.set(index, value),
            Self::Dynamic(a) => a.set(index, value),
        }
    }

    /// Reads the element at `index` widened into the 64-bit carrier.
    #[inline]
    pub fn generic_get(&self, index: usize) -> i64 {
        self.get(index).widen()
    }

    /// Writes a 64-bit carrier value at `index`.
    ///
    /// # Panics
    ///
    /// Panics if `value` does not fit losslessly in the element width.
    #[inline]
    pub fn generic_set(&mut self, index: usize, value: i64) {
        self.set(index, T::narrow(value));
    }

    /// ANDs the element at `index` with the low bits of `mask`.
    #[inline]
    pub fn generic_and(&mut self, index: usize, mask: i64) {
        match self {
            Self::Heap(a) => a.generic_and(index, mask),
            Self::OffHeap(a) => a.generic_and(index, mask),
            Self::Dynamic(a) => a.generic_and(index, mask),
        }
    }

    /// ORs the element at `index` with the low bits of `mask`.
    #[inline]
    pub fn generic_or(&mut self, index: usize, mask: i64) {
        match self {
            Self::Heap(a) => a.generic_or(index, mask),
            Self::OffHeap(a) => a.generic_or(index, mask),
            Self::Dynamic(a) => a.generic_or(index, mask),
        }
    }

    /// XORs the element at `index` with the low bits of `mask`.
    #[inline]
    pub fn generic_xor(&mut self, index: usize, mask: i64) {
        match self {
            Self::Heap(a) => a.generic_xor(index, mask),
            Self::OffHeap(a) => a.generic_xor(index, mask),
            Self::Dynamic(a) => a.generic_xor(index, mask),
        }
    }

    /// Exchanges `count` contiguous elements starting at `from_index` with
    /// the `count` elements starting at `to_index`.
    pub fn swap(&mut self, from_index: usize, to_index: usize, count: usize) {
        match self {
            Self::Heap(a) => a.swap(from_index, to_index, count),
            Self::OffHeap(a) => a.swap(from_index, to_index, count),
            Self::Dynamic(a) => a.swap(from_index, to_index, count),
        }
    }

    /// Resets `count` elements starting at `index` to the default value.
    pub fn remove(&mut self, index: usize, count: usize) {
        match self {
            Self::Heap(a) => a.remove(index, count),
            Self::OffHeap(a) => a.remove(index, count),
            Self::Dynamic(a) => a.remove(index, count),
        }
    }

    /// Resets every element to the default value.
    pub fn clear(&mut self) {
        match self {
            Self::Heap(a) => a.clear(),
            Self::OffHeap(a) => a.clear(),
            Self::Dynamic(a) => a.clear(),
        }
    }

    /// Highest index ever written, or `None` if nothing was set. A
    /// high-water mark, not a tight bound: removed elements do not lower it.
    pub fn highest_set_index(&self) -> Option<usize> {
        match self {
            Self::Heap(a) => a.highest_set_index(),
            Self::OffHeap(a) => a.highest_set_index(),
            Self::Dynamic(a) => a.highest_set_index(),
        }
    }

    /// Reports this array's backing memory to `visitor`.
    pub fn visit_memory_stats(&self, visitor: &mut impl MemoryStatsVisitor) {
        match self {
            Self::Heap(a) => visitor.heap_usage((a.length() * T::STRIDE) as u64),
            Self::OffHeap(a) => visitor.off_heap_usage((a.length() * T::STRIDE) as u64),
            Self::Dynamic(a) => {
                for chunk in &a.chunks {
                    chunk.visit_memory_stats(visitor);
                }
            }
        }
    }
}

/// A fixed-length array on the managed heap.
#[derive(Debug)]
pub struct HeapNumberArray<T: ArrayElement> {
    data: Box<[T]>,
    default_value: T,
    highest_set_index: Option<usize>,
}

impl<T: ArrayElement> HeapNumberArray<T> {
    fn new(length: usize, default_value: T) -> Self {
        Self {
            data: vec![default_value; length].into_boxed_slice(),
            default_value,
            highest_set_index: None,
        }
    }

    fn length(&self) -> usize {
        self.data.len()
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        self.data[index]
    }

    #[inline]
    fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
        if self.highest_set_index.is_none_or(|highest| index > highest) {
            self.highest_set_index = Some(index);
        }
    }

    #[inline]
    fn generic_and(&mut self, index: usize, mask: i64) {
        self.data[index] = self.data[index] & T::mask(mask);
    }

    #[inline]
    fn generic_or(&mut self, index: usize, mask: i64) {
        self.data[index] = self.data[index] | T::mask(mask);
    }

    #[inline]
    fn generic_xor(&mut self, index: usize, mask: i64) {
        self.data[index] = self.data[index] ^ T::mask(mask);
    }

    fn swap(&mut self, from_index: usize, to_index: usize, count: usize) {
        for i in 0..count {
            self.data.swap(from_index + i, to_index + i);
        }
    }

    fn remove(&mut self, index: usize, count: usize) {
        self.data[index..index + count].fill(self.default_value);
    }

    fn clear(&mut self) {
        self.data.fill(self.default_value);
        self.highest_set_index = None;
    }

    fn highest_set_index(&self) -> Option<usize> {
        self.highest_set_index
    }
}

/// A fixed-length array over a manually managed off-heap region.
///
/// The region is `length * STRIDE` bytes, exclusively owned by this value
/// and released exactly once when it is dropped. Lengths beyond what a
/// single heap collection would tolerate are supported; the only limit is
/// the address space.
#[derive(Debug)]
pub struct OffHeapNumberArray<T: ArrayElement> {
    ptr: NonNull<T>,
    length: usize,
    default_value: T,
    highest_set_index: Option<usize>,
}

// SAFETY: The region is exclusively owned, no aliasing handles exist, and
// shared references only ever read through the pointer.
unsafe impl<T: ArrayElement> Send for OffHeapNumberArray<T> {}
// SAFETY: See above; `&self` methods perform no interior mutation.
unsafe impl<T: ArrayElement> Sync for OffHeapNumberArray<T> {}

impl<T: ArrayElement> OffHeapNumberArray<T> {
    fn new(length: usize, default_value: T) -> Self {
        let ptr = if length == 0 {
            NonNull::dangling()
        } else {
            let layout = Layout::array::<T>(length).expect("allocation size overflow");
            // SAFETY: The layout has non-zero size; a null return is routed
            // to `handle_alloc_error` so a partially constructed array never
            // escapes.
            unsafe {
                let raw = std::alloc::alloc(layout);
                if raw.is_null() {
                    handle_alloc_error(layout);
                }
                NonNull::new_unchecked(raw.cast())
            }
        };
        let mut array = Self {
            ptr,
            length,
            default_value,
            highest_set_index: None,
        };
        array.clear();
        array
    }

    fn length(&self) -> usize {
        self.length
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        assert!(index < self.length, "index {index} out of bounds");
        // SAFETY: The index was checked against the allocated length.
        unsafe { self.ptr.add(index).read() }
    }

    #[inline]
    fn set(&mut self, index: usize, value: T) {
        assert!(index < self.length, "index {index} out of bounds");
        // SAFETY: The index was checked against the allocated length.
        unsafe { self.ptr.add(index).write(value) }
        if self.highest_set_index.is_none_or(|highest| index > highest) {
            self.highest_set_index = Some(index);
        }
    }

    #[inline]
    fn generic_and(&mut self, index: usize, mask: i64) {
        assert!(index < self.length, "index {index} out of bounds");
        // SAFETY: The index was checked against the allocated length.
        unsafe {
            let slot = self.ptr.add(index);
            slot.write(slot.read() & T::mask(mask));
        }
    }

    #[inline]
    fn generic_or(&mut self, index: usize, mask: i64) {
        assert!(index < self.length, "index {index} out of bounds");
        // SAFETY: The index was checked against the allocated length.
        unsafe {
            let slot = self.ptr.add(index);
            slot.write(slot.read() | T::mask(mask));
        }
    }

    #[inline]
    fn generic_xor(&mut self, index: usize, mask: i64) {
        assert!(index < self.length, "index {index} out of bounds");
        // SAFETY: The index was checked against the allocated length.
        unsafe {
            let slot = self.ptr.add(index);
            slot.write(slot.read() ^ T::mask(mask));
        }
    }

    fn swap(&mut self, from_index: usize, to_index: usize, count: usize) {
        assert!(
            from_index + count <= self.length && to_index + count <= self.length,
            "swap range out of bounds"
        );
        for i in 0..count {
            // SAFETY: Both ranges were checked against the allocated length.
            unsafe {
                let from = self.ptr.add(from_index + i);
                let to = self.ptr.add(to_index + i);
                let value = from.read();
                from.write(to.read());
                to.write(value);
            }
        }
    }

    fn remove(&mut self, index: usize, count: usize) {
        assert!(index + count <= self.length, "remove range out of bounds");
        for i in 0..count {
            // SAFETY: The range was checked against the allocated length.
            unsafe { self.ptr.add(index + i).write(self.default_value) }
        }
    }

    fn clear(&mut self) {
        if self.length == 0 {
            return;
        }
        if self.default_value.is_byte_uniform() {
            // SAFETY: The region holds exactly `length` elements and a
            // byte-uniform default can be written as a bulk fill.
            unsafe {
                core::ptr::write_bytes(
                    self.ptr.as_ptr(),
                    self.default_value.low_byte(),
                    self.length,
                );
            }
        } else {
            for i in 0..self.length {
                // SAFETY: `i` stays below the allocated length.
                unsafe { self.ptr.add(i).write(self.default_value) }
            }
        }
        self.highest_set_index = None;
    }

    fn highest_set_index(&self) -> Option<usize> {
        self.highest_set_index
    }
}

impl<T: ArrayElement> Drop for OffHeapNumberArray<T> {
    fn drop(&mut self) {
        if self.length != 0 {
            let layout = Layout::array::<T>(self.length).expect("allocation size overflow");
            // SAFETY: The pointer was produced by `alloc` with this exact
            // layout and ownership is exclusive, so this releases the region
            // exactly once.
            unsafe { dealloc(self.ptr.as_ptr().cast(), layout) }
        }
    }
}

/// An array composed of fixed-size chunks, growing as indexes are written.
///
/// Suited to index spaces that are sparse or unbounded relative to what a
/// single allocation should cover, such as caches keyed by raw ids in the
/// tens-of-billions range. Reads beyond the current length return the
/// default value; writes allocate the chunks needed to cover the index.
#[derive(Debug)]
pub struct DynamicNumberArray<T: ArrayElement> {
    factory: NumberArrayFactory,
    chunk_size: usize,
    default_value: T,
    chunks: Vec<NumberArray<T>>,
}

impl<T: ArrayElement> DynamicNumberArray<T> {
    fn new(factory: NumberArrayFactory, chunk_size: usize, default_value: T) -> Self {
        assert!(chunk_size > 0, "chunk size must be non-zero");
        Self {
            factory,
            chunk_size,
            default_value,
            chunks: Vec::new(),
        }
    }

    fn length(&self) -> usize {
        self.chunks.len() * self.chunk_size
    }

    fn ensure_chunk_at(&mut self, index: usize) -> &mut NumberArray<T> {
        while index >= self.length() {
            self.chunks
                .push(self.factory.new_array(self.chunk_size, self.default_value));
        }
        &mut self.chunks[index / self.chunk_size]
    }

    fn chunk_at(&self, index: usize) -> Option<&NumberArray<T>> {
        self.chunks.get(index / self.chunk_size)
    }

    #[inline]
    fn get(&self, index: usize) -> T {
        match self.chunk_at(index) {
            Some(chunk) => chunk.get(index % self.chunk_size),
            None => self.default_value,
        }
    }

    #[inline]
    fn set(&mut self, index: usize, value: T) {
        let chunk_size = self.chunk_size;
        self.ensure_chunk_at(index).set(index % chunk_size, value);
    }

    fn generic_and(&mut self, index: usize, mask: i64) {
        let chunk_size = self.chunk_size;
        self.ensure_chunk_at(index).generic_and(index % chunk_size, mask);
    }

    fn generic_or(&mut self, index: usize, mask: i64) {
        let chunk_size = self.chunk_size;
        self.ensure_chunk_at(index).generic_or(index % chunk_size, mask);
    }

    fn generic_xor(&mut self, index: usize, mask: i64) {
        let chunk_size = self.chunk_size;
        self.ensure_chunk_at(index).generic_xor(index % chunk_size, mask);
    }

    fn swap(&mut self, from_index: usize, to_index: usize, count: usize) {
        // Element-wise so that ranges may straddle chunk boundaries.
        for i in 0..count {
            let from_value = self.get(from_index + i);
            let to_value = self.get(to_index + i);
            self.set(from_index + i, to_value);
            self.set(to_index + i, from_value);
        }
    }

    fn remove(&mut self, index: usize, count: usize) {
        for i in 0..count {
            if (index + i) / self.chunk_size >= self.chunks.len() {
                break;
            }
            let chunk_size = self.chunk_size;
            self.chunks[(index + i) / chunk_size].remove((index + i) % chunk_size, 1);
        }
    }

    fn clear(&mut self) {
        for chunk in &mut self.chunks {
            chunk.clear();
        }
    }

    fn highest_set_index(&self) -> Option<usize> {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(i, chunk)| {
                chunk
                    .highest_set_index()
                    .map(|highest| i * self.chunk_size + highest)
            })
            .max()
    }
}
