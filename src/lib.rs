#![warn(missing_docs)]
#![doc = include_str!("../README.md")]

pub mod array;
pub mod hash;
mod hopscotch;
pub mod maps;
pub mod sets;

pub use array::ArrayElement;
pub use array::IntArray;
pub use array::LongArray;
pub use array::MemoryStats;
pub use array::MemoryStatsVisitor;
pub use array::NumberArray;
pub use array::NumberArrayFactory;
pub use hash::HashFunction;
pub use hopscotch::EMPTY_KEY;
pub use maps::IntLongMap;
pub use maps::IntObjectMap;
pub use maps::LongIntMap;
pub use maps::LongLongMap;
pub use maps::LongObjectMap;
pub use sets::IntSet;
pub use sets::LongSet;

/// Default initial capacity for heap-backed collections.
pub const DEFAULT_HEAP_CAPACITY: usize = 1 << 8;

/// Default initial capacity for off-heap collections, which are expected
/// to hold entry counts that would strain a heap-backed table.
pub const DEFAULT_OFF_HEAP_CAPACITY: usize = 1 << 20;
