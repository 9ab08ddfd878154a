//! Key-to-bucket hash functions.

/// Maps a 64-bit key to a 32-bit hash, from which the home slot is derived
/// by masking with the table capacity.
///
/// The function is part of a collection's construction and never changes
/// over its lifetime, so the same key always lands in the same home
/// neighborhood.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HashFunction {
    /// A segment-redistributing bit mixer. It stripes and jumbles the
    /// input bits, which spreads randomly distributed keys well but
    /// performs poorly on sequences, whose increments all land in the
    /// same stripe.
    Spread,
    /// A xorshift pseudo-random generator seeded by the key. Very fast and
    /// a decent, though not superb, distribution for most inputs. The
    /// default.
    #[default]
    Xorshift,
}

impl HashFunction {
    /// Hashes a 64-bit key.
    #[inline]
    pub fn hash(self, value: i64) -> u32 {
        match self {
            HashFunction::Spread => {
                let h = ((value as u64 >> 32) as u32) ^ (value as u32);
                let h = h ^ (h >> 20) ^ (h >> 12);
                h ^ (h >> 7) ^ (h >> 4)
            }
            HashFunction::Xorshift => {
                let mut x = value as u64;
                x ^= x << 21;
                x ^= x >> 35;
                x ^= x << 4;
                ((x >> 32) as u32) ^ (x as u32)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic() {
        for function in [HashFunction::Spread, HashFunction::Xorshift] {
            for key in [0, 1, -1, 42, i64::MAX, i64::MIN, 0x0123_4567_89ab_cdef] {
                assert_eq!(function.hash(key), function.hash(key));
            }
        }
    }

    #[test]
    fn test_xorshift_mixes_sequential_keys() {
        // Sequential keys must not collapse into one bucket at a small
        // power-of-two capacity.
        let mask = 0b1111;
        let mut buckets = [0u32; 16];
        for key in 0..1_000i64 {
            buckets[(HashFunction::Xorshift.hash(key) & mask) as usize] += 1;
        }
        let occupied = buckets.iter().filter(|&&count| count > 0).count();
        assert!(occupied >= 12, "only {occupied} of 16 buckets used");
    }

    #[test]
    fn test_spread_folds_both_halves() {
        let low = HashFunction::Spread.hash(0x0000_0000_dead_beef);
        let high = HashFunction::Spread.hash(0x1dea_dbee_f000_0000u64 as i64);
        assert_ne!(low, HashFunction::Spread.hash(0));
        assert_ne!(high, HashFunction::Spread.hash(0));
    }

    #[test]
    fn test_default_is_xorshift() {
        assert_eq!(HashFunction::default(), HashFunction::Xorshift);
        assert_eq!(
            HashFunction::default().hash(12_345),
            HashFunction::Xorshift.hash(12_345)
        );
    }
}
