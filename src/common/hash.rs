/// Mixes a machine word into a well-distributed 64-bit hash.
///
/// This is Thomas Wang's 64-bit shift/add integer hash, a refinement of
/// Bob Jenkins' integer mixing. It is a bijection on `u64`, so distinct
/// keys never collide before the index mask is applied.
#[inline]
pub(crate) fn hash_word(key: usize) -> u64 {
    let mut k = key as u64;
    k = (!k).wrapping_add(k << 21);
    k ^= k >> 24;
    k = k.wrapping_add(k << 3).wrapping_add(k << 8);
    k ^= k >> 14;
    k = k.wrapping_add(k << 2).wrapping_add(k << 4);
    k ^= k >> 28;
    k.wrapping_add(k << 31)
}

#[cfg(test)]
mod tests {
    use super::hash_word;
    use std::collections::HashSet;

    #[test]
    fn nearby_keys_spread_across_buckets() {
        // Pointer-like keys: aligned and close together.
        let mask = 1023_u64;
        let buckets: HashSet<_> = (0..256_usize)
            .map(|i| hash_word(0x7f00_0000_1000 + i * 16) & mask)
            .collect();

        // With a bad mix every key would share the low bits.
        assert!(buckets.len() > 180, "only {} distinct buckets", buckets.len());
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(hash_word(0x1000), hash_word(0x1000));
        assert_ne!(hash_word(0x1000), hash_word(0x2000));
    }
}
