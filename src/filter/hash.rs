//! Bit positions of an element in a Bloom filter.
//!
//! Positions are derived by double hashing: with `h1` and `h2` the lower 64
//! bits of MurmurHash3 x64/128 of the element with seeds 0 and 1, the
//! position for hash function `i` is `(h1 + i * h2) mod m`, computed with
//! wrapping 64 bit arithmetic.

use std::io::Cursor;

/// Returns the lower 64 bits of the MurmurHash3 x64/128 of `element`.
fn murmur_hash(element: &[u8], seed: u32) -> u64 {
    // Reading from a slice cannot fail.
    murmur3::murmur3_x64_128(&mut Cursor::new(element), seed).unwrap_or(0)
        as u64
}

/// Returns an iterator over the `k` bit positions of `element`.
pub fn positions(
    element: &[u8],
    k: u8,
    m: u32,
) -> impl Iterator<Item = usize> {
    let h1 = murmur_hash(element, 0);
    let h2 = murmur_hash(element, 1);
    let m = u64::from(m);
    (0..u64::from(k))
        .map(move |i| (h1.wrapping_add(i.wrapping_mul(h2)) % m) as usize)
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn deterministic() {
        let one: Vec<_> = positions(b"element", 7, 1000).collect();
        let two: Vec<_> = positions(b"element", 7, 1000).collect();
        assert_eq!(one, two);
    }

    #[test]
    fn seeds_differ() {
        assert_ne!(murmur_hash(b"element", 0), murmur_hash(b"element", 1));
    }

    #[test]
    fn in_range_and_varied() {
        let positions: Vec<_> = positions(b"element", 7, 10_000).collect();
        assert_eq!(positions.len(), 7);
        assert!(positions.iter().all(|&pos| pos < 10_000));
        let unique: HashSet<_> = positions.iter().collect();
        assert!(unique.len() >= 3);
    }

    #[test]
    fn roughly_uniform() {
        let mut counts = [0usize; 10];
        for i in 0..1000 {
            let element = format!("element_{}", i);
            for pos in positions(element.as_bytes(), 7, 1000) {
                counts[pos / 100] += 1;
            }
        }
        for count in counts {
            assert!((350..=1050).contains(&count), "count {}", count);
        }
    }
}
