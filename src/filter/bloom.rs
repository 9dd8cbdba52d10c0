//! A Bloom filter with an explicit wire format.

use std::f64::consts::LN_2;

use bitvec::prelude::*;

use super::hash::positions;
use super::{FilterInitError, FilterWireError};

//------------ BloomFilter ---------------------------------------------------

/// A Bloom filter.
///
/// The filter is sized from a capacity `n` and a target false positive
/// rate `p`: it has `m = ceil(-n ln p / ln(2)^2)` bits and uses
/// `k = round(m / n * ln 2)` hash functions, with `k` limited to 1 to 32.
///
/// # Wire format
///
/// All integers are in network byte order.
///
/// ```text
/// offset size field
/// 0      4    capacity
/// 4      8    false positive rate as IEEE 754 binary64
/// 12     1    number of hash functions (k)
/// 13     4    number of bits (m)
/// 17     4    number of bytes in the bit array (b = ceil(m / 8))
/// 21     b    bit array
/// ```
///
/// Bit `i` of the filter is stored in byte `i / 8` at bit position `i % 8`,
/// counting from the least significant bit.
#[derive(Clone, Debug, PartialEq)]
pub struct BloomFilter {
    /// The number of elements the filter was sized for.
    capacity: u32,

    /// The target false positive rate.
    false_positive_rate: f64,

    /// The number of hash functions.
    hashes: u8,

    /// The bit array.
    bits: BitVec<u8, Lsb0>,
}

impl BloomFilter {
    /// The length of the fixed part of the wire format.
    pub const HEADER_LEN: usize = 4 + 8 + 1 + 4 + 4;

    /// Creates an empty filter for the given capacity and rate.
    pub fn new(
        capacity: usize,
        false_positive_rate: f64,
    ) -> Result<Self, FilterInitError> {
        if capacity == 0 {
            return Err(FilterInitError::ZeroCapacity);
        }
        let capacity_u32 = u32::try_from(capacity)
            .map_err(|_| FilterInitError::LargeCapacity(capacity))?;
        if false_positive_rate.is_nan()
            || false_positive_rate <= 0.0
            || false_positive_rate >= 1.0
        {
            return Err(FilterInitError::FalsePositiveRate(
                false_positive_rate,
            ));
        }

        let n = f64::from(capacity_u32);
        let m = (-n * false_positive_rate.ln() / (LN_2 * LN_2)).ceil();
        if m > f64::from(u32::MAX) {
            return Err(FilterInitError::LargeCapacity(capacity));
        }
        let m = (m as u32).max(1);
        let k = (f64::from(m) / n * LN_2).round().clamp(1.0, 32.0) as u8;

        Ok(BloomFilter {
            capacity: capacity_u32,
            false_positive_rate,
            hashes: k,
            bits: bitvec![u8, Lsb0; 0; m as usize],
        })
    }

    /// Returns the number of elements the filter was sized for.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the target false positive rate.
    pub fn false_positive_rate(&self) -> f64 {
        self.false_positive_rate
    }

    /// Returns the number of hash functions.
    pub fn hashes(&self) -> u8 {
        self.hashes
    }

    /// Returns the size of the filter in bits.
    pub fn bit_len(&self) -> u32 {
        // The length was created from a u32.
        self.bits.len() as u32
    }

    /// Returns the number of bits set.
    pub fn bits_set(&self) -> usize {
        self.bits.count_ones()
    }

    /// Adds an element to the filter.
    pub fn add(&mut self, element: &[u8]) {
        for pos in positions(element, self.hashes, self.bit_len()) {
            self.bits.set(pos, true);
        }
    }

    /// Returns whether the element may have been added to the filter.
    ///
    /// There are no false negatives: an element that was added always
    /// returns `true`.
    pub fn contains(&self, element: &[u8]) -> bool {
        positions(element, self.hashes, self.bit_len())
            .all(|pos| self.bits[pos])
    }

    /// Returns the length of the wire format.
    pub fn compose_len(&self) -> usize {
        Self::HEADER_LEN + self.bits.as_raw_slice().len()
    }

    /// Appends the wire format of the filter to `target`.
    pub fn compose(&self, target: &mut Vec<u8>) {
        let raw = self.bits.as_raw_slice();
        target.reserve(Self::HEADER_LEN + raw.len());
        target.extend_from_slice(&self.capacity.to_be_bytes());
        target.extend_from_slice(
            &self.false_positive_rate.to_bits().to_be_bytes(),
        );
        target.push(self.hashes);
        target.extend_from_slice(&self.bit_len().to_be_bytes());
        // At most 2^29 bytes for a u32 bit count.
        target.extend_from_slice(&(raw.len() as u32).to_be_bytes());
        target.extend_from_slice(raw);
    }

    /// Returns the wire format of the filter.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut res = Vec::with_capacity(self.compose_len());
        self.compose(&mut res);
        res
    }

    /// Parses a filter from its complete wire format.
    pub fn from_wire(data: &[u8]) -> Result<Self, FilterWireError> {
        if data.len() < Self::HEADER_LEN {
            return Err(FilterWireError::ShortInput);
        }
        let (head, raw) = data.split_at(Self::HEADER_LEN);
        let capacity =
            u32::from_be_bytes([head[0], head[1], head[2], head[3]]);
        let mut rate = [0u8; 8];
        rate.copy_from_slice(&head[4..12]);
        let false_positive_rate = f64::from_bits(u64::from_be_bytes(rate));
        let hashes = head[12];
        let bit_len =
            u32::from_be_bytes([head[13], head[14], head[15], head[16]]);
        let byte_len =
            u32::from_be_bytes([head[17], head[18], head[19], head[20]]);

        if hashes == 0
            || bit_len == 0
            || u64::from(byte_len) != (u64::from(bit_len) + 7) / 8
        {
            return Err(FilterWireError::Inconsistent);
        }
        let byte_len = byte_len as usize;
        if raw.len() < byte_len {
            return Err(FilterWireError::ShortInput);
        }
        if raw.len() > byte_len {
            return Err(FilterWireError::TrailingData);
        }

        let mut bits = BitVec::<u8, Lsb0>::from_slice(raw);
        bits.truncate(bit_len as usize);
        Ok(BloomFilter {
            capacity,
            false_positive_rate,
            hashes,
            bits,
        })
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0.2, FilterInitError::ZeroCapacity)]
    #[case(10, 0.0, FilterInitError::FalsePositiveRate(0.0))]
    #[case(10, -1.0, FilterInitError::FalsePositiveRate(-1.0))]
    #[case(10, 1.0, FilterInitError::FalsePositiveRate(1.0))]
    fn reject_parameters(
        #[case] capacity: usize,
        #[case] rate: f64,
        #[case] err: FilterInitError,
    ) {
        assert_eq!(BloomFilter::new(capacity, rate), Err(err));
    }

    #[test]
    fn sizing() {
        // n = 100, p = 0.01 gives m = 959 and k = 7.
        let filter = BloomFilter::new(100, 0.01).unwrap();
        assert_eq!(filter.bit_len(), 959);
        assert_eq!(filter.hashes(), 7);
        assert_eq!(filter.compose_len(), BloomFilter::HEADER_LEN + 120);

        // n = 1000, p = 0.2 gives m = 3350 and k = 2.
        let filter = BloomFilter::new(1000, 0.2).unwrap();
        assert_eq!(filter.bit_len(), 3350);
        assert_eq!(filter.hashes(), 2);
        assert_eq!(filter.bits_set(), 0);
    }

    #[test]
    fn no_false_negatives() {
        let mut filter = BloomFilter::new(1000, 0.01).unwrap();
        let elements: Vec<_> =
            (0..1000).map(|i| format!("signature_{}", i)).collect();
        for element in &elements {
            filter.add(element.as_bytes());
        }
        for element in &elements {
            assert!(filter.contains(element.as_bytes()));
        }
    }

    #[test]
    fn false_positive_rate_bounded() {
        let mut filter = BloomFilter::new(200, 0.05).unwrap();
        for i in 0..200 {
            filter.add(format!("in_{}", i).as_bytes());
        }
        let hits = (0..20_000)
            .filter(|i| filter.contains(format!("out_{}", i).as_bytes()))
            .count();
        assert!(hits < 2_000, "{} false positives", hits);
    }

    #[test]
    fn wire_layout() {
        let mut filter = BloomFilter::new(10, 0.5).unwrap();
        filter.add(b"one");
        let wire = filter.to_wire();
        assert_eq!(wire.len(), filter.compose_len());
        assert_eq!(&wire[0..4], &[0, 0, 0, 10]);
        assert_eq!(&wire[4..12], &0.5f64.to_bits().to_be_bytes());
        assert_eq!(wire[12], filter.hashes());
        assert_eq!(&wire[13..17], &filter.bit_len().to_be_bytes());
        let byte_len =
            u32::from_be_bytes([wire[17], wire[18], wire[19], wire[20]]);
        assert_eq!(byte_len as usize, wire.len() - BloomFilter::HEADER_LEN);
        let set: u32 = wire[21..].iter().map(|b| b.count_ones()).sum();
        assert_eq!(set as usize, filter.bits_set());
    }

    #[test]
    fn wire_roundtrip_keeps_membership() {
        let mut filter = BloomFilter::new(50, 0.1).unwrap();
        filter.add(b"withdrawn");
        let parsed = BloomFilter::from_wire(&filter.to_wire()).unwrap();
        assert_eq!(parsed, filter);
        assert!(parsed.contains(b"withdrawn"));
    }

    #[test]
    fn bad_wire() {
        let wire = BloomFilter::new(50, 0.1).unwrap().to_wire();
        assert_eq!(
            BloomFilter::from_wire(&wire[..10]),
            Err(FilterWireError::ShortInput)
        );
        assert_eq!(
            BloomFilter::from_wire(&wire[..wire.len() - 1]),
            Err(FilterWireError::ShortInput)
        );
        let mut long = wire.clone();
        long.push(0);
        assert_eq!(
            BloomFilter::from_wire(&long),
            Err(FilterWireError::TrailingData)
        );
        let mut bad = wire;
        bad[20] ^= 1;
        assert_eq!(
            BloomFilter::from_wire(&bad),
            Err(FilterWireError::Inconsistent)
        );
    }
}
