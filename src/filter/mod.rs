//! Probabilistic membership filters.
//!
//! A filter is built for every bucket of withdrawn signatures and embedded
//! into the payload of a TXT record. Its wire format therefore is part of
//! the record format and is defined explicitly field by field. See
//! [`BloomFilter`] for the layout.

use core::fmt;
use std::{error, io};

pub use self::bloom::BloomFilter;

mod bloom;
mod hash;

//------------ FilterAlgorithm -----------------------------------------------

/// The filter algorithms that can be selected.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum FilterAlgorithm {
    /// A Bloom filter.
    #[default]
    Bloom,
}

impl FilterAlgorithm {
    /// All supported algorithms.
    pub const ALL: &'static [FilterAlgorithm] = &[FilterAlgorithm::Bloom];

    /// Returns the algorithm for a command line name.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|alg| alg.name().eq_ignore_ascii_case(name))
    }

    /// The name used on the command line.
    pub fn name(self) -> &'static str {
        match self {
            FilterAlgorithm::Bloom => "bloom",
        }
    }

    /// A human readable description.
    pub fn description(self) -> &'static str {
        match self {
            FilterAlgorithm::Bloom => "Bloom filter",
        }
    }

    /// The identifier written into the `a=` field of the record header.
    pub fn id(self) -> u8 {
        match self {
            FilterAlgorithm::Bloom => 0,
        }
    }

    /// Writes the list of supported algorithms.
    pub fn write_list(mut target: impl io::Write) -> io::Result<()> {
        writeln!(target, "Possible algorithms:")?;
        for alg in Self::ALL {
            writeln!(target, "{:<8}{}", alg.name(), alg.description())?;
        }
        Ok(())
    }
}

impl fmt::Display for FilterAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

//------------ FilterInitError -----------------------------------------------

/// A filter could not be created from the given parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FilterInitError {
    /// The capacity is zero.
    ZeroCapacity,

    /// The capacity does not fit the wire format.
    LargeCapacity(usize),

    /// The false positive rate is not in the open interval (0, 1).
    FalsePositiveRate(f64),
}

impl fmt::Display for FilterInitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FilterInitError::ZeroCapacity => {
                f.write_str("capacity must be greater than 0")
            }
            FilterInitError::LargeCapacity(capacity) => {
                write!(f, "capacity {} is too large", capacity)
            }
            FilterInitError::FalsePositiveRate(rate) => {
                write!(f, "invalid false positive rate {}", rate)
            }
        }
    }
}

impl error::Error for FilterInitError {}

//------------ FilterWireError -----------------------------------------------

/// A filter could not be parsed from its wire format.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FilterWireError {
    /// The data ended before the filter did.
    ShortInput,

    /// The data continues after the filter.
    TrailingData,

    /// The header fields contradict each other.
    Inconsistent,
}

impl fmt::Display for FilterWireError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            FilterWireError::ShortInput => "short filter data",
            FilterWireError::TrailingData => "trailing data after filter",
            FilterWireError::Inconsistent => "inconsistent filter header",
        })
    }
}

impl error::Error for FilterWireError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn algorithm_names() {
        assert_eq!(
            FilterAlgorithm::from_name("bloom"),
            Some(FilterAlgorithm::Bloom)
        );
        assert_eq!(
            FilterAlgorithm::from_name("BLOOM"),
            Some(FilterAlgorithm::Bloom)
        );
        assert_eq!(FilterAlgorithm::from_name("cuckoo"), None);
        assert_eq!(FilterAlgorithm::Bloom.id(), 0);
    }

    #[test]
    fn list() {
        let mut out = Vec::new();
        FilterAlgorithm::write_list(&mut out).unwrap();
        let out = String::from_utf8(out).unwrap();
        assert!(out.starts_with("Possible algorithms:\n"));
        assert!(out.contains("bloom   Bloom filter\n"));
    }
}
