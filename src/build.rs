//! Building the filter for a bucket of signatures.

use crate::config::Config;
use crate::error::Error;
use crate::filter::BloomFilter;
use crate::signature::Signature;

//------------ BuiltFilter ---------------------------------------------------

/// The filter over the signatures of one bucket.
#[derive(Clone, Debug)]
pub struct BuiltFilter {
    /// The expiration day of the bucket.
    pub day: u32,

    /// The filter containing every signature of the bucket.
    pub filter: BloomFilter,

    /// The latest expiration time of any signature in the bucket.
    pub max_expiration: u32,

    /// The number of signatures added to the filter.
    pub count: usize,
}

/// Builds the filter for the bucket of expiration day `day`.
///
/// The filter is sized for the bucket, raised to the configured capacity
/// floor if there is one. Every signature is added in its canonical wire
/// format.
pub fn build_filter(
    day: u32,
    signatures: &[Signature],
    config: &Config,
) -> Result<BuiltFilter, Error> {
    let capacity = config.filter_capacity(signatures.len());
    let mut filter = BloomFilter::new(capacity, config.false_positive_rate)
        .map_err(|source| Error::FilterInit { day, source })?;
    let mut max_expiration = 0;
    for sig in signatures {
        filter.add(&sig.to_wire());
        max_expiration = max_expiration.max(sig.expiration());
    }
    Ok(BuiltFilter {
        day,
        filter,
        max_expiration,
        count: signatures.len(),
    })
}

//============ Testing =======================================================
