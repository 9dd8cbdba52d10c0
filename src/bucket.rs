//! Grouping signatures by the day they expire.

use std::collections::BTreeMap;

use crate::signature::Signature;

/// Signatures grouped by expiration day.
///
/// The key is the expiration time divided by the number of seconds in a
/// day, i.e., the UTC day since the Unix epoch. Iteration is in ascending
/// order of days, which keeps the output of a run reproducible.
pub type Buckets = BTreeMap<u32, Vec<Signature>>;

/// Partitions signatures by the day they expire.
///
/// Within each bucket, signatures keep the order they are given in.
pub fn bucket_by_expiration(
    signatures: impl IntoIterator<Item = Signature>,
) -> Buckets {
    let mut res = Buckets::new();
    for sig in signatures {
        res.entry(sig.expiration_day()).or_default().push(sig);
    }
    res
}

//============ Testing =======================================================
