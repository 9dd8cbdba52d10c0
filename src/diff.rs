//! Finding the signatures withdrawn between two snapshots.
//!
//! Both snapshots are sorted into canonical order and then walked in
//! parallel. A signature of the older snapshot that has no canonically
//! equal counterpart in the newer one is a candidate. Whether a candidate
//! is reported depends on the [`StalenessPolicy`] and on [`is_stale`].

use core::cmp::Ordering;

use crate::config::StalenessPolicy;
use crate::signature::Signature;

//------------ Staleness -----------------------------------------------------

/// The time horizons the staleness check is made against.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Staleness {
    /// The reference time in seconds since the Unix epoch.
    pub now: u32,

    /// The safety margin before expiration in seconds.
    pub buffer: u32,

    /// Which candidates the check applies to.
    pub policy: StalenessPolicy,
}

impl Staleness {
    fn check_merge(&self, sig: &Signature) -> bool {
        match self.policy {
            StalenessPolicy::Full | StalenessPolicy::MergeOnly => {
                is_stale(sig, self.now, self.buffer)
            }
            StalenessPolicy::Off => true,
        }
    }

    fn check_tail(&self, sig: &Signature) -> bool {
        match self.policy {
            StalenessPolicy::Full => is_stale(sig, self.now, self.buffer),
            StalenessPolicy::MergeOnly | StalenessPolicy::Off => true,
        }
    }
}

/// Returns whether a withdrawn signature is worth reporting.
///
/// This is the case if the signature would still have been valid for longer
/// than both its original TTL and the safety buffer. Signatures expiring
/// sooner drop out of caches by themselves.
pub fn is_stale(sig: &Signature, now: u32, buffer: u32) -> bool {
    let now = u64::from(now);
    let expiration = u64::from(sig.expiration());
    now + u64::from(sig.original_ttl()) < expiration
        && now + u64::from(buffer) < expiration
}

//------------ difference ----------------------------------------------------

/// Returns the signatures of `old` that have been withdrawn in `new`.
///
/// Both collections are consumed. The result is in canonical order.
pub fn difference(
    mut old: Vec<Signature>,
    mut new: Vec<Signature>,
    staleness: &Staleness,
) -> Vec<Signature> {
    old.sort_by(Signature::canonical_cmp);
    new.sort_by(Signature::canonical_cmp);

    let mut res = Vec::new();
    let mut new = new.iter().peekable();
    for sig in old {
        let keep = loop {
            let Some(other) = new.peek() else {
                break staleness.check_tail(&sig);
            };
            match sig.canonical_cmp(other) {
                Ordering::Less => break staleness.check_merge(&sig),
                Ordering::Greater => {
                    new.next();
                }
                Ordering::Equal => {
                    new.next();
                    break false;
                }
            }
        };
        if keep {
            res.push(sig)
        }
    }
    res
}

//============ Testing =======================================================
