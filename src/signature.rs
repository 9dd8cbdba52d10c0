//! RRSIG records as loaded from a zone snapshot.

use core::cmp::Ordering;
use core::fmt;

use bytes::Bytes;
use domain::base::cmp::CanonicalOrd;
use domain::base::{Name, Record};
use domain::rdata::Rrsig;
use octseq::builder::infallible;

use crate::config::SECS_PER_DAY;

//------------ Signature -----------------------------------------------------

/// The record type of a loaded signature.
pub type SignatureRecord = Record<Name<Bytes>, Rrsig<Bytes, Name<Bytes>>>;

/// A single RRSIG record.
///
/// Signatures are immutable once loaded. They are moved from stage to stage
/// of the pipeline and dropped by whichever stage consumes them last.
#[derive(Clone)]
pub struct Signature {
    record: SignatureRecord,
}

impl Signature {
    /// Creates a signature from an RRSIG record.
    pub fn new(record: SignatureRecord) -> Self {
        Signature { record }
    }

    /// Returns the underlying record.
    pub fn record(&self) -> &SignatureRecord {
        &self.record
    }

    /// Returns the owner name of the signature.
    pub fn owner(&self) -> &Name<Bytes> {
        self.record.owner()
    }

    /// Returns the RRSIG record data.
    pub fn rrsig(&self) -> &Rrsig<Bytes, Name<Bytes>> {
        self.record.data()
    }

    /// Returns the expiration time in seconds since the Unix epoch.
    pub fn expiration(&self) -> u32 {
        self.rrsig().expiration().into_int()
    }

    /// Returns the inception time in seconds since the Unix epoch.
    pub fn inception(&self) -> u32 {
        self.rrsig().inception().into_int()
    }

    /// Returns the original TTL of the covered RRset in seconds.
    pub fn original_ttl(&self) -> u32 {
        self.rrsig().original_ttl().as_secs()
    }

    /// Returns the day of the expiration as days since the Unix epoch.
    pub fn expiration_day(&self) -> u32 {
        self.expiration() / SECS_PER_DAY
    }

    /// Compares two signatures in canonical DNSSEC order.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.record.canonical_cmp(&other.record)
    }

    /// Returns the wire format of the record as it is added to a filter.
    ///
    /// Names are in canonical form, that is, lower case and uncompressed.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        infallible(self.record.compose_canonical(&mut buf));
        buf
    }
}

impl From<SignatureRecord> for Signature {
    fn from(record: SignatureRecord) -> Self {
        Signature::new(record)
    }
}

//--- Display and Debug

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.record.fmt(f)
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Signature")
            .field("owner", &format_args!("{}", self.owner()))
            .field("type_covered", &self.rrsig().type_covered())
            .field("key_tag", &self.rrsig().key_tag())
            .field("expiration", &self.expiration())
            .finish()
    }
}

//============ Testing =======================================================
