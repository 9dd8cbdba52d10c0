//! Signing the filter records.
//!
//! Every filter record is an RRset of its own. It is signed with each of
//! the configured keys, producing one RRSIG record per key. The signed data
//! is formed as described in RFC 4034, section 3.1.8.1: the RRSIG record
//! data without the signature followed by the record in canonical form.

use core::fmt;
use std::error;

use bytes::Bytes;
use domain::base::iana::Rtype;
use domain::base::name::ToName;
use domain::base::{Name, Record};
use domain::rdata::dnssec::{ProtoRrsig, Timestamp};
use domain::rdata::Rrsig;
use octseq::builder::infallible;

use crate::keys::{KeyError, SigningKey};
use crate::record::FilterRecord;

/// The RRSIG records produced for a filter record.
pub type RrsigRecord = Record<Name<Vec<u8>>, Rrsig<Vec<u8>, Name<Bytes>>>;

/// Signs a filter record with every key.
///
/// The signatures are valid from `inception` until `expiration`, both in
/// seconds since the Unix epoch. They are returned in the order of `keys`.
pub fn sign_record(
    record: &FilterRecord,
    keys: &[SigningKey],
    inception: u32,
    expiration: u32,
) -> Result<Vec<RrsigRecord>, SignError> {
    let record = record.record();
    let mut res = Vec::with_capacity(keys.len());
    for key in keys {
        let proto = ProtoRrsig::new(
            Rtype::TXT,
            key.algorithm(),
            record.owner().rrsig_label_count(),
            record.ttl(),
            Timestamp::from(expiration),
            Timestamp::from(inception),
            key.key_tag(),
            key.owner().clone(),
        );

        let mut data = Vec::new();
        infallible(proto.compose_canonical(&mut data));
        infallible(record.compose_canonical(&mut data));

        let signature = key.sign_raw(&data)?;
        let rrsig = proto
            .into_rrsig(signature)
            .map_err(|_| SignError::LongRecordData)?;
        res.push(Record::new(
            record.owner().clone(),
            record.class(),
            record.ttl(),
            rrsig,
        ));
    }
    Ok(res)
}

//------------ SignError -----------------------------------------------------

/// A filter record could not be signed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SignError {
    /// The key failed to produce a signature.
    Key(KeyError),

    /// The signature does not fit into a record.
    LongRecordData,
}

impl From<KeyError> for SignError {
    fn from(err: KeyError) -> Self {
        SignError::Key(err)
    }
}

impl fmt::Display for SignError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SignError::Key(err) => err.fmt(f),
            SignError::LongRecordData => {
                f.write_str("signature record data too long")
            }
        }
    }
}

impl error::Error for SignError {}

//============ Testing =======================================================
