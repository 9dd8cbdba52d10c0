//! The TXT records carrying a filter.
//!
//! Each bucket of withdrawn signatures is published as a single TXT record
//! owned by `_filter.<YYYYMMDD>.<domain>`. The record data is the payload
//!
//! ```text
//! "v=" version ";s=" HHMMSS ";a=" algorithm ";d=" filter
//! ```
//!
//! split into character strings of at most 255 octets. The date in the
//! owner name and the time in the header are those of the latest
//! expiration in the bucket, in UTC. The filter is in the wire format of
//! [`BloomFilter`].

use core::fmt;
use std::error;

use domain::base::iana::Class;
use domain::base::{Name, Record, Ttl};
use domain::rdata::Txt;
use time::{OffsetDateTime, Time};

use crate::build::BuiltFilter;
use crate::error::AssembleError;
use crate::filter::{BloomFilter, FilterAlgorithm, FilterWireError};

/// The maximum length of a character string.
pub const CHUNK_LEN: usize = 255;

/// The maximum length of record data.
const MAX_RDATA_LEN: usize = 0xFFFF;

/// The TXT record type produced by the assembler.
pub type TxtRecord = Record<Name<Vec<u8>>, Txt<Vec<u8>>>;

//------------ FilterHeader --------------------------------------------------

/// The ASCII header preceding the filter in the payload.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FilterHeader {
    /// The version of the record format.
    pub version: u32,

    /// The time of day of the latest expiration in the bucket.
    pub time: Time,

    /// The identifier of the filter algorithm.
    pub algorithm: u8,
}

impl FilterHeader {
    /// Parses the header from the start of `data`.
    ///
    /// Returns the header and the remaining data.
    pub fn parse(data: &[u8]) -> Result<(Self, &[u8]), PayloadError> {
        let data = expect(data, b"v=")?;
        let (version, data) = number(data, 10)?;
        let data = expect(data, b";s=")?;
        if data.len() < 6 || !data[..6].iter().all(u8::is_ascii_digit) {
            return Err(PayloadError::BadHeader);
        }
        let digits =
            |i: usize| (data[i] - b'0') * 10 + (data[i + 1] - b'0');
        let time = Time::from_hms(digits(0), digits(2), digits(4))
            .map_err(|_| PayloadError::BadHeader)?;
        let data = expect(&data[6..], b";a=")?;
        let (algorithm, data) = number(data, 3)?;
        let data = expect(data, b";d=")?;
        Ok((
            FilterHeader {
                version: u32::try_from(version)
                    .map_err(|_| PayloadError::BadHeader)?,
                time,
                algorithm: u8::try_from(algorithm)
                    .map_err(|_| PayloadError::BadHeader)?,
            },
            data,
        ))
    }
}

impl fmt::Display for FilterHeader {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "v={};s={:02}{:02}{:02};a={};d=",
            self.version,
            self.time.hour(),
            self.time.minute(),
            self.time.second(),
            self.algorithm
        )
    }
}

fn expect<'a>(
    data: &'a [u8],
    prefix: &[u8],
) -> Result<&'a [u8], PayloadError> {
    data.strip_prefix(prefix).ok_or(PayloadError::BadHeader)
}

/// Parses a decimal number of at most `max_digits` digits.
fn number(
    data: &[u8],
    max_digits: usize,
) -> Result<(u64, &[u8]), PayloadError> {
    let len = data.iter().take_while(|ch| ch.is_ascii_digit()).count();
    if len == 0 || len > max_digits {
        return Err(PayloadError::BadHeader);
    }
    let value = data[..len]
        .iter()
        .fold(0u64, |value, ch| value * 10 + u64::from(ch - b'0'));
    Ok((value, &data[len..]))
}

//------------ FilterPayload -------------------------------------------------

/// The parsed payload of a filter record.
#[derive(Clone, Debug)]
pub struct FilterPayload {
    /// The header.
    pub header: FilterHeader,

    /// The filter.
    pub filter: BloomFilter,
}

impl FilterPayload {
    /// Parses a complete payload.
    pub fn parse(data: &[u8]) -> Result<Self, PayloadError> {
        let (header, data) = FilterHeader::parse(data)?;
        let filter = BloomFilter::from_wire(data)?;
        Ok(FilterPayload { header, filter })
    }
}

//------------ FilterRecord --------------------------------------------------

/// A TXT record carrying the filter of one bucket.
#[derive(Clone, Debug)]
pub struct FilterRecord {
    record: TxtRecord,
}

impl FilterRecord {
    /// Returns the record.
    pub fn record(&self) -> &TxtRecord {
        &self.record
    }

    /// Converts the value into the record.
    pub fn into_record(self) -> TxtRecord {
        self.record
    }

    /// Returns the owner name.
    pub fn owner(&self) -> &Name<Vec<u8>> {
        self.record.owner()
    }

    /// Returns an iterator over the character strings of the record.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.record.data().iter()
    }

    /// Returns the payload, i.e., the concatenated character strings.
    pub fn payload(&self) -> Vec<u8> {
        self.chunks().flatten().copied().collect()
    }

    /// Parses the payload.
    pub fn parse_payload(&self) -> Result<FilterPayload, PayloadError> {
        FilterPayload::parse(&self.payload())
    }
}

//------------ assemble ------------------------------------------------------

/// Assembles the TXT record for a built filter.
pub fn assemble(
    built: &BuiltFilter,
    domain: &str,
    ttl: u32,
    version: u32,
    algorithm: FilterAlgorithm,
) -> Result<FilterRecord, AssembleError> {
    let expiration = utc(built.max_expiration);
    let owner_str = format!(
        "_filter.{:04}{:02}{:02}.{}",
        expiration.year(),
        u8::from(expiration.month()),
        expiration.day(),
        domain
    );
    let owner = Name::vec_from_str(&owner_str)
        .map_err(|_| AssembleError::BadOwner(owner_str))?;

    let header = FilterHeader {
        version,
        time: expiration.time(),
        algorithm: algorithm.id(),
    };
    let mut payload = header.to_string().into_bytes();
    built.filter.compose(&mut payload);

    let data = Txt::from_octets(chunk(&payload)?)
        .map_err(|_| AssembleError::LongRecordData(payload.len()))?;
    Ok(FilterRecord {
        record: Record::new(owner, Class::IN, Ttl::from_secs(ttl), data),
    })
}

/// Splits a payload into length prefixed character strings.
fn chunk(payload: &[u8]) -> Result<Vec<u8>, AssembleError> {
    let count = payload.len().div_ceil(CHUNK_LEN);
    let len = payload.len() + count;
    if len > MAX_RDATA_LEN {
        return Err(AssembleError::LongRecordData(len));
    }
    let mut res = Vec::with_capacity(len);
    for piece in payload.chunks(CHUNK_LEN) {
        // A piece is at most CHUNK_LEN long.
        res.push(piece.len() as u8);
        res.extend_from_slice(piece);
    }
    Ok(res)
}

/// Converts seconds since the Unix epoch into a UTC date and time.
fn utc(secs: u32) -> OffsetDateTime {
    // Every u32 value is in range.
    OffsetDateTime::from_unix_timestamp(i64::from(secs))
        .unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

//------------ PayloadError --------------------------------------------------

/// A filter payload could not be parsed.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum PayloadError {
    /// The header is malformed.
    BadHeader,

    /// The filter is malformed.
    Filter(FilterWireError),
}

impl From<FilterWireError> for PayloadError {
    fn from(err: FilterWireError) -> Self {
        PayloadError::Filter(err)
    }
}

impl fmt::Display for PayloadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PayloadError::BadHeader => {
                f.write_str("malformed payload header")
            }
            PayloadError::Filter(err) => err.fmt(f),
        }
    }
}

impl error::Error for PayloadError {}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;
    use domain::rdata::ZoneRecordData;
    use domain::zonefile::inplace::{Entry, Zonefile};
    use rstest::rstest;

    // 2024-03-01 12:34:56 UTC
    const EXPIRATION: u32 = 1_709_296_496;

    fn built(capacity: usize, rate: f64) -> BuiltFilter {
        let mut filter = BloomFilter::new(capacity, rate).unwrap();
        filter.add(b"withdrawn");
        BuiltFilter {
            day: EXPIRATION / 86_400,
            filter,
            max_expiration: EXPIRATION,
            count: 1,
        }
    }

    fn assemble_default(built: &BuiltFilter) -> FilterRecord {
        assemble(built, "example.com", 900, 1, FilterAlgorithm::Bloom)
            .unwrap()
    }

    #[test]
    fn owner_and_header_use_utc() {
        let record = assemble_default(&built(10, 0.2));
        assert_eq!(
            record.owner().to_string(),
            "_filter.20240301.example.com"
        );
        assert!(record.payload().starts_with(b"v=1;s=123456;a=0;d="));
        assert_eq!(record.record().ttl().as_secs(), 900);
        assert_eq!(record.record().class(), Class::IN);
    }

    #[test]
    fn domain_with_trailing_dot() {
        let record = assemble(
            &built(10, 0.2),
            "example.com.",
            900,
            0,
            FilterAlgorithm::Bloom,
        )
        .unwrap();
        assert_eq!(
            record.owner().to_string(),
            "_filter.20240301.example.com"
        );
    }

    #[test]
    fn bad_domain() {
        let err = assemble(
            &built(10, 0.2),
            "example..com",
            900,
            0,
            FilterAlgorithm::Bloom,
        )
        .unwrap_err();
        assert!(matches!(err, AssembleError::BadOwner(_)));
    }

    #[rstest]
    #[case(1, 0.5)]
    #[case(100, 0.2)]
    #[case(1000, 0.2)]
    #[case(5000, 0.01)]
    fn chunking(#[case] capacity: usize, #[case] rate: f64) {
        let built = built(capacity, rate);
        let record = assemble_default(&built);

        let mut expected = b"v=1;s=123456;a=0;d=".to_vec();
        expected.extend_from_slice(&built.filter.to_wire());

        let chunks: Vec<_> = record.chunks().collect();
        assert_eq!(chunks.len(), expected.len().div_ceil(255));
        assert!(chunks.iter().all(|chunk| chunk.len() <= 255));
        assert_eq!(record.payload(), expected);
    }

    #[test]
    fn payload_roundtrip() {
        let record = assemble_default(&built(100, 0.1));
        let payload = record.parse_payload().unwrap();
        assert_eq!(payload.header.version, 1);
        assert_eq!(payload.header.time, Time::from_hms(12, 34, 56).unwrap());
        assert_eq!(payload.header.algorithm, 0);
        assert_eq!(payload.filter.capacity(), 100);
        assert!(payload.filter.contains(b"withdrawn"));
    }

    #[rstest]
    #[case(b"")]
    #[case(b"v=;s=123456;a=0;d=")]
    #[case(b"v=1;s=12345;a=0;d=")]
    #[case(b"v=1;s=246060;a=0;d=")]
    #[case(b"v=1;s=123456;a=0;")]
    #[case(b"v=1;s=123456;a=256;d=")]
    fn bad_header(#[case] data: &[u8]) {
        assert_eq!(
            FilterPayload::parse(data).unwrap_err(),
            PayloadError::BadHeader
        );
    }

    #[test]
    fn missing_filter() {
        assert_eq!(
            FilterPayload::parse(b"v=0;s=000000;a=0;d=").unwrap_err(),
            PayloadError::Filter(FilterWireError::ShortInput)
        );
    }

    #[test]
    fn too_long() {
        let payload = vec![0u8; 65_535];
        assert!(matches!(
            chunk(&payload),
            Err(AssembleError::LongRecordData(_))
        ));
        assert_eq!(chunk(&vec![0u8; 65_279]).unwrap().len(), 65_535);
    }

    #[test]
    fn presentation_survives_parsing() {
        let mut bucket = built(40, 0.01);
        for i in 0..40u8 {
            bucket.filter.add(&[b'"', b'\\', i]);
        }
        let record = assemble_default(&bucket);
        let text = format!("{}\n", record.record());
        assert!(text.starts_with("_filter.20240301.example.com. 900 IN TXT"));

        let mut zonefile = Zonefile::load(&mut text.as_bytes()).unwrap();
        let Some(Entry::Record(parsed)) = zonefile.next_entry().unwrap()
        else {
            panic!("no record in {}", text);
        };
        let ZoneRecordData::Txt(txt) = parsed.into_data() else {
            panic!("not a TXT record: {}", text);
        };
        let payload: Vec<u8> = txt.iter().flatten().copied().collect();
        assert_eq!(payload, record.payload());
    }
}
