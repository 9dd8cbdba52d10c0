//! Loading signatures from zone snapshots.
//!
//! A snapshot is read with the in-place zone file scanner of the `domain`
//! crate. Only RRSIG records are kept. Parse problems after the first
//! record are reported as warnings and end loading of the file; everything
//! read up to that point is kept.

use std::fs::File;
use std::{error, fmt, io};
use std::path::Path;

use bytes::Bytes;
use domain::base::iana::Rtype;
use domain::base::name::FlattenInto;
use domain::base::{Name, Record};
use domain::rdata::ZoneRecordData;
use domain::zonefile::inplace::{Entry, Zonefile};
use tracing::{debug, warn};

use crate::config::InputMode;
use crate::error::Error;
use crate::signature::Signature;

//------------ ParseWarning --------------------------------------------------

/// A non-fatal problem found while loading a snapshot.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum ParseWarning {
    /// Parsing stopped early because of a malformed entry.
    Truncated { message: String, records: usize },

    /// A record other than an RRSIG was found in an RRSIG list.
    NotRrsig { owner: String, rtype: Rtype },

    /// An `$INCLUDE` directive was found and ignored.
    Include,
}

//------------ LoadedSignatures ----------------------------------------------

/// The signatures of one snapshot together with any warnings.
#[derive(Debug, Default)]
pub struct LoadedSignatures {
    /// The RRSIG records in file order.
    pub signatures: Vec<Signature>,

    /// The warnings produced while reading the file.
    pub warnings: Vec<ParseWarning>,
}

//------------ load_signatures -----------------------------------------------

/// Loads the RRSIG records from the snapshot at `path`.
pub fn load_signatures(
    path: &Path,
    mode: InputMode,
    origin: Option<&Name<Bytes>>,
) -> Result<LoadedSignatures, Error> {
    let mut file =
        File::open(path).map_err(|err| Error::input_open(path, err))?;
    let loaded = read_signatures(&mut file, mode, origin)
        .map_err(|err| match err {
            ReadError::Io(err) => Error::input_open(path, err),
            ReadError::Parse(message) => Error::parse_fatal(path, message),
        })?;
    for warning in &loaded.warnings {
        log_warning(path, warning);
    }
    Ok(loaded)
}

/// Reads RRSIG records from a reader.
pub fn read_signatures(
    source: &mut impl io::Read,
    mode: InputMode,
    origin: Option<&Name<Bytes>>,
) -> Result<LoadedSignatures, ReadError> {
    let mut zonefile = Zonefile::load(source).map_err(ReadError::Io)?;
    if let Some(origin) = origin {
        zonefile.set_origin(origin.clone());
    }

    let mut res = LoadedSignatures::default();
    let mut records = 0usize;
    loop {
        let entry = match zonefile.next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(err) if records == 0 => {
                return Err(ReadError::Parse(err.to_string()))
            }
            Err(err) => {
                res.warnings.push(ParseWarning::Truncated {
                    message: err.to_string(),
                    records,
                });
                break;
            }
        };
        let record = match entry {
            Entry::Record(record) => record,
            _ => {
                res.warnings.push(ParseWarning::Include);
                continue;
            }
        };
        records += 1;

        let record: Record<Name<Bytes>, ZoneRecordData<Bytes, Name<Bytes>>> =
            record.flatten_into();
        let owner = record.owner().clone();
        let class = record.class();
        let ttl = record.ttl();
        let rtype = record.rtype();
        match record.into_data() {
            ZoneRecordData::Rrsig(rrsig) => {
                res.signatures.push(Signature::new(Record::new(
                    owner, class, ttl, rrsig,
                )));
            }
            _ if mode == InputMode::RrsigList => {
                res.warnings.push(ParseWarning::NotRrsig {
                    owner: owner.to_string(),
                    rtype,
                });
            }
            _ => {}
        }
    }
    debug!(
        "read {} records, {} signatures",
        records,
        res.signatures.len()
    );
    Ok(res)
}

fn log_warning(path: &Path, warning: &ParseWarning) {
    match warning {
        ParseWarning::Truncated { message, records } => warn!(
            "Parsing of {} ended after {} records: {}",
            path.display(),
            records,
            message
        ),
        ParseWarning::NotRrsig { owner, rtype } => warn!(
            "Skipping {} record for {} in RRSIG list {}",
            rtype,
            owner,
            path.display()
        ),
        ParseWarning::Include => {
            warn!("Ignoring $INCLUDE directive in {}", path.display())
        }
    }
}

//------------ ReadError -----------------------------------------------------

/// Reading signatures from a reader failed.
#[derive(Debug)]
pub enum ReadError {
    /// The data could not be read.
    Io(io::Error),

    /// The data could not be parsed at all.
    Parse(String),
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadError::Io(err) => err.fmt(f),
            ReadError::Parse(message) => f.write_str(message),
        }
    }
}

impl error::Error for ReadError {}

//============ Testing =======================================================
