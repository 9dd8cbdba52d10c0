//! Running the complete filter generation.
//!
//! A run loads both snapshots, determines the withdrawn signatures, groups
//! them by expiration day, and appends one filter record per day to the
//! output file, each optionally followed by its signatures.
//!
//! Problems confined to a single bucket are logged, recorded in the
//! [`Report`], and the run continues with the next bucket. Everything else
//! ends the run with an [`Error`]. Records already written stay in the
//! output file.

use std::fs::{File, OpenOptions};
use std::io::Write;

use tracing::{error, info};

use crate::bucket::bucket_by_expiration;
use crate::build::{build_filter, BuiltFilter};
use crate::config::{Config, ConfigError};
use crate::diff::{difference, Staleness};
use crate::error::{AssembleError, BucketError, Error};
use crate::keys::SigningKey;
use crate::load::load_signatures;
use crate::record::{assemble, FilterRecord};
use crate::sign::sign_record;

//------------ Report --------------------------------------------------------

/// What a run did.
#[derive(Debug, Default)]
pub struct Report {
    /// The number of signatures in the older snapshot.
    pub old_signatures: usize,

    /// The number of signatures in the newer snapshot.
    pub new_signatures: usize,

    /// The number of withdrawn signatures.
    pub withdrawn: usize,

    /// The buckets whose records were written.
    pub written: Vec<WrittenBucket>,

    /// The buckets that failed.
    pub failed_buckets: Vec<FailedBucket>,
}

/// A bucket whose filter record was written.
#[derive(Clone, Debug)]
pub struct WrittenBucket {
    /// The expiration day of the bucket.
    pub day: u32,

    /// The number of signatures in the filter.
    pub signatures: usize,

    /// The owner name of the filter record.
    pub owner: String,

    /// The number of RRSIG records written for the filter record.
    pub rrsigs: usize,
}

/// A bucket that could not be written.
#[derive(Debug)]
pub struct FailedBucket {
    /// The expiration day of the bucket.
    pub day: u32,

    /// What went wrong.
    pub error: BucketError,
}

//------------ run -----------------------------------------------------------

/// Runs filter generation as configured.
pub fn run(config: &Config) -> Result<Report, Error> {
    config.validate()?;

    let keys = config
        .key_bases
        .iter()
        .map(|base| SigningKey::load(base))
        .collect::<Result<Vec<_>, _>>()?;

    let mut report = Report::default();
    let old = load_signatures(
        &config.old_zone,
        config.input_mode,
        config.origin.as_ref(),
    )?;
    report.old_signatures = old.signatures.len();
    info!(
        "Loaded {} RRSIGs from {}",
        report.old_signatures,
        config.old_zone.display()
    );
    let new = load_signatures(
        &config.new_zone,
        config.input_mode,
        config.origin.as_ref(),
    )?;
    report.new_signatures = new.signatures.len();
    info!(
        "Loaded {} RRSIGs from {}",
        report.new_signatures,
        config.new_zone.display()
    );

    let staleness = Staleness {
        now: config.now,
        buffer: config.buffer,
        policy: config.staleness,
    };
    let withdrawn = difference(old.signatures, new.signatures, &staleness);
    report.withdrawn = withdrawn.len();
    info!("Found {} withdrawn RRSIGs", report.withdrawn);

    let buckets = bucket_by_expiration(withdrawn);
    if buckets.is_empty() {
        return Ok(report);
    }
    let domain = config.domain()?;

    let mut output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&config.output)
        .map_err(|source| Error::OutputWrite {
            path: config.output.clone(),
            source,
        })?;

    for (day, signatures) in buckets {
        info!(
            "Building {} filter for day {} with {} entries",
            config.algorithm,
            day,
            signatures.len()
        );
        let built = build_filter(day, &signatures, config)?;
        drop(signatures);

        let record = match assemble(
            &built,
            domain,
            config.ttl,
            config.version,
            config.algorithm,
        ) {
            Ok(record) => record,
            Err(AssembleError::BadOwner(_)) => {
                return Err(ConfigError::BadDomain(domain.into()).into())
            }
            Err(err) => {
                report.fail(day, err.into());
                continue;
            }
        };

        match write_bucket(&record, &keys, config, &mut output) {
            Ok(rrsigs) => {
                info!(
                    "Wrote {} to {}",
                    record.owner(),
                    config.output.display()
                );
                report
                    .written
                    .push(WrittenBucket::new(&built, &record, rrsigs))
            }
            Err(err) => report.fail(day, err),
        }
    }
    Ok(report)
}

/// Signs a record and appends it and its signatures to the output.
///
/// Returns the number of signatures written.
fn write_bucket(
    record: &FilterRecord,
    keys: &[SigningKey],
    config: &Config,
    output: &mut File,
) -> Result<usize, BucketError> {
    let rrsigs = sign_record(
        record,
        keys,
        config.now,
        config.now.saturating_add(config.signature_validity),
    )?;

    let mut text = format!("{}\n", record.record());
    for rrsig in &rrsigs {
        text.push_str(&format!("{}\n", rrsig));
    }
    output.write_all(text.as_bytes())?;
    output.flush()?;
    Ok(rrsigs.len())
}

impl Report {
    /// Returns whether the records of all buckets were written.
    pub fn is_complete(&self) -> bool {
        self.failed_buckets.is_empty()
    }

    fn fail(&mut self, day: u32, error: BucketError) {
        error!("Skipping filter for day {}: {}", day, error);
        self.failed_buckets.push(FailedBucket { day, error })
    }
}

impl WrittenBucket {
    fn new(
        built: &BuiltFilter,
        record: &FilterRecord,
        rrsigs: usize,
    ) -> Self {
        WrittenBucket {
            day: built.day,
            signatures: built.count,
            owner: record.owner().to_string(),
            rrsigs,
        }
    }
}
