//! Configuration of a filter generation run.
//!
//! A [`Config`] is built once, usually from the command line, and handed by
//! reference to [`pipeline::run`][crate::pipeline::run]. Nothing in the
//! crate keeps configuration in global state.

use std::path::PathBuf;
use std::{error, fmt};

use bytes::Bytes;
use domain::base::Name;
use domain::rdata::dnssec::Timestamp;
use time::macros::format_description;
use time::PrimitiveDateTime;

use crate::filter::FilterAlgorithm;

//------------ Constants -----------------------------------------------------

/// The number of seconds in a day.
pub const SECS_PER_DAY: u32 = 86_400;

/// The default false positive rate of a filter.
pub const DEFAULT_FALSE_POSITIVE_RATE: f64 = 0.2;

/// The default safety margin before expiration.
pub const DEFAULT_BUFFER: u32 = 2 * SECS_PER_DAY;

/// The default TTL of the generated TXT records.
pub const DEFAULT_TTL: u32 = 900;

/// The default minimum capacity of a filter.
pub const DEFAULT_CAPACITY_FLOOR: usize = 1000;

/// The default validity period of signatures over the TXT records.
pub const DEFAULT_SIGNATURE_VALIDITY: u32 = 28 * SECS_PER_DAY;

/// The default output file.
pub const DEFAULT_OUTPUT: &str = "filter.txt";

//------------ InputMode -----------------------------------------------------

/// How the input files are to be interpreted.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum InputMode {
    /// A complete zone file of which only the RRSIG records are used.
    #[default]
    Zone,

    /// A flat list of RRSIG records.
    RrsigList,
}

//------------ StalenessPolicy -----------------------------------------------

/// When a signature missing from the newer snapshot is reported.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum StalenessPolicy {
    /// Report only signatures that pass the staleness check.
    #[default]
    Full,

    /// Check only signatures found while walking both snapshots.
    ///
    /// Signatures left over once the newer snapshot has been exhausted are
    /// reported unconditionally.
    MergeOnly,

    /// Report every signature missing from the newer snapshot.
    Off,
}

impl StalenessPolicy {
    /// Returns the policy for the given command line name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "full" => Some(StalenessPolicy::Full),
            "merge-only" => Some(StalenessPolicy::MergeOnly),
            "off" => Some(StalenessPolicy::Off),
            _ => None,
        }
    }
}

//------------ Config --------------------------------------------------------

/// The complete configuration of a run.
#[derive(Clone, Debug)]
pub struct Config {
    /// The older zone snapshot.
    pub old_zone: PathBuf,

    /// The newer zone snapshot.
    pub new_zone: PathBuf,

    /// How to read the two snapshots.
    pub input_mode: InputMode,

    /// The origin for relative names in the snapshots.
    pub origin: Option<Name<Bytes>>,

    /// Base names of the key pairs to sign the TXT records with.
    ///
    /// For every base name, `<base>.private` and `<base>.key` are read.
    pub key_bases: Vec<PathBuf>,

    /// The filter algorithm.
    pub algorithm: FilterAlgorithm,

    /// The target false positive rate of every filter.
    pub false_positive_rate: f64,

    /// The reference time as seconds since the Unix epoch.
    pub now: u32,

    /// The safety margin before expiration in seconds.
    pub buffer: u32,

    /// Which signatures the staleness check applies to.
    pub staleness: StalenessPolicy,

    /// The minimum capacity of a filter, if any.
    pub capacity_floor: Option<usize>,

    /// The TTL of the generated TXT records.
    pub ttl: u32,

    /// The domain name the `_filter` records are placed under.
    pub domain: Option<String>,

    /// The header version.
    pub version: u32,

    /// The file the records are appended to.
    pub output: PathBuf,

    /// How long signatures over the TXT records are valid in seconds.
    pub signature_validity: u32,
}

impl Config {
    /// Creates a configuration with default values for two snapshots.
    pub fn new(
        old_zone: impl Into<PathBuf>,
        new_zone: impl Into<PathBuf>,
    ) -> Self {
        Config {
            old_zone: old_zone.into(),
            new_zone: new_zone.into(),
            input_mode: InputMode::default(),
            origin: None,
            key_bases: Vec::new(),
            algorithm: FilterAlgorithm::default(),
            false_positive_rate: DEFAULT_FALSE_POSITIVE_RATE,
            now: unix_now(),
            buffer: DEFAULT_BUFFER,
            staleness: StalenessPolicy::default(),
            capacity_floor: Some(DEFAULT_CAPACITY_FLOOR),
            ttl: DEFAULT_TTL,
            domain: None,
            version: 0,
            output: PathBuf::from(DEFAULT_OUTPUT),
            signature_validity: DEFAULT_SIGNATURE_VALIDITY,
        }
    }

    /// Checks the configuration before any file is touched.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let rate = self.false_positive_rate;
        if rate.is_nan() || rate <= 0.0 || rate >= 1.0 {
            return Err(ConfigError::FalsePositiveRate(rate));
        }
        if self.capacity_floor == Some(0) {
            return Err(ConfigError::CapacityFloor);
        }
        Ok(())
    }

    /// Returns the domain name for the `_filter` records.
    ///
    /// This is only asked for when the first record is assembled, so a run
    /// that produces no records does not need a domain name.
    pub fn domain(&self) -> Result<&str, ConfigError> {
        match self.domain.as_deref().map(str::trim_start) {
            Some(domain) if !domain.is_empty() => Ok(domain),
            _ => Err(ConfigError::MissingDomain),
        }
    }

    /// Returns the capacity of a filter for a bucket of the given size.
    pub fn filter_capacity(&self, bucket_size: usize) -> usize {
        match self.capacity_floor {
            Some(floor) => bucket_size.max(floor),
            None => bucket_size,
        }
    }
}

/// Parses a reference time.
///
/// The time is either given as `YYYY-MM-DD HH:MM:SS` in UTC or as seconds
/// since the Unix epoch.
pub fn parse_time(s: &str) -> Result<u32, ConfigError> {
    let s = s.trim();
    if !s.is_empty() && s.bytes().all(|ch| ch.is_ascii_digit()) {
        return s.parse().map_err(|_| ConfigError::BadTime(s.into()));
    }
    let format = format_description!(
        "[year]-[month]-[day] [hour]:[minute]:[second]"
    );
    PrimitiveDateTime::parse(s, format)
        .ok()
        .and_then(|time| {
            u32::try_from(time.assume_utc().unix_timestamp()).ok()
        })
        .ok_or_else(|| ConfigError::BadTime(s.into()))
}

/// Returns the current time as seconds since the Unix epoch.
///
/// Like the times in RRSIG records, the value is taken modulo 2^32.
pub fn unix_now() -> u32 {
    Timestamp::now().into_int()
}

//------------ ConfigError ---------------------------------------------------

/// The configuration is not usable.
#[derive(Clone, Debug, PartialEq)]
pub enum ConfigError {
    /// The false positive rate is not in the open interval (0, 1).
    FalsePositiveRate(f64),

    /// A capacity floor of zero was given.
    CapacityFloor,

    /// No domain name was given but a record needs one.
    MissingDomain,

    /// The domain name does not form valid owner names.
    BadDomain(String),

    /// An unknown filter algorithm was requested.
    UnknownAlgorithm(String),

    /// The reference time could not be parsed.
    BadTime(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::FalsePositiveRate(rate) => write!(
                f,
                "false positive rate must be greater than 0 and less \
                 than 1, got {}",
                rate
            ),
            ConfigError::CapacityFloor => {
                f.write_str("capacity floor must be greater than 0")
            }
            ConfigError::MissingDomain => f.write_str(
                "domain name (-d) is required for TXT record generation",
            ),
            ConfigError::BadDomain(domain) => {
                write!(f, "invalid domain name '{}'", domain)
            }
            ConfigError::UnknownAlgorithm(name) => {
                write!(f, "unknown filter algorithm '{}'", name)
            }
            ConfigError::BadTime(time) => write!(
                f,
                "invalid time '{}', use 'YYYY-MM-DD HH:MM:SS'",
                time
            ),
        }
    }
}

impl error::Error for ConfigError {}

//============ Testing =======================================================
