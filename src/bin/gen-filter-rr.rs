//! Generate filter records for the RRSIGs withdrawn between two snapshots.

use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

use bytes::Bytes;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use domain::base::Name;
use rrsig_filter::config::{
    parse_time, unix_now, Config, ConfigError, InputMode, StalenessPolicy,
    DEFAULT_BUFFER, DEFAULT_CAPACITY_FLOOR, DEFAULT_FALSE_POSITIVE_RATE,
    DEFAULT_OUTPUT, DEFAULT_SIGNATURE_VALIDITY, DEFAULT_TTL,
};
use rrsig_filter::filter::FilterAlgorithm;
use rrsig_filter::logging::init_logging;
use rrsig_filter::pipeline::{run, Report};
use tracing::error;

//------------ Args ----------------------------------------------------------

#[derive(Clone, Debug, Parser)]
#[command(
    name = "gen-filter-rr",
    disable_version_flag = true,
    about = "Generate filter records for RRSIGs withdrawn between two \
             zone snapshots",
    after_help = "Keys must be specified by their base name (usually
K<name>+<alg>+<id>), i.e. WITHOUT the .private extension. The DNSKEY
record is read from <base>.key.

Records are appended to the output file. A bucket that cannot be written
is skipped and the exit status is 1."
)]
struct Args {
    /// The older zone snapshot
    #[arg(value_name = "old zone")]
    old_zone: Option<PathBuf>,

    /// The newer zone snapshot
    #[arg(value_name = "new zone")]
    new_zone: Option<PathBuf>,

    /// Keys to sign the filter records with
    #[arg(value_name = "key")]
    keys: Vec<PathBuf>,

    /// Filter algorithm, use 'list' to show the possible algorithms
    #[arg(short = 'f', value_name = "algorithm", default_value = "bloom")]
    algorithm: String,

    /// False positive rate of the filters
    #[arg(
        short = 'p',
        value_name = "rate",
        default_value_t = DEFAULT_FALSE_POSITIVE_RATE
    )]
    false_positive_rate: f64,

    /// Reference time as 'YYYY-MM-DD HH:MM:SS' in UTC or Unix seconds
    /// [default: now]
    #[arg(short = 'c', value_name = "time", value_parser = parse_time)]
    now: Option<u32>,

    /// Safety margin before expiration in seconds
    #[arg(
        short = 'b',
        value_name = "secs",
        default_value_t = DEFAULT_BUFFER
    )]
    buffer: u32,

    /// TTL of the filter records
    #[arg(short = 't', value_name = "ttl", default_value_t = DEFAULT_TTL)]
    ttl: u32,

    /// Domain name the '_filter' records are placed under
    #[arg(short = 'd', value_name = "domain")]
    domain: Option<String>,

    /// Version written into the record header
    #[arg(short = 'v', value_name = "version", default_value_t = 0)]
    version: u32,

    /// File to append the records to
    #[arg(short = 'o', value_name = "file", default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Input files contain RRSIG records only
    #[arg(short = 'r')]
    rrsig_list: bool,

    /// Origin for relative names in the snapshots
    #[arg(long = "origin", value_name = "domain")]
    origin: Option<Name<Bytes>>,

    /// Which withdrawn signatures are checked for staleness
    #[arg(
        long = "staleness",
        value_name = "policy",
        default_value = "full",
        value_parser = ["full", "merge-only", "off"]
    )]
    staleness: String,

    /// Minimum capacity of every filter
    #[arg(
        long = "capacity-floor",
        value_name = "n",
        default_value_t = DEFAULT_CAPACITY_FLOOR,
        conflicts_with = "no_capacity_floor"
    )]
    capacity_floor: usize,

    /// Size every filter for exactly the signatures in it
    #[arg(long = "no-capacity-floor")]
    no_capacity_floor: bool,

    /// Validity period of signatures over the records in seconds
    #[arg(
        long = "sig-validity",
        value_name = "secs",
        default_value_t = DEFAULT_SIGNATURE_VALIDITY
    )]
    signature_validity: u32,

    /// Log more, can be given multiple times
    #[arg(short = 'V', action = ArgAction::Count)]
    verbose: u8,

    /// Log errors only
    #[arg(short = 'q', action = ArgAction::Count)]
    quiet: u8,
}

impl Args {
    fn verbosity(&self) -> i8 {
        let verbose = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let quiet = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        verbose.saturating_sub(quiet)
    }

    /// Converts the arguments into a configuration.
    fn into_config(self) -> Result<Config, ConfigError> {
        let algorithm = FilterAlgorithm::from_name(&self.algorithm)
            .ok_or(ConfigError::UnknownAlgorithm(self.algorithm))?;
        let (Some(old_zone), Some(new_zone)) =
            (self.old_zone, self.new_zone)
        else {
            Args::command()
                .error(
                    ErrorKind::MissingRequiredArgument,
                    "two zone files are required",
                )
                .exit()
        };
        let mut config = Config::new(old_zone, new_zone);
        config.key_bases = self.keys;
        config.algorithm = algorithm;
        config.false_positive_rate = self.false_positive_rate;
        config.now = self.now.unwrap_or_else(unix_now);
        config.buffer = self.buffer;
        config.ttl = self.ttl;
        config.domain = self.domain;
        config.version = self.version;
        config.output = self.output;
        if self.rrsig_list {
            config.input_mode = InputMode::RrsigList;
        }
        config.origin = self.origin;
        config.staleness = StalenessPolicy::from_name(&self.staleness)
            .unwrap_or_default();
        config.capacity_floor =
            (!self.no_capacity_floor).then_some(self.capacity_floor);
        config.signature_validity = self.signature_validity;
        Ok(config)
    }
}

//------------ main ----------------------------------------------------------

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbosity());

    if args.algorithm == "list" {
        return match FilterAlgorithm::write_list(io::stdout().lock()) {
            Ok(()) => ExitCode::SUCCESS,
            Err(_) => ExitCode::FAILURE,
        };
    }

    let config = match args.into_config() {
        Ok(config) => config,
        Err(err) => {
            error!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    match run(&config) {
        Ok(report) => {
            print_report(&config, &report);
            if report.is_complete() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn print_report(config: &Config, report: &Report) {
    println!(
        "Loaded {} RRSIGs from {}",
        report.old_signatures,
        config.old_zone.display()
    );
    println!(
        "Loaded {} RRSIGs from {}",
        report.new_signatures,
        config.new_zone.display()
    );
    println!("{} RRSIGs withdrawn", report.withdrawn);
    for bucket in &report.written {
        println!(
            "Wrote {} with {} entries to {}",
            bucket.owner,
            bucket.signatures,
            config.output.display()
        );
    }
    for bucket in &report.failed_buckets {
        println!("Failed to write filter for day {}", bucket.day);
    }
}
