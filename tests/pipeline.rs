use std::fs;
use std::path::{Path, PathBuf};

use domain::base::name::ToName;
use domain::rdata::ZoneRecordData;
use domain::zonefile::inplace::{Entry, Zonefile};
use rstest::rstest;
use tempfile::TempDir;

use rrsig_filter::config::{Config, ConfigError, InputMode};
use rrsig_filter::error::{AssembleError, BucketError, Error};
use rrsig_filter::load::load_signatures;
use rrsig_filter::pipeline::run;
use rrsig_filter::record::FilterPayload;
use rrsig_filter::signature::Signature;

// 2024-03-01 00:00:00 UTC
const NOW: u32 = 1_709_251_200;

const OLD_ZONE: &str = "test-data/old.zone";
const NEW_ZONE: &str = "test-data/new.zone";
const KEY: &str = "test-data/Kexample.com.+015+58797";

fn config(
    dir: &TempDir,
    old: impl Into<PathBuf>,
    new: impl Into<PathBuf>,
) -> Config {
    let mut config = Config::new(old, new);
    config.now = NOW;
    config.domain = Some("example.com".into());
    config.output = dir.path().join("filter.txt");
    config
}

fn signatures(path: &str) -> Vec<Signature> {
    load_signatures(Path::new(path), InputMode::Zone, None)
        .unwrap()
        .signatures
}

fn find<'a>(sigs: &'a [Signature], owner: &str) -> &'a Signature {
    sigs.iter()
        .find(|sig| sig.owner().to_string() == owner)
        .unwrap()
}

/// Parses the TXT records of an output file.
///
/// Returns the owner and the parsed payload of each record.
fn read_output(path: &Path) -> Vec<(String, FilterPayload)> {
    let data = fs::read(path).unwrap();
    let mut zonefile = Zonefile::load(&mut data.as_slice()).unwrap();
    let mut res = Vec::new();
    while let Some(entry) = zonefile.next_entry().unwrap() {
        let Entry::Record(record) = entry else {
            continue;
        };
        let owner = record.owner().to_name::<Vec<u8>>().to_string();
        if let ZoneRecordData::Txt(txt) = record.into_data() {
            let payload: Vec<u8> = txt.iter().flatten().copied().collect();
            res.push((owner, FilterPayload::parse(&payload).unwrap()));
        }
    }
    res
}

#[test]
fn withdrawn_signatures_are_published() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, OLD_ZONE, NEW_ZONE);
    let report = run(&config).unwrap();

    assert_eq!(report.old_signatures, 5);
    assert_eq!(report.new_signatures, 4);
    // The ftp signature expires within the buffer.
    assert_eq!(report.withdrawn, 2);
    assert!(report.failed_buckets.is_empty());

    let records = read_output(&config.output);
    let owners: Vec<_> = records.iter().map(|(owner, _)| owner).collect();
    assert_eq!(
        owners,
        ["_filter.20240315.example.com", "_filter.20240320.example.com"]
    );

    let old = signatures(OLD_ZONE);
    let www = find(&old, "www.example.com");
    let mail = find(&old, "mail.example.com");
    let ftp = find(&old, "ftp.example.com");

    let (_, first) = &records[0];
    assert_eq!(first.header.version, 0);
    assert_eq!(first.header.time.hour(), 12);
    assert_eq!(first.filter.capacity(), 1000);
    assert!(first.filter.contains(&www.to_wire()));
    assert!(!first.filter.contains(&ftp.to_wire()));

    let (_, second) = &records[1];
    assert_eq!(second.header.time.hour(), 0);
    assert!(second.filter.contains(&mail.to_wire()));
    assert!(!second.filter.contains(&www.to_wire()));
}

#[test]
fn output_is_appended() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, OLD_ZONE, NEW_ZONE);
    fs::write(&config.output, "; existing content\n").unwrap();
    run(&config).unwrap();
    run(&config).unwrap();

    let text = fs::read_to_string(&config.output).unwrap();
    assert!(text.starts_with("; existing content\n"));
    assert_eq!(read_output(&config.output).len(), 4);
}

// Two signatures expiring one and two days from now, none in the newer
// snapshot, no buffer.
#[test]
fn everything_withdrawn() {
    let dir = tempfile::tempdir().unwrap();
    let old = dir.path().join("old.zone");
    fs::write(
        &old,
        "a.example.com. 3600 IN RRSIG A 15 3 3600 20240302060000 \
         20240201000000 1 example.com. YWFhYQ==\n\
         b.example.com. 3600 IN RRSIG A 15 3 3600 20240303060000 \
         20240201000000 1 example.com. YmJiYg==\n",
    )
    .unwrap();
    let new = dir.path().join("new.zone");
    fs::write(&new, "").unwrap();

    let mut config = config(&dir, old, new);
    config.buffer = 0;
    let report = run(&config).unwrap();
    assert_eq!(report.withdrawn, 2);
    assert_eq!(report.written.len(), 2);
    assert_eq!(report.written[0].day + 1, report.written[1].day);

    let records = read_output(&config.output);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].0, "_filter.20240302.example.com");
    assert_eq!(records[1].0, "_filter.20240303.example.com");
    for (_, payload) in &records {
        assert_eq!(payload.header.time.hour(), 6);
    }
}

#[test]
fn identical_snapshots() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, OLD_ZONE, OLD_ZONE);
    // A run without records does not need a domain name.
    config.domain = None;
    let report = run(&config).unwrap();
    assert_eq!(report.withdrawn, 0);
    assert!(report.written.is_empty());
    assert!(!config.output.exists());
}

#[rstest]
#[case(0.0)]
#[case(-0.1)]
#[case(1.5)]
fn bad_false_positive_rate_fails_before_reading(#[case] rate: f64) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, "missing-old.zone", "missing-new.zone");
    config.false_positive_rate = rate;
    let err = run(&config).unwrap_err();
    assert!(matches!(
        err,
        Error::Config(ConfigError::FalsePositiveRate(_))
    ));
    assert!(!config.output.exists());
}

#[test]
fn missing_domain() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, OLD_ZONE, NEW_ZONE);
    config.domain = Some("  ".into());
    let err = run(&config).unwrap_err();
    assert!(matches!(err, Error::Config(ConfigError::MissingDomain)));
    assert!(!config.output.exists());
}

// A bucket too large for a TXT record is skipped, the others are written.
#[test]
fn oversized_bucket_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let mut zone = String::new();
    for i in 0..400 {
        zone.push_str(&format!(
            "a{}.example.com. 3600 IN RRSIG A 15 3 3600 20240310000000 \
             20240201000000 1 example.com. YWFhYQ==\n",
            i
        ));
    }
    zone.push_str(
        "b.example.com. 3600 IN RRSIG A 15 3 3600 20240312000000 \
         20240201000000 1 example.com. YmJiYg==\n",
    );
    let old = dir.path().join("old.zone");
    fs::write(&old, zone).unwrap();
    let new = dir.path().join("new.zone");
    fs::write(&new, "").unwrap();

    let mut config = config(&dir, old, new);
    config.capacity_floor = None;
    config.false_positive_rate = 1e-300;
    let report = run(&config).unwrap();
    assert_eq!(report.withdrawn, 401);
    assert!(!report.is_complete());

    // 2024-03-10
    assert_eq!(report.failed_buckets.len(), 1);
    assert_eq!(report.failed_buckets[0].day, 19_792);
    assert!(matches!(
        report.failed_buckets[0].error,
        BucketError::Assemble(AssembleError::LongRecordData(_))
    ));

    assert_eq!(report.written.len(), 1);
    assert_eq!(report.written[0].signatures, 1);
    let records = read_output(&config.output);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, "_filter.20240312.example.com");
}

#[test]
fn missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(&dir, OLD_ZONE, "test-data/missing.zone");
    let err = run(&config).unwrap_err();
    assert!(matches!(err, Error::InputOpen { .. }));
}

#[test]
fn signed_records() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, OLD_ZONE, NEW_ZONE);
    config.key_bases = vec![KEY.into()];
    let report = run(&config).unwrap();
    assert_eq!(report.written.len(), 2);
    assert!(report.written.iter().all(|bucket| bucket.rrsigs == 1));

    let text = fs::read_to_string(&config.output).unwrap();
    let lines: Vec<_> = text.lines().collect();
    assert_eq!(lines.len(), 4);
    for pair in lines.chunks(2) {
        let owner = pair[0].split(' ').next().unwrap();
        assert!(pair[0].contains(" IN TXT "));
        assert!(pair[1].starts_with(owner));
        assert!(pair[1].contains(" IN RRSIG TXT "));
        assert!(pair[1].contains(" 58797 example.com. "));
    }
}

#[test]
fn missing_key() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(&dir, OLD_ZONE, NEW_ZONE);
    config.key_bases = vec!["test-data/Kexample.com.+015+00000".into()];
    let err = run(&config).unwrap_err();
    assert!(matches!(err, Error::KeyLoad { .. }));
    assert!(!config.output.exists());
}
