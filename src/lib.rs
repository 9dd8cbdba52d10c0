//! Publishing withdrawn DNSSEC signatures as probabilistic filters.
//!
//! When a zone is re-signed, validating resolvers may still hold the old
//! RRSIG records in their caches until those expire. This crate compares
//! two snapshots of a zone, finds the signatures that were withdrawn while
//! still having a long remaining lifetime, and publishes them as Bloom
//! filters in TXT records, one record per day of expiration. A resolver can
//! then check a cached signature against the filter for its expiration day.
//!
//! # Modules
//!
//! The work of a run is split into a chain of steps, each in its own
//! module:
//!
//! * [load] reads the RRSIG records of a snapshot,
//! * [diff] finds the signatures of the older snapshot that are missing
//!   from the newer one,
//! * [bucket] groups them by day of expiration,
//! * [build] creates a [filter] for each group,
//! * [record] turns each filter into a TXT record, and
//! * [sign] signs the record with the [keys] given.
//!
//! [pipeline] ties the steps together as configured by a [config::Config].
//! The `gen-filter-rr` binary provides a command line interface for it.

pub mod bucket;
pub mod build;
pub mod config;
pub mod diff;
pub mod error;
pub mod filter;
pub mod keys;
pub mod load;
pub mod logging;
pub mod pipeline;
pub mod record;
pub mod sign;
pub mod signature;
