//! # growth_collector
//!
//! growth_collector gathers time-dependent data from the QNC-MBE lab's three
//! in-situ measurement subsystems into a uniform time-series format. The lab
//! systems log independently, each with its own clock convention and file
//! layout:
//!
//! - **Molly**, the process-control software, logs a value only when it
//!   changes, as binary hour buckets with plaintext index headers.
//! - **BET**, the band-edge thermometry instrument, writes whitespace text
//!   tables whose time column is relative to each file's creation instant.
//! - **SVT**, the reflectometry system, writes run folders of text files
//!   whose time column is a day fraction relative to an unrecorded midnight.
//!
//! Given a wall-clock window and a list of signal names, the collector reads
//! whichever files cover the window, reconciles the three time conventions
//! onto one epoch, and returns one [`TimeSeries`](time_series::TimeSeries)
//! per signal, optionally cached on disk so repeated analyses of the same
//! growth skip the network shares.
//!
//! ## Installation
//!
//! Install the CLI from source with
//! `cargo install --path ./growth_collector_cli` from the top level
//! growth_collector repository. The binary is installed to your cargo
//! install location (typically `~/.cargo/bin/`).
//!
//! ## Configuration
//!
//! Collection jobs are described by a YAML configuration file:
//!
//! ```yml
//! molly_path: null
//! bet_path: null
//! svt_path: null
//! registry_path: null
//! cache_dir: null
//! output_dir: ./collected
//! start_time: '2019-08-16 01:30'
//! end_time: '2019-08-16 04:30'
//! names:
//! - Al1 base measured
//! - BET temp
//! resample_dt: 2.0
//! force_reload: false
//! ```
//!
//! The three `*_path` fields default to the lab network shares when `null`.
//! `registry_path` points at a signal registry CSV; `null` uses the registry
//! bundled with the code base. `cache_dir` set to `null` disables the
//! on-disk cache. `resample_dt` resamples change-triggered (Molly) signals
//! onto a fixed grid with the given spacing in seconds; `null` keeps the raw
//! change records.
//!
//! ### Signal Registry Format
//!
//! The registry is a semicolon-delimited CSV with the columns
//!
//! ```csv
//! name;location;sublocation;parameters;units
//! ```
//!
//! `location` is one of `Molly`, `BET`, or `SVT`. `parameters` is a
//! comma-separated list of `key=value` pairs whose keys depend on the
//! location (`local_name` for Molly; `folder`, `time_column`, `column` for
//! BET; `filename`, `time_column`, `column` for SVT). Signal names are
//! matched case-insensitively, treating runs of punctuation and whitespace
//! as equivalent.
//!
//! ## Output
//!
//! Each collected signal is written to `<name>.dat`: a two-line header
//! recording the epoch and the signal label, then one `time,value` pair per
//! line in full-precision scientific notation.
//!
//! ```text
//! # (time=0 at: 2019-08-16 01:30:00.000000)
//! # time (s), Al1 base measured (degC)
//! 0.000000000000000000e0,5.213000106811523438e2
//! ```

pub mod bet;
pub mod cache;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod constants;
pub mod datetime;
pub mod diagnostics;
pub mod error;
pub mod molly;
pub mod source;
pub mod svt;
pub mod time_series;
