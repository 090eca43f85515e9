//! Reader for the Molly process-control logger.
//!
//! Molly stores data in one-hour chunks, sorted by date, e.g.
//! `2019/08-Aug/16day-21hr-binary.txt` with a plaintext header
//! `2019/08-Aug/16day-21hr.txt` describing how to read it. A value is logged
//! only when it changes (checked roughly every 2 s): each change appends a
//! pair of little-endian f32s, the time it changed (as a fraction of the
//! day, relative to midnight of the bucket's date) and the value it changed
//! to. The header tells you, per signal, how many pairs that hour holds and
//! at which record offset they start.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use byteorder::{LittleEndian, ReadBytesExt};
use chrono::{Duration, NaiveDateTime};
use fxhash::FxHashMap;

use super::catalog::{Location, NameCatalog};
use super::collector::CollectionRequest;
use super::constants::{MOLLY_RECORD_SIZE, SECONDS_PER_DAY};
use super::datetime::{floor_hour, midnight_of, seconds_between};
use super::diagnostics::Diagnostics;
use super::error::{CollectorError, MollyError};
use super::source::SourceReader;
use super::time_series::TimeSeries;

/// Default location of the Molly data on the lab network share.
const DEFAULT_DATA_PATH: &str =
    r"\\insitu1.nexus.uwaterloo.ca\Documents\QNC MBE Data\Production Data\Molly data";

/// Record count and offset for one signal in one hour's header.
#[derive(Debug, Clone, Copy, Default)]
struct HeaderEntry {
    total_values: i64,
    values_offset: i64,
    found: bool,
}

#[derive(Debug, Clone)]
pub struct MollyReader {
    data_path: PathBuf,
}

impl Default for MollyReader {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DATA_PATH))
    }
}

impl MollyReader {
    pub fn new(data_path: PathBuf) -> Self {
        Self { data_path }
    }

    /// Header and binary paths for a given hour bucket.
    fn hour_paths(&self, hour: NaiveDateTime) -> (PathBuf, PathBuf) {
        let dir = self
            .data_path
            .join(hour.format("%Y").to_string())
            .join(hour.format("%m-%b").to_string());
        let header = dir.join(hour.format("%dday-%Hhr.txt").to_string());
        let binary = dir.join(hour.format("%dday-%Hhr-binary.txt").to_string());
        (header, binary)
    }

    /// Scan one hour's header file for the requested signals.
    ///
    /// `wanted` maps display name to Molly-internal name. A missing header
    /// file degrades the whole hour to zero records (None). A signal absent
    /// from the header yields zero records; a signal matched more than once
    /// is a data-integrity warning, last match wins.
    fn scan_header(
        &self,
        header_path: &Path,
        wanted: &[(String, String)],
        diagnostics: &Diagnostics,
    ) -> Option<FxHashMap<String, HeaderEntry>> {
        let file = match File::open(header_path) {
            Ok(f) => f,
            Err(_) => {
                diagnostics.warn(format!("Missing Molly header file {header_path:?}"));
                return None;
            }
        };

        let mut entries: FxHashMap<String, HeaderEntry> = wanted
            .iter()
            .map(|(display, _)| (display.clone(), HeaderEntry::default()))
            .collect();

        for line in BufReader::new(file).lines() {
            let line = match line {
                Ok(l) => l,
                Err(_) => {
                    diagnostics.warn(format!("Unreadable line in Molly header {header_path:?}"));
                    break;
                }
            };
            let Some(rest) = line.strip_prefix("DataItem=Name:") else {
                continue;
            };
            for (display, local_name) in wanted {
                if !rest.starts_with(local_name.as_str()) {
                    continue;
                }
                let Some((count, offset)) = parse_header_counts(rest) else {
                    continue;
                };
                let entry = entries.entry(display.clone()).or_default();
                if entry.found {
                    diagnostics.warn(format!(
                        "Duplicate Molly header entries for '{display}' in {header_path:?}; using the last one"
                    ));
                }
                entry.total_values = count;
                entry.values_offset = offset;
                entry.found = true;
            }
        }

        for (display, entry) in &entries {
            if !entry.found {
                diagnostics.warn(format!(
                    "Could not find value '{display}' in Molly header {header_path:?}"
                ));
            }
        }

        Some(entries)
    }

    /// Read the change records for the requested signals from a single hour
    /// bucket. Every returned series is anchored at midnight of the bucket's
    /// date, since Molly times are day fractions.
    fn read_hour(
        &self,
        hour: NaiveDateTime,
        signals: &[(String, String, String)],
        diagnostics: &Diagnostics,
    ) -> FxHashMap<String, TimeSeries> {
        let (header_path, binary_path) = self.hour_paths(hour);
        let epoch = midnight_of(hour);

        let mut data: FxHashMap<String, TimeSeries> = signals
            .iter()
            .map(|(display, units, _)| {
                (display.clone(), TimeSeries::new(display.clone(), units.clone(), epoch))
            })
            .collect();

        let wanted: Vec<(String, String)> = signals
            .iter()
            .map(|(display, _, local)| (display.clone(), local.clone()))
            .collect();

        let Some(entries) = self.scan_header(&header_path, &wanted, diagnostics) else {
            return data;
        };

        let mut binary = match File::open(&binary_path) {
            Ok(f) => f,
            Err(_) => {
                diagnostics.warn(format!("Missing Molly binary file {binary_path:?}"));
                return data;
            }
        };

        for (display, _, _) in signals {
            let entry = entries.get(display).copied().unwrap_or_default();
            if !entry.found {
                continue;
            }
            if entry.total_values < 0 || entry.values_offset < 0 {
                diagnostics.error(format!(
                    "Invalid TotalValues/ValueOffset for '{display}' in {header_path:?} \
                     ({}/{}); dropping this hour",
                    entry.total_values, entry.values_offset
                ));
                continue;
            }

            match read_records(&mut binary, entry.values_offset as u64, entry.total_values as u64) {
                Ok((times, values)) => {
                    if let Some(series) = data.get_mut(display) {
                        // Lengths match by construction.
                        let _ = series.set_data(times, values);
                    }
                }
                Err(e) => {
                    diagnostics.error(format!(
                        "Failed to read {} records for '{display}' from {binary_path:?}: {e}; \
                         dropping this hour",
                        entry.total_values
                    ));
                }
            }
        }

        data
    }
}

/// Extract `TotalValues` and `ValueOffset` from a header line remainder,
/// e.g. `Al1.PID.Base.Input;...TotalValues:123;ValueOffset:4096`.
fn parse_header_counts(rest: &str) -> Option<(i64, i64)> {
    let count = field_after(rest, "TotalValues:")?;
    let offset = field_after(rest, "ValueOffset:")?;
    Some((count, offset))
}

fn field_after(text: &str, tag: &str) -> Option<i64> {
    let start = text.find(tag)? + tag.len();
    let rest = &text[start..];
    let end = rest
        .find(|c: char| c != '-' && !c.is_ascii_digit())
        .unwrap_or(rest.len());
    rest[..end].parse().ok()
}

/// Read `count` (day-fraction, value) f32 pairs starting at record `offset`.
/// The file begins with one reserved record, hence the +1.
fn read_records(
    binary: &mut File,
    offset: u64,
    count: u64,
) -> std::io::Result<(Vec<f64>, Vec<f64>)> {
    binary.seek(SeekFrom::Start((offset + 1) * MOLLY_RECORD_SIZE))?;
    let mut reader = BufReader::new(binary);
    let mut times = Vec::with_capacity(count as usize);
    let mut values = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let day_fraction = reader.read_f32::<LittleEndian>()?;
        let value = reader.read_f32::<LittleEndian>()?;
        times.push(day_fraction as f64 * SECONDS_PER_DAY);
        values.push(value as f64);
    }
    Ok((times, values))
}

impl SourceReader for MollyReader {
    fn location(&self) -> Location {
        Location::Molly
    }

    fn data_path(&self) -> &Path {
        &self.data_path
    }

    fn collect(
        &self,
        request: &CollectionRequest,
        catalog: &NameCatalog,
        diagnostics: &Diagnostics,
    ) -> Result<FxHashMap<String, TimeSeries>, CollectorError> {
        if request.names.is_empty() {
            return Ok(FxHashMap::default());
        }

        // (display name, units, Molly-internal name) per requested signal.
        let mut signals = Vec::with_capacity(request.names.len());
        for name in &request.names {
            let info = catalog.lookup(name)?;
            let local = info.str_param("local_name")?.to_string();
            signals.push((info.display_name.clone(), info.units.clone(), local));
        }

        let mut data: FxHashMap<String, TimeSeries> = signals
            .iter()
            .map(|(display, units, _)| {
                (
                    display.clone(),
                    TimeSeries::new(display.clone(), units.clone(), request.start),
                )
            })
            .collect();

        // One-hour buffer on each side. A value's last-change record can
        // land in an adjacent hour bucket relative to where it takes
        // effect: a change at 01:59:57 may be in the 02:00 file, and a
        // value unchanged for a long time may appear in a later file with a
        // negative time. Empirically the buffer makes the window safe.
        let mut hour = floor_hour(request.start) - Duration::hours(1);
        let last_hour = floor_hour(request.end) + Duration::hours(1);

        while hour <= last_hour {
            let data_hour = self.read_hour(hour, &signals, diagnostics);
            for (display, series_hour) in &data_hour {
                if let Some(series) = data.get_mut(display) {
                    series.append(series_hour).map_err(MollyError::from)?;
                }
            }
            hour += Duration::hours(1);
        }

        // Clip to the requested window, synthesizing boundary samples so
        // stepped data has defined values at both ends, then resample onto
        // the fixed grid if one was requested.
        for series in data.values_mut() {
            series.trim(request.start, request.end, true);
            if let Some(dt) = request.resample_dt {
                *series = series.step_interpolate(&resample_grid(request, dt), false);
            }
        }

        Ok(data)
    }
}

/// Fixed query grid `0, dt, 2dt, ...` covering the request window. The
/// small buffer keeps the final point from being lost to rounding.
pub(crate) fn resample_grid(request: &CollectionRequest, dt: f64) -> Vec<f64> {
    let total = seconds_between(request.end, request.start);
    let mut grid = Vec::new();
    let mut t = 0.0;
    let mut i: u64 = 0;
    while t <= total + 1e-3 * dt {
        grid.push(t);
        i += 1;
        t = i as f64 * dt;
    }
    grid
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_header_counts() {
        let rest = "Al1.PID.Base.Input;Units:degC;TotalValues:123;ValueOffset:4096";
        assert_eq!(parse_header_counts(rest), Some((123, 4096)));
    }

    #[test]
    fn test_parse_header_counts_negative() {
        let rest = "X;TotalValues:-1;ValueOffset:-1";
        assert_eq!(parse_header_counts(rest), Some((-1, -1)));
    }

    #[test]
    fn test_parse_header_counts_missing_fields() {
        assert_eq!(parse_header_counts("X;Units:degC"), None);
    }

    #[test]
    fn test_hour_paths_layout() {
        let reader = MollyReader::new(PathBuf::from("/data/molly"));
        let hour = crate::datetime::parse_datetime_str("2019-08-16 21:00:00").unwrap();
        let (header, binary) = reader.hour_paths(hour);
        assert_eq!(header, PathBuf::from("/data/molly/2019/08-Aug/16day-21hr.txt"));
        assert_eq!(
            binary,
            PathBuf::from("/data/molly/2019/08-Aug/16day-21hr-binary.txt")
        );
    }
}
