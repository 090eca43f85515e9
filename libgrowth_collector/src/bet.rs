//! Reader for the band-edge thermometry (BET) instrument.
//!
//! The instrument writes whitespace-delimited numeric tables into a folder
//! per data kind ("BET data", "ISP data"). File names carry a human-readable
//! timestamp, e.g. `BET 14.25.03 Friday, August 16, 2019.dat`, and each
//! record's time column is seconds relative to the file's creation instant.
//! Which files matter for a request is decided from the creation and
//! modification times.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, NaiveDateTime};
use fxhash::FxHashMap;

use super::catalog::{Location, NameCatalog};
use super::collector::CollectionRequest;
use super::datetime::seconds_between;
use super::diagnostics::Diagnostics;
use super::error::{BetError, CollectorError};
use super::source::SourceReader;
use super::time_series::TimeSeries;

/// Default location of the production data on the lab network share.
const DEFAULT_DATA_PATH: &str =
    r"\\insitu1.nexus.uwaterloo.ca\Documents\QNC MBE Data\Production Data";

#[derive(Debug, Clone)]
pub struct BetReader {
    data_path: PathBuf,
}

impl Default for BetReader {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DATA_PATH))
    }
}

impl BetReader {
    pub fn new(data_path: PathBuf) -> Self {
        Self { data_path }
    }
}

/// BET data files are named `BET ...` or `ISP ...` with a `.dat` suffix.
fn has_data_file_name(path: &Path) -> bool {
    let Some(basename) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    (basename.starts_with("BET") || basename.starts_with("ISP")) && basename.ends_with(".dat")
}

/// Creation and modification instants for a BET data file.
///
/// The filesystem creation time is the authoritative zero point for the
/// file's time column, but it can shift if the file was copied, so it is
/// cross-checked against the timestamp embedded in the file name. A
/// mismatch beyond tolerance (1 s, or 60 s for older names without a
/// seconds field) is a warning; the filesystem time is the fallback
/// either way.
fn file_times(path: &Path, diagnostics: &Diagnostics) -> Option<(NaiveDateTime, NaiveDateTime)> {
    let metadata = match path.metadata() {
        Ok(m) => m,
        Err(e) => {
            diagnostics.warn(format!("Could not stat BET file {path:?}: {e}"));
            return None;
        }
    };
    let mtime = metadata.modified().ok().map(system_time_to_naive)?;
    let ctime = metadata
        .created()
        .ok()
        .map(system_time_to_naive)
        .unwrap_or(mtime);

    let basename = path.file_name()?.to_str()?;
    match parse_filename_timestamp(basename) {
        Some((stamp, has_seconds)) => {
            let tolerance = if has_seconds { 1.0 } else { 60.0 };
            if seconds_between(stamp, ctime).abs() >= tolerance {
                diagnostics.warn(format!(
                    "Timestamp in BET file name {basename:?} disagrees with the filesystem \
                     creation time by more than {tolerance} s; using the filesystem time"
                ));
            }
        }
        None => {
            diagnostics.warn(format!(
                "Invalid or missing timestamp in BET file name {basename:?}; \
                 using the filesystem creation time"
            ));
        }
    }

    Some((ctime, mtime))
}

fn system_time_to_naive(t: std::time::SystemTime) -> NaiveDateTime {
    chrono::DateTime::<chrono::Local>::from(t).naive_local()
}

/// Parse the `HH.MM[.SS] <Weekday>, <Month> <DD>, <YYYY>.dat` tail of a BET
/// file name. Returns the instant and whether a seconds field was present.
fn parse_filename_timestamp(basename: &str) -> Option<(NaiveDateTime, bool)> {
    let stem = basename.strip_suffix(".dat")?;
    let tokens: Vec<&str> = stem.split_whitespace().collect();
    if tokens.len() < 5 {
        return None;
    }

    let year: i32 = tokens[tokens.len() - 1].parse().ok()?;
    let day: u32 = tokens[tokens.len() - 2].strip_suffix(',')?.parse().ok()?;
    let month = month_number(tokens[tokens.len() - 3])?;
    // tokens[len-4] is the weekday name; redundant, ignored.
    let clock = tokens[tokens.len() - 5];

    let parts: Vec<&str> = clock.split('.').collect();
    let (hour, minute, second, has_seconds) = match parts.as_slice() {
        [h, m] => (h.parse().ok()?, m.parse().ok()?, 0, false),
        [h, m, s] => (h.parse().ok()?, m.parse().ok()?, s.parse().ok()?, true),
        _ => return None,
    };

    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some((date.and_hms_opt(hour, minute, second)?, has_seconds))
}

fn month_number(name: &str) -> Option<u32> {
    match name {
        "January" => Some(1),
        "February" => Some(2),
        "March" => Some(3),
        "April" => Some(4),
        "May" => Some(5),
        "June" => Some(6),
        "July" => Some(7),
        "August" => Some(8),
        "September" => Some(9),
        "October" => Some(10),
        "November" => Some(11),
        "December" => Some(12),
        _ => None,
    }
}

/// Read a whitespace-delimited numeric table, skipping the single header
/// row. Rows that fail to parse as numbers are skipped with a warning.
fn read_table(path: &Path, diagnostics: &Diagnostics) -> std::io::Result<Vec<Vec<f64>>> {
    let contents = std::fs::read_to_string(path)?;
    let mut rows = Vec::new();
    for (i, line) in contents.lines().enumerate().skip(1) {
        if line.trim().is_empty() {
            continue;
        }
        let row: Option<Vec<f64>> = line
            .split_whitespace()
            .map(|tok| tok.parse::<f64>().ok())
            .collect();
        match row {
            Some(row) => rows.push(row),
            None => diagnostics.warn(format!(
                "Skipping unparseable line {} in BET file {path:?}",
                i + 1
            )),
        }
    }
    Ok(rows)
}

impl SourceReader for BetReader {
    fn location(&self) -> Location {
        Location::Bet
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

        let mut data: FxHashMap<String, TimeSeries> = FxHashMap::default();
        let mut folders: BTreeSet<String> = BTreeSet::new();
        for name in &request.names {
            let info = catalog.lookup(name)?;
            folders.insert(info.str_param("folder")?.to_string());
            data.insert(
                info.display_name.clone(),
                TimeSeries::new(info.display_name.clone(), info.units.clone(), request.start),
            );
        }

        for folder in &folders {
            let folder_path = self.data_path.join(folder);
            let listing = match folder_path.read_dir() {
                Ok(l) => l,
                Err(e) => {
                    diagnostics.warn(format!(
                        "Could not list BET folder {folder_path:?}: {e}; \
                         signals from this folder will be empty"
                    ));
                    continue;
                }
            };

            for item in listing {
                let path = item.map_err(BetError::from)?.path();
                if !has_data_file_name(&path) {
                    continue;
                }
                let Some((ctime, mtime)) = file_times(&path, diagnostics) else {
                    continue;
                };
                if request.start >= mtime || request.end <= ctime {
                    continue;
                }
                let rows = match read_table(&path, diagnostics) {
                    Ok(r) => r,
                    Err(e) => {
                        diagnostics.warn(format!("Could not read BET file {path:?}: {e}"));
                        continue;
                    }
                };

                for name in &request.names {
                    let info = catalog.lookup(name)?;
                    if info.str_param("folder")? != folder.as_str() {
                        continue;
                    }
                    let tcol = info.index_param("time_column")?;
                    let vcol = info.index_param("column")?;

                    let mut times = Vec::with_capacity(rows.len());
                    let mut values = Vec::with_capacity(rows.len());
                    let mut short_rows = 0usize;
                    for row in &rows {
                        match (row.get(tcol), row.get(vcol)) {
                            (Some(t), Some(v)) => {
                                times.push(*t);
                                values.push(*v);
                            }
                            _ => short_rows += 1,
                        }
                    }
                    if short_rows > 0 {
                        diagnostics.warn(format!(
                            "{short_rows} rows in {path:?} were too short for \
                             '{}' (columns {tcol}/{vcol})",
                            info.display_name
                        ));
                    }

                    let chunk = TimeSeries::with_data(
                        info.display_name.clone(),
                        info.units.clone(),
                        ctime,
                        times,
                        values,
                    )
                    .map_err(BetError::from)?;
                    if let Some(series) = data.get_mut(&info.display_name) {
                        series.append(&chunk).map_err(BetError::from)?;
                    }
                }
            }
        }

        for series in data.values_mut() {
            series.trim(request.start, request.end, false);
        }

        Ok(data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::NameCatalog;
    use crate::collector::CollectionRequest;
    use crate::datetime::format_epoch;

    #[test]
    fn test_has_data_file_name() {
        assert!(has_data_file_name(Path::new(
            "/data/BET 14.25.03 Friday, August 16, 2019.dat"
        )));
        assert!(has_data_file_name(Path::new("/data/ISP whatever.dat")));
        assert!(!has_data_file_name(Path::new("/data/notes.dat")));
        assert!(!has_data_file_name(Path::new("/data/BET notes.txt")));
    }

    #[test]
    fn test_timestamp_mismatch_warns_once_per_file() {
        let dir = tempfile::tempdir().unwrap();
        let folder = dir.path().join("BET data");
        std::fs::create_dir(&folder).unwrap();
        // The name claims 2019 but the file was just created, so the
        // cross-check fails and the filesystem time is used.
        std::fs::write(
            folder.join("BET 14.25.03 Friday, August 16, 2019.dat"),
            "time temp ratio emiss\n0.0 1.0 2.0 3.0\n",
        )
        .unwrap();

        let now = chrono::Local::now().naive_local();
        let request = CollectionRequest::new(
            now - chrono::Duration::hours(1),
            now + chrono::Duration::hours(1),
            vec!["BET temp".to_string()],
            None,
        )
        .unwrap();

        let sink = Diagnostics::default();
        let reader = BetReader::new(dir.path().to_path_buf());
        let data = reader
            .collect(&request, &NameCatalog::bundled().unwrap(), &sink)
            .unwrap();
        assert_eq!(data["BET temp"].len(), 1);

        let mismatch_warnings = sink
            .records()
            .iter()
            .filter(|d| d.message.contains("disagrees"))
            .count();
        assert_eq!(mismatch_warnings, 1);
    }

    #[test]
    fn test_parse_filename_timestamp_with_seconds() {
        let (stamp, has_seconds) =
            parse_filename_timestamp("BET 14.25.03 Friday, August 16, 2019.dat").unwrap();
        assert!(has_seconds);
        assert_eq!(format_epoch(stamp), "2019-08-16 14:25:03.000000");
    }

    #[test]
    fn test_parse_filename_timestamp_without_seconds() {
        let (stamp, has_seconds) =
            parse_filename_timestamp("ISP 09.05 Monday, January 06, 2020.dat").unwrap();
        assert!(!has_seconds);
        assert_eq!(format_epoch(stamp), "2020-01-06 09:05:00.000000");
    }

    #[test]
    fn test_parse_filename_timestamp_rejects_malformed() {
        assert!(parse_filename_timestamp("BET notes.dat").is_none());
        assert!(parse_filename_timestamp("BET 14.25.03 Friday, Augest 16, 2019.dat").is_none());
    }

    #[test]
    fn test_read_table_skips_bad_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("BET test.dat");
        std::fs::write(
            &path,
            "time temp ratio emiss\n0.0 1.0 2.0 3.0\nnot numbers here\n1.0 1.5 2.5 3.5\n",
        )
        .unwrap();

        let sink = Diagnostics::default();
        let rows = read_table(&path, &sink).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![1.0, 1.5, 2.5, 3.5]);
        assert_eq!(sink.records().len(), 1);
    }
}
