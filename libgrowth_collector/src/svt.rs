//! Reader for the SVT in-situ reflectometry system.
//!
//! Each run of the SVT software produces a folder of whitespace-delimited
//! text files (`<prefix>Engine 1.txt`, `<prefix>IS4K Temp.txt`,
//! `<prefix>IS4K Refl.txt`) whose time column is a fraction of a day
//! relative to midnight of an unrecorded date. The date is recovered from
//! the engine file's filesystem creation time and memoized in a
//! `time_info.txt` sidecar so later collections skip the full data read.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use fxhash::FxHashMap;

use super::catalog::{Location, NameCatalog};
use super::collector::CollectionRequest;
use super::constants::{DAY_AMBIGUITY_LIMIT, EPOCH_FORMAT, SECONDS_PER_DAY, SIDECAR_MAGIC};
use super::datetime::{midnight_of, offset_by_seconds, parse_epoch, seconds_between};
use super::diagnostics::Diagnostics;
use super::error::{CollectorError, SvtError};
use super::source::SourceReader;
use super::time_series::TimeSeries;

/// Default location of the SVT software's output on the lab network share.
const DEFAULT_DATA_PATH: &str = r"\\zw-xp1\QNC_MBE_Data";

const SIDECAR_NAME: &str = "time_info.txt";
const ENGINE_SUFFIX: &str = "Engine 1.txt";
const TEMP_SUFFIX: &str = "IS4K Temp.txt";
const REFL_SUFFIX: &str = "IS4K Refl.txt";

/// Absolute time span of one run folder: the zero point of its time column
/// plus the instants of its first and last samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunTimeInfo {
    pub zero_time: NaiveDateTime,
    pub data_start: NaiveDateTime,
    pub data_end: NaiveDateTime,
}

#[derive(Debug, Clone)]
pub struct SvtReader {
    data_path: PathBuf,
}

impl Default for SvtReader {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_DATA_PATH))
    }
}

impl SvtReader {
    pub fn new(data_path: PathBuf) -> Self {
        Self { data_path }
    }

    /// Time span of a run folder, from the sidecar when present and valid,
    /// recomputed (and the sidecar rewritten) otherwise.
    fn folder_time_info(
        &self,
        folder: &Path,
        diagnostics: &Diagnostics,
    ) -> Result<RunTimeInfo, SvtError> {
        if let Some(info) = read_sidecar(&folder.join(SIDECAR_NAME)) {
            return Ok(info);
        }

        let info = self.recompute_time_info(folder)?;
        if let Err(e) = write_sidecar(&folder.join(SIDECAR_NAME), folder, &info) {
            diagnostics.warn(format!(
                "Could not write SVT time sidecar in {folder:?}: {e}; \
                 the time span will be recomputed on the next collection"
            ));
        }
        Ok(info)
    }

    /// Recover a run folder's absolute time span from its engine file.
    ///
    /// The data gives times relative to an unrecorded midnight; the engine
    /// file's filesystem creation time pins down which midnight.
    fn recompute_time_info(&self, folder: &Path) -> Result<RunTimeInfo, SvtError> {
        let engine_path = find_file_with_suffix(folder, ENGINE_SUFFIX)
            .ok_or_else(|| SvtError::NoEngineFile(folder.to_path_buf()))?;

        let day_fractions = read_data_columns(&engine_path, &[0])?;
        let first = day_fractions
            .first()
            .ok_or_else(|| SvtError::EmptyRun(folder.to_path_buf()))?[0];
        let last = day_fractions[day_fractions.len() - 1][0];

        let creation_time = engine_file_creation_time(&engine_path)?;
        let zero_time = resolve_zero_day(first * SECONDS_PER_DAY, creation_time);

        Ok(RunTimeInfo {
            zero_time,
            data_start: offset_by_seconds(zero_time, first * SECONDS_PER_DAY),
            data_end: offset_by_seconds(zero_time, last * SECONDS_PER_DAY),
        })
    }
}

fn engine_file_creation_time(path: &Path) -> Result<NaiveDateTime, SvtError> {
    let metadata = path.metadata()?;
    let system_time = metadata.created().or_else(|_| metadata.modified())?;
    Ok(chrono::DateTime::<chrono::Local>::from(system_time).naive_local())
}

/// Pick the midnight that anchors a run's time column.
///
/// `first_sample` is the first data time in seconds-past-midnight;
/// `creation_time` is when the engine file appeared on disk. The midnight of
/// the creation date is the natural candidate, but a run that straddles
/// midnight can be created on the wrong side; shift by whole days until the
/// first sample lands within half a day of the creation instant.
pub fn resolve_zero_day(first_sample: f64, creation_time: NaiveDateTime) -> NaiveDateTime {
    let mut zero = midnight_of(creation_time);
    loop {
        let diff = seconds_between(offset_by_seconds(zero, first_sample), creation_time);
        if diff.abs() <= DAY_AMBIGUITY_LIMIT {
            return zero;
        }
        zero -= Duration::seconds(diff.signum() as i64 * SECONDS_PER_DAY as i64);
    }
}

/// Parse a `time_info.txt` sidecar. Returns None on any structural problem
/// so the caller falls back to recomputation.
fn read_sidecar(path: &Path) -> Option<RunTimeInfo> {
    let file = File::open(path).ok()?;
    let mut lines = BufReader::new(file).lines();

    let magic = lines.next()?.ok()?;
    if magic != SIDECAR_MAGIC {
        return None;
    }
    let parent = lines.next()?.ok()?;
    if !parent.starts_with("Parent folder = ") {
        return None;
    }

    let mut stamps = [NaiveDateTime::MIN; 3];
    for stamp in &mut stamps {
        let line = lines.next()?.ok()?;
        let text = line.rsplit(" = ").next()?;
        *stamp = parse_epoch(text).ok()?;
    }

    Some(RunTimeInfo {
        zero_time: stamps[0],
        data_start: stamps[1],
        data_end: stamps[2],
    })
}

fn write_sidecar(path: &Path, folder: &Path, info: &RunTimeInfo) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    writeln!(file, "{SIDECAR_MAGIC}")?;
    writeln!(file, "Parent folder = \"{}\"", folder.display())?;
    writeln!(file, "Zero_time = {}", info.zero_time.format(EPOCH_FORMAT))?;
    writeln!(
        file,
        "Data_start_time = {}",
        info.data_start.format(EPOCH_FORMAT)
    )?;
    write!(file, "Data_end_time = {}", info.data_end.format(EPOCH_FORMAT))?;
    Ok(())
}

/// Is this folder a run folder? Either it carries a sidecar, or it holds all
/// three SVT output files.
fn is_run_folder(folder: &Path) -> bool {
    if folder.join(SIDECAR_NAME).exists() {
        return true;
    }

    let Ok(listing) = folder.read_dir() else {
        return false;
    };
    let (mut engine, mut temp, mut refl) = (false, false, false);
    for item in listing.flatten() {
        if let Some(name) = item.file_name().to_str() {
            engine |= name.ends_with(ENGINE_SUFFIX);
            temp |= name.ends_with(TEMP_SUFFIX);
            refl |= name.ends_with(REFL_SUFFIX);
        }
    }
    engine && temp && refl
}

fn find_file_with_suffix(folder: &Path, suffix: &str) -> Option<PathBuf> {
    for item in folder.read_dir().ok()?.flatten() {
        let name = item.file_name();
        if name.to_str().is_some_and(|n| n.ends_with(suffix)) {
            return Some(folder.join(name));
        }
    }
    None
}

/// Read the selected columns from an SVT data file, following continuation
/// files. Lines that do not parse (headers, partial writes) are skipped.
///
/// The SVT software rolls over to an incremented file name when a file grows
/// too long (`...Refl.txt` continues in `...Refm.txt`), so increments are
/// followed transitively.
fn read_data_columns(path: &Path, cols: &[usize]) -> Result<Vec<Vec<f64>>, SvtError> {
    let mut rows = Vec::new();
    let mut current = path.to_path_buf();
    loop {
        let file = File::open(&current)?;
        for line in BufReader::new(file).lines() {
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            let row: Option<Vec<f64>> = cols
                .iter()
                .map(|&i| fields.get(i).and_then(|f| f.parse::<f64>().ok()))
                .collect();
            if let Some(row) = row {
                rows.push(row);
            }
        }

        match increment_filename(&current) {
            Some(next) if next.exists() => current = next,
            _ => break,
        }
    }
    Ok(rows)
}

/// Next continuation file name: the character before `.txt` advances by one
/// (`Refl` then `Refm` then `Refn`).
fn increment_filename(path: &Path) -> Option<PathBuf> {
    let name = path.file_name()?.to_str()?;
    let stem = name.strip_suffix(".txt")?;
    let last = stem.chars().last()?;
    let mut next = String::with_capacity(name.len());
    next.push_str(&stem[..stem.len() - last.len_utf8()]);
    next.push(char::from_u32(last as u32 + 1)?);
    next.push_str(".txt");
    Some(path.with_file_name(next))
}

impl SourceReader for SvtReader {
    fn location(&self) -> Location {
        Location::Svt
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
        for name in &request.names {
            let info = catalog.lookup(name)?;
            data.insert(
                info.display_name.clone(),
                TimeSeries::new(info.display_name.clone(), info.units.clone(), request.start),
            );
        }

        let listing = match self.data_path.read_dir() {
            Ok(l) => l,
            Err(e) => {
                diagnostics.error(format!(
                    "Could not list the SVT data root {:?}: {e}; every SVT signal will be empty",
                    self.data_path
                ));
                return Ok(data);
            }
        };
        for item in listing {
            let folder = item.map_err(SvtError::from)?.path();
            if !is_run_folder(&folder) {
                continue;
            }

            let info = match self.folder_time_info(&folder, diagnostics) {
                Ok(i) => i,
                Err(e) => {
                    diagnostics.warn(format!(
                        "Could not determine the time span of SVT folder {folder:?}: {e}; skipping it"
                    ));
                    continue;
                }
            };
            if request.end < info.data_start || request.start > info.data_end {
                continue;
            }

            for name in &request.names {
                let signal = catalog.lookup(name)?;
                let suffix = signal.str_param("filename")?;
                let tcol = signal.index_param("time_column")?;
                let vcol = signal.index_param("column")?;

                let Some(path) = find_file_with_suffix(&folder, suffix) else {
                    diagnostics.warn(format!(
                        "No '{suffix}' file in SVT folder {folder:?} for '{}'",
                        signal.display_name
                    ));
                    continue;
                };
                let rows = match read_data_columns(&path, &[tcol, vcol]) {
                    Ok(r) => r,
                    Err(e) => {
                        diagnostics.warn(format!("Could not read SVT file {path:?}: {e}"));
                        continue;
                    }
                };

                let times = rows.iter().map(|r| r[0] * SECONDS_PER_DAY).collect();
                let values = rows.iter().map(|r| r[1]).collect();
                let chunk = TimeSeries::with_data(
                    signal.display_name.clone(),
                    signal.units.clone(),
                    info.zero_time,
                    times,
                    values,
                )
                .map_err(SvtError::from)?;
                if let Some(series) = data.get_mut(&signal.display_name) {
                    series.append(&chunk).map_err(SvtError::from)?;
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
    use crate::datetime::parse_datetime_str;

    #[test]
    fn test_resolve_zero_day_same_day() {
        let created = parse_datetime_str("2019-08-16 14:00:00").unwrap();
        // First sample at 13:59:30 seconds-past-midnight of the same day.
        let zero = resolve_zero_day(50370.0, created);
        assert_eq!(zero, parse_datetime_str("2019-08-16 00:00:00").unwrap());
    }

    #[test]
    fn test_resolve_zero_day_run_straddling_midnight() {
        // File created shortly after midnight; first sample late the
        // previous evening. The candidate midnight must shift back a day.
        let created = parse_datetime_str("2019-08-17 00:10:00").unwrap();
        let zero = resolve_zero_day(23.5 * 3600.0, created);
        assert_eq!(zero, parse_datetime_str("2019-08-16 00:00:00").unwrap());
    }

    #[test]
    fn test_increment_filename() {
        let next = increment_filename(Path::new("/runs/G0123_IS4K Refl.txt")).unwrap();
        assert_eq!(next, PathBuf::from("/runs/G0123_IS4K Refm.txt"));
    }

    #[test]
    fn test_sidecar_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join(SIDECAR_NAME);
        let info = RunTimeInfo {
            zero_time: parse_datetime_str("2019-08-16 00:00:00").unwrap(),
            data_start: parse_datetime_str("2019-08-16 09:15:00.25").unwrap(),
            data_end: parse_datetime_str("2019-08-16 17:45:30").unwrap(),
        };
        write_sidecar(&sidecar, dir.path(), &info).unwrap();
        assert_eq!(read_sidecar(&sidecar), Some(info));
    }

    #[test]
    fn test_sidecar_rejects_foreign_file() {
        let dir = tempfile::tempdir().unwrap();
        let sidecar = dir.path().join(SIDECAR_NAME);
        std::fs::write(&sidecar, "some unrelated notes\n").unwrap();
        assert!(read_sidecar(&sidecar).is_none());
    }

    #[test]
    fn test_read_data_columns_follows_increments() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("G1_IS4K Refl.txt");
        let second = dir.path().join("G1_IS4K Refm.txt");
        std::fs::write(&first, "header line\n0.5 10.0 1.0\n0.6 11.0 2.0\n").unwrap();
        std::fs::write(&second, "0.7 12.0 3.0\n").unwrap();

        let rows = read_data_columns(&first, &[0, 2]).unwrap();
        assert_eq!(rows, vec![vec![0.5, 1.0], vec![0.6, 2.0], vec![0.7, 3.0]]);
    }

    #[test]
    fn test_is_run_folder_requires_all_three_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("G1_Engine 1.txt"), "").unwrap();
        std::fs::write(dir.path().join("G1_IS4K Temp.txt"), "").unwrap();
        assert!(!is_run_folder(dir.path()));
        std::fs::write(dir.path().join("G1_IS4K Refl.txt"), "").unwrap();
        assert!(is_run_folder(dir.path()));
    }
}
