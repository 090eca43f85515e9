//! Orchestration of a collection run across the three lab subsystems.
//!
//! The [`Collector`] owns one reader per source plus the signal catalog and
//! an optional on-disk cache. A request names the window and the signals;
//! the collector partitions the names by source location, dispatches to the
//! readers, and merges the results into one map of series.

use std::path::PathBuf;

use chrono::{Duration, NaiveDateTime};
use fxhash::FxHashMap;

use super::bet::BetReader;
use super::cache::SeriesCache;
use super::catalog::{Location, NameCatalog};
use super::datetime::{parse_datetime_str, seconds_between};
use super::diagnostics::Diagnostics;
use super::error::CollectorError;
use super::molly::MollyReader;
use super::source::SourceReader;
use super::svt::SvtReader;
use super::time_series::TimeSeries;

/// One collection request: a half-open wall-clock window plus the signal
/// names to fetch, optionally resampled onto a fixed grid (Molly only;
/// change-triggered data is the only kind that benefits).
#[derive(Debug, Clone)]
pub struct CollectionRequest {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub names: Vec<String>,
    pub resample_dt: Option<f64>,
}

impl CollectionRequest {
    pub fn new(
        start: NaiveDateTime,
        end: NaiveDateTime,
        names: Vec<String>,
        resample_dt: Option<f64>,
    ) -> Result<Self, CollectorError> {
        if end <= start {
            return Err(CollectorError::InvalidRange { start, end });
        }
        Ok(Self {
            start,
            end,
            names,
            resample_dt,
        })
    }

    /// Build a request from human-readable datetime strings.
    pub fn parse(
        start: &str,
        end: &str,
        names: Vec<String>,
        resample_dt: Option<f64>,
    ) -> Result<Self, CollectorError> {
        Self::new(
            parse_datetime_str(start)?,
            parse_datetime_str(end)?,
            names,
            resample_dt,
        )
    }

    /// Same window, different name subset.
    fn with_names(&self, names: Vec<String>) -> Self {
        Self {
            names,
            ..self.clone()
        }
    }

    /// Same names, different window.
    fn with_window(&self, start: NaiveDateTime, end: NaiveDateTime) -> Self {
        Self {
            start,
            end,
            ..self.clone()
        }
    }
}

pub struct Collector {
    catalog: NameCatalog,
    molly: MollyReader,
    bet: BetReader,
    svt: SvtReader,
    cache: Option<SeriesCache>,
    diagnostics: Diagnostics,
}

impl Collector {
    /// Collector over the default network-share paths, no cache.
    pub fn new(catalog: NameCatalog) -> Self {
        Self {
            catalog,
            molly: MollyReader::default(),
            bet: BetReader::default(),
            svt: SvtReader::default(),
            cache: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn with_molly_path(mut self, path: PathBuf) -> Self {
        self.molly = MollyReader::new(path);
        self
    }

    pub fn with_bet_path(mut self, path: PathBuf) -> Self {
        self.bet = BetReader::new(path);
        self
    }

    pub fn with_svt_path(mut self, path: PathBuf) -> Self {
        self.svt = SvtReader::new(path);
        self
    }

    pub fn with_cache(mut self, root: PathBuf) -> Self {
        self.cache = Some(SeriesCache::new(root));
        self
    }

    pub fn catalog(&self) -> &NameCatalog {
        &self.catalog
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    fn reader(&self, location: Location) -> &dyn SourceReader {
        match location {
            Location::Molly => &self.molly,
            Location::Bet => &self.bet,
            Location::Svt => &self.svt,
        }
    }

    /// Data roots that are needed by the request but not currently
    /// reachable. Meant as a pre-flight check so a user can connect the
    /// network shares before a long collection silently comes back empty.
    pub fn find_bad_data_paths(&self, request: &CollectionRequest) -> Vec<PathBuf> {
        let mut bad = Vec::new();
        for location in Location::ALL {
            let partition = self.partition(request, location);
            match partition {
                Ok(names) if !names.is_empty() => {
                    let reader = self.reader(location);
                    if !reader.is_reachable() {
                        bad.push(reader.data_path().to_path_buf());
                    }
                }
                _ => {}
            }
        }
        bad
    }

    fn partition(
        &self,
        request: &CollectionRequest,
        location: Location,
    ) -> Result<Vec<String>, CollectorError> {
        let mut names = Vec::new();
        for name in &request.names {
            let info = self.catalog.lookup(name)?;
            if info.location == location {
                names.push(info.display_name.clone());
            }
        }
        Ok(names)
    }

    /// Collect every requested signal, through the cache when one is
    /// configured.
    ///
    /// A cache entry is served only when it holds every requested name; a
    /// partial entry counts as a full miss, and the refetched result
    /// overwrites it. `force_reload` bypasses the lookup but still rewrites
    /// the entry.
    pub fn collect(
        &self,
        request: &CollectionRequest,
        force_reload: bool,
    ) -> Result<FxHashMap<String, TimeSeries>, CollectorError> {
        if request.names.is_empty() {
            return Ok(FxHashMap::default());
        }

        // Resolve every name up front so a typo fails before any I/O.
        let mut resolved = Vec::with_capacity(request.names.len());
        for name in &request.names {
            resolved.push(self.catalog.lookup(name)?.display_name.clone());
        }
        let request = request.with_names(resolved);

        let Some(cache) = &self.cache else {
            return self.collect_from_sources(&request);
        };

        if !force_reload {
            match cache.load(&request) {
                Ok(data) => {
                    self.diagnostics.info(format!(
                        "Loaded {} signals from cache entry {:?}",
                        data.len(),
                        cache.entry_dir(&request)
                    ));
                    return Ok(data);
                }
                Err(e) => {
                    self.diagnostics
                        .info(format!("Cache miss ({e}); collecting from the sources"));
                }
            }
        }

        let data = self.collect_from_sources(&request)?;
        cache.store(&request, &data)?;
        Ok(data)
    }

    /// Collect directly from the source readers, bypassing the cache.
    pub fn collect_from_sources(
        &self,
        request: &CollectionRequest,
    ) -> Result<FxHashMap<String, TimeSeries>, CollectorError> {
        let mut data = FxHashMap::default();
        for location in Location::ALL {
            let names = self.partition(request, location)?;
            if names.is_empty() {
                continue;
            }
            let sub_request = request.with_names(names);
            let collected = self
                .reader(location)
                .collect(&sub_request, &self.catalog, &self.diagnostics)?;
            data.extend(collected);
        }
        Ok(data)
    }

    /// Collect a long window one day at a time, stitching the pieces.
    ///
    /// Day-sized sub-requests keep the cache entries reusable across
    /// overlapping analyses and bound the memory of any single source read.
    /// Adjacent pieces can share a boundary sample: change-logged series are
    /// trimmed with synthesized endpoints, so each piece ends exactly where
    /// the next begins, and a sampled series may happen to have a
    /// measurement on the boundary instant. A piece's first sample is
    /// dropped only when it coincides with the last accumulated sample;
    /// a genuinely new measurement near the boundary is kept.
    pub fn collect_daily(
        &self,
        request: &CollectionRequest,
        force_reload: bool,
    ) -> Result<FxHashMap<String, TimeSeries>, CollectorError> {
        let mut data: FxHashMap<String, TimeSeries> = FxHashMap::default();

        for (day_start, day_end) in day_windows(request.start, request.end) {
            let piece = self.collect(&request.with_window(day_start, day_end), force_reload)?;
            for (name, series) in piece {
                match data.get_mut(&name) {
                    None => {
                        data.insert(name, series);
                    }
                    Some(total) => {
                        if shares_boundary_sample(total, &series) {
                            total.append(&drop_first_sample(&series)?)?;
                        } else {
                            total.append(&series)?;
                        }
                    }
                }
            }
        }

        Ok(data)
    }
}

/// Split `[start, end]` into consecutive windows of at most one day.
fn day_windows(start: NaiveDateTime, end: NaiveDateTime) -> Vec<(NaiveDateTime, NaiveDateTime)> {
    let mut windows = Vec::new();
    let mut cursor = start;
    while cursor < end {
        let next = (cursor + Duration::days(1)).min(end);
        windows.push((cursor, next));
        cursor = next;
    }
    windows
}

/// Samples closer than this are treated as the same instant when stitching
/// day pieces. Covers float rounding from the repeated epoch rebasing.
const STITCH_TOLERANCE: f64 = 1e-6;

/// Does `piece` open with a sample at the same instant `total` ends with?
fn shares_boundary_sample(total: &TimeSeries, piece: &TimeSeries) -> bool {
    let offset = seconds_between(piece.epoch(), total.epoch());
    match (piece.times().first(), total.times().last()) {
        (Some(&first), Some(&last)) => (first + offset - last).abs() < STITCH_TOLERANCE,
        _ => false,
    }
}

fn drop_first_sample(series: &TimeSeries) -> Result<TimeSeries, CollectorError> {
    if series.is_empty() {
        return Ok(series.clone());
    }
    Ok(TimeSeries::with_data(
        series.name(),
        series.units(),
        series.epoch(),
        series.times()[1..].to_vec(),
        series.values()[1..].to_vec(),
    )?)
}
