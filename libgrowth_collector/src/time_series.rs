//! Container for time-dependent lab data.
//!
//! A [`TimeSeries`] holds (time, value) pairs anchored to an absolute epoch
//! (the instant at which t=0). The time array is in seconds and is kept
//! ascending by every mutating operation. Because the subsystems log a value
//! only when it changes, resampling uses step interpolation (zero-order
//! hold): the value at time t is the last recorded value at or before t.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use super::datetime::{format_epoch, parse_epoch, seconds_between};
use super::error::TimeSeriesError;

#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    name: String,
    units: String,
    epoch: NaiveDateTime,
    times: Vec<f64>,
    values: Vec<f64>,
}

impl TimeSeries {
    /// Create an empty series. `name` and `units` are fixed for the lifetime
    /// of the series; changing either requires a new instance.
    pub fn new(name: impl Into<String>, units: impl Into<String>, epoch: NaiveDateTime) -> Self {
        Self {
            name: name.into(),
            units: units.into(),
            epoch,
            times: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Create a series from raw arrays. Sorts ascending by time.
    pub fn with_data(
        name: impl Into<String>,
        units: impl Into<String>,
        epoch: NaiveDateTime,
        times: Vec<f64>,
        values: Vec<f64>,
    ) -> Result<Self, TimeSeriesError> {
        let mut series = Self::new(name, units, epoch);
        series.set_data(times, values)?;
        Ok(series)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &str {
        &self.units
    }

    pub fn epoch(&self) -> NaiveDateTime {
        self.epoch
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Replace both arrays. Fails if the lengths differ; always re-sorts.
    pub fn set_data(&mut self, times: Vec<f64>, values: Vec<f64>) -> Result<(), TimeSeriesError> {
        if times.len() != values.len() {
            return Err(TimeSeriesError::ShapeMismatch(times.len(), values.len()));
        }
        self.times = times;
        self.values = values;
        self.sort();
        Ok(())
    }

    /// Stable co-sort of both arrays so that `times` is ascending.
    fn sort(&mut self) {
        let mut order: Vec<usize> = (0..self.times.len()).collect();
        order.sort_by(|&a, &b| self.times[a].total_cmp(&self.times[b]));
        self.times = order.iter().map(|&i| self.times[i]).collect();
        self.values = order.iter().map(|&i| self.values[i]).collect();
    }

    /// Append another series, re-basing its time axis onto this series'
    /// epoch, then re-sorting. Duplicate timestamps are kept as-is; callers
    /// that stitch overlapping fetches are responsible for de-duplication.
    pub fn append(&mut self, other: &TimeSeries) -> Result<(), TimeSeriesError> {
        if self.name != other.name || self.units != other.units {
            return Err(TimeSeriesError::IncompatibleSeries {
                expected: format!("{} ({})", self.name, self.units),
                found: format!("{} ({})", other.name, other.units),
            });
        }

        let offset = seconds_between(other.epoch, self.epoch);
        self.times.extend(other.times.iter().map(|t| t + offset));
        self.values.extend_from_slice(&other.values);
        self.sort();
        Ok(())
    }

    /// Re-base the time axis onto a new epoch.
    pub fn set_epoch(&mut self, new_epoch: NaiveDateTime) {
        let shift = seconds_between(self.epoch, new_epoch);
        for t in &mut self.times {
            *t += shift;
        }
        self.epoch = new_epoch;
    }

    /// Restrict the series to [start, end].
    ///
    /// With `include_endpoints` false, keeps samples with
    /// `start <= t <= end` (inclusive). With `include_endpoints` true, keeps
    /// strictly-interior samples and synthesizes boundary samples at exactly
    /// `start` and `end` by step interpolation, so stepped data with long
    /// gaps between changes still has defined values at both ends of the
    /// requested window. No-op on an empty series.
    pub fn trim(&mut self, start: NaiveDateTime, end: NaiveDateTime, include_endpoints: bool) {
        if self.is_empty() {
            return;
        }

        let ti = seconds_between(start, self.epoch);
        let tf = seconds_between(end, self.epoch);

        if include_endpoints {
            // Boundary values come from the untrimmed series.
            let vi = self.hold_before(ti);
            let vf = self.hold_before(tf);

            let mut times = Vec::with_capacity(self.times.len() + 2);
            let mut values = Vec::with_capacity(self.values.len() + 2);
            times.push(ti);
            values.push(vi);
            for (t, v) in self.times.iter().zip(&self.values) {
                if *t > ti && *t < tf {
                    times.push(*t);
                    values.push(*v);
                }
            }
            times.push(tf);
            values.push(vf);
            self.times = times;
            self.values = values;
        } else {
            let mut times = Vec::new();
            let mut values = Vec::new();
            for (t, v) in self.times.iter().zip(&self.values) {
                if *t >= ti && *t <= tf {
                    times.push(*t);
                    values.push(*v);
                }
            }
            self.times = times;
            self.values = values;
        }
        self.sort();
    }

    /// Step-interpolate (zero-order hold) onto the given query times,
    /// returning a new series with the same name, units, and epoch.
    ///
    /// With `round_up` false, each query takes the value at the greatest
    /// index whose time is at or before it; a query before all data clamps
    /// to the first recorded value (the earliest known value is assumed to
    /// apply retroactively -- a documented approximation, not an error).
    /// With `round_up` true, each query takes the value at the smallest
    /// index whose time is at or after it, clamping to the last value.
    ///
    /// An empty source yields an empty copy; callers must treat an all-empty
    /// result as valid.
    pub fn step_interpolate(&self, query_times: &[f64], round_up: bool) -> TimeSeries {
        let mut out = TimeSeries::new(self.name.clone(), self.units.clone(), self.epoch);
        if self.is_empty() {
            return out;
        }

        let values = query_times
            .iter()
            .map(|&q| {
                if round_up {
                    self.hold_after(q)
                } else {
                    self.hold_before(q)
                }
            })
            .collect();

        // Unreachable shape error: both arrays are query-length by
        // construction.
        let _ = out.set_data(query_times.to_vec(), values);
        out
    }

    /// Value held at time `t`: the last sample at or before `t`, clamped to
    /// the first sample. Must not be called on an empty series.
    fn hold_before(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&x| x <= t);
        self.values[idx.saturating_sub(1)]
    }

    /// First sample at or after `t`, clamped to the last sample.
    fn hold_after(&self, t: f64) -> f64 {
        let idx = self.times.partition_point(|&x| x < t);
        self.values[idx.min(self.values.len() - 1)]
    }

    /// Point list for rendering the series as a step function (hold until
    /// changed), doubling interior points so a plotting layer can draw it
    /// with straight line segments.
    pub fn step_points(&self) -> Vec<(f64, f64)> {
        let mut points = Vec::with_capacity(self.len().saturating_mul(2));
        for i in 0..self.len() {
            if i > 0 {
                points.push((self.times[i], self.values[i - 1]));
            }
            points.push((self.times[i], self.values[i]));
        }
        points
    }

    /// File name this series saves to within a directory.
    pub fn file_name(&self) -> String {
        format!("{}.dat", self.name)
    }

    /// Save as a two-line header plus CSV body:
    ///
    /// ```text
    /// # (time=0 at: 2019-08-16 21:00:00.000000)
    /// # time (s), Al1 base measured (degC)
    /// 0.000000000000000000e0,5.000000000000000000e2
    /// ```
    pub fn save(&self, dir: &Path) -> Result<(), TimeSeriesError> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.file_name());
        let mut writer = BufWriter::new(File::create(path)?);

        writeln!(writer, "# (time=0 at: {})", format_epoch(self.epoch))?;
        writeln!(writer, "# time (s), {} ({})", self.name, self.units)?;
        for (t, v) in self.times.iter().zip(&self.values) {
            writeln!(writer, "{t:.18e},{v:.18e}")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Load the series for `name` from a directory written by [`save`].
    ///
    /// Rejects files whose header does not parse; tolerates an empty body,
    /// producing empty arrays.
    ///
    /// [`save`]: TimeSeries::save
    pub fn load(dir: &Path, name: &str) -> Result<Self, TimeSeriesError> {
        let path = dir.join(format!("{name}.dat"));
        let mut reader = BufReader::new(File::open(&path)?);

        let mut line = String::new();
        reader.read_line(&mut line)?;
        let epoch_text = line
            .trim_end()
            .strip_prefix("# (time=0 at: ")
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| TimeSeriesError::BadHeader(path.clone()))?;
        let epoch = parse_epoch(epoch_text)?;

        line.clear();
        reader.read_line(&mut line)?;
        let (file_name, units) = parse_label_header(line.trim_end())
            .ok_or_else(|| TimeSeriesError::BadHeader(path.clone()))?;

        let mut times = Vec::new();
        let mut values = Vec::new();
        for (i, body_line) in reader.lines().enumerate() {
            let body_line = body_line?;
            if body_line.trim().is_empty() {
                continue;
            }
            let (t, v) = parse_sample(&body_line).ok_or_else(|| TimeSeriesError::BadSample {
                path: path.clone(),
                line: i + 3,
            })?;
            times.push(t);
            values.push(v);
        }

        TimeSeries::with_data(file_name, units, epoch, times, values)
    }

    /// Path of the file that [`load`] would read for `name` in `dir`.
    ///
    /// [`load`]: TimeSeries::load
    pub fn saved_path(dir: &Path, name: &str) -> PathBuf {
        dir.join(format!("{name}.dat"))
    }
}

/// Parse the second header line `# time (s), <name> (<units>)`. The name may
/// itself contain spaces, so the units are taken from the trailing
/// parenthesized group.
fn parse_label_header(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("# time (s), ")?;
    let rest = rest.strip_suffix(')')?;
    let open = rest.rfind(" (")?;
    let name = rest[..open].to_string();
    let units = rest[open + 2..].to_string();
    if name.is_empty() {
        return None;
    }
    Some((name, units))
}

fn parse_sample(line: &str) -> Option<(f64, f64)> {
    let (t, v) = line.split_once(',')?;
    Some((t.trim().parse().ok()?, v.trim().parse().ok()?))
}
