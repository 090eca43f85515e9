use std::path::PathBuf;
use thiserror::Error;

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Error)]
pub enum TimeInputError {
    #[error("Could not parse datetime string {0:?}; expected \"YYYY-mm-dd[ HH:MM[:SS[.ffffff]]]\"")]
    BadDatetimeString(String),
}

#[derive(Debug, Error)]
pub enum TimeSeriesError {
    #[error("Time and value arrays must have the same length; got {0} times and {1} values")]
    ShapeMismatch(usize, usize),
    #[error("Incompatible series for append; expected {expected}, found {found}")]
    IncompatibleSeries { expected: String, found: String },
    #[error("Saved series file {0:?} has an invalid header")]
    BadHeader(PathBuf),
    #[error("Saved series file {path:?} has an unparseable sample on line {line}")]
    BadSample { path: PathBuf, line: usize },
    #[error("TimeSeries failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("TimeSeries failed to parse epoch: {0}")]
    BadEpoch(#[from] TimeInputError),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Catalog failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Registry row {line} is malformed: {reason}")]
    BadRow { line: usize, reason: String },
    #[error("Registry parameter value {0:?} is not an integer, float, boolean, or quoted string")]
    BadLiteral(String),
    #[error("Unknown source location {0:?}; expected Molly, BET, or SVT")]
    BadLocation(String),
    #[error("Duplicate signal name {0:?} in registry")]
    DuplicateName(String),
    #[error("Unknown signal name {0:?}; not found in the registry")]
    UnknownName(String),
    #[error("Signal {name:?} is missing required parameter {key:?}")]
    MissingParameter { name: String, key: String },
    #[error("Signal {name:?} parameter {key:?} has the wrong type")]
    WrongParameterType { name: String, key: String },
}

#[derive(Debug, Error)]
pub enum MollyError {
    #[error("Molly reader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Molly reader failed due to TimeSeries error: {0}")]
    Series(#[from] TimeSeriesError),
}

#[derive(Debug, Error)]
pub enum BetError {
    #[error("BET reader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("BET reader failed due to TimeSeries error: {0}")]
    Series(#[from] TimeSeriesError),
}

#[derive(Debug, Error)]
pub enum SvtError {
    #[error("SVT reader failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("SVT run folder {0:?} has no engine data file")]
    NoEngineFile(PathBuf),
    #[error("SVT run folder {0:?} contains no data samples")]
    EmptyRun(PathBuf),
    #[error("SVT reader failed due to TimeSeries error: {0}")]
    Series(#[from] TimeSeriesError),
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Cache entry is missing file {0:?}")]
    MissingFile(PathBuf),
    #[error("Cache failed due to TimeSeries error: {0}")]
    Series(#[from] TimeSeriesError),
}

#[derive(Debug, Error)]
pub enum CollectorError {
    #[error("Invalid time range; start {start} must be before end {end}")]
    InvalidRange {
        start: NaiveDateTime,
        end: NaiveDateTime,
    },
    #[error("Collector failed due to time input error: {0}")]
    TimeInput(#[from] TimeInputError),
    #[error("Collector failed due to catalog error: {0}")]
    Catalog(#[from] CatalogError),
    #[error("Collector failed due to Molly error: {0}")]
    Molly(#[from] MollyError),
    #[error("Collector failed due to BET error: {0}")]
    Bet(#[from] BetError),
    #[error("Collector failed due to SVT error: {0}")]
    Svt(#[from] SvtError),
    #[error("Collector failed due to TimeSeries error: {0}")]
    Series(#[from] TimeSeriesError),
    #[error("Collector failed due to cache error: {0}")]
    Cache(#[from] CacheError),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration as file {0:?} does not exist")]
    BadFilePath(PathBuf),
    #[error("Config failed due to IO error: {0}")]
    IOError(#[from] std::io::Error),
    #[error("Config failed to parse YAML: {0}")]
    ParsingError(#[from] serde_yaml::Error),
}
