//! On-disk cache of collected series, keyed by request window.
//!
//! Collecting from the network shares can take minutes; re-running analysis
//! on the same growth should not. Each distinct time window gets its own
//! subdirectory holding one saved series file per signal.

use std::path::{Path, PathBuf};

use fxhash::FxHashMap;

use super::collector::CollectionRequest;
use super::constants::CACHE_KEY_FORMAT;
use super::error::CacheError;
use super::time_series::TimeSeries;

#[derive(Debug, Clone)]
pub struct SeriesCache {
    root: PathBuf,
}

impl SeriesCache {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding the cached series for one request window.
    pub fn entry_dir(&self, request: &CollectionRequest) -> PathBuf {
        self.root.join(format!(
            "{}_to_{}",
            request.start.format(CACHE_KEY_FORMAT),
            request.end.format(CACHE_KEY_FORMAT)
        ))
    }

    /// Load every requested signal from the cache.
    ///
    /// All-or-nothing: a missing or unreadable file for any one signal fails
    /// the whole load, so the caller refetches the complete request and
    /// overwrites the entry. Partially-valid entries are never served since
    /// the set of signals stored together reflects a single collection pass.
    pub fn load(
        &self,
        request: &CollectionRequest,
    ) -> Result<FxHashMap<String, TimeSeries>, CacheError> {
        let dir = self.entry_dir(request);
        let mut data = FxHashMap::default();
        for name in &request.names {
            let path = TimeSeries::saved_path(&dir, name);
            if !path.is_file() {
                return Err(CacheError::MissingFile(path));
            }
            let series = TimeSeries::load(&dir, name)?;
            data.insert(name.clone(), series);
        }
        Ok(data)
    }

    /// Write every series to the cache entry, overwriting existing files.
    pub fn store(
        &self,
        request: &CollectionRequest,
        data: &FxHashMap<String, TimeSeries>,
    ) -> Result<(), CacheError> {
        let dir = self.entry_dir(request);
        std::fs::create_dir_all(&dir)?;
        for series in data.values() {
            series.save(&dir)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datetime::parse_datetime_str;

    fn request(names: &[&str]) -> CollectionRequest {
        CollectionRequest::new(
            parse_datetime_str("2019-08-16 01:30:00").unwrap(),
            parse_datetime_str("2019-08-16 04:30:00").unwrap(),
            names.iter().map(|s| s.to_string()).collect(),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_entry_dir_name() {
        let cache = SeriesCache::new(PathBuf::from("/tmp/cache"));
        assert_eq!(
            cache.entry_dir(&request(&[])),
            PathBuf::from("/tmp/cache/2019-08-16_01-30-00_to_2019-08-16_04-30-00")
        );
    }

    #[test]
    fn test_store_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path().to_path_buf());
        let req = request(&["GM1 pressure"]);

        let mut data = FxHashMap::default();
        data.insert(
            "GM1 pressure".to_string(),
            TimeSeries::with_data(
                "GM1 pressure".to_string(),
                "Torr".to_string(),
                req.start,
                vec![0.0, 10.0],
                vec![1e-9, 2e-9],
            )
            .unwrap(),
        );
        cache.store(&req, &data).unwrap();

        let loaded = cache.load(&req).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded["GM1 pressure"].values(), &[1e-9, 2e-9]);
    }

    #[test]
    fn test_partial_entry_fails_whole_load() {
        let dir = tempfile::tempdir().unwrap();
        let cache = SeriesCache::new(dir.path().to_path_buf());
        let one = request(&["GM1 pressure"]);
        let two = request(&["GM1 pressure", "BET temp"]);

        let mut data = FxHashMap::default();
        data.insert(
            "GM1 pressure".to_string(),
            TimeSeries::new("GM1 pressure".to_string(), "Torr".to_string(), one.start),
        );
        cache.store(&one, &data).unwrap();

        assert!(cache.load(&one).is_ok());
        assert!(matches!(cache.load(&two), Err(CacheError::MissingFile(_))));
    }
}
