//! End-to-end collection over a synthesized Molly data tree.

use std::io::Write;
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use chrono::NaiveDateTime;

use libgrowth_collector::catalog::NameCatalog;
use libgrowth_collector::collector::{CollectionRequest, Collector};
use libgrowth_collector::datetime::parse_datetime_str;
use libgrowth_collector::time_series::TimeSeries;

const LOCAL_NAME: &str = "GM1.Pressure.Input";
const SIGNAL: &str = "GM1 pressure";

/// Write one Molly hour bucket: a plaintext header naming the record span
/// plus a binary file of (day-fraction, value) f32 pairs. The binary file
/// starts with one reserved record.
fn write_hour_bucket(root: &Path, hour: NaiveDateTime, records: &[(f64, f64)]) {
    let dir = root
        .join(hour.format("%Y").to_string())
        .join(hour.format("%m-%b").to_string());
    std::fs::create_dir_all(&dir).unwrap();

    let header_path = dir.join(hour.format("%dday-%Hhr.txt").to_string());
    let mut header = std::fs::File::create(header_path).unwrap();
    writeln!(header, "Rate=2000").unwrap();
    writeln!(
        header,
        "DataItem=Name:{LOCAL_NAME};Units:Torr;TotalValues:{};ValueOffset:0",
        records.len()
    )
    .unwrap();

    let binary_path = dir.join(hour.format("%dday-%Hhr-binary.txt").to_string());
    let mut binary = std::fs::File::create(binary_path).unwrap();
    // Reserved leading record.
    binary.write_f32::<LittleEndian>(0.0).unwrap();
    binary.write_f32::<LittleEndian>(0.0).unwrap();
    for &(seconds_of_day, value) in records {
        binary
            .write_f32::<LittleEndian>((seconds_of_day / 86400.0) as f32)
            .unwrap();
        binary.write_f32::<LittleEndian>(value as f32).unwrap();
    }
}

fn populate_molly_tree(root: &Path) {
    // Changes at 02:00:00, at 02:59:57 (stored in the 02hr bucket), and at
    // 03:00:02 (in the 03hr bucket).
    write_hour_bucket(
        root,
        parse_datetime_str("2019-08-16 02:00:00").unwrap(),
        &[(7200.0, 1.5e-7), (10797.0, 2.5e-7)],
    );
    write_hour_bucket(
        root,
        parse_datetime_str("2019-08-16 03:00:00").unwrap(),
        &[(10802.0, 4.0e-7)],
    );
}

const SVT_SIGNAL: &str = "SVT PI 950";

/// A two-day Molly tree: one change on the first day, one exactly on the
/// 06:00 day boundary, one after it.
fn populate_two_day_molly_tree(root: &Path) {
    write_hour_bucket(
        root,
        parse_datetime_str("2019-08-16 10:00:00").unwrap(),
        &[(37000.0, 1.0)],
    );
    write_hour_bucket(
        root,
        parse_datetime_str("2019-08-17 06:00:00").unwrap(),
        &[(21600.0, 2.0)],
    );
    write_hour_bucket(
        root,
        parse_datetime_str("2019-08-17 08:00:00").unwrap(),
        &[(30000.0, 3.0)],
    );
}

/// An SVT run spanning two days, with its sidecar already in place. Engine
/// samples are day fractions past midnight of Aug 16; fraction 1.25 lands
/// exactly on the 06:00 day boundary of the stitched requests below.
fn populate_svt_run(root: &Path) {
    let run = root.join("growth_run");
    std::fs::create_dir_all(&run).unwrap();

    let mut engine = String::from("sample header line\n");
    for (frac, value) in [
        (0.5, 1.0),
        (0.9, 2.0),
        (1.05, 3.0),
        (1.25, 4.0),
        (1.3, 5.0),
        (1.45, 6.0),
        (1.55, 7.0),
    ] {
        engine.push_str(&format!("{frac} {value}\n"));
    }
    std::fs::write(run.join("G1_Engine 1.txt"), engine).unwrap();

    std::fs::write(
        run.join("time_info.txt"),
        "(Generated by growth_collector data import. Do not modify.)\n\
         Parent folder = \"growth_run\"\n\
         Zero_time = 2019-08-16 00:00:00.000000\n\
         Data_start_time = 2019-08-16 12:00:00.000000\n\
         Data_end_time = 2019-08-17 13:12:00.000000",
    )
    .unwrap();
}

fn assert_series_close(expected: &TimeSeries, actual: &TimeSeries) {
    assert_eq!(expected.epoch(), actual.epoch());
    assert_eq!(expected.len(), actual.len(), "{}", expected.name());
    for i in 0..expected.len() {
        assert!(
            (expected.times()[i] - actual.times()[i]).abs() < 1e-6,
            "{} sample {i}: time {} != {}",
            expected.name(),
            actual.times()[i],
            expected.times()[i]
        );
        assert!(
            (expected.values()[i] - actual.values()[i]).abs() < 1e-9,
            "{} sample {i}: value {} != {}",
            expected.name(),
            actual.values()[i],
            expected.values()[i]
        );
    }
}

fn request() -> CollectionRequest {
    CollectionRequest::parse(
        "2019-08-16 01:30:00",
        "2019-08-16 04:30:00",
        vec![SIGNAL.to_string()],
        None,
    )
    .unwrap()
}

fn assert_expected_series(series: &TimeSeries) {
    // Synthesized boundary samples at both window edges plus the three
    // change records, in time order across the hour boundary. Times carry
    // the f32 day-fraction quantization of the stored records.
    assert_eq!(series.epoch(), request().start);
    assert_eq!(series.len(), 5);
    let expected = [
        (0.0, 1.5e-7),
        (1800.0, 1.5e-7),
        (5397.0, 2.5e-7),
        (5402.0, 4.0e-7),
        (10800.0, 4.0e-7),
    ];
    for (i, (t, v)) in expected.iter().enumerate() {
        assert!(
            (series.times()[i] - t).abs() < 0.01,
            "sample {i}: time {} != {t}",
            series.times()[i]
        );
        assert!(
            (series.values()[i] - v).abs() < 1e-12,
            "sample {i}: value {} != {v}",
            series.values()[i]
        );
    }
}

#[test]
fn collects_across_hour_boundary() {
    let molly = tempfile::tempdir().unwrap();
    populate_molly_tree(molly.path());

    let collector =
        Collector::new(NameCatalog::bundled().unwrap()).with_molly_path(molly.path().to_path_buf());

    let data = collector.collect(&request(), false).unwrap();
    assert_expected_series(&data[SIGNAL]);

    // Missing hour buckets inside the window degrade to warnings, never
    // errors.
    assert!(!collector.diagnostics().has_errors());
    assert!(!collector.diagnostics().records().is_empty());
}

#[test]
fn second_collection_is_served_from_cache() {
    let molly = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    populate_molly_tree(molly.path());

    let collector = Collector::new(NameCatalog::bundled().unwrap())
        .with_molly_path(molly.path().to_path_buf())
        .with_cache(cache.path().to_path_buf());

    let first = collector.collect(&request(), false).unwrap();

    // Remove the source tree; a cache hit must not touch it.
    drop(molly);
    let second = collector.collect(&request(), false).unwrap();

    assert_eq!(first[SIGNAL], second[SIGNAL]);
    assert_expected_series(&second[SIGNAL]);
}

#[test]
fn partial_cache_entry_is_refetched_whole() {
    let molly = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    populate_molly_tree(molly.path());

    let collector = Collector::new(NameCatalog::bundled().unwrap())
        .with_molly_path(molly.path().to_path_buf())
        .with_cache(cache.path().to_path_buf());

    collector.collect(&request(), false).unwrap();

    // Same window, one more signal: the cached entry no longer covers the
    // request, so everything is refetched and the entry rewritten.
    let mut wider = request();
    wider.names.push("Substrate measured".to_string());
    let data = collector.collect(&wider, false).unwrap();

    assert_expected_series(&data[SIGNAL]);
    assert!(data["Substrate measured"].is_empty());

    let entry = cache.path().join("2019-08-16_01-30-00_to_2019-08-16_04-30-00");
    assert!(entry.join("GM1 pressure.dat").is_file());
    assert!(entry.join("Substrate measured.dat").is_file());
}

#[test]
fn force_reload_overwrites_the_cache_entry() {
    let molly = tempfile::tempdir().unwrap();
    let cache = tempfile::tempdir().unwrap();
    populate_molly_tree(molly.path());

    let collector = Collector::new(NameCatalog::bundled().unwrap())
        .with_molly_path(molly.path().to_path_buf())
        .with_cache(cache.path().to_path_buf());

    collector.collect(&request(), false).unwrap();

    // Rewrite the source with different values; force_reload must pick the
    // new data up even though the cache entry is complete.
    write_hour_bucket(
        molly.path(),
        parse_datetime_str("2019-08-16 02:00:00").unwrap(),
        &[(7200.0, 9.0e-7)],
    );
    let data = collector.collect(&request(), true).unwrap();
    assert!((data[SIGNAL].values()[1] - 9.0e-7).abs() < 1e-12);

    // And the overwritten entry is what later lookups see.
    let cached = collector.collect(&request(), false).unwrap();
    assert_eq!(cached[SIGNAL], data[SIGNAL]);
}

#[test]
fn daily_stitching_matches_whole_window() {
    let molly = tempfile::tempdir().unwrap();
    let svt = tempfile::tempdir().unwrap();
    populate_two_day_molly_tree(molly.path());
    populate_svt_run(svt.path());

    let collector = Collector::new(NameCatalog::bundled().unwrap())
        .with_molly_path(molly.path().to_path_buf())
        .with_svt_path(svt.path().to_path_buf());

    let request = CollectionRequest::parse(
        "2019-08-16 06:00:00",
        "2019-08-17 12:00:00",
        vec![SIGNAL.to_string(), SVT_SIGNAL.to_string()],
        None,
    )
    .unwrap();

    let whole = collector.collect(&request, false).unwrap();
    let daily = collector.collect_daily(&request, false).unwrap();

    for name in [SIGNAL, SVT_SIGNAL] {
        assert_series_close(&whole[name], &daily[name]);
    }

    // The change-logged signal: the synthesized day-boundary sample of the
    // first piece and the second piece's opening sample coincide, and only
    // one survives the stitch.
    let pressure = &daily[SIGNAL];
    assert_eq!(pressure.len(), 5);
    assert_eq!(
        pressure
            .times()
            .iter()
            .filter(|t| (**t - 86400.0).abs() < 1e-6)
            .count(),
        1
    );

    // The sampled signal: six measurements fall inside the window. The one
    // shortly after the day boundary (fraction 1.30, 90720 s) is a real
    // sample, not a duplicate, and must survive the stitch; the one exactly
    // on the boundary (fraction 1.25) appears once.
    let detector = &daily[SVT_SIGNAL];
    assert_eq!(detector.len(), 6);
    assert!(detector
        .times()
        .iter()
        .any(|t| (t - 90720.0).abs() < 1e-6));
    assert_eq!(
        detector
            .times()
            .iter()
            .filter(|t| (**t - 86400.0).abs() < 1e-6)
            .count(),
        1
    );
    let expected_values = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
    for (value, expected) in detector.values().iter().zip(expected_values) {
        assert!((value - expected).abs() < 1e-9);
    }
}

#[test]
fn resampling_onto_a_fixed_grid() {
    let molly = tempfile::tempdir().unwrap();
    populate_molly_tree(molly.path());

    let collector =
        Collector::new(NameCatalog::bundled().unwrap()).with_molly_path(molly.path().to_path_buf());

    let mut req = request();
    req.resample_dt = Some(3600.0);
    let data = collector.collect(&req, false).unwrap();

    let series = &data[SIGNAL];
    // Grid 0, 3600, 7200, 10800 over the three-hour window.
    assert_eq!(series.times(), &[0.0, 3600.0, 7200.0, 10800.0]);
    assert!((series.values()[0] - 1.5e-7).abs() < 1e-12);
    assert!((series.values()[1] - 1.5e-7).abs() < 1e-12);
    assert!((series.values()[2] - 4.0e-7).abs() < 1e-12);
    assert!((series.values()[3] - 4.0e-7).abs() < 1e-12);
}
