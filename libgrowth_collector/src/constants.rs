//! Constants shared across the collection pipeline.

/// Seconds in one day. Molly and SVT record times as day fractions.
pub const SECONDS_PER_DAY: f64 = 86400.0;

/// Size in bytes of one Molly binary record: f32 day-fraction + f32 value.
pub const MOLLY_RECORD_SIZE: u64 = 8;

/// Format of the epoch line in saved series files and SVT sidecar files.
/// Microsecond precision.
pub const EPOCH_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.6f";

/// Format of the two instants in a cache subdirectory name.
/// Second precision; filesystem-safe.
pub const CACHE_KEY_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// An SVT run folder's times are relative to midnight of an unknown day.
/// The day is resolved by shifting until the discrepancy against the file
/// creation time is below half a day.
pub const DAY_AMBIGUITY_LIMIT: f64 = SECONDS_PER_DAY / 2.0;

/// First line of the SVT sidecar file. Anything else means the sidecar is
/// stale or foreign, and the folder times are recomputed.
pub const SIDECAR_MAGIC: &str =
    "(Generated by growth_collector data import. Do not modify.)";
