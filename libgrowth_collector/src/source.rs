//! Shared capability interface for the three source readers.

use std::path::Path;

use fxhash::FxHashMap;

use super::catalog::{Location, NameCatalog};
use super::collector::CollectionRequest;
use super::diagnostics::Diagnostics;
use super::error::CollectorError;
use super::time_series::TimeSeries;

/// One subsystem's on-disk representation. Implementations know how to
/// enumerate candidate files for a time window, decide whether a file
/// belongs to the window, and parse matching files into [`TimeSeries`]
/// objects.
///
/// A reader never aborts a multi-signal request because one signal, file, or
/// hour is missing: it degrades that piece to empty and reports through the
/// [`Diagnostics`] sink. Errors escape only for structural problems (an
/// unreadable directory listing mid-walk, an unwritable series).
pub trait SourceReader {
    /// The location tag this reader serves. The orchestrator dispatches by
    /// this tag, taken from the catalog, never by inspecting names itself.
    fn location(&self) -> Location;

    /// Root of the backing storage (usually a network share).
    fn data_path(&self) -> &Path;

    /// Opportunistic pre-flight reachability check. No retries; a missing
    /// root simply degrades every signal of this source to empty, so callers
    /// should surface this before committing to a long collection.
    fn is_reachable(&self) -> bool {
        self.data_path().exists()
    }

    /// Collect every requested name this reader owns over the request
    /// window, as a map from display name to series. Names in the request
    /// that belong to other locations have already been filtered out by the
    /// orchestrator.
    fn collect(
        &self,
        request: &CollectionRequest,
        catalog: &NameCatalog,
        diagnostics: &Diagnostics,
    ) -> Result<FxHashMap<String, TimeSeries>, CollectorError>;
}
