//! Registry of collectable signal names.
//!
//! Each signal the lab tracks has one entry describing which subsystem
//! produces it, the subsystem-specific locator parameters (byte offsets,
//! filename fragments, column indices), and its display units. The registry
//! is a semicolon-delimited CSV with columns
//! `name;location;sublocation;parameters;units`; a default copy is bundled
//! with the crate and can be overridden by a file on disk.
//!
//! Lookup is insensitive to case and punctuation: `"Al1 base measured"`,
//! `"al1_base_measured"`, and `"AL1.BASE.MEASURED"` resolve to the same
//! entry.

use std::path::Path;

use fxhash::FxHashMap;

use super::error::CatalogError;

/// Load the bundled default registry.
fn load_default_registry() -> &'static str {
    include_str!("data/signal_registry.csv")
}

/// Canonical form of a signal name: lowercased, with every run of
/// non-alphanumeric characters folded to a single underscore. Pure function
/// so the folding rule is testable on its own.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;
    for c in name.chars() {
        if c.is_alphanumeric() {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.extend(c.to_lowercase());
        } else {
            // Collapse runs; keep a leading separator so the folding is a
            // pure function of the input, applied identically at insert and
            // lookup.
            pending_sep = true;
        }
    }
    if pending_sep {
        out.push('_');
    }
    out
}

/// The subsystem a signal comes from. Drives reader dispatch in the
/// orchestrator; there is deliberately no open-ended variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// Molly process-control logger (binary hour buckets).
    Molly,
    /// Band-edge thermometry instrument (whitespace tables).
    Bet,
    /// SVT reflectometry/pyrometry instrument (per-run folders).
    Svt,
}

impl Location {
    pub const ALL: [Location; 3] = [Location::Molly, Location::Bet, Location::Svt];

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Molly => "Molly",
            Location::Bet => "BET",
            Location::Svt => "SVT",
        }
    }

    pub fn parse(text: &str) -> Result<Self, CatalogError> {
        match text.trim().to_ascii_lowercase().as_str() {
            "molly" => Ok(Location::Molly),
            "bet" => Ok(Location::Bet),
            "svt" => Ok(Location::Svt),
            _ => Err(CatalogError::BadLocation(text.to_string())),
        }
    }
}

impl std::fmt::Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A locator parameter value. Only literal primitives are representable;
/// registry text that is not one of these is rejected at load time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

impl ParamValue {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParamValue::Float(v) => Some(*v),
            ParamValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(v) => Some(*v),
            _ => None,
        }
    }
}

/// Strict declarative literal parser for registry parameter values.
/// Accepts integers, floats, booleans (`true`/`True`/`false`/`False`), and
/// single- or double-quoted strings. Anything else is a configuration
/// error; the registry is user-editable text and is never evaluated as
/// code.
pub fn parse_literal(text: &str) -> Result<ParamValue, CatalogError> {
    let trimmed = text.trim();

    match trimmed {
        "true" | "True" => return Ok(ParamValue::Bool(true)),
        "false" | "False" => return Ok(ParamValue::Bool(false)),
        _ => {}
    }

    for quote in ['\'', '"'] {
        if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
            let inner = &trimmed[1..trimmed.len() - 1];
            if inner.contains(quote) {
                return Err(CatalogError::BadLiteral(text.to_string()));
            }
            return Ok(ParamValue::Str(inner.to_string()));
        }
    }

    if let Ok(v) = trimmed.parse::<i64>() {
        return Ok(ParamValue::Int(v));
    }
    if let Ok(v) = trimmed.parse::<f64>() {
        return Ok(ParamValue::Float(v));
    }

    Err(CatalogError::BadLiteral(text.to_string()))
}

/// Registry entry for a single signal.
#[derive(Debug, Clone)]
pub struct SignalInfo {
    /// Name formatted for display; also the cache/save file stem.
    pub display_name: String,
    /// Which subsystem produces the signal.
    pub location: Location,
    /// Grouping tag (e.g. the effusion cell) used by downstream export.
    pub sublocation: String,
    /// Subsystem-specific locator parameters.
    pub parameters: FxHashMap<String, ParamValue>,
    /// Display units.
    pub units: String,
}

impl SignalInfo {
    /// Required string parameter, e.g. the Molly-internal signal name.
    pub fn str_param(&self, key: &str) -> Result<&str, CatalogError> {
        let value = self
            .parameters
            .get(key)
            .ok_or_else(|| CatalogError::MissingParameter {
                name: self.display_name.clone(),
                key: key.to_string(),
            })?;
        value.as_str().ok_or_else(|| CatalogError::WrongParameterType {
            name: self.display_name.clone(),
            key: key.to_string(),
        })
    }

    /// Required non-negative integer parameter, e.g. a column index.
    pub fn index_param(&self, key: &str) -> Result<usize, CatalogError> {
        let value = self
            .parameters
            .get(key)
            .ok_or_else(|| CatalogError::MissingParameter {
                name: self.display_name.clone(),
                key: key.to_string(),
            })?;
        value
            .as_int()
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| CatalogError::WrongParameterType {
                name: self.display_name.clone(),
                key: key.to_string(),
            })
    }
}

/// The full name registry, loaded once at startup and read-only after.
#[derive(Debug, Clone, Default)]
pub struct NameCatalog {
    entries: FxHashMap<String, SignalInfo>,
}

impl NameCatalog {
    /// Load the registry bundled with the crate.
    pub fn bundled() -> Result<Self, CatalogError> {
        Self::from_contents(load_default_registry())
    }

    /// Load a registry from a file on disk.
    pub fn from_file(path: &Path) -> Result<Self, CatalogError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_contents(&contents)
    }

    /// Parse registry text. The first line is the column header.
    pub fn from_contents(contents: &str) -> Result<Self, CatalogError> {
        let mut catalog = NameCatalog::default();

        let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
        let mut lines = contents.lines().enumerate();
        lines.next(); // Skip the header

        for (i, line) in lines {
            let line_no = i + 1;
            if line.trim().is_empty() {
                continue;
            }
            let columns: Vec<&str> = line.split(';').collect();
            if columns.len() != 5 {
                return Err(CatalogError::BadRow {
                    line: line_no,
                    reason: format!("expected 5 columns, found {}", columns.len()),
                });
            }

            let name = columns[0].trim();
            let location = Location::parse(columns[1])?;
            let sublocation = columns[2].trim().to_string();
            let units = columns[4].trim().to_string();

            let mut parameters = FxHashMap::default();
            for arg in columns[3].split(',') {
                let arg = arg.trim();
                if arg.is_empty() {
                    continue;
                }
                let (key, value) = arg.split_once('=').ok_or_else(|| CatalogError::BadRow {
                    line: line_no,
                    reason: format!("parameter {arg:?} is not of the form key=value"),
                })?;
                parameters.insert(key.trim().to_string(), parse_literal(value)?);
            }

            let info = SignalInfo {
                display_name: name.to_string(),
                location,
                sublocation,
                parameters,
                units,
            };

            if catalog
                .entries
                .insert(normalize_name(name), info)
                .is_some()
            {
                return Err(CatalogError::DuplicateName(name.to_string()));
            }
        }

        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&SignalInfo> {
        self.entries.get(&normalize_name(name))
    }

    /// Lookup that fails with the offending name, for fail-fast validation
    /// before any I/O.
    pub fn lookup(&self, name: &str) -> Result<&SignalInfo, CatalogError> {
        self.get(name)
            .ok_or_else(|| CatalogError::UnknownName(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Display names of every signal at one location, sorted for stable
    /// output.
    pub fn names_for(&self, location: Location) -> Vec<String> {
        let mut names: Vec<String> = self
            .entries
            .values()
            .filter(|info| info.location == location)
            .map(|info| info.display_name.clone())
            .collect();
        names.sort();
        names
    }
}
