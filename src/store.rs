//! store — JSON persistence for estimation results.
//!
//! Purpose
//! -------
//! Write and read [`EstimationResult`] bundles so long runs survive
//! process boundaries: one self-contained JSON file for the common
//! case, a scattered per-start layout for runs too large to rewrite on
//! every update, and an autosave hook pipeline callers invoke after
//! each estimation phase completes.
//!
//! Key behaviors
//! -------------
//! - [`write_result`]/[`read_result`] round-trip a whole bundle through
//!   one file; [`SaveSelection`] picks which sections to persist.
//! - [`write_scattered`]/[`read_scattered`] keep a manifest plus one
//!   file per optimization start; reading re-sorts the starts, so file
//!   order never matters.
//! - Existing files are never overwritten unless asked to.
//!
//! Invariants & assumptions
//! ------------------------
//! - Bundles round-trip exactly, non-finite floats included (see the
//!   result module's lossless float helpers).
//! - The objective itself is not persisted; a loaded bundle carries the
//!   problem summary only.
//!
//! Testing notes
//! -------------
//! - Round trips run against temporary directories; nothing touches the
//!   working directory.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter},
    path::Path,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    errors::{FitError, FitResult},
    result::{EstimationResult, OptimizeResult},
};

// -------------------------------------------------------------------------
// Section selection
// -------------------------------------------------------------------------

/// Which sections of a bundle to persist. Defaults to all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveSelection {
    pub optimize: bool,
    pub profile: bool,
    pub sample: bool,
}

impl Default for SaveSelection {
    fn default() -> Self {
        SaveSelection { optimize: true, profile: true, sample: true }
    }
}

impl SaveSelection {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_optimize(mut self, optimize: bool) -> Self {
        self.optimize = optimize;
        self
    }

    pub fn with_profile(mut self, profile: bool) -> Self {
        self.profile = profile;
        self
    }

    pub fn with_sample(mut self, sample: bool) -> Self {
        self.sample = sample;
        self
    }

    /// Clone of `result` with the deselected sections stripped.
    fn apply(&self, result: &EstimationResult) -> EstimationResult {
        let mut pruned = result.clone();
        if !self.optimize {
            pruned.optimize = None;
        }
        if !self.profile {
            pruned.profile = None;
        }
        if !self.sample {
            pruned.sample = None;
        }
        pruned
    }
}

// -------------------------------------------------------------------------
// Single-file layout
// -------------------------------------------------------------------------

/// Write the selected sections of a bundle to one JSON file.
///
/// # Errors
/// - [`FitError::FileExists`] when `path` exists and `overwrite` is off.
/// - I/O and serialization failures.
pub fn write_result(
    result: &EstimationResult, path: &Path, overwrite: bool, what: &SaveSelection,
) -> FitResult<()> {
    if path.exists() && !overwrite {
        return Err(FitError::FileExists { path: path.display().to_string() });
    }
    let writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(writer, &what.apply(result))?;
    info!("Wrote estimation result to {}", path.display());
    Ok(())
}

/// Read a bundle back from one JSON file.
pub fn read_result(path: &Path) -> FitResult<EstimationResult> {
    let reader = BufReader::new(File::open(path)?);
    let result = serde_json::from_reader(reader)?;
    debug!("Read estimation result from {}", path.display());
    Ok(result)
}

// -------------------------------------------------------------------------
// Scattered layout
// -------------------------------------------------------------------------

const MANIFEST_NAME: &str = "manifest.json";

/// Directory manifest: the bundle minus its optimize section, plus the
/// file names holding the individual starts.
#[derive(Debug, Serialize, Deserialize)]
struct ScatterManifest {
    bundle: EstimationResult,
    start_files: Vec<String>,
}

/// Write a bundle as a directory: `manifest.json` plus one file per
/// optimization start, so an appended start only costs one small file.
///
/// # Errors
/// - [`FitError::FileExists`] when a manifest already exists in `dir`
///   and `overwrite` is off.
/// - I/O and serialization failures.
pub fn write_scattered(
    result: &EstimationResult, dir: &Path, overwrite: bool, what: &SaveSelection,
) -> FitResult<()> {
    let manifest_path = dir.join(MANIFEST_NAME);
    if manifest_path.exists() && !overwrite {
        return Err(FitError::FileExists { path: manifest_path.display().to_string() });
    }
    fs::create_dir_all(dir)?;

    let mut bundle = what.apply(result);
    let starts = bundle.optimize.take();
    let mut start_files = Vec::new();
    if let Some(starts) = starts {
        for start in starts.list() {
            let name = format!("start_{:05}.json", start.id);
            let writer = BufWriter::new(File::create(dir.join(&name))?);
            serde_json::to_writer_pretty(writer, start)?;
            start_files.push(name);
        }
    }
    let n_starts = start_files.len();
    let writer = BufWriter::new(File::create(&manifest_path)?);
    serde_json::to_writer_pretty(writer, &ScatterManifest { bundle, start_files })?;
    info!("Wrote scattered result ({} starts) to {}", n_starts, dir.display());
    Ok(())
}

/// Read a scattered bundle back, re-sorting the collected starts.
pub fn read_scattered(dir: &Path) -> FitResult<EstimationResult> {
    let reader = BufReader::new(File::open(dir.join(MANIFEST_NAME))?);
    let manifest: ScatterManifest = serde_json::from_reader(reader)?;
    let mut bundle = manifest.bundle;
    if !manifest.start_files.is_empty() {
        let mut list = Vec::with_capacity(manifest.start_files.len());
        for name in &manifest.start_files {
            let reader = BufReader::new(File::open(dir.join(name))?);
            list.push(serde_json::from_reader(reader)?);
        }
        bundle.optimize = Some(OptimizeResult::new(list));
    }
    debug!("Read scattered result from {}", dir.display());
    Ok(bundle)
}

// -------------------------------------------------------------------------
// Autosave
// -------------------------------------------------------------------------

/// The estimation task that just finished, for autosave logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Optimize,
    Profile,
    Sample,
}

/// Persist the bundle after a task section completed.
///
/// A no-op without a target path, so callers can thread an optional
/// autosave location through unconditionally. Always overwrites: the
/// bundle on disk is a snapshot that grows with each section.
pub fn autosave(
    result: &EstimationResult, target: Option<&Path>, section: Section,
) -> FitResult<()> {
    let Some(path) = target else {
        return Ok(());
    };
    debug!("Autosaving after {:?} to {}", section, path.display());
    write_result(result, path, true, &SaveSelection::all())
}
