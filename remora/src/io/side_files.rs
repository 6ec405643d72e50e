//! The three side files an initialization run may leave behind.
//!
//! All three are written only when a non-empty results path was
//! configured; without one the run produces no files at all. The files
//! are named after the database so several runs can share a directory.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::Path;

use crate::error::Error;
use crate::execution::engine::InitTimings;
use crate::graph::GraphMetrics;

/// Write `compatibility_<db>.json`, `cg_metrics_<db>.json`, and
/// `init_time_metrics_<db>.json` into the results directory, creating
/// it if necessary.
pub fn write_side_files(
    results_path: &Path,
    database: &str,
    compatibility: &BTreeMap<String, Vec<String>>,
    metrics: GraphMetrics,
    timings: InitTimings,
) -> Result<(), Error> {
    std::fs::create_dir_all(results_path).map_err(|error| Error::IoWriting {
        error,
        filename: results_path.display().to_string(),
    })?;

    write_json(
        &results_path.join(format!("compatibility_{database}.json")),
        compatibility,
    )?;
    write_json(
        &results_path.join(format!("cg_metrics_{database}.json")),
        &metrics.to_string(),
    )?;
    write_json(
        &results_path.join(format!("init_time_metrics_{database}.json")),
        &timings,
    )?;

    log::info!("side files written to {}", results_path.display());
    Ok(())
}

fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), Error> {
    let file = File::create(path).map_err(|error| Error::IoWriting {
        error,
        filename: path.display().to_string(),
    })?;
    serde_json::to_writer_pretty(file, value)?;
    Ok(())
}
