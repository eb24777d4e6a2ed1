use chrono::{DateTime, Utc};
use intrinsic_core::monte_carlo::{McValuationInput, McValuationRun};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::input;

/// Run-level facts stored alongside the raw values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRunMetadata {
    pub requested_trials: u32,
    pub completed_trials: u32,
    pub valid_trials: u32,
    pub cancelled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub generated_at: DateTime<Utc>,
    pub parameters: McValuationInput,
}

/// A persisted value distribution, reloadable without re-simulating.
///
/// Failed trials are stored as `null` and come back as NaN.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedRun {
    pub metadata: SavedRunMetadata,
    pub values: Vec<Option<f64>>,
}

impl SavedRun {
    pub fn from_run(input: &McValuationInput, run: &McValuationRun) -> Self {
        let report = &run.output.result;
        Self {
            metadata: SavedRunMetadata {
                requested_trials: report.requested_trials,
                completed_trials: report.completed_trials,
                valid_trials: report.valid_trials,
                cancelled: report.cancelled,
                seed: report.seed,
                generated_at: report.generated_at,
                parameters: input.clone(),
            },
            values: run
                .distribution
                .values()
                .into_iter()
                .map(|v| v.is_finite().then_some(v))
                .collect(),
        }
    }

    /// Flat distribution with NaN sentinels.
    pub fn values(&self) -> Vec<f64> {
        self.values.iter().map(|v| v.unwrap_or(f64::NAN)).collect()
    }
}

pub fn save_run(path: &str, run: &SavedRun) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(run)?;
    fs::write(Path::new(path), json).map_err(|e| format!("Failed to write '{}': {}", path, e))?;
    info!(path, trials = run.values.len(), "saved simulation run");
    Ok(())
}

pub fn load_run(path: &str) -> Result<SavedRun, Box<dyn std::error::Error>> {
    let run: SavedRun = input::file::read_input(path)?;
    if run.values.len() != run.metadata.completed_trials as usize {
        return Err(format!(
            "Saved run '{}' lists {} completed trials but stores {} values",
            path,
            run.metadata.completed_trials,
            run.values.len()
        )
        .into());
    }
    Ok(run)
}
