use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::options::{ClassifyOpts, QUALIFYING_IDENTITY_MIN};

/// Information about a classification run, written alongside its statistics.
#[derive(Serialize, Deserialize, Default, Debug)]
pub struct RunMetadata {
    pub fnaclass_version: String,
    pub file_path: String,
    pub run_date: String,
    pub elapsed: f64,
    pub subset_cell_type: String,
    pub identity_threshold: f64,
    pub global_threshold: f64,
}

impl RunMetadata {
    pub fn new(input: &str, opts: &ClassifyOpts, elapsed: Duration) -> Self {
        // fall back to the path as given if it cannot be resolved
        let file_path = std::fs::canonicalize(input)
            .map(|p| p.display().to_string())
            .unwrap_or_else(|_| input.to_string());

        RunMetadata {
            fnaclass_version: crate::cli::VERSION.to_string(),
            file_path,
            run_date: format!("{:?}", chrono::offset::Local::now()),
            elapsed: elapsed.as_secs_f64(),
            subset_cell_type: opts.subset_cell_type.clone(),
            identity_threshold: QUALIFYING_IDENTITY_MIN,
            global_threshold: opts.global_threshold,
        }
    }
}
