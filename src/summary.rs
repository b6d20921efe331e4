use std::io::prelude::*;

use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::json;

use crate::classify::{Label, LABEL_COLS};
use crate::file::RunMetadata;
use crate::options::{ClassifyOpts, QUALIFYING_IDENTITY_MIN};
use crate::preset::TableFormat;
use crate::record::text_cell;
use crate::table::Table;

/// How many groups resolved to each label value.
#[derive(Serialize, Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct LabelCounts {
    pub yes: usize,
    pub no: usize,
    #[serde(rename = "yes and no")]
    pub yes_and_no: usize,
}

impl LabelCounts {
    pub fn add(&mut self, label: Label) {
        match label {
            Label::Yes => self.yes += 1,
            Label::No => self.no += 1,
            Label::YesAndNo => self.yes_and_no += 1,
        }
    }

    pub fn get(&self, label: Label) -> usize {
        match label {
            Label::Yes => self.yes,
            Label::No => self.no,
            Label::YesAndNo => self.yes_and_no,
        }
    }
}

/// Diagnostics from a single classification run.
#[derive(Serialize, Debug, Default)]
pub struct ClassifyStats {
    pub rows_input: usize,
    /// Rows dropped as lower-support same-well duplicates
    pub rows_removed: usize,
    pub rows_remaining: usize,
    /// Rows whose first cell type is the subset type
    pub subset_rows: usize,
    pub groups: usize,
    pub ungrouped_rows: usize,
    /// Groups labelled "no" cross-epitope only because both epitopes were empty
    pub empty_epitope_matches: usize,
    /// Groups whose qualifying rows disagree on the first epitope
    pub epitope_conflicts: usize,
    /// Per label column, counts over groups
    pub labels: IndexMap<String, LabelCounts>,
}

impl ClassifyStats {
    /// Logs a human-readable report of the run.
    pub fn log_report(&self, opts: &ClassifyOpts) {
        log_label_counts(&opts.groupby_col, &self.labels);

        info!(
            "Sequences removed ({}>={QUALIFYING_IDENTITY_MIN} & {}>{}, same well, lower read): {}",
            opts.identity_col, opts.global_col, opts.global_threshold, self.rows_removed
        );
        info!("Remaining rows: {}", self.rows_remaining);
        info!(
            "Processed subset rows ({}=={:?}): {}",
            opts.cell_type_col_1, opts.subset_cell_type, self.subset_rows
        );
        info!(
            "{} groups classified as 'no' due to both epitopes empty: {}",
            opts.groupby_col, self.empty_epitope_matches
        );
        if self.epitope_conflicts > 0 {
            warn!(
                "{} groups had more than one first epitope; the first seen value was used",
                self.epitope_conflicts
            );
        }
    }
}

/// Logs the value counts of each label column, skipping values which never occur.
pub fn log_label_counts(groupby_col: &str, labels: &IndexMap<String, LabelCounts>) {
    info!("──────────── Summary (by {groupby_col}) ────────────");
    for (col, counts) in labels.iter() {
        for label in Label::ALL {
            let n = counts.get(label);
            if n > 0 {
                info!("{col:<28} {:<10} → {n}", label.as_str());
            }
        }
    }
}

/// Counts label values per group of an already labelled table. Each group contributes the first
/// non-empty value of each label column among its subset rows; groups with no value are not
/// counted.
///
/// # Errors
///
/// Returns an error if the group key, cell type, or any suffixed label column is missing.
pub fn count_labels(table: &Table, opts: &ClassifyOpts) -> Result<IndexMap<String, LabelCounts>> {
    let key_col = table.require(&opts.groupby_col)?;
    let type_col = table.require(&opts.cell_type_col_1)?;
    let suffix = opts.suffix();

    let mut summary = IndexMap::new();
    for name in LABEL_COLS {
        let col_name = format!("{name}{suffix}");
        let col = table.require(&col_name)?;

        let mut first_by_group: IndexMap<&str, Label> = IndexMap::new();
        for row in table.rows.iter() {
            if !opts.is_subset(text_cell(&row[type_col]).as_deref()) {
                continue;
            }
            if text_cell(&row[key_col]).is_none() {
                continue;
            }
            if let Some(label) = Label::parse(&row[col]) {
                first_by_group.entry(row[key_col].as_str()).or_insert(label);
            }
        }

        let mut counts = LabelCounts::default();
        for label in first_by_group.values() {
            counts.add(*label);
        }
        summary.insert(col_name, counts);
    }

    Ok(summary)
}

/// Writes the run metadata and statistics as pretty JSON.
pub fn write_summary(path: &str, metadata: &RunMetadata, stats: &ClassifyStats) -> Result<()> {
    let mut data = serde_json::to_value(metadata).context("Could not serialize run metadata")?;
    data["stats"] = serde_json::to_value(stats).context("Could not serialize statistics")?;

    let file = std::fs::File::create(path)
        .with_context(|| format!("Unable to create summary file {path}"))?;
    serde_json::to_writer_pretty(file, &data)?;

    info!("Wrote summary to {path}");
    Ok(())
}

/// Summarizes the labels of an already classified table and writes them as JSON.
///
/// # Arguments
///
/// * `input` - The path to the classified table.
/// * `format` - The table format, or `None` to infer it from the file extension.
/// * `writer` - Where the JSON is written.
/// * `opts` - Column names and subset type used when the table was classified.
pub fn summarize(
    input: &str,
    format: Option<TableFormat>,
    writer: &mut impl Write,
    opts: &ClassifyOpts,
) -> Result<()> {
    info!("Summarising labels in {input}");
    let table = Table::from_path(input, TableFormat::resolve(format, input))?;
    let labels = count_labels(&table, opts).context("Table does not look classified")?;

    log_label_counts(&opts.groupby_col, &labels);

    let data = json!({
        "input": input,
        "rows": table.len(),
        "labels": labels,
    });
    serde_json::to_writer_pretty(&mut *writer, &data)?;
    writeln!(writer)?;

    Ok(())
}
