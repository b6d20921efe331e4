use std::fs::File;
use std::io::prelude::*;

use anyhow::{Context, Result};
use csv::{ReaderBuilder, WriterBuilder};
use itertools::Itertools;
use thiserror::Error;

use crate::options::ClassifyOpts;
use crate::preset::TableFormat;
use crate::record::{is_missing, text_cell, ComparisonRecord};

pub const FIRST_WELL_COL: &str = "1st_sequence_or_well_id";
pub const SECOND_WELL_COL: &str = "2nd_sequence_or_well_id";
pub const FIRST_DONOR_COL: &str = "1st_real_subjectid";
pub const SECOND_DONOR_COL: &str = "2nd_real_subjectid";
pub const SECOND_CELL_TYPE_COL: &str = "2nd_cell_type";
pub const FIRST_READ_SUPPORT_COL: &str = "1st_mixcr_read";
pub const FIRST_EPITOPE_COL: &str = "1st_flowindex_epitope";
pub const SECOND_EPITOPE_COL: &str = "2nd_flowindex_epitope";

/// Passthrough columns which are synthesized as empty when the input lacks them.
pub const OPTIONAL_COLS: [&str; 3] = [
    "unique_within_sample_type",
    "cross_donor_sample_type",
    "cross_epitope_sample_type",
];

#[derive(Error, Debug)]
pub enum TableError {
    #[error(
        "required column `{column}` is missing from the input table
available columns:
    {available}"
    )]
    MissingColumn { column: String, available: String },

    #[error("row {row}: column `{column}` should be numeric, but instead got `{value}`")]
    InvalidNumber {
        column: String,
        row: usize,
        value: String,
    },
}

/// An in-memory delimited table. Every input column is kept, in order, so that the table can be
/// written back out with extra columns appended.
#[derive(Clone, Debug, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn from_path(path: &str, format: TableFormat) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Unable to open file {path}"))?;
        Self::from_reader(file, format).with_context(|| format!("Could not parse table {path}"))
    }

    pub fn from_reader(reader: impl Read, format: TableFormat) -> Result<Self> {
        let mut rdr = ReaderBuilder::new()
            .delimiter(format.delimiter())
            .has_headers(true)
            .from_reader(reader);

        let headers = rdr
            .headers()
            .context("Could not read the header row")?
            .iter()
            .map(str::to_string)
            .collect();

        let rows = rdr
            .records()
            .map_ok(|rec| rec.iter().map(str::to_string).collect())
            .collect::<csv::Result<Vec<Vec<String>>>>()?;

        Ok(Table { headers, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    /// Looks up a column, failing with `TableError::MissingColumn` if it is absent.
    pub fn require(&self, name: &str) -> Result<usize, TableError> {
        self.column(name).ok_or_else(|| TableError::MissingColumn {
            column: name.to_string(),
            available: self.headers.iter().join(", "),
        })
    }

    /// Returns the index of `name`, appending it as an empty column if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) -> usize {
        if let Some(idx) = self.column(name) {
            return idx;
        }
        self.headers.push(name.to_string());
        for row in self.rows.iter_mut() {
            row.push(String::new());
        }
        self.headers.len() - 1
    }

    pub fn cell(&self, row: usize, col: usize) -> &str {
        &self.rows[row][col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: &str) {
        self.rows[row][col] = value.to_string();
    }

    pub fn write(&self, writer: impl Write, format: TableFormat) -> Result<()> {
        let mut wtr = WriterBuilder::new()
            .delimiter(format.delimiter())
            .from_writer(writer);

        wtr.write_record(&self.headers)?;
        for row in self.rows.iter() {
            wtr.write_record(row)?;
        }
        wtr.flush()?;

        Ok(())
    }
}

/// Column positions of every field the classifier reads, resolved once when the table is loaded.
#[derive(Clone, Copy, Debug)]
pub struct Schema {
    group_key: usize,
    identity: usize,
    global_score: usize,
    first_well_id: usize,
    second_well_id: usize,
    first_donor_id: usize,
    second_donor_id: usize,
    first_cell_type: usize,
    second_cell_type: usize,
    first_read_support: usize,
    first_epitope: usize,
    second_epitope: usize,
}

impl Schema {
    pub fn resolve(table: &Table, opts: &ClassifyOpts) -> Result<Self, TableError> {
        Ok(Schema {
            group_key: table.require(&opts.groupby_col)?,
            identity: table.require(&opts.identity_col)?,
            global_score: table.require(&opts.global_col)?,
            first_well_id: table.require(FIRST_WELL_COL)?,
            second_well_id: table.require(SECOND_WELL_COL)?,
            first_donor_id: table.require(FIRST_DONOR_COL)?,
            second_donor_id: table.require(SECOND_DONOR_COL)?,
            first_cell_type: table.require(&opts.cell_type_col_1)?,
            second_cell_type: table.require(SECOND_CELL_TYPE_COL)?,
            first_read_support: table.require(FIRST_READ_SUPPORT_COL)?,
            first_epitope: table.require(FIRST_EPITOPE_COL)?,
            second_epitope: table.require(SECOND_EPITOPE_COL)?,
        })
    }

    /// Parses every row of the table into a `ComparisonRecord`. Numeric columns are validated
    /// here, so a malformed cell fails the whole run rather than a single group.
    pub fn records(&self, table: &Table) -> Result<Vec<ComparisonRecord>, TableError> {
        (0..table.len()).map(|row| self.record(table, row)).collect()
    }

    fn record(&self, table: &Table, row: usize) -> Result<ComparisonRecord, TableError> {
        let text = |col: usize| text_cell(table.cell(row, col));
        let number = |col: usize| parse_number(table, row, col);

        Ok(ComparisonRecord {
            row,
            group_key: text(self.group_key),
            identity: number(self.identity)?,
            global_score: number(self.global_score)?,
            first_well_id: text(self.first_well_id),
            second_well_id: text(self.second_well_id),
            first_donor_id: text(self.first_donor_id),
            second_donor_id: text(self.second_donor_id),
            first_cell_type: text(self.first_cell_type),
            second_cell_type: text(self.second_cell_type),
            first_read_support: number(self.first_read_support)?,
            first_epitope: text(self.first_epitope),
            second_epitope: text(self.second_epitope),
        })
    }
}

fn parse_number(table: &Table, row: usize, col: usize) -> Result<Option<f64>, TableError> {
    let cell = table.cell(row, col);
    if is_missing(cell) {
        return Ok(None);
    }

    cell.trim()
        .parse::<f64>()
        .map(Some)
        .map_err(|_| TableError::InvalidNumber {
            column: table.headers[col].clone(),
            // 1-indexed, counting data rows only
            row: row + 1,
            value: cell.to_string(),
        })
}
