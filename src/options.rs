use clap::Args;

/// Minimum identity (inclusive) for a comparison to count as a qualifying match.
pub const QUALIFYING_IDENTITY_MIN: f64 = 99.0;

/// Exact identity required for two subset sequences to count as identical. This is deliberately
/// stricter than `QUALIFYING_IDENTITY_MIN`.
pub const IDENTICAL_MATCH_IDENTITY: f64 = 100.0;

/// Suffix used for the label columns when no subset cell type is given.
pub const ALL_ROWS_SUFFIX: &str = "_all";

/// Options shared by every subcommand which reads a comparison table.
#[derive(Args, Clone, Debug)]
pub struct ClassifyOpts {
    /// the column holding the first sequence identifier, which defines each group
    #[arg(long, default_value = "1st_sequence_id")]
    pub groupby_col: String,

    /// the column holding the percentage identity of each comparison
    #[arg(long, default_value = "identity")]
    pub identity_col: String,

    /// the column holding the global alignment score of each comparison
    #[arg(long, default_value = "global")]
    pub global_col: String,

    /// the cell type whose rows are labelled. an empty value labels every row
    #[arg(long, default_value = "Bcell")]
    pub subset_cell_type: String,

    /// comparisons must have a global score strictly greater than this to qualify
    #[arg(long, default_value_t = 50.0)]
    pub global_threshold: f64,

    /// the column holding the cell type of the first sequence
    #[arg(long = "cell-type-col", default_value = "1st_cell_type")]
    pub cell_type_col_1: String,
}

impl Default for ClassifyOpts {
    fn default() -> Self {
        ClassifyOpts {
            groupby_col: "1st_sequence_id".to_string(),
            identity_col: "identity".to_string(),
            global_col: "global".to_string(),
            subset_cell_type: "Bcell".to_string(),
            global_threshold: 50.0,
            cell_type_col_1: "1st_cell_type".to_string(),
        }
    }
}

impl ClassifyOpts {
    /// Whether a cell type value belongs to the configured subset. With an empty subset type,
    /// every row is a member.
    pub fn is_subset(&self, cell_type: Option<&str>) -> bool {
        if self.subset_cell_type.is_empty() {
            return true;
        }
        cell_type == Some(self.subset_cell_type.as_str())
    }

    /// The suffix appended to each label column, e.g. `_Bcell`.
    pub fn suffix(&self) -> String {
        if self.subset_cell_type.is_empty() {
            ALL_ROWS_SUFFIX.to_string()
        } else {
            format!("_{}", self.subset_cell_type)
        }
    }
}
