/// Cell values treated as missing, after trimming whitespace. These are the default null
/// markers of common spreadsheet and dataframe exports.
const MISSING_TOKENS: [&str; 19] = [
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Placeholder epitope used when either side of a comparison has no annotation.
pub const EMPTY_EPITOPE: &str = "empty";

/// One row of the input table: a comparison between a "first" and a "second" sequence.
///
/// Missing cells are `None`, and a `None` never compares equal to anything (including another
/// `None`). See `same_value`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ComparisonRecord {
    /// The 0-indexed position of this row in the input table
    pub row: usize,
    pub group_key: Option<String>,
    pub identity: Option<f64>,
    pub global_score: Option<f64>,
    pub first_well_id: Option<String>,
    pub second_well_id: Option<String>,
    pub first_donor_id: Option<String>,
    pub second_donor_id: Option<String>,
    pub first_cell_type: Option<String>,
    pub second_cell_type: Option<String>,
    /// Read depth of the first sequence, used to pick between same-well duplicates
    pub first_read_support: Option<f64>,
    pub first_epitope: Option<String>,
    pub second_epitope: Option<String>,
}

impl ComparisonRecord {
    pub fn same_well(&self) -> bool {
        same_value(&self.first_well_id, &self.second_well_id)
    }

    pub fn same_donor(&self) -> bool {
        same_value(&self.first_donor_id, &self.second_donor_id)
    }

    pub fn first_epitope_normalized(&self) -> &str {
        normalize_epitope(self.first_epitope.as_deref())
    }

    pub fn second_epitope_normalized(&self) -> &str {
        normalize_epitope(self.second_epitope.as_deref())
    }
}

/// Returns true if a raw cell should be treated as a missing value.
pub fn is_missing(cell: &str) -> bool {
    MISSING_TOKENS.contains(&cell.trim())
}

/// Converts a raw cell into an owned value, or `None` if it is missing.
pub fn text_cell(cell: &str) -> Option<String> {
    if is_missing(cell) {
        None
    } else {
        Some(cell.to_string())
    }
}

fn same_value(a: &Option<String>, b: &Option<String>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Trims an epitope annotation, replacing a missing or blank value with `EMPTY_EPITOPE`.
pub fn normalize_epitope(epitope: Option<&str>) -> &str {
    match epitope.map(str::trim) {
        Some(e) if !is_missing(e) => e,
        _ => EMPTY_EPITOPE,
    }
}
