use std::path::Path;

/// Enum representing the supported delimited table formats.
#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum TableFormat {
    /// comma-separated values
    Csv,

    /// tab-separated values
    Tsv,
}

impl TableFormat {
    /// Infers the table format from a file extension. `.tsv` and `.txt` files are tab-delimited,
    /// and anything else is treated as comma-delimited.
    pub fn from_path(path: &str) -> Self {
        let ext = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());

        match ext.as_deref() {
            Some("tsv") | Some("txt") => TableFormat::Tsv,
            _ => TableFormat::Csv,
        }
    }

    /// Returns the explicit format if one was given, otherwise infers it from `path`.
    pub fn resolve(explicit: Option<TableFormat>, path: &str) -> Self {
        explicit.unwrap_or_else(|| Self::from_path(path))
    }

    pub fn delimiter(&self) -> u8 {
        match self {
            TableFormat::Csv => b',',
            TableFormat::Tsv => b'\t',
        }
    }
}
