use clap::builder::styling::AnsiColor;
use clap::builder::Styles;
use clap::{Parser, Subcommand};

use crate::options::ClassifyOpts;
use crate::preset::TableFormat;

const fn extra_build_info() -> &'static str {
    match option_env!("CARGO_BUILD_DESC") {
        Some(e) => e,
        None => env!("CARGO_PKG_VERSION"),
    }
}
pub const VERSION: &str = extra_build_info();
const INFO_STRING: &str = "
🧬 fnaclass version ";
const AFTER_STRING: &str = "
   ──────────────────────────────────
   uniqueness, cross-donor and cross-epitope labels
   for paired B-cell sequence comparisons";

// colouring of the help
const STYLES: Styles = Styles::styled()
    .header(AnsiColor::Yellow.on_default().bold())
    .usage(AnsiColor::BrightMagenta.on_default().bold())
    .literal(AnsiColor::BrightMagenta.on_default())
    .placeholder(AnsiColor::White.on_default());

#[derive(Parser)]
#[command(
    version = VERSION,
    about = format!("{}{}{}", INFO_STRING, VERSION, AFTER_STRING),
    arg_required_else_help = true,
    flatten_help = true,
    styles = STYLES
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Label every comparison group of a table and write the augmented table
    #[command(arg_required_else_help = true)]
    Classify {
        /// the input comparison table (.csv or .tsv)
        input: String,

        /// the output table, in the same format as the input. defaults to standard output
        #[arg(short)]
        output: Option<String>,

        /// the table format. by default this is inferred from the input file extension:
        ///   .tsv and .txt are tab-delimited, everything else is comma-delimited
        #[arg(long, value_enum, verbatim_doc_comment)]
        format: Option<TableFormat>,

        /// write a JSON summary of the run to this file
        #[arg(long)]
        summary: Option<String>,

        #[command(flatten)]
        opts: ClassifyOpts,
    },

    /// Count the group-level labels of an already classified table
    #[command(arg_required_else_help = true)]
    Summary {
        /// the classified table
        input: String,

        /// write the label counts as JSON to this file. defaults to standard output
        #[arg(short)]
        output: Option<String>,

        /// the table format, see `classify --help`
        #[arg(long, value_enum)]
        format: Option<TableFormat>,

        #[command(flatten)]
        opts: ClassifyOpts,
    },
}
