extern crate env_logger;
#[macro_use]
extern crate log;
use std::{
    fs::File,
    io::{prelude::*, stdout, BufWriter},
    path::Path,
    time::Instant,
};

use anyhow::{Context, Result};
use clap::Parser;

mod classify;
mod cli;
mod duplicates;
mod file;
mod group;
mod mask;
mod options;
mod preset;
mod record;
mod summary;
mod table;

use cli::{Cli, Commands};
use file::RunMetadata;
use preset::TableFormat;
use table::Table;

/// Creates a `BufWriter` for the given output option. This allows for an output file to be passed
/// or otherwise will default to using standard output.
///
/// If `output` is `Some`, it creates a file at the specified path and returns a `BufWriter` for it.
/// If `output` is `None`, it returns a `BufWriter` for the standard output.
fn get_writer(output: &Option<String>) -> Result<impl Write> {
    // get output as a BufWriter - equal to stdout if None
    let writer = BufWriter::new(match output {
        Some(ref x) => {
            let file = File::create(Path::new(x))
                .with_context(|| format!("Unable to create output file {x}"))?;
            Box::new(file) as Box<dyn Write + Send>
        }
        None => Box::new(stdout()) as Box<dyn Write + Send>,
    });
    Ok(writer)
}

fn try_main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_target(false)
        .init();

    let cli = Cli::parse();

    // stdout may carry the output table, so this goes to the log
    info!("fnaclass v{}", cli::VERSION);

    match &cli.command {
        Commands::Classify {
            input,
            output,
            format,
            summary: summary_path,
            opts,
        } => {
            let now = Instant::now();
            let format = TableFormat::resolve(*format, input);

            info!("Reading comparison table {input}");
            let mut table = Table::from_path(input, format)?;
            info!(
                "Evaluating groups where {}={:?}",
                opts.cell_type_col_1, opts.subset_cell_type
            );

            let stats = classify::classify_table(&mut table, opts)?;
            stats.log_report(opts);

            let mut writer = get_writer(output)?;
            table.write(&mut writer, format)?;

            if let Some(path) = summary_path {
                let metadata = RunMetadata::new(input, opts, now.elapsed());
                summary::write_summary(path, &metadata, &stats)?;
            }

            info!("Completed successfully.")
        }
        Commands::Summary {
            input,
            output,
            format,
            opts,
        } => {
            let mut writer = get_writer(output)?;
            summary::summarize(input, *format, &mut writer, opts)?;
            writer.flush()?;
        }
    };
    Ok(())
}

fn main() {
    if let Err(err) = try_main() {
        error!("{}", err);

        // report any errors that are produced
        err.chain()
            .skip(1)
            .for_each(|cause| error!("  because: {}", cause));

        std::process::exit(1);
    }
}
