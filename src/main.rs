use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Parser;

use rusty_lens::data::columnar::preview;
use rusty_lens::report::comparison_table;
use rusty_lens::{AppConfig, Choice, Comparison, ExportFormat, Selections, Session};

/// Filter a dataset and compare the target distribution before and after.
#[derive(Parser, Debug)]
#[command(name = "rusty-lens", version, about)]
struct Cli {
    /// Dataset to analyse (csv, xlsx, json, parquet)
    #[arg(required_unless_present = "print_config")]
    file: Option<PathBuf>,

    /// Config file (default: <config dir>/rusty-lens/config.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Target column whose distribution is compared
    #[arg(long)]
    target: Option<String>,

    /// Numeric column for the range filter
    #[arg(long)]
    range_column: Option<String>,

    /// Lower bound of the range filter (default: column minimum)
    #[arg(long)]
    min: Option<f64>,

    /// Upper bound of the range filter (default: column maximum)
    #[arg(long)]
    max: Option<f64>,

    /// Categorical selection, e.g. `job=admin,technician`. `all` keeps every value
    #[arg(long = "select", value_name = "COLUMN=V1,V2")]
    selections: Vec<String>,

    /// CSV field separator (default: sniffed)
    #[arg(long)]
    delimiter: Option<char>,

    /// Write the filtered rows as CSV
    #[arg(long, value_name = "PATH")]
    export_csv: Option<PathBuf>,

    /// Write the filtered rows as xlsx
    #[arg(long, value_name = "PATH")]
    export_xlsx: Option<PathBuf>,

    /// Write the original target distribution as xlsx
    #[arg(long, value_name = "PATH")]
    raw_distribution: Option<PathBuf>,

    /// Write the filtered target distribution as xlsx
    #[arg(long, value_name = "PATH")]
    filtered_distribution: Option<PathBuf>,

    /// Print the default config and exit
    #[arg(long)]
    print_config: bool,

    /// Debug logging (overridden by RUST_LOG)
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    if cli.print_config {
        print!("{}", AppConfig::default_toml()?);
        return Ok(());
    }

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(target) = &cli.target {
        config.target_column = target.clone();
    }
    if let Some(column) = &cli.range_column {
        config.filters.range_column = Some(column.clone());
    }
    if cli.delimiter.is_some() {
        config.delimiter = cli.delimiter;
    }
    config.validate()?;

    let selections = parse_selections(&cli)?;
    let Some(path) = cli.file.as_deref() else {
        bail!("no input file given");
    };

    let mut session = Session::new(config);
    let dataset = session
        .load_file(path)
        .with_context(|| format!("loading {}", path.display()))?;
    let rows = session.config().preview_rows;

    println!("## Before filters ({} rows)", dataset.len());
    println!("{}", preview(&dataset, rows)?);

    // Raw-side exports still run when the filters fail.
    let comparison = match session.apply(&selections) {
        Ok(c) => {
            println!("## After filters ({} rows)", c.filtered.len());
            println!("{}", preview(&c.filtered, rows)?);
            println!(
                "{}",
                comparison_table(
                    &session.config().target_column,
                    &c.raw_distribution,
                    &c.filtered_distribution,
                )
            );
            Some(c)
        }
        Err(e) => {
            eprintln!("Filter error: {e}");
            None
        }
    };

    write_artifacts(&session, comparison.as_ref(), &requested_artifacts(&cli));
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Artifact {
    Filtered(ExportFormat),
    RawDistribution,
    FilteredDistribution,
}

fn requested_artifacts(cli: &Cli) -> Vec<(&Path, Artifact)> {
    [
        (cli.export_csv.as_deref(), Artifact::Filtered(ExportFormat::Csv)),
        (cli.export_xlsx.as_deref(), Artifact::Filtered(ExportFormat::Spreadsheet)),
        (cli.raw_distribution.as_deref(), Artifact::RawDistribution),
        (cli.filtered_distribution.as_deref(), Artifact::FilteredDistribution),
    ]
    .into_iter()
    .filter_map(|(path, artifact)| Some((path?, artifact)))
    .collect()
}

/// Write every requested artifact. One failed export does not stop the
/// others; returns how many failed.
fn write_artifacts(
    session: &Session,
    comparison: Option<&Comparison>,
    artifacts: &[(&Path, Artifact)],
) -> usize {
    let mut failed = 0;
    for &(path, artifact) in artifacts {
        if let Err(e) = write_artifact(session, comparison, artifact, path) {
            log::warn!("{e:#}");
            eprintln!("Export error: {e:#}");
            failed += 1;
        }
    }
    failed
}

fn write_artifact(
    session: &Session,
    comparison: Option<&Comparison>,
    artifact: Artifact,
    path: &Path,
) -> Result<()> {
    let filtered = || {
        comparison.with_context(|| format!("skipping {}: filters were not applied", path.display()))
    };
    let bytes = match artifact {
        Artifact::Filtered(format) => session.export_filtered(filtered()?, format)?,
        Artifact::RawDistribution => session.export_raw_distribution(ExportFormat::Spreadsheet)?,
        Artifact::FilteredDistribution => {
            session.export_filtered_distribution(filtered()?, ExportFormat::Spreadsheet)?
        }
    };
    std::fs::write(path, bytes.as_slice()).with_context(|| format!("writing {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn parse_selections(cli: &Cli) -> Result<Selections> {
    let mut selections = Selections {
        lower: cli.min,
        upper: cli.max,
        ..Selections::default()
    };
    for pair in &cli.selections {
        let Some((column, values)) = pair.split_once('=') else {
            bail!("invalid selection '{pair}', expected COLUMN=V1,V2");
        };
        let choices: Vec<Choice> = if values.is_empty() {
            Vec::new()
        } else {
            values.split(',').map(Choice::parse).collect()
        };
        selections.categories.insert(column.to_string(), choices);
    }
    Ok(selections)
}
