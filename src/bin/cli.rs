use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use physician_map::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pmcli")]
#[command(version, about = "Physician Map CLI - Browse, filter, and export a provider directory", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the occupations, specialties, subspecialties, and languages in the data
    Facets(FacetsArgs),
    /// Filter providers and show the markers that would be drawn
    Search(SearchArgs),
    /// Show summary statistics for the data
    Stats(SourceArgs),
    /// Export filtered providers to JSON or CSV
    Export(ExportArgs),
}

#[derive(Args)]
struct SourceArgs {
    /// Read a saved `{ "physicians": [...] }` payload instead of fetching
    #[arg(short, long, conflicts_with = "endpoint")]
    input: Option<PathBuf>,
    /// Directory endpoint URL (defaults to the configured one)
    #[arg(short, long)]
    endpoint: Option<String>,
    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[derive(Args)]
struct FacetsArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Only list subspecialties found under this specialty (substring match)
    #[arg(long)]
    specialty: Option<String>,
}

#[derive(Args)]
struct CriteriaArgs {
    /// Occupation filter (case-insensitive substring)
    #[arg(long)]
    occupation: Option<String>,
    /// Specialty filter (case-insensitive substring)
    #[arg(long)]
    specialty: Option<String>,
    /// Subspecialty filter (ignored when the data has no subspecialty column)
    #[arg(long)]
    subspecialty: Option<String>,
    /// Language filter (case-insensitive substring)
    #[arg(long)]
    language: Option<String>,
    /// 5-digit zip code to search around
    #[arg(long)]
    zip: Option<String>,
    /// Search radius in miles (defaults to the configured distance)
    #[arg(long)]
    distance: Option<f64>,
}

#[derive(Args)]
struct SearchArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    criteria: CriteriaArgs,
    /// Number of markers to list
    #[arg(long, default_value_t = 20)]
    limit: usize,
    /// Print full popup details for each listed marker
    #[arg(long)]
    details: bool,
}

#[derive(Args)]
struct ExportArgs {
    #[command(flatten)]
    source: SourceArgs,
    #[command(flatten)]
    criteria: CriteriaArgs,
    /// Output file path
    #[arg(short, long)]
    output: PathBuf,
    /// Export format
    #[arg(long, value_enum, default_value_t = ExportFormatOpt::Json)]
    format: ExportFormatOpt,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
enum ExportFormatOpt {
    Json,
    Csv,
}

impl From<ExportFormatOpt> for ExportFormat {
    fn from(opt: ExportFormatOpt) -> Self {
        match opt {
            ExportFormatOpt::Json => ExportFormat::Json,
            ExportFormatOpt::Csv => ExportFormat::Csv,
        }
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to create tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    let outcome = runtime.block_on(async {
        match cli.command {
            Commands::Facets(args) => cmd_facets(args).await,
            Commands::Search(args) => cmd_search(args).await,
            Commands::Stats(args) => cmd_stats(args).await,
            Commands::Export(args) => cmd_export(args).await,
        }
    });

    if let Err(e) = outcome {
        match e.downcast_ref::<LocatorError>() {
            Some(err) => eprintln!("Error: {}", err.user_message()),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}

/// Resolve configuration and fetch the dataset, with a spinner while waiting
async fn load(args: &SourceArgs) -> anyhow::Result<(LocatorConfig, Arc<ProviderDataset>)> {
    let config = LocatorConfig::load(args.config.as_deref())?;

    let source: Box<dyn ProviderSource> = match (&args.input, &args.endpoint) {
        (Some(path), _) => Box::new(FileProviderSource::new(path)),
        (None, Some(url)) => Box::new(HttpProviderSource::with_config(url.as_str(), &config)?),
        (None, None) => match config.endpoint_url.as_deref() {
            Some(url) => Box::new(HttpProviderSource::with_config(url, &config)?),
            None => bail!(
                "No data source: pass --input or --endpoint, or set endpoint_url in {}",
                LocatorConfig::default_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "config.toml".to_string())
            ),
        },
    };

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message(StatusMessage::Loading.text());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let loaded = ProviderDataset::load(source.as_ref()).await;
    spinner.finish_and_clear();

    let dataset = loaded
        .map_err(|e| anyhow::anyhow!(StatusMessage::Error(e.to_string()).text()))
        .with_context(|| format!("while loading from {}", source.describe()))?;
    Ok((config, Arc::new(dataset)))
}

fn build_criteria(args: &CriteriaArgs, config: &LocatorConfig) -> anyhow::Result<FilterCriteria> {
    let mut criteria = FilterCriteria::new();
    if let Some(occupation) = &args.occupation {
        criteria = criteria.occupation(occupation.as_str());
    }
    if let Some(specialty) = &args.specialty {
        criteria = criteria.specialty(specialty.as_str());
    }
    if let Some(subspecialty) = &args.subspecialty {
        criteria = criteria.subspecialty(subspecialty.as_str());
    }
    if let Some(language) = &args.language {
        criteria = criteria.language(language.as_str());
    }
    if let Some(zip) = &args.zip {
        // Reject typos up front; the library would just skip the distance stage
        ZipCode::new(zip)?;
        let miles = args.distance.unwrap_or(config.default_distance_miles);
        criteria = criteria.within(zip.as_str(), miles);
    }
    Ok(criteria)
}

async fn run_filter(
    dataset: &Arc<ProviderDataset>,
    config: &LocatorConfig,
    args: &CriteriaArgs,
) -> anyhow::Result<Vec<ProviderRecord>> {
    let criteria = build_criteria(args, config)?;
    let geocoder = HttpGeocoder::with_config(config.geocode_base_url.as_str(), config)?;
    let session = Session::new(Arc::new(geocoder), config).with_debounce(Duration::ZERO);
    session.install(Arc::clone(dataset));

    match session.filter(criteria).await {
        FilterOutcome::Applied(pass) => Ok(pass.records),
        FilterOutcome::Superseded => bail!("filter pass was superseded"),
    }
}

async fn cmd_facets(args: FacetsArgs) -> anyhow::Result<()> {
    let (_, dataset) = load(&args.source).await?;
    let facets = dataset.facets();

    if let Some(specialty) = args.specialty.as_deref() {
        if !facets.supports_subspecialty() {
            println!("No subspecialty column in this data.");
            return Ok(());
        }
        for subspecialty in facets.subspecialties_for(specialty) {
            println!("{}", subspecialty);
        }
        return Ok(());
    }

    println!("Occupations ({}):", facets.occupations().len());
    for value in facets.occupations() {
        println!("  {}", value);
    }
    println!("Specialties ({}):", facets.specialties().len());
    for value in facets.specialties() {
        println!("  {}", value);
    }
    match facets.subspecialty_field() {
        Some(field) => {
            println!("Subspecialties ({}, from '{}'):", facets.all_subspecialties().len(), field);
            for value in facets.all_subspecialties() {
                println!("  {}", value);
            }
        }
        None => println!("Subspecialties: not present in data"),
    }
    println!("Languages ({}):", facets.languages().len());
    for value in facets.languages() {
        println!("  {}", value);
    }
    Ok(())
}

async fn cmd_search(args: SearchArgs) -> anyhow::Result<()> {
    let (config, dataset) = load(&args.source).await?;
    let matches = run_filter(&dataset, &config, &args.criteria).await?;

    let renderer = MarkerRenderer::from_config(&config);
    let result = renderer.render(&matches, dataset.len());
    let subspecialty_field = dataset.facets().subspecialty_field();

    for (index, marker) in result.markers.iter().enumerate().take(args.limit) {
        println!(
            "{:>4}. {} ({:.5}, {:.5})",
            index + 1,
            marker.label,
            marker.position.latitude,
            marker.position.longitude
        );
        if args.details {
            if let Some(detail) = result.detail(&matches, index, subspecialty_field) {
                print!("{}", detail);
            }
        }
    }
    if result.displayed() > args.limit {
        println!("  ... {} more", result.displayed() - args.limit);
    }
    if result.skipped_invalid > 0 {
        println!("Skipped {} provider(s) without usable coordinates", result.skipped_invalid);
    }

    match result.viewport {
        ViewportAction::FitBounds(b) => println!(
            "Viewport: fit to ({:.4}, {:.4}) - ({:.4}, {:.4})",
            b.south, b.west, b.north, b.east
        ),
        ViewportAction::ResetDefault { center, zoom } => println!(
            "Viewport: reset to ({:.4}, {:.4}) at zoom {}",
            center.latitude, center.longitude, zoom
        ),
        ViewportAction::Keep => println!("Viewport: unchanged"),
    }
    println!("{}", result.summary());
    Ok(())
}

async fn cmd_stats(args: SourceArgs) -> anyhow::Result<()> {
    let (_, dataset) = load(&args).await?;
    dataset.statistics().print_summary();
    Ok(())
}

async fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let (config, dataset) = load(&args.source).await?;
    let matches = run_filter(&dataset, &config, &args.criteria).await?;

    physician_map::export::export_records(&matches, &args.output, args.format.into())
        .with_context(|| format!("failed to write {}", args.output.display()))?;
    println!(
        "Exported {} of {} provider(s) to {}",
        matches.len(),
        dataset.len(),
        args.output.display()
    );
    Ok(())
}
