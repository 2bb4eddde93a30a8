use std::path::Path;
use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;
use url::Url;

use physiograb::app::{App, SyncOptions, SyncResult};
use physiograb::config::{ConfigLoader, DEFAULT_SAMPLES_DIR, GroupFilter};
use physiograb::domain::{GroupCode, RecordId};
use physiograb::error::GrabError;
use physiograb::output::{JsonOutput, OutputMode, TraceSink};
use physiograb::site::{SiteClient, SiteHttpClient};
use physiograb::store::Store;

#[derive(Parser)]
#[command(name = "physiograb")]
#[command(about = "Fetch challenge waveform training-set records and plot their channels")]
#[command(version, author)]
struct Cli {
    #[arg(long, global = true)]
    non_interactive: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Scrape the listing page and download record files")]
    Sync(SyncArgs),
    #[command(about = "List channels of a downloaded record")]
    Channels(ChannelsArgs),
    #[command(about = "Plot one channel of a downloaded record")]
    Plot(PlotArgs),
}

#[derive(Args)]
struct SyncArgs {
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    max_groups: Option<usize>,

    #[arg(long, value_delimiter = ',')]
    groups: Option<Vec<String>>,

    #[arg(long)]
    dir: Option<String>,

    #[arg(long)]
    dry_run: bool,
}

#[derive(Args)]
struct ChannelsArgs {
    record: String,

    #[arg(long)]
    dir: Option<String>,
}

#[derive(Args)]
struct PlotArgs {
    record: String,
    channel: String,

    #[arg(long)]
    dir: Option<String>,

    #[arg(long)]
    output: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(grab) = report.downcast_ref::<GrabError>() {
            return ExitCode::from(map_exit_code(grab));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &GrabError) -> u8 {
    match error {
        GrabError::RecordNotFound(_)
        | GrabError::ChannelNotFound { .. }
        | GrabError::MalformedPage(_)
        | GrabError::ConfigRead(_) => 2,
        GrabError::SiteHttp(_) | GrabError::SiteStatus { .. } => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.non_interactive {
        OutputMode::NonInteractive
    } else {
        OutputMode::Interactive
    };

    match cli.command {
        Commands::Sync(args) => run_sync(args, output_mode),
        Commands::Channels(args) => run_channels(args, output_mode),
        Commands::Plot(args) => run_plot(args, output_mode),
    }
}

fn run_sync(args: SyncArgs, output_mode: OutputMode) -> miette::Result<()> {
    let mut config = ConfigLoader::resolve(args.config.as_deref()).into_diagnostic()?;
    if let Some(count) = args.max_groups {
        config.groups = GroupFilter::Max(count);
    }
    if let Some(codes) = args.groups {
        let codes = codes
            .iter()
            .map(|code| code.parse())
            .collect::<Result<Vec<GroupCode>, GrabError>>()
            .into_diagnostic()?;
        config.groups = GroupFilter::Include(codes);
    }
    if let Some(dir) = args.dir {
        config.samples_dir = Utf8PathBuf::from(dir);
    }

    let site = SiteHttpClient::new(config.timeout, config.max_retries).into_diagnostic()?;
    let store = Store::new(config.samples_dir.clone());
    let app = App::new(store, site);
    let options = SyncOptions {
        dry_run: args.dry_run,
    };

    let result = match output_mode {
        OutputMode::Interactive => app.sync(&config, options, &TraceSink).into_diagnostic()?,
        OutputMode::NonInteractive => app.sync(&config, options, &JsonOutput).into_diagnostic()?,
    };

    match output_mode {
        OutputMode::Interactive => print_sync_summary(&result),
        OutputMode::NonInteractive => JsonOutput::print_sync(&result).into_diagnostic()?,
    }
    Ok(())
}

fn run_channels(args: ChannelsArgs, output_mode: OutputMode) -> miette::Result<()> {
    let id: RecordId = args.record.parse().into_diagnostic()?;
    let app = local_app(args.dir);

    let result = app.channels(&id, &TraceSink).into_diagnostic()?;
    match output_mode {
        OutputMode::Interactive => {
            println!(
                "{} channels, {} samples at {} Hz",
                result.channels.len(),
                result.samples,
                result.sampling_frequency
            );
            for name in &result.channels {
                println!("  {name}");
            }
        }
        OutputMode::NonInteractive => JsonOutput::print_channels(&result).into_diagnostic()?,
    }
    Ok(())
}

fn run_plot(args: PlotArgs, output_mode: OutputMode) -> miette::Result<()> {
    let id: RecordId = args.record.parse().into_diagnostic()?;
    let output = Utf8PathBuf::from(
        args.output
            .unwrap_or_else(|| format!("{}_{}.png", args.record, args.channel)),
    );
    let app = local_app(args.dir);

    let result = app
        .plot(&id, &args.channel, &output, &TraceSink)
        .into_diagnostic()?;
    match output_mode {
        OutputMode::Interactive => {
            println!(
                "plotted {} of {} ({} samples, {:.1}s) to {}",
                result.channel, result.record, result.samples, result.duration_secs, result.output
            );
        }
        OutputMode::NonInteractive => JsonOutput::print_plot(&result).into_diagnostic()?,
    }
    Ok(())
}

fn local_app(dir: Option<String>) -> App<NopSite> {
    let samples_dir =
        Utf8PathBuf::from(dir.unwrap_or_else(|| DEFAULT_SAMPLES_DIR.to_string()));
    App::new(Store::new(samples_dir), NopSite)
}

fn print_sync_summary(result: &SyncResult) {
    let green = "\x1b[32m";
    let cyan = "\x1b[36m";
    let reset = "\x1b[0m";

    println!("{cyan}physiograb sync summary{reset}");
    println!("{green}records processed: {}{reset}", result.items.len());
    for item in &result.items {
        println!(
            "{cyan}  {} (group {}, {}): {} file(s){reset}",
            item.record,
            item.group,
            item.action,
            item.files.len()
        );
        for path in &item.paths {
            println!("    {path}");
        }
    }
}

/// Local read/plot commands never reach the network.
#[derive(Clone, Copy)]
struct NopSite;

impl SiteClient for NopSite {
    fn fetch_page(&self, _url: &Url) -> Result<String, GrabError> {
        Err(GrabError::SiteHttp("site client not configured".to_string()))
    }

    fn download_file(&self, _url: &Url, _destination: &Path) -> Result<(), GrabError> {
        Err(GrabError::SiteHttp("site client not configured".to_string()))
    }
}
