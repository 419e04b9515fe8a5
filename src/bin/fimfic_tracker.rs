use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use fimfic_tracker::app::{App, DownloadOptions, TrackOptions};
use fimfic_tracker::config::ConfigLoader;
use fimfic_tracker::download::ConfiguredDownloader;
use fimfic_tracker::error::TrackerError;
use fimfic_tracker::fimfiction::FimfictionClient;
use fimfic_tracker::output::Console;

#[derive(Parser)]
#[command(name = "fimfic-tracker")]
#[command(about = "Track Fimfiction stories and download them when they update")]
#[command(
    long_about = "Track Fimfiction stories and download them when they update.\n\n\
    The application directory defaults to ~/.fimfic-tracker and can be changed with the \
    FIMFIC_TRACKER_DIR environment variable. Settings are read from \
    /etc/fimfic-tracker/settings.json, the user config directory, the application directory \
    and finally --config, later files overriding earlier ones."
)]
#[command(version, author)]
struct Cli {
    /// Extra settings file applied on top of the default locations
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Track stories and download them")]
    Track(TrackArgs),
    #[command(about = "Stop tracking stories")]
    Untrack(UntrackArgs),
    #[command(about = "List tracked stories")]
    List(ListArgs),
    #[command(about = "Download tracked stories that have updated")]
    Download(DownloadArgs),
}

#[derive(Args)]
struct TrackArgs {
    /// Story URLs or IDs
    #[arg(required = true)]
    stories: Vec<String>,

    #[arg(long)]
    skip_download: bool,

    /// Replace already tracked stories without asking
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args)]
struct UntrackArgs {
    #[arg(required = true)]
    ids: Vec<String>,
}

#[derive(Args)]
struct ListArgs {
    /// One line per story
    #[arg(long, short)]
    short: bool,
}

#[derive(Args)]
struct DownloadArgs {
    /// Only check these stories
    ids: Vec<String>,

    /// Download every selected story, updated or not
    #[arg(long)]
    force: bool,

    #[arg(long, short = 'y')]
    assume_yes: bool,

    #[arg(long, short = 'n')]
    assume_no: bool,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<TrackerError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &TrackerError) -> u8 {
    if error.is_validation() { 2 } else { 1 }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Flag conflicts are rejected before settings, registry or network.
    let download_options = match &cli.command {
        Commands::Download(args) => Some(DownloadOptions::from_flags(
            args.force,
            args.assume_yes,
            args.assume_no,
            &args.ids,
        )?),
        _ => None,
    };

    let settings = ConfigLoader::resolve(cli.config.as_deref())?;
    let console = Console::new(settings.colors);
    let source = FimfictionClient::new(settings.data_source, settings.download_format)?;
    let downloader = ConfiguredDownloader::from_settings(&settings)?;
    let app = App::new(&settings, source, downloader);

    match cli.command {
        Commands::Track(args) => {
            let options = TrackOptions {
                skip_download: args.skip_download,
                overwrite: args.overwrite,
            };
            app.track(&args.stories, &options, &console, &console)?;
        }
        Commands::Untrack(args) => {
            app.untrack(&args.ids, &console)?;
        }
        Commands::List(args) => {
            let result = app.list()?;
            console.print_list(&result, args.short).into_diagnostic()?;
        }
        Commands::Download(_) => {
            let options = download_options
                .ok_or_else(|| miette::Report::msg("download options were not resolved"))?;
            let summary = app.download(&options, &console, &console)?;
            if summary.checked > 0 || !summary.failed.is_empty() {
                console.print_summary(&summary).into_diagnostic()?;
            }
        }
    }
    Ok(())
}
