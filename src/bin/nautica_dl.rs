use std::process::ExitCode;

use clap::Parser;
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use nautica_sync::client::NauticaHttpClient;
use nautica_sync::config::{ExtractorKind, SettingsLoader, SettingsOverrides};
use nautica_sync::domain::SyncTarget;
use nautica_sync::error::NauticaError;
use nautica_sync::extract;
use nautica_sync::output::{self, JsonOutput, OutputMode};
use nautica_sync::store::MetaStore;
use nautica_sync::sync::{StalenessPolicy, SyncOutcome, Syncer};

#[derive(Parser)]
#[command(name = "nautica-dl")]
#[command(about = "Download new and updated charts from Nautica into per-uploader folders")]
#[command(version)]
struct Cli {
    /// Destination directory [default: ./nautica]
    #[arg(long)]
    dest: Option<String>,

    /// Download a single song by id
    #[arg(long, conflicts_with = "user")]
    song: Option<String>,

    /// Download every song uploaded by this user id
    #[arg(long)]
    user: Option<String>,

    /// Keep scanning after five consecutive up-to-date songs
    #[arg(long = "continue")]
    should_continue: bool,

    /// Settings file (defaults to ./nautica.json when present)
    #[arg(long)]
    config: Option<String>,

    #[arg(long)]
    base_url: Option<String>,

    /// HTTP timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    #[arg(long, value_enum)]
    extractor: Option<ExtractorKind>,

    /// Filename encoding passed to unar (e.g. shift_jis)
    #[arg(long)]
    encoding: Option<String>,

    /// Print the sync report as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    match run() {
        Ok(SyncOutcome::Aborted) => ExitCode::from(1),
        Ok(_) => ExitCode::SUCCESS,
        Err(report) => {
            eprintln!("{report:?}");
            if let Some(error) = report.downcast_ref::<NauticaError>() {
                return ExitCode::from(map_exit_code(error));
            }
            ExitCode::from(1)
        }
    }
}

fn map_exit_code(error: &NauticaError) -> u8 {
    match error {
        NauticaError::InvalidSongId(_)
        | NauticaError::InvalidUserId(_)
        | NauticaError::ConflictingTargets
        | NauticaError::ConfigRead(_)
        | NauticaError::ConfigParse(_) => 2,
        NauticaError::Http(_)
        | NauticaError::HttpStatus { .. }
        | NauticaError::MissingTool(_)
        | NauticaError::Extraction(_) => 3,
        _ => 1,
    }
}

fn run() -> miette::Result<SyncOutcome> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    let target = SyncTarget::from_args(cli.song.as_deref(), cli.user.as_deref())?;
    let settings = SettingsLoader::resolve(
        cli.config.as_deref(),
        SettingsOverrides {
            dest: cli.dest,
            base_url: cli.base_url,
            timeout_secs: cli.timeout_secs,
            extractor: cli.extractor,
            filename_encoding: cli.encoding,
        },
    )?;
    tracing::debug!(?settings, "resolved settings");

    let store = MetaStore::open(settings.dest.clone())?;
    let client = NauticaHttpClient::new(&settings)?;
    let extractor = extract::from_settings(&settings);
    let syncer = Syncer::new(
        store,
        client,
        extractor,
        StalenessPolicy::from_settings(&settings),
    );

    let report = syncer.run(&target, cli.should_continue)?;
    match output_mode {
        OutputMode::Json => JsonOutput::print_report(&report).into_diagnostic()?,
        OutputMode::Human => output::print_summary(&report).into_diagnostic()?,
    }
    Ok(report.outcome)
}
