//! Command-line front end for the scan session orchestrator.

mod manifest;

use anyhow::Context;
use clap::{Parser, Subcommand};
use granary_session::{Classifier, DispatchTiming, ScanController, SessionError, StartOutcome};
use manifest::{Manifest, ManifestExecutor, ManifestPlanner, ReplayStore};
use std::io::Write;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "granary", version, about = "Chunked archive scan orchestrator")]
struct Cli {
    /// TOML file overriding the built-in error classifier synonym lists
    #[arg(long, global = true)]
    synonyms: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Replay a scripted scan manifest through the full session pipeline
    Replay {
        /// JSON manifest describing the scan and its chunk responses
        manifest: PathBuf,

        /// Skip the inter-chunk cool-downs
        #[arg(long)]
        fast: bool,

        /// Answer the destructive-reset confirmation without prompting
        #[arg(long)]
        yes: bool,
    },
    /// Classify an error message and print its category
    Classify {
        /// The raw error message to classify
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("granary=info")),
        )
        .init();

    let cli = Cli::parse();
    let classifier = match &cli.synonyms {
        Some(path) => Classifier::from_path(path)
            .with_context(|| format!("loading synonym config from {}", path.display()))?,
        None => Classifier::default(),
    };

    match cli.command {
        Command::Replay {
            manifest,
            fast,
            yes,
        } => replay(&manifest, fast, yes, classifier).await,
        Command::Classify { message } => {
            println!("{}", classifier.classify(&message));
            Ok(())
        }
    }
}

async fn replay(
    manifest_path: &PathBuf,
    fast: bool,
    yes: bool,
    classifier: Classifier,
) -> anyhow::Result<()> {
    let manifest = Manifest::from_path(manifest_path)
        .with_context(|| format!("loading manifest {}", manifest_path.display()))?;
    let source = manifest.source();
    let reset_store = manifest.reset_store;

    let timing = if fast {
        DispatchTiming::immediate()
    } else {
        DispatchTiming::default()
    };
    let planner = ManifestPlanner::new(manifest.clone());
    let executor = ManifestExecutor::new(&manifest);
    let mut controller =
        ScanController::with_config(planner, executor, ReplayStore, classifier, timing);

    let started = controller.start(source, reset_store).await;
    match started {
        Ok(StartOutcome::Started) => {}
        Ok(StartOutcome::AwaitingResetConfirmation(prompt)) => {
            println!("{}", prompt.message);
            if yes || confirm_from_stdin()? {
                controller
                    .confirm_reset()
                    .await
                    .context("store reset failed")?;
            } else {
                controller.decline_reset()?;
                info!("Reset declined; nothing was scanned");
                return Ok(());
            }
        }
        Err(error) => return finish_failed(&mut controller, error).await,
    }

    let progress = controller.watch().map(|mut rx| {
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow().clone();
                info!(
                    percent = snapshot.percent_complete,
                    chunk = snapshot.current_chunk_index,
                    total_chunks = snapshot.total_chunks,
                    errors = snapshot.error_count,
                    eta = %snapshot.eta_display(),
                    "Progress"
                );
                if snapshot.status.is_terminal() {
                    break;
                }
            }
        })
    });

    let report = controller.wait().await?;
    if let Some(progress) = progress {
        let _ = progress.await;
    }
    print!("{report}");
    if report.status != granary_protocol::SessionStatus::Completed {
        std::process::exit(1);
    }
    Ok(())
}

async fn finish_failed<P, E, M>(
    controller: &mut ScanController<P, E, M>,
    error: SessionError,
) -> anyhow::Result<()>
where
    P: granary_protocol::ChunkPlanner + 'static,
    E: granary_protocol::ChunkExecutor + 'static,
    M: granary_protocol::StoreMaintenance + 'static,
{
    eprintln!("scan failed to start: {error}");
    if let Ok(report) = controller.wait().await {
        print!("{report}");
    }
    std::process::exit(1);
}

fn confirm_from_stdin() -> anyhow::Result<bool> {
    print!("Proceed? [y/N] ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim().to_lowercase();
    Ok(answer == "y" || answer == "yes")
}
