//! Pegasus binary entry point

use clap::{Parser, Subcommand};
use pegasus::service::{LoadOutcome, ProgressReporter};
use pegasus::{AppContext, config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pegasus")]
#[command(about = "Offline content sync for ILIAS", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Local user the command acts for
    #[arg(short, long, global = true, default_value = "1")]
    user_id: i64,

    /// Print Prometheus metrics after the command
    #[arg(long, global = true)]
    print_metrics: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Download or refresh a learning module
    LoadModule {
        /// ILIAS object id of the module
        #[arg(short, long)]
        obj_id: i64,
    },

    /// Recompute needs-download flags from a node upwards
    RefreshAvailability {
        /// ILIAS reference id of the node
        #[arg(short, long)]
        ref_id: i64,
    },

    /// Unmark a favorite and delete the offline copies it held
    RemoveFavorite {
        /// ILIAS reference id of the favorite
        #[arg(short, long)]
        ref_id: i64,

        /// Keep going when a stored copy cannot be deleted
        #[arg(long)]
        ignore_deletion_errors: bool,
    },

    /// List favorites
    Favorites {
        /// Also list favorites whose download has not finished
        #[arg(long)]
        include_pending: bool,
    },

    /// Show disk space used by offline content
    StorageUsage,
}

/// Writes pipeline progress to the log
struct LogProgress {
    obj_id: i64,
}

impl ProgressReporter for LogProgress {
    fn set(&self, fraction: f64) {
        tracing::info!(obj_id = self.obj_id, progress = fraction, "Loading learning module");
    }

    fn finish(&self) {
        tracing::info!(obj_id = self.obj_id, "Learning module load finished");
    }
}

/// Application entry point
///
/// # Setup
/// 1. Load configuration from file and environment
/// 2. Initialize tracing/logging
/// 3. Initialize metrics
/// 4. Initialize session context
/// 5. Run the command
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // 1. Load configuration
    let config = config::AppConfig::load()?;

    // 2. Initialize tracing/logging
    init_tracing(&config.logging);
    tracing::info!(
        installation = %config.ilias.base_url,
        storage = %config.storage.root.display(),
        "Configuration loaded"
    );

    // 3. Initialize metrics
    pegasus::metrics::init_metrics();

    // 4. Initialize session context
    let ctx = AppContext::new(config).await?;

    // 5. Run the command
    let result = run(&ctx, cli.user_id, cli.command).await;
    ctx.end_session().await;

    if cli.print_metrics {
        println!("{}", pegasus::metrics::render()?);
    }

    result
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides `logging.level` when set.
fn init_tracing(logging: &config::LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.filter_directive().into());

    if logging.is_json() {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

async fn run(
    ctx: &AppContext,
    user_id: i64,
    command: Commands,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::LoadModule { obj_id } => {
            let progress = LogProgress { obj_id };
            let outcome = ctx
                .learning_modules
                .load(user_id, obj_id, &progress)
                .await?;
            let entry = ctx
                .learning_modules
                .start_file_path(user_id, obj_id, outcome.start_file());
            match outcome {
                LoadOutcome::UpToDate { timestamp, .. } => {
                    println!("up to date ({timestamp}): {}", entry.display());
                }
                LoadOutcome::Installed { timestamp, .. } => {
                    println!("installed ({timestamp}): {}", entry.display());
                }
            }
        }
        Commands::RefreshAvailability { ref_id } => {
            let object = ctx
                .objects
                .find_by_ref_id_and_user_id(ref_id, user_id)
                .await?;
            if !object.is_saved() {
                return Err(format!("no object with ref id {ref_id}").into());
            }
            let changed = ctx
                .availability
                .update_needs_download(&object, None)
                .await?;
            for node in &changed {
                println!(
                    "{}\t{}\tneeds_download={}",
                    node.ref_id, node.title, node.needs_download
                );
            }
            println!("{} node(s) changed", changed.len());
        }
        Commands::RemoveFavorite {
            ref_id,
            ignore_deletion_errors,
        } => {
            let object = ctx
                .objects
                .find_by_ref_id_and_user_id(ref_id, user_id)
                .await?;
            if !object.is_saved() {
                return Err(format!("no object with ref id {ref_id}").into());
            }
            ctx.objects
                .remove_from_favorites(&object, ctx.user_storage.as_ref(), ignore_deletion_errors)
                .await?;
            println!("removed favorite {ref_id}");
        }
        Commands::Favorites { include_pending } => {
            let favorites = ctx
                .objects
                .favorites_by_user_id(user_id, include_pending)
                .await?;
            for favorite in favorites {
                let path = ctx.objects.parents_title_chain(&favorite).await?;
                println!(
                    "{}\t{:?}\t{}",
                    favorite.ref_id,
                    favorite.favorite,
                    path.join(" / ")
                );
            }
        }
        Commands::StorageUsage => {
            let bytes = ctx.user_storage.used_disk_space(user_id).await?;
            println!("{bytes} bytes");
        }
    }

    Ok(())
}
