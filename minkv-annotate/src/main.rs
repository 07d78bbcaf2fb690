//! minkv-annotate - annotation command line tool
//!
//! `csv`: key-value pairs from a delimited file onto dataset/plate/screen
//! contents. `tags`: key-value pairs and tags from the tag database onto
//! images.

use anyhow::{Context, Result};
use clap::Parser;
use minkv_annotate::config::{Cli, Command, RunSettings};
use minkv_annotate::store::SqliteStore;
use minkv_annotate::tagdb::TabblesSource;
use minkv_annotate::workflow::{CsvJob, RunSummary, TagJob};
use minkv_common::config::load_config;
use minkv_common::db::init_database;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, origin) = load_config(cli.config.as_deref())?;
    let settings = RunSettings::resolve(&cli, &config);

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .init();

    origin.log();
    info!(
        "Starting minkv-annotate v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );
    info!("Annotation store: {}", settings.store_path.display());

    let pool = init_database(&settings.store_path)
        .await
        .context("Failed to open annotation store")?;
    let store = SqliteStore::new(pool, settings.annotate.default_namespace.clone());

    let summary = match &cli.command {
        Command::Csv(args) => {
            let text = std::fs::read_to_string(&args.file)
                .with_context(|| format!("Failed to read {}", args.file.display()))?;
            CsvJob::new(&store, settings.retry)
                .run(args.kind, &args.root_ids(), &text)
                .await?
        }
        Command::Tags(args) => {
            let tag_db = args.tag_db_config(&config)?;
            let mut source = TabblesSource::connect(&tag_db)
                .await
                .context("Failed to connect to tag database")?;
            TagJob::new(
                &store,
                &mut source,
                settings.retry,
                args.policy,
                args.split_options(&settings.annotate),
            )
            .run(args.kind, &args.root_ids())
            .await?
        }
    };

    print_summary(&summary, cli.json)?;

    if !summary.is_success() {
        anyhow::bail!(
            "Run finished with {} failed roots and {} write failures",
            summary.roots_failed,
            summary.write_failures
        );
    }
    Ok(())
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(summary)?);
    } else {
        println!("{}", summary);
    }
    Ok(())
}
