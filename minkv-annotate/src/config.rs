//! Command line and resolved run settings
//!
//! Priority for every setting: command line → environment → TOML → default.

use crate::merge::{MergePolicy, SplitOptions};
use crate::model::{EntityId, EntityKind};
use crate::tagdb::TagDbConfig;
use crate::utils::RetryPolicy;
use clap::{Args, Parser, Subcommand};
use minkv_common::config::{resolve_store_path, resolve_tagdb_url, AnnotateConfig, TomlConfig};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "minkv-annotate")]
#[command(about = "Key-value and tag annotation of microscopy data")]
#[command(version)]
pub struct Cli {
    /// Config file (default: $MINKV_CONFIG, then <config dir>/minkv/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Annotation store database
    #[arg(long, global = true)]
    pub store: Option<PathBuf>,

    /// Print the run summary as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add key-value pairs from a delimited file
    Csv(CsvArgs),
    /// Add key-value pairs and tags from the tag database
    Tags(TagArgs),
}

#[derive(Args, Debug)]
pub struct CsvArgs {
    /// Root kind: dataset, plate or screen
    #[arg(long, value_parser = parse_kind)]
    pub kind: EntityKind,

    /// Root ids
    #[arg(long = "id", required = true, num_args = 1..)]
    pub ids: Vec<i64>,

    /// Delimited input file
    #[arg(long)]
    pub file: PathBuf,
}

#[derive(Args, Debug)]
pub struct TagArgs {
    /// Root kind: dataset, image or project
    #[arg(long, value_parser = parse_kind)]
    pub kind: EntityKind,

    /// Root ids
    #[arg(long = "id", required = true, num_args = 1..)]
    pub ids: Vec<i64>,

    #[arg(long, value_enum, default_value_t = MergePolicy::Append)]
    pub policy: MergePolicy,

    /// Keep tag-database namespaces as separate prefixed groups
    #[arg(long)]
    pub namespaced: bool,

    /// Link tags without a parent tag as standalone tags
    #[arg(long)]
    pub single_tags: bool,

    /// Tag database URL (default: $MINKV_TAGDB_URL, then TOML)
    #[arg(long)]
    pub tagdb_url: Option<String>,
}

impl CsvArgs {
    pub fn root_ids(&self) -> Vec<EntityId> {
        self.ids.iter().copied().map(EntityId).collect()
    }
}

impl TagArgs {
    pub fn root_ids(&self) -> Vec<EntityId> {
        self.ids.iter().copied().map(EntityId).collect()
    }

    pub fn split_options(&self, config: &AnnotateConfig) -> SplitOptions {
        SplitOptions::from_config(config, self.namespaced, self.single_tags)
    }

    pub fn tag_db_config(&self, config: &TomlConfig) -> minkv_common::Result<TagDbConfig> {
        resolve_tagdb_url(self.tagdb_url.as_deref(), config).map(TagDbConfig::new)
    }
}

fn parse_kind(s: &str) -> Result<EntityKind, String> {
    s.parse()
}

/// Settings shared by both jobs
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub store_path: PathBuf,
    pub log_level: String,
    pub retry: RetryPolicy,
    pub annotate: AnnotateConfig,
}

impl RunSettings {
    pub fn resolve(cli: &Cli, config: &TomlConfig) -> Self {
        Self {
            store_path: resolve_store_path(cli.store.as_deref(), config),
            log_level: config.logging.level.clone(),
            retry: RetryPolicy::from(&config.retry),
            annotate: config.annotate.clone(),
        }
    }
}
