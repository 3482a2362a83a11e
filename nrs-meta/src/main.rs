//! nrs-meta - metadata core command-line tool
//!
//! Operator front end for the identifier codec, URL detection, resolution
//! engine and provider adapters. Every subcommand prints JSON on stdout;
//! logs go to stderr.

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use nrs_common::config::ConfigResolver;
use nrs_meta::entry_id::{self, EntryId};
use nrs_meta::providers::{default_adapters, ProviderTokens};
use nrs_meta::{sources, CustomIdSequence, EntryCategory, MetadataBlob, MetadataResolver, NewEntry, Populator};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use tracing::info;

/// Command-line arguments for nrs-meta
#[derive(Parser, Debug)]
#[command(name = "nrs-meta")]
#[command(about = "Multi-source metadata tools for NRS entries")]
#[command(version)]
struct Cli {
    /// Config file (overrides NRS_CONFIG and the default location)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Parse an entry identifier
    ParseId { id: String },

    /// Generate an identifier for a new entry
    GenId {
        #[arg(value_parser = parse_category)]
        category: EntryCategory,
        /// Source URL; catalog URLs yield a standard identifier
        #[arg(long)]
        url: Option<String>,
        /// Number of identifiers to mint; custom ones share a sequence
        #[arg(short = 'n', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
        count: u32,
    },

    /// Detect the catalog a URL belongs to
    Detect { url: String },

    /// Resolve a stored metadata blob
    Resolve {
        /// JSON file holding the blob
        blob: PathBuf,
        #[arg(value_parser = parse_category)]
        category: EntryCategory,
        /// Resolve as of this RFC 3339 instant instead of now
        #[arg(long)]
        at: Option<String>,
    },

    /// Refresh a blob from the provider APIs and write it back
    Populate {
        blob: PathBuf,
        #[arg(value_parser = parse_category)]
        category: EntryCategory,
        /// Write the refreshed blob here instead of overwriting the input
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate a new-entry JSON document
    ValidateEntry { file: PathBuf },
}

fn parse_category(raw: &str) -> std::result::Result<EntryCategory, String> {
    let category = EntryCategory::parse_lenient(raw);
    if category == EntryCategory::Other && !raw.trim().eq_ignore_ascii_case("other") {
        return Err(format!("unknown category '{}'", raw));
    }
    Ok(category)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ParsedId<'a> {
    id: &'a EntryId,
    default_category: EntryCategory,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigResolver::new(cli.config.clone())
        .load()
        .context("Failed to load configuration")?;
    nrs_common::logging::init(&config.logging)?;

    info!(
        "nrs-meta {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    let output = match cli.command {
        Command::ParseId { id } => {
            let parsed = entry_id::parse(&id)?;
            serde_json::to_value(ParsedId {
                id: &parsed,
                default_category: parsed.default_category(),
            })?
        }

        Command::GenId {
            category,
            url,
            count,
        } => {
            let ids = gen_ids(category, url.as_deref(), count)?;
            json!({ "ids": ids })
        }

        Command::Detect { url } => serde_json::to_value(sources::detect(&url))?,

        Command::Resolve { blob, category, at } => {
            let blob = read_blob(&blob)?;
            let now = match at {
                Some(raw) => nrs_common::time::parse_timestamp(&raw)
                    .ok_or_else(|| anyhow!("Invalid timestamp '{}'", raw))?,
                None => nrs_common::time::now(),
            };
            let resolver = MetadataResolver::from_config(&config.resolution);
            serde_json::to_value(blob.resolve_for(category, &resolver, now))?
        }

        Command::Populate {
            blob: path,
            category,
            output,
        } => {
            let mut blob = read_blob(&path)?;
            let adapters = default_adapters(&config.providers)?;
            let populator = Populator::new(adapters, ProviderTokens::from_config(&config));

            let report = populator
                .refresh(&mut blob, category, nrs_common::time::now())
                .await;

            let target = output.unwrap_or(path);
            let text = serde_json::to_string_pretty(&blob)?;
            std::fs::write(&target, text)
                .with_context(|| format!("Failed to write {}", target.display()))?;
            info!("Wrote refreshed blob to {}", target.display());

            serde_json::to_value(report)?
        }

        Command::ValidateEntry { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let entry: NewEntry = serde_json::from_str(&text)
                .with_context(|| format!("Failed to parse {}", file.display()))?;
            serde_json::to_value(entry.validate()?)?
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn gen_ids(category: EntryCategory, url: Option<&str>, count: u32) -> Result<Vec<String>> {
    let mut sequence = CustomIdSequence::new();
    let now = nrs_common::time::now();
    (0..count)
        .map(|_| -> Result<String> {
            let id = sources::auto_generate_id_with(&mut sequence, category, url, now)?;
            Ok(id.to_string())
        })
        .collect()
}

fn read_blob(path: &Path) -> Result<MetadataBlob> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    Ok(MetadataBlob::from_value(value)?)
}
