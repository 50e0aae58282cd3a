//! Canopy CLI Binary
//!
//! Command-line interface for running filtered queries against a data
//! model and leaf store loaded from TOML files.

use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use tracing::{error, info};

use canopy::config::CanopyConfig;
use canopy::filter::{Filter, FilterNode};
use canopy::logging::{init_logging, LoggingConfig};
use canopy::proxy::{HttpRemoteStore, ProxyResolver};
use canopy::query::{QueryEngine, QueryOutcome, QueryRequest};
use canopy::render::WithDefaults;
use canopy::schema::Schema;
use canopy::store::TreeStore;
use canopy::TreePath;

#[derive(Parser)]
#[command(name = "canopy", about = "Filtered configuration queries", version)]
struct Cli {
    /// Workspace root used to locate canopy.toml
    #[arg(long, default_value = ".")]
    workspace: PathBuf,

    /// Explicit configuration file, bypassing workspace discovery
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data model file, overriding the configured model_path
    #[arg(long)]
    model: Option<PathBuf>,

    /// Seed data file, overriding the configured data_path
    #[arg(long)]
    data: Option<PathBuf>,

    /// Enable logging output
    #[arg(short, long)]
    verbose: bool,

    /// Log level override (trace, debug, info, warn, error, off)
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Query the running datastore
    Get {
        /// Path filter, e.g. /interfaces/interface/mtu
        path: Option<String>,

        /// Subtree filter file (TOML)
        #[arg(long, conflicts_with = "path")]
        filter: Option<PathBuf>,

        /// Disclosure mode: report-all, trim, or explicit
        #[arg(long)]
        with_defaults: Option<String>,

        /// Return configuration only, excluding state subtrees
        #[arg(long)]
        config_only: bool,

        /// Source datastore
        #[arg(long, default_value = "running")]
        datastore: String,
    },
    /// Write one leaf, or clear it by omitting the value
    Set {
        /// Leaf path, e.g. /interfaces/interface/eth0/mtu
        path: String,

        /// New value; omitted or empty clears the leaf
        value: Option<String>,
    },
}

/// Subtree filter file layout.
#[derive(Deserialize)]
struct FilterFile {
    filter: Vec<FilterNode>,
}

/// Seed data file layout.
#[derive(Deserialize)]
struct DataFile {
    #[serde(default)]
    leaves: Vec<LeafEntry>,
}

#[derive(Deserialize)]
struct LeafEntry {
    path: String,
    value: String,
}

fn main() {
    let cli = Cli::parse();

    let logging_config = build_logging_config(&cli);
    if let Err(e) = init_logging(Some(&logging_config)) {
        eprintln!("Failed to initialize logging: {}", e);
        process::exit(1);
    }

    match run(&cli) {
        Ok(output) => {
            info!("Command completed successfully");
            println!("{}", output);
        }
        Err(e) => {
            error!("Command failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: &Cli) -> Result<String> {
    let config = match &cli.config {
        Some(path) => CanopyConfig::load_from_file(path)
            .with_context(|| format!("loading configuration from {:?}", path))?,
        None => CanopyConfig::load(&cli.workspace).context("loading configuration")?,
    };

    let model_path = cli
        .model
        .clone()
        .or_else(|| config.model_path.clone())
        .context("no data model configured; pass --model or set model_path")?;
    let schema = load_model(&model_path)?;

    let store = Arc::new(TreeStore::new());
    let data_path = cli.data.clone().or_else(|| config.data_path.clone());
    if let Some(path) = &data_path {
        load_data(&store, path)?;
    }

    let mounts = config.mount_table()?;
    let proxy = if mounts.is_empty() {
        ProxyResolver::unmounted()
    } else {
        let remote = HttpRemoteStore::new(config.proxy.timeout())?;
        ProxyResolver::new(mounts, Arc::new(remote))
    };
    let engine = QueryEngine::new(schema, store, proxy);

    match &cli.command {
        Command::Get {
            path,
            filter,
            with_defaults,
            config_only,
            datastore,
        } => {
            let filter = match (path, filter) {
                (Some(path), _) => Some(Filter::Path(path.clone())),
                (None, Some(file)) => Some(Filter::Subtree(load_filter(file)?)),
                (None, None) => None,
            };
            let mode = match with_defaults {
                Some(raw) => WithDefaults::parse(raw)
                    .map_err(|e| anyhow::anyhow!("{} ({})", e, e.tag().as_str()))?,
                None => WithDefaults::default(),
            };
            let mut request = QueryRequest::new(filter)
                .with_datastore(datastore)
                .with_mode(mode);
            if *config_only {
                request = request.config_only();
            }
            let outcome = engine
                .run(&request)
                .map_err(|e| anyhow::anyhow!("{} ({})", e, e.tag().as_str()))?;
            render_outcome(&outcome)
        }
        Command::Set { path, value } => {
            let path = TreePath::parse(path)?;
            engine
                .store()
                .write(&path, value.as_deref().unwrap_or(""))?;
            if let Some(data_file) = &data_path {
                save_data(engine.store(), data_file)?;
            }
            Ok("ok".to_string())
        }
    }
}

fn load_model(path: &Path) -> Result<Schema> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading data model {:?}", path))?;
    let schema: Schema =
        toml::from_str(&raw).with_context(|| format!("parsing data model {:?}", path))?;
    if schema.roots.is_empty() {
        bail!("data model {:?} declares no roots", path);
    }
    Ok(schema)
}

fn load_data(store: &TreeStore, path: &Path) -> Result<()> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed data {:?}", path))?;
    let data: DataFile =
        toml::from_str(&raw).with_context(|| format!("parsing seed data {:?}", path))?;
    store
        .load(data.leaves.iter().map(|l| (l.path.as_str(), l.value.as_str())))
        .context("loading seed data into store")?;
    Ok(())
}

fn save_data(store: &TreeStore, path: &Path) -> Result<()> {
    let snapshot = store.snapshot();
    let mut out = String::new();
    for (leaf_path, value) in snapshot.iter() {
        out.push_str(&format!(
            "[[leaves]]\npath = {:?}\nvalue = {:?}\n\n",
            leaf_path.to_string(),
            value
        ));
    }
    std::fs::write(path, out).with_context(|| format!("writing seed data {:?}", path))?;
    Ok(())
}

fn load_filter(path: &Path) -> Result<Vec<FilterNode>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading filter file {:?}", path))?;
    let file: FilterFile =
        toml::from_str(&raw).with_context(|| format!("parsing filter file {:?}", path))?;
    Ok(file.filter)
}

fn render_outcome(outcome: &QueryOutcome) -> Result<String> {
    match outcome {
        QueryOutcome::Empty => Ok("{\n  \"data\": []\n}".to_string()),
        QueryOutcome::Data(roots) => {
            let body = serde_json::json!({ "data": roots });
            serde_json::to_string_pretty(&body).context("serializing result")
        }
    }
}

/// Build logging configuration from CLI args, environment, and config file
fn build_logging_config(cli: &Cli) -> LoggingConfig {
    // Without --verbose logging stays off regardless of configuration.
    if !cli.verbose {
        let mut config = LoggingConfig::default();
        config.level = "off".to_string();
        return config;
    }

    let mut config = if let Some(ref config_path) = cli.config {
        CanopyConfig::load_from_file(config_path)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    } else {
        CanopyConfig::load(&cli.workspace)
            .ok()
            .map(|c| c.logging)
            .unwrap_or_default()
    };

    if let Some(ref level) = cli.log_level {
        config.level = level.clone();
    }

    config
}
