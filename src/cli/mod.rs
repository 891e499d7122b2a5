//! Command-line interface: run the federated workflow or serve it over HTTP

use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{AggregationMode, FederationConfig};
use crate::data::{synthetic, Dataset, FeatureEncoder, LABEL_COLUMN};
use crate::federation::Federation;
use crate::storage::FileModelStore;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn kv_row(key: &str, val: String) {
    println!("  {:<16} {}", muted(key), val.white());
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "kolosal-federated")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Federated gradient boosting across simulated hospitals")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Where the records come from
#[derive(clap::Args, Debug, Clone)]
pub struct DataArgs {
    /// CSV dataset (defaults to FED_DATA_PATH or smoking.csv)
    #[arg(short, long)]
    pub data: Option<PathBuf>,

    /// Generate this many synthetic records instead of reading a CSV
    #[arg(long, conflicts_with = "data")]
    pub synthetic: Option<usize>,

    /// Number of hospitals
    #[arg(long)]
    pub hospitals: Option<usize>,

    /// Partition seed (random when omitted)
    #[arg(long)]
    pub seed: Option<u64>,

    /// Aggregation mode (first, averaged)
    #[arg(long)]
    pub mode: Option<String>,

    /// Directory for persisted models
    #[arg(long)]
    pub models_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Train every hospital, aggregate and fine-tune from the global model
    Simulate {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Train a single hospital locally
    Train {
        /// Hospital id (1-based)
        #[arg(long)]
        hospital: usize,

        #[command(flatten)]
        data: DataArgs,
    },

    /// Show dataset information
    Info {
        #[command(flatten)]
        data: DataArgs,
    },

    /// Start the HTTP server
    Serve {
        /// Server port (defaults to API_PORT or 5000)
        #[arg(short, long)]
        port: Option<u16>,

        /// Server host (defaults to API_HOST or 0.0.0.0)
        #[arg(long)]
        host: Option<String>,

        #[command(flatten)]
        data: DataArgs,
    },
}

impl DataArgs {
    pub fn config(&self) -> anyhow::Result<FederationConfig> {
        let mut config = FederationConfig::default();
        if let Some(ref path) = self.data {
            config = config.with_data_path(path);
        }
        if let Some(n) = self.hospitals {
            config = config.with_hospitals(n);
        }
        if let Some(seed) = self.seed {
            config = config.with_partition_seed(seed);
        }
        if let Some(ref mode) = self.mode {
            config = config.with_aggregation_mode(AggregationMode::parse(mode)?);
        }
        if let Some(ref dir) = self.models_dir {
            config = config.with_models_dir(dir);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn load(&self, config: &FederationConfig) -> anyhow::Result<Dataset> {
        let dataset = match self.synthetic {
            Some(rows) => synthetic::health_records(rows, config.partition_seed.unwrap_or(0))?,
            None => Dataset::load_csv(&config.data_path, &config.drop_columns)?,
        };
        Ok(dataset)
    }

    fn federation(&self) -> anyhow::Result<Federation> {
        let config = self.config()?;

        step_run("Loading data");
        let start = Instant::now();
        let dataset = self.load(&config)?;
        step_done(&format!(
            "{} rows × {} cols in {:?}",
            dataset.n_rows(),
            dataset.n_columns(),
            start.elapsed()
        ));

        let store = FileModelStore::new(config.models_dir.clone());
        Ok(Federation::new(config, Arc::new(dataset), Box::new(store))?)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_simulate(args: &DataArgs) -> anyhow::Result<()> {
    section("Federated simulation");
    let federation = args.federation()?;
    let n = federation.config().n_hospitals;

    println!();
    println!("  {:<12} {:>10} {:>10}", muted("Hospital"), muted("Local"), muted("Time"));
    println!("  {}", dim(&"─".repeat(34)));
    let mut local = Vec::with_capacity(n);
    for id in 1..=n {
        let start = Instant::now();
        let accuracy = federation.train_local(id)?;
        println!("  {:<12} {:>10.4} {:>10.2?}", id, accuracy, start.elapsed());
        local.push(accuracy);
    }

    println!();
    step_run(&format!("Aggregating ({})", federation.config().aggregation_mode));
    let start = Instant::now();
    let report = federation.aggregate_report()?;
    step_done(&format!("{} trees from {} models in {:?}", report.n_trees, report.contributors.len(), start.elapsed()));

    step_run("Fine-tuning from the global model");
    let start = Instant::now();
    let tuned = federation.train_all_with_global()?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    println!("  {:<12} {:>10} {:>10} {:>10}", muted("Hospital"), muted("Local"), muted("Global"), muted("Tuned"));
    println!("  {}", dim(&"─".repeat(46)));
    for (id, local_accuracy) in (1..=n).zip(&local) {
        println!(
            "  {:<12} {:>10.4} {:>10.4} {:>10.4}",
            id,
            local_accuracy,
            report.hospital_accuracies.get(&id).copied().unwrap_or(0.0),
            tuned.get(&id).copied().unwrap_or(0.0),
        );
    }
    println!("  {}", dim(&"─".repeat(46)));

    let mean_local = local.iter().sum::<f64>() / n as f64;
    let mean_tuned = tuned.values().sum::<f64>() / n as f64;
    println!();
    kv_row("Mean local", format!("{:.4}", mean_local));
    kv_row("Global", format!("{:.4}", report.global_accuracy));
    kv_row("Mean tuned", format!("{:.4}", mean_tuned));
    println!();
    Ok(())
}

pub fn cmd_train(hospital: usize, args: &DataArgs) -> anyhow::Result<()> {
    section("Local training");
    let federation = args.federation()?;

    step_run(&format!("Training hospital {}", hospital.to_string().cyan()));
    let start = Instant::now();
    let accuracy = federation.train_local(hospital)?;
    step_done(&format!("{:?}", start.elapsed()));

    println!();
    kv_row("Accuracy", format!("{:.4}", accuracy));
    if let Some(model) = federation.local_model(hospital) {
        kv_row("Trees", model.classifier.n_trees().to_string());
        kv_row("Train / test", format!("{} / {}", model.n_train, model.n_test));
    }
    println!();
    Ok(())
}

pub fn cmd_info(args: &DataArgs) -> anyhow::Result<()> {
    section("Data Info");
    let config = args.config()?;
    let dataset = args.load(&config)?;
    let encoder = FeatureEncoder::default();

    let positives = dataset
        .column_index(LABEL_COLUMN)
        .map(|label| {
            (0..dataset.n_rows())
                .filter_map(|i| dataset.row(i))
                .filter(|row| FeatureEncoder::encode_value(LABEL_COLUMN, &row[label]).ok() == Some(1.0))
                .count()
        })
        .unwrap_or(0);

    match args.synthetic {
        Some(rows) => kv_row("Source", format!("synthetic ({} rows)", rows)),
        None => kv_row("File", config.data_path.display().to_string()),
    }
    kv_row("Rows", dataset.n_rows().to_string());
    kv_row("Columns", dataset.n_columns().to_string());
    kv_row("Positive label", positives.to_string());
    kv_row("Hospitals", config.n_hospitals.to_string());
    kv_row("Aggregation", config.aggregation_mode.to_string());
    println!();

    println!("  {}", muted("Features"));
    println!("  {}", dim(&"─".repeat(34)));
    for name in encoder.feature_names(&dataset) {
        println!("  {}", name);
    }
    println!();
    Ok(())
}

pub async fn cmd_serve(host: Option<String>, port: Option<u16>, args: &DataArgs) -> anyhow::Result<()> {
    use crate::server::{serve, ServerConfig};

    let mut config = ServerConfig::default();
    if let Some(host) = host {
        config.host = host;
    }
    if let Some(port) = port {
        config.port = port;
    }

    section("Federated learning server");
    let federation = args.federation()?;

    kv_row("API", format!("http://{}", config.address()));
    kv_row("Health", format!("http://{}/health", config.address()));
    kv_row("Hospitals", federation.config().n_hospitals.to_string());
    kv_row("Aggregation", federation.config().aggregation_mode.to_string());
    println!("  {}", dim("ctrl+c to stop"));
    println!();

    serve(&config, federation).await
}
