//! CLI for tabsight: browser telemetry collection and next-event prediction.

mod commands;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tabsight_core::{
    DEFAULT_COLLECTOR_PORT, DEFAULT_HOST, DEFAULT_PREDICTOR_PORT, ModelKind, parse_duration,
    parse_interval,
};

#[derive(Parser)]
#[command(name = "tabsight")]
#[command(about = "tabsight: browser telemetry collector and next-event predictor")]
#[command(version = tabsight_core::VERSION)]
struct Cli {
    /// Log filter when RUST_LOG is unset (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion endpoint and the background resource sampler
    Collect {
        /// Bind address
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port for POST /log
        #[arg(long, default_value_t = DEFAULT_COLLECTOR_PORT)]
        port: u16,

        /// NDJSON telemetry log (created if missing, always appended)
        #[arg(long, default_value = "user_data.ndjson")]
        log_path: PathBuf,

        /// Case-insensitive substring matched against process names
        #[arg(long, default_value = "chrome")]
        target: String,

        /// Time between resource snapshots (e.g. 30s, 500ms, 5m)
        #[arg(long, default_value = "30s", value_parser = parse_interval)]
        interval: Duration,

        /// Give up on a log append after waiting this long for the writer
        #[arg(long, default_value = "2s", value_parser = parse_duration)]
        write_timeout: Duration,

        /// Only ingest client events; do not sample resources
        #[arg(long)]
        no_sampler: bool,
    },

    /// Load model artifacts and serve POST /predict
    PredictServer {
        /// Bind address
        #[arg(long, default_value = DEFAULT_HOST)]
        host: String,

        /// Port for POST /predict
        #[arg(long, default_value_t = DEFAULT_PREDICTOR_PORT)]
        port: u16,

        /// Directory holding vocabulary.json, scaler.json and model.json
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Model kind stored in model.json: transition or frequency
        #[arg(long, default_value = "transition")]
        model: ModelKind,

        /// Seed the sampler for reproducible responses
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print one resource snapshot of the target application as JSON
    Snapshot {
        /// Case-insensitive substring matched against process names
        #[arg(long, default_value = "chrome")]
        target: String,

        /// Gap between the baseline and the reported sample
        #[arg(long, default_value = "1s", value_parser = parse_duration)]
        interval: Duration,
    },

    /// Predict the next event offline from the command line
    Predict {
        /// Directory holding vocabulary.json, scaler.json and model.json
        #[arg(long, default_value = "artifacts")]
        artifacts: PathBuf,

        /// Model kind stored in model.json: transition or frequency
        #[arg(long, default_value = "transition")]
        model: ModelKind,

        /// Comma-separated event labels, oldest first
        #[arg(long)]
        events: String,

        /// Comma-separated elapsed seconds, one per event
        #[arg(long)]
        times: String,

        /// Sampling temperature (> 0; lower is more deterministic)
        #[arg(long, default_value_t = 1.0)]
        temperature: f64,

        /// Seed the sampler for a reproducible draw
        #[arg(long)]
        seed: Option<u64>,

        /// Also print the model's distribution over the vocabulary
        #[arg(long)]
        show_distribution: bool,
    },

    /// Print the last records of a telemetry log
    Tail {
        /// NDJSON telemetry log
        #[arg(default_value = "user_data.ndjson")]
        log_path: PathBuf,

        /// Number of records to show
        #[arg(short = 'n', long, default_value_t = 10)]
        count: usize,

        /// Only show records whose payload type matches
        #[arg(long = "type")]
        event_type: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cli.log_level))
        .format_timestamp_millis()
        .init();

    match cli.command {
        Commands::Collect {
            host,
            port,
            log_path,
            target,
            interval,
            write_timeout,
            no_sampler,
        } => commands::collect::run(commands::collect::CollectCommandConfig {
            host: &host,
            port,
            collector: tabsight_core::CollectorConfig {
                log_path,
                target,
                interval,
                write_timeout,
            },
            sample_resources: !no_sampler,
        }),
        Commands::PredictServer {
            host,
            port,
            artifacts,
            model,
            seed,
        } => commands::predict_server::run(
            &host,
            port,
            &tabsight_core::PredictorConfig {
                artifact_dir: artifacts,
                model_kind: model,
            },
            seed,
        ),
        Commands::Snapshot { target, interval } => commands::snapshot::run(&target, interval),
        Commands::Predict {
            artifacts,
            model,
            events,
            times,
            temperature,
            seed,
            show_distribution,
        } => commands::predict::run(commands::predict::PredictCommandConfig {
            predictor: tabsight_core::PredictorConfig {
                artifact_dir: artifacts,
                model_kind: model,
            },
            events: &events,
            times: &times,
            temperature,
            seed,
            show_distribution,
        }),
        Commands::Tail {
            log_path,
            count,
            event_type,
        } => commands::tail::run(&log_path, count, event_type.as_deref()),
    }
}
