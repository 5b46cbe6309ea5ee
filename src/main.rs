use std::fs::File;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Mutex;

use clap::{Parser, ValueEnum};
use ratatui::DefaultTerminal;
use tracing::info;
use tracing_error::ErrorLayer;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod controller;
mod domain;
mod export;
mod filter;
mod form;
mod inputter;
mod model;
mod provider;
mod record;
mod selection;
mod sort;
mod task;
mod ui;
mod validation;

use controller::Controller;
use domain::{TVCConfig, TVCError};
use export::ClipboardSink;
use model::{Model, Status};
use provider::{DataProvider, FileProvider, SampleOperations, SampleTraders};
use record::Dataset;
use ui::TableUI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum DatasetKind {
    Traders,
    Operations,
}

/// Back-office table viewer: sort, filter, select and edit traders or operations.
#[derive(Debug, Parser)]
#[command(name = "tvc", version, about)]
struct Args {
    /// CSV, Parquet or Arrow IPC file to show instead of a built-in table
    path: Option<String>,

    /// Built-in table to show when no file is given
    #[arg(long, value_enum, default_value_t = DatasetKind::Traders)]
    dataset: DatasetKind,

    /// Quiet period before a typed search is applied
    #[arg(long)]
    debounce_ms: Option<u64>,

    /// Delay of the simulated save
    #[arg(long)]
    persist_delay_ms: Option<u64>,

    /// Event poll interval
    #[arg(long)]
    poll_ms: Option<u64>,

    /// Directory for CSV exports
    #[arg(long)]
    export_dir: Option<String>,

    #[arg(long, default_value = "tvc.log")]
    log_file: String,

    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn expand(path: &str) -> Result<PathBuf, TVCError> {
    shellexpand::full(path)
        .map(|p| PathBuf::from(p.as_ref()))
        .map_err(|e| TVCError::LoadingFailed(format!("cannot expand {path}: {e}")))
}

fn init_logging(args: &Args) -> Result<(), TVCError> {
    let file = File::create(expand(&args.log_file)?)
        .map_err(|e| TVCError::LoggingFailed(format!("{}: {e}", args.log_file)))?;
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .map_err(|e| TVCError::LoggingFailed(e.to_string()))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(Mutex::new(file)).with_ansi(false))
        .with(ErrorLayer::default())
        .try_init()
        .map_err(|e| TVCError::LoggingFailed(e.to_string()))
}

fn build_config(args: &Args) -> Result<TVCConfig, TVCError> {
    let mut config = TVCConfig::default();
    if let Some(ms) = args.debounce_ms {
        config = config.with_debounce_ms(ms);
    }
    if let Some(ms) = args.persist_delay_ms {
        config = config.with_persist_delay_ms(ms);
    }
    if let Some(ms) = args.poll_ms {
        config = config.with_event_poll_time(ms);
    }
    if let Some(dir) = &args.export_dir {
        config = config.with_export_dir(expand(dir)?);
    }
    Ok(config)
}

fn load_dataset(args: &Args) -> Result<Dataset, TVCError> {
    match (&args.path, args.dataset) {
        (Some(path), _) => FileProvider::new(expand(path)?).load(),
        (None, DatasetKind::Traders) => SampleTraders.load(),
        (None, DatasetKind::Operations) => SampleOperations.load(),
    }
}

fn main() -> ExitCode {
    match run() {
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
        Ok(_) => ExitCode::SUCCESS,
    }
}

fn run() -> Result<(), TVCError> {
    let args = Args::parse();
    init_logging(&args)?;
    info!("Starting tvc with {args:?}");

    let config = build_config(&args)?;
    let dataset = load_dataset(&args)?;

    let mut terminal = ratatui::init();
    let result = event_loop(&mut terminal, &config, dataset);
    ratatui::restore();
    result
}

fn event_loop(terminal: &mut DefaultTerminal, config: &TVCConfig, dataset: Dataset) -> Result<(), TVCError> {
    let size = terminal.size()?;
    let mut model = Model::init(
        config,
        dataset,
        ClipboardSink::new(),
        size.width as usize,
        size.height as usize,
    )?;
    let mut ui = TableUI::new();
    let controller = Controller::new(config);

    while model.status != Status::QUITTING {
        // Render the current view
        terminal.draw(|f| ui.draw(&model, f))?;

        // Handle events and map to a Message. Timers run on every pass.
        let message = controller.handle_event(&model)?;
        model.update(message)?;
    }

    info!("Bye");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_the_config() {
        let args = Args::try_parse_from(["tvc"]).unwrap();
        let config = build_config(&args).unwrap();
        assert_eq!(config.debounce_ms, 300);
        assert_eq!(config.persist_delay_ms, 1500);
        assert_eq!(args.dataset, DatasetKind::Traders);
        assert_eq!(load_dataset(&args).unwrap().name, "Traders");
    }

    #[test]
    fn flags_override_the_config() {
        let args = Args::try_parse_from([
            "tvc",
            "--dataset",
            "operations",
            "--debounce-ms",
            "50",
            "--poll-ms",
            "20",
            "--export-dir",
            "/tmp",
        ])
        .unwrap();
        let config = build_config(&args).unwrap();
        assert_eq!(config.debounce_ms, 50);
        assert_eq!(config.event_poll_time, 20);
        assert_eq!(config.export_dir, PathBuf::from("/tmp"));
        assert_eq!(load_dataset(&args).unwrap().entity, "operations");
    }

    #[test]
    fn missing_file_is_reported() {
        let args = Args::try_parse_from(["tvc", "/nonexistent/traders.csv"]).unwrap();
        assert!(matches!(load_dataset(&args), Err(TVCError::FileNotFound)));
    }
}
