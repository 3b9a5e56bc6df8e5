//! bindtrace - replay binder scenarios and inspect trace configuration
//!
//! Events go to stdout; diagnostics go to stderr.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use bindtrace_core::{BinderEvent, TraceConfig};

mod scenario;

use scenario::Scenario;

/// Modules whose internal tracing can be raised to trace level
#[derive(Debug, Clone, ValueEnum)]
enum TraceModule {
    Bind,
    Resolution,
    Config,
    All,
}

/// Log levels
#[derive(Debug, Clone, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_filter_directive(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// How replayed events are printed
#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Human-readable table
    Table,
}

#[derive(Parser, Debug)]
#[clap(
    name = "bindtrace",
    about = "Structured trace events for runtime assembly binding",
    version
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,

    /// Enable internal tracing (comma-separated: bind,resolution,config,all)
    #[clap(long, value_delimiter = ',', global = true)]
    trace: Vec<TraceModule>,

    /// Set log level
    #[clap(long, default_value = "warn", global = true)]
    log_level: LogLevel,
}

#[derive(Parser, Debug)]
enum Command {
    /// Replay a binder scenario and print the events it produces
    Simulate {
        /// Scenario file (YAML)
        #[clap(long)]
        scenario: PathBuf,

        /// Output format
        #[clap(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },

    /// Validate a trace configuration file
    CheckConfig {
        /// Trace configuration file (YAML)
        #[clap(long)]
        config: PathBuf,
    },
}

/// Initialize tracing with CLI flags
///
/// Configures logging based on --log-level and --trace flags.
/// When --trace is set, enables JSON output for structured tracing.
fn initialize_tracing(log_level: &LogLevel, trace_modules: &[TraceModule]) {
    let mut filter = EnvFilter::new(log_level.to_filter_directive());

    for module in trace_modules {
        let directive = match module {
            TraceModule::Bind => "bindtrace_core::bind=trace",
            TraceModule::Resolution => "bindtrace_core::resolution=trace",
            TraceModule::Config => "bindtrace_core::config=trace",
            TraceModule::All => "bindtrace_core=trace",
        };

        if let Ok(parsed) = directive.parse() {
            filter = filter.add_directive(parsed);
        }
    }

    // Logs always go to stderr; stdout carries the events.
    if !trace_modules.is_empty() {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .with_thread_ids(true)
            .with_thread_names(true)
            .with_file(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();

        tracing::info!(trace_modules = ?trace_modules, "bindtrace internal tracing enabled");
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_tracing(&cli.log_level, &cli.trace);

    match cli.command {
        Command::Simulate { scenario, format } => simulate_command(scenario, format),
        Command::CheckConfig { config } => check_config_command(config),
    }
}

fn simulate_command(path: PathBuf, format: OutputFormat) -> Result<()> {
    info!("Simulating scenario: {:?}", path);

    let scenario = Scenario::load(&path)?;
    let events = scenario
        .run()
        .with_context(|| format!("Scenario {} failed", path.display()))?;
    debug!(count = events.len(), "Scenario produced events");

    match format {
        OutputFormat::Json => {
            for event in &events {
                println!("{}", serde_json::to_string(event)?);
            }
        }
        OutputFormat::Table => print_event_table(&events),
    }

    Ok(())
}

// Table row structure for event display
#[derive(Tabled)]
struct EventTableRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Event")]
    event: String,
    #[tabled(rename = "Stage/Source")]
    location: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Assembly")]
    assembly: String,
    #[tabled(rename = "Path")]
    path: String,
}

impl EventTableRow {
    fn from_event(index: usize, event: &BinderEvent) -> Self {
        let (location, result, assembly, path) = match event {
            BinderEvent::BindStart(start) => (
                String::new(),
                String::new(),
                start.request.assembly_name.clone().unwrap_or_default(),
                start.request.assembly_path.clone().unwrap_or_default(),
            ),
            BinderEvent::BindStop(stop) => (
                String::new(),
                match (stop.success, stop.cached) {
                    (true, true) => "success (cached)".to_string(),
                    (true, false) => "success".to_string(),
                    (false, _) => "failure".to_string(),
                },
                stop.result_assembly_name
                    .clone()
                    .or_else(|| stop.request.assembly_name.clone())
                    .unwrap_or_default(),
                stop.result_assembly_path.clone().unwrap_or_default(),
            ),
            BinderEvent::ResolutionAttempted(attempt) => (
                attempt.stage.to_string(),
                attempt.result.to_string(),
                attempt.assembly_name.clone().unwrap_or_default(),
                attempt.result_assembly_path.clone().unwrap_or_default(),
            ),
            BinderEvent::PathProbed(probe) => (
                probe.source.to_string(),
                probe.result.to_string(),
                String::new(),
                probe.path.clone(),
            ),
        };

        Self {
            index,
            event: event.name().to_string(),
            location,
            result,
            assembly,
            path,
        }
    }
}

fn print_event_table(events: &[BinderEvent]) {
    if events.is_empty() {
        println!("No events emitted.");
        return;
    }

    let rows: Vec<EventTableRow> = events
        .iter()
        .enumerate()
        .map(|(i, event)| EventTableRow::from_event(i + 1, event))
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Rows::first()).with(Alignment::center()))
        .to_string();

    println!("{table}");
}

fn check_config_command(path: PathBuf) -> Result<()> {
    info!("Checking trace config: {:?}", path);

    let mut config = TraceConfig::load(&path)?;
    config.apply_env_overrides()?;

    let categories = config.effective_categories();
    println!("Configuration OK: {}", path.display());
    if categories.is_empty() {
        println!("Enabled categories: (none)");
    } else {
        let names: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
        println!("Enabled categories: {}", names.join(", "));
    }

    let sink = config.sink.kind.as_str();
    match &config.sink.path {
        Some(log_path) => println!("Sink: {sink} ({})", log_path.display()),
        None => println!("Sink: {sink}"),
    }

    Ok(())
}
