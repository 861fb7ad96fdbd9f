//! mqmetric-replay - runs the metric monitor against a scripted queue manager.
//!
//! Loads a JSON scenario (schema, queues, per-cycle churn and publications),
//! performs discovery and subscription, then replays each cycle and prints
//! the normalised metric store.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use serde::Serialize;
use tracing::{Level, info, warn};
use tracing_subscriber::EnvFilter;

use mqmetric_core::transport::mock::{MockCodec, MockQueueManager, Scenario};
use mqmetric_core::{ConfigStatus, CycleStats, MetricCatalog, Monitor, MonitorConfig};

#[derive(Parser)]
#[command(
    name = "mqmetric-replay",
    about = "Replay a scripted queue manager through the metric monitor",
    version
)]
struct Cli {
    /// Scenario file (JSON).
    scenario: PathBuf,

    /// Monitor configuration file (JSON). Flags below override its fields.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Queue patterns, e.g. "APP*,!APP.TEMP*".
    #[arg(long)]
    queues: Option<String>,

    /// File with one queue pattern per line.
    #[arg(long, value_name = "PATH")]
    queues_file: Option<PathBuf>,

    /// Take queue patterns as literal names instead of expanding them.
    #[arg(long)]
    no_check_queues: bool,

    /// Inquire max depth and usage of monitored queues.
    #[arg(long)]
    use_status: bool,

    /// Metadata topic prefix replacing "$SYS/MQ".
    #[arg(long)]
    prefix: Option<String>,

    /// Locale for translated descriptions, e.g. "fr_FR".
    #[arg(long)]
    locale: Option<String>,

    /// Rediscover queues every N seconds of wall time.
    #[arg(long, value_name = "SECS")]
    rediscovery_interval: Option<u64>,

    /// Number of cycles to run. Defaults to the cycles in the scenario.
    #[arg(long)]
    cycles: Option<usize>,

    /// Output one JSON document per cycle.
    #[arg(long)]
    json: bool,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber on stderr so stdout stays parseable.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let mut filter = EnvFilter::from_default_env();
    for target in ["mqmetric_core", "mqmetric_replay"] {
        if let Ok(directive) = format!("{}={}", target, level).parse() {
            filter = filter.add_directive(directive);
        }
    }

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<(), String> {
    let scenario = load_scenario(&cli.scenario)?;
    let config = build_config(cli)?;
    let transport = MockQueueManager::from_scenario(scenario);
    let cycles = cli.cycles.unwrap_or_else(|| transport.cycle_count());

    let mut monitor =
        Monitor::new(transport, MockCodec, config).map_err(|e| format!("config: {}", e))?;
    monitor
        .discover_and_subscribe()
        .map_err(|e| format!("discovery: {}", e))?;

    match monitor.verify_config() {
        Ok(ConfigStatus::Ok) => {}
        Ok(status) => eprintln!("Warning: {}", status),
        Err(e) => return Err(format!("verify: {}", e)),
    }

    let queues = monitor.discovered_queues();
    info!(
        queues = queues.len(),
        classes = monitor.catalog().classes.len(),
        cycles,
        "Replay starting"
    );

    for index in 0..cycles {
        let report = replay_cycle(&mut monitor, index)?;
        print_report(&report, cli.json)?;
        monitor.reset_values();
    }

    monitor.end_subscriptions();
    Ok(())
}

/// Applies one scripted cycle and collects what it published.
fn replay_cycle(
    monitor: &mut Monitor<MockQueueManager, MockCodec>,
    index: usize,
) -> Result<CycleReport, String> {
    if monitor.transport_mut().apply_churn(index) {
        monitor
            .rediscover_and_subscribe()
            .map_err(|e| format!("cycle {}: rediscovery: {}", index, e))?;
    }

    let outcome = monitor.transport_mut().publish_cycle(index);
    if outcome.dropped > 0 {
        warn!(cycle = index, dropped = outcome.dropped, "Publications without subscriber");
    }

    let stats = monitor
        .collect()
        .map_err(|e| format!("cycle {}: {}", index, e))?;
    info!(
        cycle = index,
        messages = stats.messages,
        applied = stats.samples_applied,
        discarded = stats.samples_discarded,
        malformed = stats.malformed,
        "Cycle processed"
    );

    Ok(CycleReport::new(index, stats, monitor.catalog()))
}

fn load_scenario(path: &Path) -> Result<Scenario, String> {
    let text =
        fs::read_to_string(path).map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
    serde_json::from_str(&text).map_err(|e| format!("Invalid scenario {}: {}", path.display(), e))
}

fn build_config(cli: &Cli) -> Result<MonitorConfig, String> {
    let mut config = match &cli.config {
        Some(path) => {
            let text = fs::read_to_string(path)
                .map_err(|e| format!("Cannot read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| format!("Invalid config {}: {}", path.display(), e))?
        }
        None => MonitorConfig::new(),
    };

    if let Some(queues) = &cli.queues {
        config = config.with_monitored_queues(queues.as_str());
    }
    if let Some(path) = &cli.queues_file {
        config = config.with_monitored_queues_file(path.as_path());
    }
    if cli.no_check_queues {
        config = config.with_check_queue_list(false);
    }
    if cli.use_status {
        config = config.with_use_status(true);
    }
    if let Some(prefix) = &cli.prefix {
        config = config.with_meta_prefix(prefix.as_str());
    }
    if let Some(locale) = &cli.locale {
        config = config.with_locale(locale.as_str());
    }
    if let Some(secs) = cli.rediscovery_interval {
        config = config.with_rediscovery_interval(Duration::from_secs(secs));
    }
    Ok(config)
}

// ── Output ──────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct CycleReport {
    cycle: usize,
    timestamp: String,
    messages: usize,
    discarded: usize,
    malformed: usize,
    metrics: Vec<MetricRow>,
}

#[derive(Serialize)]
struct MetricRow {
    metric: String,
    object: String,
    description: String,
    value: f64,
}

impl CycleReport {
    fn new(cycle: usize, stats: CycleStats, catalog: &MetricCatalog) -> Self {
        let metrics = catalog
            .elements()
            .flat_map(|e| {
                let name = e.scoped_metric_name();
                let description = e
                    .element
                    .description_nls
                    .clone()
                    .unwrap_or_else(|| e.element.description.clone());
                e.element.values().keys().filter_map(move |key| {
                    Some(MetricRow {
                        metric: name.clone(),
                        object: key.to_string(),
                        description: description.clone(),
                        value: e.element.normalised(key)?,
                    })
                })
            })
            .collect();

        Self {
            cycle,
            timestamp: Utc::now().to_rfc3339(),
            messages: stats.messages,
            discarded: stats.samples_discarded,
            malformed: stats.malformed,
            metrics,
        }
    }
}

fn print_report(report: &CycleReport, json: bool) -> Result<(), String> {
    if json {
        let line = serde_json::to_string(report).map_err(|e| format!("JSON: {}", e))?;
        println!("{}", line);
        return Ok(());
    }

    println!(
        "── cycle {} at {} ({} messages, {} samples discarded)",
        report.cycle, report.timestamp, report.messages, report.discarded
    );
    let width = report
        .metrics
        .iter()
        .map(|r| r.metric.len())
        .max()
        .unwrap_or(0);
    for row in &report.metrics {
        println!(
            "  {:<width$}  {:<24}  {:>16}  {}",
            row.metric,
            row.object,
            format_value(row.value),
            row.description,
            width = width
        );
    }
    Ok(())
}

fn format_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{:.4}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TYPICAL: &str = include_str!("../scenarios/typical.json");

    fn monitor(patterns: &str) -> Monitor<MockQueueManager, MockCodec> {
        let scenario: Scenario = serde_json::from_str(TYPICAL).unwrap();
        let config = MonitorConfig::new().with_monitored_queues(patterns);
        let mut m =
            Monitor::new(MockQueueManager::from_scenario(scenario), MockCodec, config).unwrap();
        m.discover_and_subscribe().unwrap();
        m
    }

    fn objects(report: &CycleReport) -> Vec<&str> {
        let mut objects: Vec<&str> = report.metrics.iter().map(|r| r.object.as_str()).collect();
        objects.sort_unstable();
        objects.dedup();
        objects
    }

    #[test]
    fn first_cycle_reports_only_queue_manager_data() {
        let mut m = monitor("APP*");
        assert_eq!(m.transport().cycle_count(), 3);

        let report = replay_cycle(&mut m, 0).unwrap();
        assert_eq!(report.messages, 7);
        assert_eq!(report.discarded, 6);
        assert_eq!(objects(&report), vec!["@self"]);
        assert_eq!(report.metrics.iter().filter(|r| r.value == 52.0).count(), 1);
    }

    #[test]
    fn churn_follows_the_scenario() {
        let mut m = monitor("APP*");
        for index in 0..2 {
            replay_cycle(&mut m, index).unwrap();
            m.reset_values();
        }
        assert_eq!(
            m.discovered_queues(),
            vec!["APP.ORDERS", "APP.PAYMENTS", "APP.REFUNDS"]
        );

        let report = replay_cycle(&mut m, 2).unwrap();
        assert_eq!(m.discovered_queues(), vec!["APP.ORDERS", "APP.REFUNDS"]);
        assert_eq!(report.messages, 3);
        assert_eq!(objects(&report), vec!["@self", "APP.ORDERS", "APP.REFUNDS"]);
    }

    #[test]
    fn locale_replaces_descriptions() {
        let scenario: Scenario = serde_json::from_str(TYPICAL).unwrap();
        let config = MonitorConfig::new()
            .with_monitored_queues("APP.ORDERS")
            .with_locale("fr_FR");
        let mut m =
            Monitor::new(MockQueueManager::from_scenario(scenario), MockCodec, config).unwrap();
        m.discover_and_subscribe().unwrap();

        replay_cycle(&mut m, 0).unwrap();
        let report = replay_cycle(&mut m, 1).unwrap();
        assert!(
            report
                .metrics
                .iter()
                .any(|r| r.object == "APP.ORDERS" && r.description == "Profondeur de la file")
        );
    }

    #[test]
    fn flags_override_config() {
        let cli = Cli::try_parse_from([
            "mqmetric-replay",
            "scenario.json",
            "--queues",
            "APP*",
            "--no-check-queues",
            "--prefix",
            "MYPREFIX",
            "--rediscovery-interval",
            "30",
        ])
        .unwrap();

        let config = build_config(&cli).unwrap();
        assert_eq!(config.monitored_queues, "APP*");
        assert!(!config.check_queue_list);
        assert_eq!(config.meta_prefix(), Some("MYPREFIX"));
        assert_eq!(config.rediscovery_interval(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn values_format_without_noise() {
        assert_eq!(format_value(52.0), "52");
        assert_eq!(format_value(12.5), "12.5000");
    }
}
