//! Top-level CLI definition and dispatch.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use serde::Serialize;
use tracing::level_filters::LevelFilter;

use crate::core::config::{Config, DEFAULT_CONFIG_PATH};
use crate::core::errors::{MonError, Result};
use crate::daemon::context::{Context, FALLBACK_INTERVAL};
use crate::daemon::coordinator::Coordinator;
use crate::daemon::signals::SignalHandler;
use crate::logger;
use crate::monitor::node::Node;
use crate::monitor::probe::{NetProber, Prober};
use crate::notify::pushover::PushoverNotifier;
use crate::notify::{LogNotifier, Notifier};

/// hbsdmon: per-node health monitoring with Pushover alerts.
#[derive(Debug, Parser)]
#[command(name = "hbsdmon", version, about)]
pub struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    pub config: PathBuf,

    /// Log at debug level unless HBSDMON_LOG overrides it.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands. With none given, `daemon` runs.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the monitor in the foreground until SIGINT/SIGTERM.
    Daemon {
        /// Log notifications instead of sending them.
        #[arg(long)]
        dry_run: bool,
    },
    /// Load and validate the configuration, then summarize the nodes.
    Check {
        /// Emit the summary as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Probe every enabled node once and report PASS/FAIL.
    Probe,
    /// Print a shell completion script.
    Completions {
        /// Target shell.
        shell: Shell,
    },
}

/// Dispatch a parsed command line.
///
/// # Errors
/// Returns an error if the config cannot be loaded, startup fails, or (for
/// `probe`) any node fails its probe.
pub fn run(cli: &Cli) -> Result<()> {
    logger::init_with(if cli.verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    });

    match &cli.command {
        None => run_daemon(cli, false),
        Some(Command::Daemon { dry_run }) => run_daemon(cli, *dry_run),
        Some(Command::Check { json }) => run_check(cli, *json),
        Some(Command::Probe) => run_probe(cli),
        Some(Command::Completions { shell }) => {
            clap_complete::generate(*shell, &mut Cli::command(), "hbsdmon", &mut io::stdout());
            Ok(())
        }
    }
}

fn run_daemon(cli: &Cli, dry_run: bool) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let settings = config.settings();
    let nodes = config.enabled_nodes()?;

    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(PushoverNotifier::new(
            config.token.clone(),
            settings.timings.notify_timeout,
        )?)
    };
    let prober: Arc<dyn Prober> = Arc::new(NetProber::new(settings.timings.probe_timeout)?);
    let ctx = Arc::new(Context::new(&settings, notifier, prober)?);
    let signals = SignalHandler::install()?;

    tracing::info!(
        config = %cli.config.display(),
        nodes = nodes.len(),
        dry_run,
        "starting {}",
        settings.name
    );
    let mut coordinator = Coordinator::start(ctx, nodes, signals)?;
    let summary = coordinator.run();
    if summary.leaked > 0 {
        tracing::warn!(leaked = summary.leaked, "exiting with detached workers");
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CheckReport {
    config: PathBuf,
    name: String,
    heartbeat_interval_secs: u64,
    nodes: Vec<NodeSummary>,
}

#[derive(Debug, Serialize)]
struct NodeSummary {
    host: String,
    method: String,
    port: String,
    interval_secs: u64,
    enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pool: Option<String>,
}

fn run_check(cli: &Cli, json: bool) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let settings = config.settings();

    let mut nodes = Vec::with_capacity(config.nodes.len());
    for entry in &config.nodes {
        let node = Node::from_config(entry)?;
        let interval = node
            .params()
            .interval
            .or(settings.default_interval)
            .unwrap_or(FALLBACK_INTERVAL);
        nodes.push(NodeSummary {
            host: node.host().to_string(),
            method: node.method().to_string(),
            port: node.port_label(),
            interval_secs: interval.as_secs(),
            enabled: !entry.disabled,
            pool: node.params().pool.clone(),
        });
    }

    let report = CheckReport {
        config: cli.config.clone(),
        name: settings.name,
        heartbeat_interval_secs: settings.heartbeat_interval.as_secs(),
        nodes,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let enabled = report.nodes.iter().filter(|n| n.enabled).count();
    println!(
        "{} {} ({}): {enabled} of {} node(s) enabled",
        "[+]".green().bold(),
        report.config.display(),
        report.name,
        report.nodes.len()
    );
    for node in &report.nodes {
        let line = format!(
            "    {:<28} {:<6} port {:<6} every {}s",
            node.host, node.method, node.port, node.interval_secs
        );
        if node.enabled {
            println!("{line}");
        } else {
            println!("{} {}", line.dimmed(), "(disabled)".yellow());
        }
    }
    Ok(())
}

fn run_probe(cli: &Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;
    let settings = config.settings();
    let prober = NetProber::new(settings.timings.probe_timeout)?;
    let nodes = config.enabled_nodes()?;

    let mut failed = 0_usize;
    for node in &nodes {
        let passed = match prober.prepare(node) {
            Ok(()) => prober.probe(node),
            Err(err) => {
                tracing::warn!(code = err.code(), host = node.host(), "prepare failed: {err}");
                false
            }
        };
        let verdict = if passed {
            "PASS".green().bold()
        } else {
            failed += 1;
            "FAIL".red().bold()
        };
        println!(
            "{verdict} {:<28} {:<6} port {}",
            node.host(),
            node.method(),
            node.port_label()
        );
    }

    if failed > 0 {
        return Err(MonError::Runtime {
            details: format!("{failed} of {} node(s) failed", nodes.len()),
        });
    }
    Ok(())
}
