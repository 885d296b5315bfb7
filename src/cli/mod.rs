//! Command-line interface for swfme.
//!
//! Provides commands for running built-in processes, listing and describing
//! them, and showing the resolved configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::builtin;
use crate::config;
use crate::core::logging::set_max_value_length;
use crate::core::Process;
use crate::domain::{EventType, LifecycleEvent, ParameterSnapshot};
use crate::monitoring::{subscribe_fn, EventBus, MetricsCollector};

/// swfme - Simple workflow management engine
#[derive(Parser, Debug)]
#[command(name = "swfme")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a registered process
    Run {
        /// Registered process name (see `swfme list`)
        process: String,

        /// Input parameter, parsed per its declared type (repeatable)
        #[arg(short = 'p', long = "param", value_name = "NAME=VALUE")]
        params: Vec<String>,

        /// Instance name (defaults to the process type name)
        #[arg(short, long)]
        name: Option<String>,

        /// Print the final process snapshot as JSON
        #[arg(long)]
        json: bool,

        /// Print lifecycle events as they happen
        #[arg(short, long)]
        events: bool,
    },

    /// List registered processes
    List,

    /// Show parameters of a registered process
    Info {
        /// Registered process name
        process: String,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run {
                process,
                params,
                name,
                json,
                events,
            } => run_process(&process, &params, name.as_deref(), json, events).await,
            Commands::List => list_processes(),
            Commands::Info { process } => show_info(&process),
            Commands::Config => show_config(),
        }
    }
}

/// Split `NAME=VALUE`
fn parse_param(param: &str) -> Result<(&str, &str)> {
    let (name, value) = param
        .split_once('=')
        .with_context(|| format!("Invalid parameter '{}', expected NAME=VALUE", param))?;
    let name = name.trim();
    if name.is_empty() {
        anyhow::bail!("Invalid parameter '{}', name is empty", param);
    }
    Ok((name, value))
}

/// Assign command-line parameters to the process inputs
fn apply_params(process: &mut Process, params: &[String]) -> Result<()> {
    for param in params {
        let (name, text) = parse_param(param)?;
        let declared = process
            .input()
            .get(name)
            .map(|p| p.declared_type().clone())
            .with_context(|| format!("Process '{}' has no input '{}'", process.name(), name))?;
        let value = declared
            .parse(text)
            .with_context(|| format!("Invalid value for '{}'", name))?;
        process.input_mut().set(name, value)?;
    }
    Ok(())
}

fn print_event(event: &LifecycleEvent) {
    match event.event_type {
        EventType::ProcessStarted => eprintln!("> started    {}", event.process_name),
        EventType::ProcessCompleted => eprintln!(
            "< completed  {} ({:.0}ms)",
            event.process_name,
            event.execution_time_ms.unwrap_or_default()
        ),
        EventType::ProcessFailed => eprintln!(
            "! failed     {}: {}",
            event.process_name,
            event.error.as_deref().unwrap_or("unknown error")
        ),
        EventType::GroupStarted => eprintln!(
            "  group {} ({}, {} process(es))",
            event.group_index.unwrap_or_default(),
            event
                .execution_mode
                .map(|m| m.to_string())
                .unwrap_or_default(),
            event.group_size.unwrap_or_default()
        ),
        EventType::GroupCompleted => {
            eprintln!("  group {} done", event.group_index.unwrap_or_default())
        }
    }
}

/// Run a process from the built-in registry
async fn run_process(
    name: &str,
    params: &[String],
    instance_name: Option<&str>,
    json: bool,
    events: bool,
) -> Result<()> {
    let cfg = config::config()?;
    set_max_value_length(cfg.max_value_length);

    let registry = builtin::registry();
    let mut process = registry.create(name, instance_name)?;
    apply_params(&mut process, params)?;

    let bus = EventBus::new(cfg.event_history);
    if events {
        bus.subscribe(
            "*",
            subscribe_fn(|event| async move {
                print_event(&event);
                Ok(())
            }),
        )
        .await?;
    }

    let metrics = Arc::new(MetricsCollector::new());
    if cfg.metrics_enabled {
        metrics.attach(&bus).await?;
    }

    let success = process.execute(&bus).await;

    if json {
        let snapshot = serde_json::to_string_pretty(&process.snapshot())
            .context("Failed to serialize process snapshot")?;
        println!("{}", snapshot);
    } else {
        print_outputs(&process);
        if cfg.metrics_enabled {
            let summary = metrics.summary().await;
            eprintln!(
                "\n[{} processes, {} completed, {} failed, avg {:.1}ms]",
                summary.total_processes,
                summary.completed,
                summary.failed,
                summary.avg_execution_time_ms
            );
        }
    }

    if !success {
        eprintln!(
            "\n[Process {} failed: {}]",
            process.name(),
            process.error().unwrap_or("unknown error")
        );
        std::process::exit(1);
    }

    eprintln!(
        "\n[Process {} completed in {:.0}ms]",
        process.name(),
        process.execution_time_ms().unwrap_or_default()
    );
    Ok(())
}

fn print_outputs(process: &Process) {
    if process.output().is_empty() {
        return;
    }

    println!("{:<20} {:<12} {:<40}", "OUTPUT", "TYPE", "VALUE");
    println!("{}", "-".repeat(72));
    for parameter in process.output().iter() {
        let value = parameter
            .value()
            .map(|v| v.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<20} {:<12} {:<40}",
            parameter.name(),
            parameter.declared_type().to_string(),
            value
        );
    }
}

/// List registered processes
fn list_processes() -> Result<()> {
    let registry = builtin::registry();

    println!("{:<16} {:<14} {:<50}", "NAME", "KIND", "DESCRIPTION");
    println!("{}", "-".repeat(80));

    for info in registry.list() {
        let kind = serde_json::to_value(info.kind)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        println!("{:<16} {:<14} {:<50}", info.name, kind, info.description);
    }

    println!("\nTotal: {} processes", registry.len());
    Ok(())
}

fn print_parameters(title: &str, parameters: &[ParameterSnapshot]) {
    println!("{}:", title);
    if parameters.is_empty() {
        println!("  (none)");
        return;
    }
    for p in parameters {
        let mut line = format!("  {:<18} {:<14}", p.name, p.declared_type);
        if !p.required {
            line.push_str(" optional");
        }
        if let Some(value) = &p.value {
            line.push_str(&format!(" = {}", value));
        }
        if !p.description.is_empty() {
            line.push_str(&format!("  # {}", p.description));
        }
        println!("{}", line);
    }
}

/// Show parameters of one process
fn show_info(name: &str) -> Result<()> {
    let registry = builtin::registry();
    let info = registry.info(name)?;

    println!("Name:        {}", info.name);
    println!("Class:       {}", info.class);
    println!("Kind:        {:?}", info.kind);
    if !info.description.is_empty() {
        println!("Description: {}", info.description);
    }
    println!();
    print_parameters("Inputs", &info.input);
    println!();
    print_parameters("Outputs", &info.output);

    Ok(())
}

/// Show resolved configuration
fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("swfme configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Logging:");
    println!("  Level:            {}", cfg.log_level);
    println!("  Max value length: {}", cfg.max_value_length);
    println!();
    println!("Event bus:");
    println!("  Max history:      {}", cfg.event_history);
    println!();
    println!("Metrics:");
    println!("  Enabled:          {}", cfg.metrics_enabled);

    Ok(())
}
