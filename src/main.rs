//! autoheal - Main CLI Entry Point

use anyhow::{Context, Result};
use autoheal::{
    cli::{parse_params, Args, Commands, Config, ReportFormat, Verbosity},
    escalation::{HttpAnalysisProvider, WebhookEscalationSink},
    history::JsonlHistoryStore,
    orchestrator::{Orchestrator, Pipeline},
    report::{FinalOutcome, RunReport},
    runner::{FileLogStore, ShellCommandRunner},
    telemetry,
};
use clap::Parser;
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let verbosity = args.verbosity(config.default_verbosity());
    telemetry::init_tracing(verbosity);

    if !config.telemetry.color_output {
        colored::control::set_override(false);
    }

    match &args.command {
        Commands::Run {
            pipeline,
            log_dir,
            report,
            format,
            params,
        } => {
            let options = RunOptions {
                pipeline,
                log_dir: log_dir.clone(),
                report: report.as_deref(),
                format: *format,
                params,
            };
            let success = run_pipeline(&config, verbosity, options).await?;
            if !success {
                std::process::exit(1);
            }
        }
        Commands::Validate { pipeline } => {
            validate_pipeline(pipeline)?;
        }
        Commands::Config => {
            show_config(&args, &config)?;
        }
    }

    Ok(())
}

struct RunOptions<'a> {
    pipeline: &'a Path,
    log_dir: Option<PathBuf>,
    report: Option<&'a Path>,
    format: ReportFormat,
    params: &'a [String],
}

async fn run_pipeline(config: &Config, verbosity: Verbosity, options: RunOptions<'_>) -> Result<bool> {
    let pipeline = Pipeline::load(options.pipeline)
        .with_context(|| format!("Failed to load pipeline {}", options.pipeline.display()))?;
    let parameters = parse_params(options.params)?;

    let log_dir = options.log_dir.unwrap_or_else(|| config.log_dir());
    let mut runner = ShellCommandRunner::new(&log_dir);
    if let Some(shell) = &config.runner.shell {
        runner = runner.with_shell(shell.clone());
    }
    let logs = FileLogStore::new(config.runner.max_log_bytes);

    let mut builder = Orchestrator::builder(Arc::new(runner), Arc::new(logs))
        .classifier_config(config.classifier.clone())
        .strategy_config(config.strategy.clone())
        .recovery_config(config.recovery.clone())
        .analysis_config(config.analysis.clone())
        .parameters(parameters)
        .default_timeout(config.default_timeout());

    if let Some(url) = &config.escalation.webhook_url {
        builder = builder.escalation_sink(Arc::new(WebhookEscalationSink::new(url)?));
    }
    if let Some(endpoint) = &config.analysis.endpoint {
        builder = builder.analysis_provider(Arc::new(HttpAnalysisProvider::new(
            endpoint,
            config.analysis.timeout(),
        )?));
    }
    if let Some(path) = config.history_file() {
        let store = JsonlHistoryStore::new(&path)
            .with_context(|| format!("Failed to open history file {}", path.display()))?;
        builder = builder.history_store(Arc::new(store));
    }

    let orchestrator = builder.build();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling run");
            trigger.cancel();
        }
    });

    if verbosity != Verbosity::Quiet {
        println!(
            "{} {} ({} phases, {} operations)",
            "▶".cyan(),
            pipeline.name.bold(),
            pipeline.phases.len(),
            pipeline.operation_count()
        );
    }

    let report = orchestrator.run(&pipeline, cancel).await?;
    print_report(&report, verbosity);

    if let Some(path) = options.report {
        write_report(&report, path, options.format)?;
        if verbosity != Verbosity::Quiet {
            println!("Report written to {}", path.display());
        }
    }

    Ok(report.success)
}

fn print_report(report: &RunReport, verbosity: Verbosity) {
    println!();
    for phase in &report.phases {
        let marker = if phase.success { "✓".green() } else { "✗".red() };
        let suffix = if phase.non_blocking { " (non-blocking)".dimmed().to_string() } else { String::new() };
        println!(
            "{} {}{} {}",
            marker,
            phase.name.bold(),
            suffix,
            format!("{:.1}s", phase.duration_ms as f64 / 1000.0).dimmed()
        );

        for op in &phase.operations {
            let show = verbosity.show_all_operations()
                || op.failed_at_least_once()
                || op.outcome == FinalOutcome::Abandoned;
            if !show {
                continue;
            }

            let outcome = match op.outcome {
                FinalOutcome::Succeeded | FinalOutcome::SucceededViaSubstitute => op.outcome.as_str().green(),
                FinalOutcome::Proceeded => op.outcome.as_str().yellow(),
                FinalOutcome::Escalated => op.outcome.as_str().red(),
                FinalOutcome::Abandoned => op.outcome.as_str().magenta(),
                FinalOutcome::NotRun => op.outcome.as_str().dimmed(),
            };

            let mut line = format!(
                "    {} {} ({} attempt(s), {} intervention(s))",
                op.operation, outcome, op.attempts, op.interventions()
            );
            if let Some(issue) = &op.last_issue {
                line.push_str(&format!(" - {}: {}", issue.kind, issue.message));
            }
            println!("{}", line);

            if let Some(substitute) = &op.substitute {
                println!("      via substitute {}", substitute);
            }
            for change in &op.parameter_changes {
                println!("      adapted {}", change);
            }
            if let Some(receipt) = &op.escalation {
                if receipt.delivered {
                    println!("      escalated to {}", receipt.sink);
                } else {
                    println!(
                        "      {} escalation attempted, sink unreachable ({})",
                        "!".red(),
                        receipt.error.as_deref().unwrap_or("unknown error")
                    );
                }
                println!("      remediation: {}", receipt.bundle.remediation);
            }
        }
    }

    let t = &report.totals;
    println!();
    println!(
        "Interventions: {}  retries: {}  adaptations: {}  substitutions: {}",
        t.interventions, t.retries, t.adaptations, t.substitutions
    );
    println!(
        "Recovered: {}  proceeded: {}  escalations: {}  abandoned: {}",
        t.recoveries_succeeded, t.proceeds, t.escalations, t.abandoned
    );

    let status = if report.success {
        "SUCCEEDED".green().bold()
    } else if report.cancelled {
        "CANCELLED".magenta().bold()
    } else {
        "FAILED".red().bold()
    };
    let halted = report
        .halted_at
        .as_ref()
        .map(|phase| format!(" (halted at '{}')", phase))
        .unwrap_or_default();
    println!(
        "{} {} in {:.1}s{}",
        status,
        report.pipeline,
        report.elapsed_ms as f64 / 1000.0,
        halted
    );
}

fn write_report(report: &RunReport, path: &Path, format: ReportFormat) -> Result<()> {
    let contents = match format {
        ReportFormat::Json => report.to_json()?,
        ReportFormat::Text => report.summary_lines().join("\n") + "\n",
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("Failed to write report {}", path.display()))?;
    Ok(())
}

fn validate_pipeline(path: &Path) -> Result<()> {
    let pipeline = Pipeline::load(path)
        .with_context(|| format!("Invalid pipeline {}", path.display()))?;

    println!("{} {} is valid", "✓".green(), path.display());
    for phase in &pipeline.phases {
        let ids: Vec<String> = phase
            .operations
            .iter()
            .map(|op| match &op.alternative {
                Some(alt) => format!("{} (alt {})", op.id, alt.id),
                None => op.id.to_string(),
            })
            .collect();
        println!(
            "  {}{}: {}",
            phase.name.bold(),
            if phase.non_blocking { " (non-blocking)" } else { "" },
            ids.join(", ")
        );
    }
    Ok(())
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    let source = args
        .config
        .clone()
        .or_else(|| Config::default_path().filter(|p| p.exists()));

    println!("{}", "autoheal configuration".bold());
    match source {
        Some(path) => println!("Source: {}", path.display()),
        None => println!("Source: built-in defaults"),
    }
    println!();
    println!("{}", config.to_toml()?);

    Ok(())
}
