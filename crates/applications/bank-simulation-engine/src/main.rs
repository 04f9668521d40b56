//! Bank Simulation Engine CLI
//!
//! Command-line interface for running teller queue simulations
//!
//! ```bash
//! # Branch study: three day profiles against N counters (prompts if omitted)
//! bank-sim branch --counters 2
//!
//! # Replicated experiment at 18 arrivals/hr
//! bank-sim experiment split-queue 18
//! bank-sim experiment single-queue 22 --replications 30
//!
//! # Both layouts side by side
//! bank-sim compare 18 --output compare.json
//!
//! # Any scenario from a JSON file
//! bank-sim run --config scenario.json
//! ```

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bank_simulation_engine::{
    config::{
        parse_counters, DEFAULT_HORIZON_MINUTES, DEFAULT_REPLICATIONS, DEFAULT_SEED,
        DEFAULT_SERVICE_RATE_PER_HOUR, DEFAULT_TELLERS,
    },
    BranchDay, ConfigError, Experiment, ExperimentParams, ExperimentReport, QueueLayout,
    ScenarioConfig, SimulationError,
};

#[derive(Parser)]
#[command(name = "bank-sim")]
#[command(about = "Simulate bank teller queues for capacity planning", long_about = None)]
struct Cli {
    /// Output JSON file path (optional)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the day profiles for one branch (single run each, seed 42)
    Branch {
        /// Number of counters; prompts on stdin when omitted
        #[arg(short, long, value_parser = parse_counters)]
        counters: Option<u32>,

        /// Day profiles to run (normal-day, salary-day, aswesuma-day); all by default
        #[arg(short, long = "scenario")]
        scenarios: Vec<BranchDay>,
    },

    /// Replicated experiment for one queue layout
    Experiment {
        /// Queue layout (single-queue, split-queue)
        layout: QueueLayout,

        /// Customer arrival rate per hour (e.g. 18)
        arrival_rate: f64,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Run both queue layouts with identical settings
    Compare {
        /// Customer arrival rate per hour (e.g. 18)
        arrival_rate: f64,

        #[command(flatten)]
        params: ParamArgs,
    },

    /// Run a scenario described in a JSON file
    Run {
        /// Scenario config file
        #[arg(short, long)]
        config: PathBuf,
    },
}

#[derive(Args)]
struct ParamArgs {
    /// Number of tellers
    #[arg(long, default_value_t = DEFAULT_TELLERS)]
    tellers: u32,

    /// Service rate per teller per hour
    #[arg(long, default_value_t = DEFAULT_SERVICE_RATE_PER_HOUR)]
    service_rate: f64,

    /// Number of independent replications
    #[arg(short, long, default_value_t = DEFAULT_REPLICATIONS)]
    replications: u32,

    /// Seed of the first replication
    #[arg(long, default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// Simulated minutes per replication
    #[arg(long, default_value_t = DEFAULT_HORIZON_MINUTES)]
    horizon: f64,
}

impl ParamArgs {
    fn to_params(&self, arrival_per_hour: f64) -> ExperimentParams {
        ExperimentParams {
            arrival_per_hour,
            service_per_hour: self.service_rate,
            tellers: self.tellers,
            replications: self.replications,
            seed_base: self.seed,
            horizon: self.horizon,
        }
    }
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bank_sim=info,bank_simulation_engine=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            if is_config_error(&err) {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let reports = match cli.command {
        Commands::Branch {
            counters,
            scenarios,
        } => {
            let counters = match counters {
                Some(counters) => counters,
                None => prompt_counters()?,
            };
            let days = if scenarios.is_empty() {
                BranchDay::ALL.to_vec()
            } else {
                scenarios
            };
            run_branch(counters, &days)?
        }
        Commands::Experiment {
            layout,
            arrival_rate,
            params,
        } => {
            let config = layout.config(&params.to_params(arrival_rate));
            let report = run_experiment(config)?;
            print_experiment(&report);
            vec![report]
        }
        Commands::Compare {
            arrival_rate,
            params,
        } => {
            let params = params.to_params(arrival_rate);
            let reports = [QueueLayout::SplitQueue, QueueLayout::SingleQueue]
                .iter()
                .map(|layout| run_experiment(layout.config(&params)))
                .collect::<anyhow::Result<Vec<_>>>()?;
            for report in &reports {
                print_experiment(report);
            }
            print_comparison(&reports);
            reports
        }
        Commands::Run { config } => {
            let config = ScenarioConfig::from_json_file(&config)
                .with_context(|| format!("loading scenario {}", config.display()))?;
            let report = run_experiment(config)?;
            print_experiment(&report);
            vec![report]
        }
    };

    if let Some(output_path) = cli.output {
        write_reports(&output_path, &reports)?;
    }

    println!("\n✅ Simulation complete!\n");
    Ok(())
}

fn run_experiment(config: ScenarioConfig) -> anyhow::Result<ExperimentReport> {
    print!("Running '{}'... ", config.name);
    io::stdout().flush()?;
    let report = Experiment::new(config)?.run()?;
    println!("Done");
    Ok(report)
}

/// Ask for a counter count until the user gives a usable one
fn prompt_counters() -> anyhow::Result<u32> {
    let stdin = io::stdin();
    loop {
        print!("\n>>> Enter number of counters (e.g. 2): ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            anyhow::bail!("no counter count given before end of input");
        }

        match parse_counters(&line) {
            Ok(counters) => return Ok(counters),
            Err(ConfigError::InvalidCapacity(_)) => {
                println!("Error: you must enter 1 or more counters");
            }
            Err(err) => println!("Error: {err}. Please enter a whole number."),
        }
    }
}

fn run_branch(counters: u32, days: &[BranchDay]) -> anyhow::Result<Vec<ExperimentReport>> {
    println!("╔══════════════════════════════════════════════════════════╗");
    println!("║  Bank Branch Simulation                                  ║");
    println!("╚══════════════════════════════════════════════════════════╝\n");

    info!(counters, days = days.len(), "running branch study");

    let reports = days
        .iter()
        .map(|day| run_experiment(day.config(counters)))
        .collect::<anyhow::Result<Vec<_>>>()?;

    println!("\n{}", "=".repeat(50));
    println!("Tested Counters {counters}");
    println!("{}", "=".repeat(50));

    println!(
        "{:<30} | {:<15} | {:<20} | {:<20} | {:<15}",
        "Scenario", "Total Customers", "Average Wait (min)", "Maximum Wait (min)", "Utilization (%)"
    );
    println!("{}", "-".repeat(112));

    for report in &reports {
        let row = report.scenario_result();
        println!(
            "{:<30} | {:<15} | {:<20.2} | {:<20.2} | {:<15.2}",
            row.scenario_name,
            row.total_completed_customers,
            row.average_wait_time,
            row.maximum_wait_time,
            row.utilization_percent,
        );
    }

    Ok(reports)
}

fn print_experiment(report: &ExperimentReport) {
    let config = &report.config;

    println!("\n╔══════════════════════════════════════════════════════════╗");
    println!("║  {:<56}║", report.scenario_name);
    println!("╚══════════════════════════════════════════════════════════╝\n");

    println!("Configuration:");
    println!("  Tellers: {}", config.topology.total_capacity());
    println!("  Lines: {}", config.topology.lane_capacities().len());
    println!("  Arrival rate: {}", config.arrival);
    println!("  Service rate: {}", config.service);
    println!("  Horizon: {} min", config.horizon);
    println!("  Replications: {} (seeds {}..)\n", config.replications, config.seed_base);

    println!(
        "{:<8} {:>10} {:>12} {:>12} {:>14} {:>10}",
        "Seed", "Completed", "Avg Wait", "Max Wait", "Utilization", "Abandoned"
    );
    println!("{}", "-".repeat(71));
    for run in &report.runs {
        println!(
            "{:<8} {:>10} {:>12.2} {:>12.2} {:>13.1}% {:>10}",
            run.seed,
            run.completed_customers,
            run.average_wait,
            run.max_wait,
            run.utilization_percent,
            run.abandoned_customers,
        );
    }

    let summary = &report.summary;
    println!("{}", "-".repeat(71));
    println!(
        "Averaged over {}/{} replications with completed customers:",
        summary.replications_counted, summary.replications_run
    );
    println!("  Average wait: {} min", fmt_opt(summary.average_wait));
    println!(
        "  Average utilization: {} %",
        fmt_opt(summary.average_utilization_percent)
    );
    println!(
        "  Throughput: {:.2} customers/hr",
        summary.throughput_per_hour()
    );
}

fn print_comparison(reports: &[ExperimentReport]) {
    println!("\n{}", "-".repeat(71));
    println!("Queue layout comparison:");
    for report in reports {
        println!(
            "  {:<36} wait {:>8} min  throughput {:>6.2}/hr",
            report.scenario_name,
            fmt_opt(report.summary.average_wait),
            report.summary.throughput_per_hour(),
        );
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

fn write_reports(path: &Path, reports: &[ExperimentReport]) -> anyhow::Result<()> {
    println!("\nWriting results to {}...", path.display());
    let json = serde_json::to_string_pretty(reports)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    println!("  Results saved");
    Ok(())
}

/// Configuration problems exit with status 2, everything else with 1
fn is_config_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause.is::<ConfigError>()
            || cause
                .downcast_ref::<SimulationError>()
                .is_some_and(SimulationError::is_config)
    })
}
