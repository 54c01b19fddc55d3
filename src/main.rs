use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use vicinia::config::{Config, ModelKind};
use vicinia::models::{Condensation, GameOfLife, Market, RealEstate, Segregation};
use vicinia::{Rule, Runner};

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, Subcommand)]
enum Command {
    /// Build every experiment and run it.
    Run,

    /// Build every experiment without running it.
    Check,
}

fn main() {
    env_logger::Builder::new()
        .format_timestamp_millis()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .init();

    if let Err(error) = run_cli() {
        log::error!("{error:#?}");
        std::process::exit(1);
    }
}

fn run_cli() -> Result<()> {
    let args = CLI::parse();
    log::info!("{args:#?}");

    let config = Config::from_file(&args.config).context("failed to load config")?;

    match config.model {
        ModelKind::Segregation => execute::<Segregation>(&config, args.command),
        ModelKind::Condensation => execute::<Condensation>(&config, args.command),
        ModelKind::Market => execute::<Market>(&config, args.command),
        ModelKind::RealEstate => execute::<RealEstate>(&config, args.command),
        ModelKind::GameOfLife => execute::<GameOfLife>(&config, args.command),
    }
}

fn execute<R: Rule>(config: &Config, command: Command) -> Result<()> {
    let mut runner = config
        .build_runner::<R>()
        .context("failed to construct runner")?;

    match command {
        Command::Check => {
            log::info!(
                "{} {} experiments are valid",
                runner.experiments().len(),
                R::NAME
            );
        }
        Command::Run => {
            runner.start().context("failed to run experiments")?;
            report(&runner).context("failed to report results")?;
        }
    }

    Ok(())
}

fn report<R: Rule>(runner: &Runner<R>) -> Result<()> {
    let names = runner.parameters_to_vary();
    for (i_exp, model) in runner.experiments().iter().enumerate() {
        let steps = model.runs().last().map_or(0, |summary| summary.steps);
        log::info!("experiment {i_exp} ({}): {steps} steps", model.label(&names));

        for (name, samples) in model.series().iter() {
            if let Some(val) = samples.last().and_then(|sample| sample.as_scalar()) {
                log::info!("  {name} = {val}");
            }
        }

        if runner.times() > 1 {
            for name in runner.saving_series() {
                if !model.series().last(name).is_some_and(|s| s.as_scalar().is_some()) {
                    continue;
                }
                let report = model
                    .series_history()
                    .final_report(name)
                    .with_context(|| format!("failed to aggregate {name}"))?;
                log::info!(
                    "  {name} over {} runs: mean = {}, std_dev = {}",
                    runner.times(),
                    report.mean,
                    report.std_dev
                );
            }
        }
    }
    Ok(())
}
