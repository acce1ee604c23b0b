use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use viable::manager::{self, Analysis, Manager};
use viable::summary::round_report;

#[derive(Debug, Parser)]
#[command(version, about)]
struct CLI {
    /// Scenario file (TOML).
    #[arg(long)]
    config: PathBuf,

    /// Write the report here instead of standard output.
    #[arg(long)]
    output: Option<PathBuf>,

    /// Round every reported number to this many decimals.
    #[arg(long)]
    decimals: Option<u32>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    Growth,

    Pva {
        #[arg(long)]
        seed: Option<u64>,

        #[arg(long)]
        sequential: bool,

        #[arg(long)]
        trajectory_file: Option<PathBuf>,
    },

    Metapopulation,

    Genetics,

    All,
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

    let mut mgr = Manager::new(&args.config).context("failed to construct mgr")?;

    let mut report = match args.command {
        Command::Growth => mgr.run(Analysis::Growth)?,
        Command::Pva {
            seed,
            sequential,
            trajectory_file,
        } => {
            let opts = &mut mgr.config_mut().pva_options;
            if seed.is_some() {
                opts.seed = seed;
            }
            if sequential {
                opts.parallel = false;
            }
            if trajectory_file.is_some() {
                opts.retain_trajectories = true;
            }

            let result = mgr.run_pva()?;
            if let (Some(file), Some(traj_vec)) = (&trajectory_file, &result.trajectories) {
                manager::save_trajectories(file, traj_vec)
                    .with_context(|| format!("failed to save {file:?}"))?;
                log::info!("saved {file:?}");
            }
            serde_json::json!({ "pva": result })
        }
        Command::Metapopulation => mgr.run(Analysis::Metapopulation)?,
        Command::Genetics => mgr.run(Analysis::Genetics)?,
        Command::All => mgr.run(Analysis::All)?,
    };

    if let Some(decimals) = args.decimals {
        round_report(&mut report, decimals);
    }

    match &args.output {
        Some(file) => {
            manager::save_report(file, &report).context("failed to save report")?;
            log::info!("saved {file:?}");
        }
        None => println!("{}", serde_json::to_string_pretty(&report)?),
    }

    Ok(())
}
