use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ta_cli::commands::{self, clock_in, clock_out, history, jobs, status};
use ta_cli::{Cli, Commands, Config, JobsAction};
use ta_core::clocking::{ClockInRequest, ClockOutRequest};
use ta_core::costcode::{CostCode, JobAssignment};
use ta_core::types::{Actor, SessionId};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(ta_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = ta_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();

    let now = chrono::Local::now().naive_local();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::In {
            emp,
            job,
            desc,
            cost_code,
            when,
            actor,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let request = ClockInRequest {
                emp_num: commands::employee(*emp)?,
                job_code: *job,
                clocked_time: commands::resolve_time(when.time.as_deref(), now)?,
                cost_code: cost_code.clone(),
                job_desc: desc.clone(),
            };
            let actor = Actor::new(actor.actor.clone(), actor.role.clone());
            clock_in::run(&mut out, &db, &request, &actor, now)?;
        }
        Some(Commands::Out {
            emp,
            units,
            split,
            break_flag,
            when,
            actor,
        }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let request = ClockOutRequest {
                emp_num: commands::employee(*emp)?,
                clocked_time: commands::resolve_time(when.time.as_deref(), now)?,
                units: units.clone(),
                split: split.clone(),
                break_flag: i32::from(*break_flag),
            };
            let actor = Actor::new(actor.actor.clone(), actor.role.clone());
            clock_out::run(&mut out, &db, &request, &actor)?;
        }
        Some(Commands::ForceOut { emp, manager, when }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let emp_num = commands::employee(*emp)?;
            let time = commands::resolve_time(when.time.as_deref(), now)?;
            clock_out::force(&mut out, &db, emp_num, time, manager)?;
        }
        Some(Commands::Status { emp, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, commands::employee(*emp)?, *json, now)?;
        }
        Some(Commands::History { emp, session }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let target = match (emp, session) {
                (Some(emp), _) => history::Target::Employee(commands::employee(*emp)?),
                (None, Some(session)) => {
                    history::Target::Session(SessionId::new(session.clone())?)
                }
                (None, None) => anyhow::bail!("pass --emp or --session"),
            };
            history::run(&mut out, &db, &target)?;
        }
        Some(Commands::Jobs { action }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            match action {
                JobsAction::Require {
                    emp,
                    job,
                    clockable,
                    cost_code,
                    quantity,
                    split,
                } => {
                    let assignment = JobAssignment {
                        clockable: *clockable,
                        requires_cost_code: *cost_code,
                        ask_quantity: *quantity,
                        ask_split_code: *split,
                    };
                    jobs::require(&mut out, &db, commands::employee(*emp)?, *job, assignment)?;
                }
                JobsAction::AddCostCode {
                    job,
                    sfx,
                    item,
                    seq,
                    inactive,
                } => {
                    let code = CostCode {
                        job_code: *job,
                        job_sfx: sfx.clone(),
                        bom_item: item.clone(),
                        sequence: seq.clone(),
                        active: !inactive,
                    };
                    jobs::add_cost_code(&mut out, &db, &code)?;
                }
                JobsAction::Show { emp, job } => {
                    jobs::show(&mut out, &db, commands::employee(*emp)?, *job)?;
                }
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
