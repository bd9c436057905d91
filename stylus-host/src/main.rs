//! Stylus plotter host
//!
//! Without `CONFIG` the embedded plotter.toml is used. Press Ctrl-C during a
//! run to lift the pen and stop.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::Parser;
use log::{error, info, Level};
use stylus_host::config::{self, Purpose};
use stylus_host::pipeline;
use stylus_host::HostError;

/// Plan a drawing for the SCARA plotter and stream it to the controller
#[derive(Debug, Parser)]
#[command(name = "stylus", version)]
struct Args {
    /// Plotter configuration file
    config: Option<PathBuf>,

    /// Stop after writing the command table
    #[arg(long)]
    plan_only: bool,

    /// Stream a previously saved table instead of planning
    #[arg(long, value_name = "TABLE", conflicts_with = "plan_only")]
    replay: Option<PathBuf>,
}

fn run(args: Args) -> Result<(), HostError> {
    let purpose = match args.replay {
        Some(_) => Purpose::Replay,
        None => Purpose::Plan,
    };
    let file = config::load(args.config.as_deref(), purpose)?;

    let table = match &args.replay {
        Some(path) => pipeline::load_table(path)?,
        None => {
            let plan = pipeline::plan(&file)?;
            pipeline::replay_extent(&plan.synth, &plan.table);
            if let Some(path) = &file.output.table {
                pipeline::save_table(path, &plan.table)?;
            }
            plan.table
        }
    };

    if args.plan_only {
        return Ok(());
    }

    let cancel = Arc::new(AtomicBool::new(false));
    pipeline::install_cancel_handler(cancel.clone())?;
    info!("Press Ctrl-C to abort");
    pipeline::dispatch(&file, &table, &cancel)?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    if let Err(e) = simple_logger::init_with_level(Level::Info) {
        eprintln!("logger init failed: {}", e);
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
