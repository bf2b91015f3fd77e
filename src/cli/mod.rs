pub mod client;
pub mod daemon_path;
pub mod invocation;
pub mod output;
pub mod process;

use std::{env, path::PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use client::send_request;
use daemon_path::to_daemon_path;
use invocation::to_raw_command;
use output::print_response;
use process::restart_server;
use tracing::{info, level_filters::LevelFilter};

use crate::{
    daemon::start_daemon,
    protocol::{Request, DEFAULT_ADDRESS},
    utils::{
        dir::{application_path, create_application_default_path},
        logging::{enable_logging, CLI_PREFIX, DAEMON_PREFIX},
    },
};

#[derive(Parser, Debug)]
#[command(name = "Prodtimer", version, long_about = None)]
#[command(about = "Pomodoro timer running in the background", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(long, help = "Enable logging")]
    log: bool,
    #[arg(long, default_value = DEFAULT_ADDRESS, help = "Address of the daemon")]
    address: String,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Starts a daemon for the application")]
    Init {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(
        about = "Run a daemon directly in current console. Used for debugging"
    )]
    Serve {
        #[arg(
            long,
            help = "Application directory. By default tries to save into $XDG_STATE_HOME or $HOME/.local/state"
        )]
        dir: Option<PathBuf>,
    },
    #[command(about = "Stop currently running daemon.")]
    Stop {},
    #[command(about = "Check whether the daemon is running.")]
    Ping {},
    #[command(
        about = "Send a timer command, for example `timer create -n tea -d 3`, `timer start`, `timer stats 2`",
        long_about = "Send a timer command, for example `timer create -n tea -d 3`, `timer start`, `timer stats 2`. \
            Every value after an option belongs to it, so quote values with spaces: `timer create -n \"deep work\" -d 25`"
    )]
    Timer {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        tokens: Vec<String>,
    },
}

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let logging_level = if args.log {
        Some(LevelFilter::TRACE)
    } else {
        None
    };

    match args.commands {
        Commands::Init { dir } => {
            let daemon = to_daemon_path(env::current_exe()?);
            let dir = dir.map(|dir| application_path(Some(dir))).transpose()?;
            restart_server(&daemon, dir.as_deref(), &args.address)?;
            println!("Started daemon");
            Ok(())
        }
        Commands::Serve { dir } => {
            let dir = application_path(dir)?;
            enable_logging(DAEMON_PREFIX, &dir, logging_level, true)?;
            start_daemon(&dir, &args.address).await
        }
        Commands::Stop {} => {
            print_response(send_request(&args.address, &Request::Quit).await?)?;
            Ok(())
        }
        Commands::Ping {} => {
            print_response(send_request(&args.address, &Request::Ping).await?)?;
            Ok(())
        }
        Commands::Timer { tokens } => {
            if args.log {
                enable_logging(
                    CLI_PREFIX,
                    &create_application_default_path()?,
                    logging_level,
                    true,
                )?;
            }
            let command = to_raw_command(&tokens)?;
            info!("Sending command {command}");
            print_response(send_request(&args.address, &Request::Command { command }).await?)
        }
    }
}
