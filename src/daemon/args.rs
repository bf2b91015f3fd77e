use std::path::PathBuf;

use clap::Parser;
use tracing::level_filters::LevelFilter;

use crate::protocol::DEFAULT_ADDRESS;

#[derive(Parser)]
#[command(name = "prodtimer-daemon", about = "Background process owning the prodtimer timer")]
pub struct DaemonArgs {
    /// Run in the current process instead of detaching.
    #[arg(long)]
    pub force: bool,
    /// Application directory holding the config, sessions and logs.
    #[arg(long)]
    pub dir: Option<PathBuf>,
    #[arg(long, default_value = DEFAULT_ADDRESS)]
    pub address: String,
    /// This option is for debugging purposes only.
    #[arg(long = "log-console")]
    pub log_console: bool,
    #[arg(long = "log-filter")]
    pub log: Option<LevelFilter>,
}
