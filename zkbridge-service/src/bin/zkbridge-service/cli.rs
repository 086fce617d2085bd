use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "zkbridge-service")]
#[command(about = "zkbridge deposit and settlement daemons", long_about = None)]
pub struct Cli {
    /// Which daemon to run.
    #[arg(value_name = "MODE")]
    #[arg(value_parser = ["deposit", "settlement"])]
    pub mode: String,

    /// Override the tracking store directory.
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Log filter expression (e.g. "info", "debug,ethers=warn").
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Directory for rolling log files; console-only when unset.
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn log_dir_str(&self) -> Option<String> {
        self.log_dir.as_ref().map(|dir| dir.to_string_lossy().into_owned())
    }

    pub fn apply_to_env(&self) {
        if let Some(data_dir) = &self.data_dir {
            std::env::set_var(zkbridge_core::infrastructure::config::DATA_DIR_ENV, data_dir);
        }
    }
}
