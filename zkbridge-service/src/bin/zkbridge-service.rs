#[path = "zkbridge-service/cli.rs"]
mod cli;
#[path = "zkbridge-service/setup.rs"]
mod setup;

use crate::cli::Cli;
use log::{error, info};
use zkbridge_core::infrastructure::config::ServiceMode;
use zkbridge_service::service::{run_deposit_service, run_settlement_service};

#[tokio::main]
async fn main() {
    let args = Cli::parse_args();
    zkbridge_core::infrastructure::logging::init_logger(args.log_dir_str().as_deref(), &args.log_level);
    args.apply_to_env();

    let mode: ServiceMode = match args.mode.parse() {
        Ok(mode) => mode,
        Err(err) => {
            error!("{}", err);
            std::process::exit(1);
        }
    };
    info!("zkbridge-service starting mode={} log_level={}", mode, args.log_level);

    let config = match setup::load_config(mode) {
        Ok(config) => config,
        Err(err) => {
            error!("configuration error: {}", err);
            std::process::exit(1);
        }
    };

    let shutdown = setup::shutdown_signal();
    let result = match mode {
        ServiceMode::Deposit => run_deposit_service(&config, shutdown).await,
        ServiceMode::Settlement => run_settlement_service(&config, shutdown).await,
    };

    match result {
        Ok(()) => info!("zkbridge-service stopped cleanly"),
        Err(err) if err.is_fatal() => {
            error!("fatal invariant violation: {}", err);
            std::process::exit(2);
        }
        Err(err) => {
            error!("service error: {}", err);
            std::process::exit(1);
        }
    }
}
