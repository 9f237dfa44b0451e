//! # httpgw — main entry point
//!
//! Parses arguments, brings up logging, resolves configuration, binds the
//! shared listening and monitor sockets, installs signal handlers, and runs
//! the coordinator until shutdown.

use clap::Parser;
use httpgw::cli::Args;
use httpgw::coordinator;
use httpgw::lifecycle;
use httpgw::logging;
use tracing::{error, info};

fn main() {
    let args = Args::parse();
    let verbose = args.verbose;
    let quiet = args.quiet;
    let daemonize = args.daemonize;
    let user = args.user.clone();
    let group = args.group.clone();

    let _log_guard = logging::init(verbose, quiet);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error");
            std::process::exit(1);
        }
    };

    info!(
        port = config.bind_port,
        workers = config.worker_count,
        "starting httpgw"
    );

    if daemonize {
        if let Err(e) = lifecycle::daemonize() {
            error!(error = %e, "failed to daemonize");
            std::process::exit(1);
        }
    }

    let listener = match coordinator::bind_listener(config.bind_host.as_deref(), config.bind_port) {
        Ok(listener) => listener,
        Err(e) => {
            error!(error = %e, "failed to bind http listener");
            std::process::exit(1);
        }
    };

    if user.is_some() || group.is_some() {
        if let Err(e) = lifecycle::drop_privileges(user.as_deref(), group.as_deref()) {
            error!(error = %e, "failed to drop privileges");
            std::process::exit(1);
        }
    }

    let shutdown = coordinator::new_shutdown_flag();
    if let Err(e) = lifecycle::install_signal_handlers(shutdown.clone()) {
        error!(error = %e, "failed to install signal handlers");
        std::process::exit(1);
    }

    match coordinator::run(config, listener, shutdown) {
        Ok(()) => {
            info!("terminating process");
        }
        Err(e) => {
            error!(error = %e, "coordinator exited with error");
            std::process::exit(1);
        }
    }
}
