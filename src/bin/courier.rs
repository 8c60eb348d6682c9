//! Queue consumer delivering tasks to the configured HTTP endpoint.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use thiserror::Error;

use courier::{
    AmqpQueue, ConfigError, ConsumerControl, CourierLevel, CourierLogger, DeliveryHandler, HandlerError,
    HttpDeliveryClient, QueueError, install_global_logger, load_config,
};

#[derive(Debug, Parser)]
#[command(name = "courier", about = "Deliver queued tasks over HTTP")]
struct Args {
    /// INI configuration file.
    #[arg(long, default_value = "config/app.ini")]
    config: PathBuf,

    /// Character encoding of the configuration file.
    #[arg(long)]
    encoding: Option<String>,
}

#[derive(Debug, Error)]
enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to open the log file: {0}")]
    Logger(#[from] HandlerError),
    #[error(transparent)]
    Queue(#[from] QueueError),
}

fn run(args: &Args) -> Result<(), StartupError> {
    let config = load_config(&args.config, args.encoding.as_deref())?;
    let logger = Arc::new(CourierLogger::from_config(&config.logger)?);
    if !install_global_logger(Arc::clone(&logger), log::LevelFilter::Info) {
        logger.log(
            "Another log backend is installed; library diagnostics will not reach this log",
            CourierLevel::Warning,
            "application",
        );
    }

    let queue = AmqpQueue::connect(&config.queue, Arc::clone(&logger))?;
    let client = HttpDeliveryClient::new(&config.request, &config.app, Arc::clone(&logger));
    let handler = DeliveryHandler::new(queue, client, Arc::clone(&logger), config.command);

    let control = ConsumerControl::new();
    let consumed = handler.run(&control);
    let closed = handler.queue().close();
    logger.flush()?;
    consumed?;
    closed?;
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("courier: {err}");
            ExitCode::FAILURE
        }
    }
}
