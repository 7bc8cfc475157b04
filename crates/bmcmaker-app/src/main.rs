//! Main application entry point.

use bmcmaker_app::{App, AppConfig, Cli, Level, SystemClipboard};
use clap::Parser;
use std::process::ExitCode;

fn main() -> ExitCode {
    let cli = Cli::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_level()))
        .init();
    log::info!("Starting BMC Maker");

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            log::error!("Failed to start runtime: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let config = cli.configure(AppConfig::default());
    let mut app = App::open(config, SystemClipboard::new());
    let result = runtime.block_on(app.dispatch(cli.action()));

    match result {
        Ok(notes) => {
            let mut failed = false;
            for note in notes {
                failed |= note.level == Level::Error;
                println!("{note}");
            }
            if failed {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            }
        }
        Err(e) => {
            log::error!("{}", e);
            eprintln!("[error] {e}");
            ExitCode::FAILURE
        }
    }
}
