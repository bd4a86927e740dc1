use colored::*;
use log::{error, info};
use std::path::PathBuf;

use ftp_puller::{check_reachability, logging, FtpConnector, Scheduler, Settings, Shutdown, TransferSession};

const DEFAULT_CONFIG_FILE: &str = "config.ini";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let log_file = logging::log_file_path();
    logging::init(&log_file)?;
    info!("Program started");

    let config_file = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    // Nothing is scheduled unless both gates pass.
    let settings = match Settings::load(&config_file) {
        Ok(settings) => settings,
        Err(_) => {
            println!(
                "{} Configuration issues detected in {}. See {} for details.",
                "❌".red(),
                config_file.display(),
                log_file.display()
            );
            info!("Program ended");
            std::process::exit(1);
        }
    };

    let session = TransferSession::from_settings(&settings);
    if !check_reachability(&FtpConnector, session.endpoint()) {
        println!(
            "{} Authentication issues detected in {}. See {} for details.",
            "❌".red(),
            config_file.display(),
            log_file.display()
        );
        info!("Program ended");
        std::process::exit(1);
    }

    let shutdown = Shutdown::new();
    shutdown.install_ctrlc_handler();

    let runs = Scheduler::daily(settings.schedule, shutdown).run(|| {
        let summary = session.run();
        if !summary.success() {
            error!("Run started at {} did not complete", summary.started_at);
        }
    });

    info!("Program ended after {} runs", runs);
    Ok(())
}
