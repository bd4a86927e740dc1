use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const DEFAULT_LOG_FILE: &str = "ftp_transfer_logger.log";

/// Log file path, overridable with `FTP_PULLER_LOG_FILE`.
pub fn log_file_path() -> PathBuf {
    std::env::var("FTP_PULLER_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_LOG_FILE))
}

/// Route `log` records to `path` as `timestamp - LEVEL - message` lines.
///
/// The default level is info; `RUST_LOG` still overrides it. Calling this a
/// second time leaves the first logger in place.
pub fn init(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let _ = env_logger::Builder::new()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "{} - {} - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
                record.level(),
                record.args()
            )
        })
        .target(env_logger::Target::Pipe(Box::new(file)))
        .try_init();
    Ok(())
}
