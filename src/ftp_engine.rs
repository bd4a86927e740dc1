use chrono::{DateTime, Local};
use log::{error, info, warn};
use serde::Serialize;
use std::fs;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::Settings;
use crate::error::TransferError;
use crate::remote::{Connector, Endpoint, FtpConnector, RemoteConnection};

/// Name format of the per-run staging and archive directories.
pub const BATCH_DIR_FORMAT: &str = "%Y%m%d %H%M%S";

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub name: String,
    pub error: String,
}

/// What one run did. Written as JSON to the result file when one is configured.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Local>,
    pub staging_directory: Option<PathBuf>,
    pub archive_directory: Option<PathBuf>,
    pub transferred: Vec<String>,
    pub failed: Vec<FailedFile>,
    pub moved: usize,
    pub error: Option<String>,
}

impl RunSummary {
    fn new(started_at: DateTime<Local>) -> Self {
        RunSummary {
            started_at,
            staging_directory: None,
            archive_directory: None,
            transferred: Vec::new(),
            failed: Vec::new(),
            moved: 0,
            error: None,
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// Pulls everything in the remote directory into a fresh staging batch and
/// relocates it into a fresh archive batch on the internal network side.
///
/// Every call to [`TransferSession::run`] opens its own connection and
/// creates its own pair of timestamped directories.
pub struct TransferSession<C: Connector = FtpConnector> {
    connector: C,
    endpoint: Endpoint,
    local_directory: PathBuf,
    internal_network_directory: PathBuf,
    result_file: Option<PathBuf>,
}

impl TransferSession<FtpConnector> {
    pub fn from_settings(settings: &Settings) -> Self {
        TransferSession::new(
            FtpConnector,
            settings.endpoint(),
            settings.local_directory.clone(),
            settings.internal_network_directory.clone(),
        )
        .with_result_file(settings.result_file.clone())
    }
}

impl<C: Connector> TransferSession<C> {
    pub fn new(
        connector: C,
        endpoint: Endpoint,
        local_directory: PathBuf,
        internal_network_directory: PathBuf,
    ) -> Self {
        TransferSession {
            connector,
            endpoint,
            local_directory,
            internal_network_directory,
            result_file: None,
        }
    }

    pub fn with_result_file(mut self, result_file: Option<PathBuf>) -> Self {
        self.result_file = result_file;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Run one batch. Never fails: batch-level errors are logged and recorded
    /// in the returned summary so the caller can keep scheduling.
    pub fn run(&self) -> RunSummary {
        let mut summary = RunSummary::new(Local::now());
        info!(
            "Transfer started from {}:{} {}",
            self.endpoint.host, self.endpoint.port, self.endpoint.directory
        );

        match self.transfer(&mut summary) {
            Ok(()) => info!(
                "Transfer finished: {} transferred, {} failed, {} moved",
                summary.transferred.len(),
                summary.failed.len(),
                summary.moved
            ),
            Err(e) => {
                error!("Error: {}", e);
                summary.error = Some(e.to_string());
            }
        }

        if let Some(result_file) = &self.result_file {
            if let Err(e) = write_summary(result_file, &summary) {
                error!("Failed to write run summary to {}: {}", result_file.display(), e);
            }
        }
        summary
    }

    fn transfer(&self, summary: &mut RunSummary) -> Result<(), TransferError> {
        let mut connection = self.open()?;
        let result = self.transfer_batch(&mut connection, summary);
        if let Err(e) = connection.quit() {
            warn!("Closing FTP session failed: {}", e);
        }
        result
    }

    fn open(&self) -> Result<C::Connection, TransferError> {
        let endpoint = &self.endpoint;
        let mut connection = self
            .connector
            .connect(&endpoint.host, endpoint.port)
            .map_err(|source| TransferError::Connect {
                host: endpoint.host.clone(),
                port: endpoint.port,
                source,
            })?;
        connection
            .login(&endpoint.user, &endpoint.password)
            .map_err(|source| TransferError::Login {
                user: endpoint.user.clone(),
                source,
            })?;
        Ok(connection)
    }

    fn list_remote(&self, connection: &mut C::Connection) -> Result<Vec<String>, TransferError> {
        let listing = |source| TransferError::Listing {
            directory: self.endpoint.directory.clone(),
            source,
        };
        connection.cwd(&self.endpoint.directory).map_err(listing)?;
        connection.list_names().map_err(listing)
    }

    fn transfer_batch(
        &self,
        connection: &mut C::Connection,
        summary: &mut RunSummary,
    ) -> Result<(), TransferError> {
        let names = self.list_remote(connection)?;
        info!("Found {} entries in {}", names.len(), self.endpoint.directory);

        ensure_directory(&self.local_directory)?;
        ensure_directory(&self.internal_network_directory)?;

        let staging = create_batch_directory(&self.local_directory)?;
        summary.staging_directory = Some(staging.clone());

        for name in &names {
            match download(connection, name, &staging) {
                Ok(bytes) => {
                    info!("Transferred: {} ({} bytes)", name, bytes);
                    summary.transferred.push(name.clone());
                }
                Err(e) => {
                    error!("Error: {}", e);
                    summary.failed.push(FailedFile {
                        name: name.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let archive = create_batch_directory(&self.internal_network_directory)?;
        summary.archive_directory = Some(archive.clone());
        summary.moved = move_batch(&staging, &archive)?;
        info!("Moved {} files to {}", summary.moved, archive.display());

        // Fails when anything was left behind in staging.
        fs::remove_dir(&staging)
            .map_err(TransferError::fs("removing staging directory", &staging))?;
        Ok(())
    }
}

fn ensure_directory(directory: &Path) -> Result<(), TransferError> {
    fs::create_dir_all(directory).map_err(TransferError::fs("creating directory", directory))
}

/// Create `<root>/<timestamp>`, appending `_1`, `_2`, ... if that name is taken.
pub fn create_batch_directory(root: &Path) -> Result<PathBuf, TransferError> {
    let stamp = Local::now().format(BATCH_DIR_FORMAT).to_string();
    let mut candidate = root.join(&stamp);
    let mut counter = 0;
    loop {
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && counter < 999 => {
                counter += 1;
                candidate = root.join(format!("{}_{}", stamp, counter));
            }
            Err(e) => return Err(TransferError::fs("creating batch directory", &candidate)(e)),
        }
    }
}

/// Download one remote entry into `directory`. A failed download leaves no
/// file behind, and an entry whose file name is already taken in `directory`
/// fails instead of replacing the earlier download.
fn download<R: RemoteConnection>(
    connection: &mut R,
    name: &str,
    directory: &Path,
) -> Result<u64, TransferError> {
    let file_name = Path::new(name)
        .file_name()
        .ok_or_else(|| TransferError::InvalidEntry(name.to_string()))?;
    let target = directory.join(file_name);
    let file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&target)
        .map_err(TransferError::fs("creating", &target))?;

    let mut writer = BufWriter::new(file);
    let result = connection
        .retrieve(name, &mut writer)
        .and_then(|bytes| writer.flush().map(|()| bytes).map_err(Into::into));
    drop(writer);

    result.map_err(|source| {
        if let Err(e) = fs::remove_file(&target) {
            warn!("Could not remove partial download {}: {}", target.display(), e);
        }
        TransferError::Download {
            file: name.to_string(),
            source,
        }
    })
}

/// Move every entry of `staging` into `archive`, returning how many were moved.
pub fn move_batch(staging: &Path, archive: &Path) -> Result<usize, TransferError> {
    let mut moved = 0;
    let entries = fs::read_dir(staging).map_err(TransferError::fs("reading", staging))?;
    for entry in entries {
        let entry = entry.map_err(TransferError::fs("reading", staging))?;
        let target = archive.join(entry.file_name());
        move_entry(&entry.path(), &target)?;
        moved += 1;
    }
    Ok(moved)
}

/// Rename, or copy and delete when the rename fails (e.g. the archive root
/// is on another filesystem).
pub fn move_entry(from: &Path, to: &Path) -> Result<(), TransferError> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(TransferError::fs("copying", from))?;
    fs::remove_file(from).map_err(TransferError::fs("removing", from))
}

fn write_summary(path: &Path, summary: &RunSummary) -> Result<(), Box<dyn std::error::Error>> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json)?;
    Ok(())
}
