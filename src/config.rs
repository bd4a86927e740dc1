//! Loading and validation of the key=value configuration file.
//!
//! Validation is all-or-nothing: a single bad value rejects the whole file and
//! no partially valid [`Settings`] is ever produced.

use chrono::{DateTime, Local, NaiveDateTime, TimeZone};
use log::{error, info};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::remote::Endpoint;

pub const SCHEDULE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
pub const DEFAULT_LOCAL_DIRECTORY: &str = "./local_network/";
pub const DEFAULT_INTERNAL_NETWORK_DIRECTORY: &str = "./internal_network/";
pub const DEFAULT_FTP_PORT: u16 = 21;

/// Key/value pairs exactly as they appear in the file, trimmed.
pub type RawSettings = BTreeMap<String, String>;

/// Parse `key=value` lines. Blank lines and lines starting with `#` are skipped,
/// the split happens at the first `=` so values may contain `=` themselves.
pub fn parse_raw(text: &str) -> Result<RawSettings, ConfigError> {
    let mut raw = RawSettings::new();
    for (index, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (key, value) = line.split_once('=').ok_or_else(|| ConfigError::Syntax {
            line: index + 1,
            content: line.to_string(),
        })?;
        raw.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(raw)
}

pub fn read_raw(path: &Path) -> Result<RawSettings, ConfigError> {
    let text = fs::read_to_string(path).map_err(|source| {
        if source.kind() == std::io::ErrorKind::NotFound {
            ConfigError::NotFound { path: path.to_path_buf() }
        } else {
            ConfigError::Read { path: path.to_path_buf(), source }
        }
    })?;
    parse_raw(&text)
}

/// Validated, immutable configuration handed to the transfer session and the scheduler.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub ftp_host: String,
    pub ftp_port: u16,
    pub ftp_user: String,
    pub ftp_password: String,
    pub ftp_directory: String,
    pub local_directory: PathBuf,
    pub internal_network_directory: PathBuf,
    pub schedule: DateTime<Local>,
    pub result_file: Option<PathBuf>,
}

// Keeps the password out of log lines.
impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field("ftp_host", &self.ftp_host)
            .field("ftp_port", &self.ftp_port)
            .field("ftp_user", &self.ftp_user)
            .field("ftp_password", &"***")
            .field("ftp_directory", &self.ftp_directory)
            .field("local_directory", &self.local_directory)
            .field("internal_network_directory", &self.internal_network_directory)
            .field("schedule", &self.schedule)
            .field("result_file", &self.result_file)
            .finish()
    }
}

impl Settings {
    /// Read and validate the configuration file, logging the outcome.
    pub fn load(path: &Path) -> Result<Settings, ConfigError> {
        let raw = read_raw(path).map_err(|e| {
            error!("{}", e);
            e
        })?;
        match Settings::validate(&raw, Local::now()) {
            Ok(settings) => {
                info!("Parameters in {} are correct", path.display());
                Ok(settings)
            }
            Err(e) => {
                error!("Configuration issue detected in {}: {}", path.display(), e);
                Err(e)
            }
        }
    }

    /// Validate raw pairs against `now`. Pure apart from the directory existence checks.
    pub fn validate(raw: &RawSettings, now: DateTime<Local>) -> Result<Settings, ConfigError> {
        let schedule = validate_schedule(required(raw, "schedule")?, now)?;
        let local_directory = validate_directory(raw, "local_directory", DEFAULT_LOCAL_DIRECTORY)?;
        let internal_network_directory = validate_directory(
            raw,
            "internal_network_directory",
            DEFAULT_INTERNAL_NETWORK_DIRECTORY,
        )?;

        let ftp_host = required(raw, "ftp_host")?;
        if ftp_host.is_empty() {
            return Err(ConfigError::MissingKey("ftp_host"));
        }
        let ftp_port = validate_port(required(raw, "ftp_port")?)?;

        Ok(Settings {
            ftp_host: ftp_host.to_string(),
            ftp_port,
            ftp_user: required(raw, "ftp_user")?.to_string(),
            ftp_password: required(raw, "ftp_password")?.to_string(),
            ftp_directory: required(raw, "ftp_directory")?.to_string(),
            local_directory,
            internal_network_directory,
            schedule,
            result_file: raw
                .get("result_file")
                .filter(|value| !value.is_empty())
                .map(PathBuf::from),
        })
    }

    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.ftp_host.clone(),
            port: self.ftp_port,
            user: self.ftp_user.clone(),
            password: self.ftp_password.clone(),
            directory: self.ftp_directory.clone(),
        }
    }
}

fn required<'a>(raw: &'a RawSettings, key: &'static str) -> Result<&'a str, ConfigError> {
    raw.get(key).map(String::as_str).ok_or(ConfigError::MissingKey(key))
}

/// The schedule must parse with [`SCHEDULE_FORMAT`] and lie strictly after `now`.
pub fn validate_schedule(value: &str, now: DateTime<Local>) -> Result<DateTime<Local>, ConfigError> {
    let invalid = |reason: &str| ConfigError::InvalidSchedule {
        value: value.to_string(),
        reason: reason.to_string(),
    };
    let naive = NaiveDateTime::parse_from_str(value, SCHEDULE_FORMAT)
        .map_err(|e| invalid(&e.to_string()))?;
    // DST gaps have no local representation; folds take the earlier instant.
    let at = Local
        .from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| invalid("not a valid local time"))?;
    if at <= now {
        return Err(invalid("not after the current time"));
    }
    Ok(at)
}

fn validate_directory(
    raw: &RawSettings,
    key: &'static str,
    default: &str,
) -> Result<PathBuf, ConfigError> {
    let value = required(raw, key)?;
    if value.is_empty() {
        return Ok(PathBuf::from(default));
    }
    let path = Path::new(value);
    if path.is_dir() {
        Ok(path.to_path_buf())
    } else {
        Err(ConfigError::InvalidDirectory { key, value: value.to_string() })
    }
}

fn validate_port(value: &str) -> Result<u16, ConfigError> {
    if value.is_empty() {
        return Ok(DEFAULT_FTP_PORT);
    }
    match value.parse::<u16>() {
        Ok(port) if port != 0 => Ok(port),
        _ => Err(ConfigError::InvalidPort(value.to_string())),
    }
}
