//!
//! FTP puller - scheduled download of a remote FTP directory into the
//! internal network.
//!
//! Each run connects to the server, downloads every entry of the configured
//! remote directory into a timestamped staging directory and then moves the
//! batch into a timestamped directory under the internal network root. The
//! first run happens at the configured time, later runs every 24 hours.
//!

pub mod config;
pub mod error;
pub mod ftp_engine;
pub mod logging;
pub mod reachability;
pub mod remote;
pub mod scheduler;
pub mod shutdown;

#[cfg(test)]
mod testutils;

pub use config::Settings;
pub use error::{ConfigError, RemoteError, TransferError};
pub use ftp_engine::{RunSummary, TransferSession};
pub use reachability::check_reachability;
pub use remote::{Connector, Endpoint, FtpConnector, RemoteConnection};
pub use scheduler::Scheduler;
pub use shutdown::Shutdown;
