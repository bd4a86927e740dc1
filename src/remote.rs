//! The seam between the transfer pipeline and the FTP server.
//!
//! Production code talks to [`ftp::FtpStream`] through [`FtpConnector`]; tests
//! swap in a scripted connector.

use std::cell::RefCell;
use std::io::{self, Write};

use crate::error::RemoteError;

/// Where and as whom to connect. Holds no connection itself.
#[derive(Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub directory: String,
}

impl std::fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}

/// Opens fresh connections. Every call returns a new, independent session.
pub trait Connector {
    type Connection: RemoteConnection;

    fn connect(&self, host: &str, port: u16) -> Result<Self::Connection, RemoteError>;
}

/// One live control connection.
pub trait RemoteConnection {
    fn login(&mut self, user: &str, password: &str) -> Result<(), RemoteError>;

    fn cwd(&mut self, directory: &str) -> Result<(), RemoteError>;

    /// Names of the entries in the current directory (NLST).
    fn list_names(&mut self) -> Result<Vec<String>, RemoteError>;

    /// Retrieve `name` in binary mode into `sink`, returning the byte count.
    fn retrieve(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64, RemoteError>;

    fn quit(&mut self) -> Result<(), RemoteError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FtpConnector;

impl Connector for FtpConnector {
    type Connection = FtpConnection;

    fn connect(&self, host: &str, port: u16) -> Result<FtpConnection, RemoteError> {
        let stream = ftp::FtpStream::connect((host, port))?;
        Ok(FtpConnection { stream })
    }
}

pub struct FtpConnection {
    stream: ftp::FtpStream,
}

impl RemoteConnection for FtpConnection {
    fn login(&mut self, user: &str, password: &str) -> Result<(), RemoteError> {
        self.stream.login(user, password)?;
        Ok(())
    }

    fn cwd(&mut self, directory: &str) -> Result<(), RemoteError> {
        self.stream.cwd(directory)?;
        Ok(())
    }

    fn list_names(&mut self) -> Result<Vec<String>, RemoteError> {
        Ok(self.stream.nlst(None)?)
    }

    fn retrieve(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.stream.transfer_type(ftp::types::FileType::Binary)?;
        // retr takes an Fn reader, so the sink is borrowed through a RefCell.
        let sink = RefCell::new(sink);
        let copied = self.stream.retr(name, |reader| {
            let mut sink = sink.borrow_mut();
            io::copy(reader, &mut **sink).map_err(ftp::types::FtpError::ConnectionError)
        })?;
        Ok(copied)
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        self.stream.quit()?;
        Ok(())
    }
}
