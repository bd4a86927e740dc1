//! Scripted in-memory FTP server for exercising the session and the prober.

use std::cell::RefCell;
use std::collections::{BTreeMap, BTreeSet};
use std::io::Write;
use std::rc::Rc;

use crate::error::RemoteError;
use crate::remote::{Connector, RemoteConnection};

/// Every call the connections made, in order, e.g. `"login partner"`.
pub type CallLog = Rc<RefCell<Vec<String>>>;

#[derive(Default)]
pub struct MockServer {
    pub refuse_connect: bool,
    pub refuse_login: bool,
    pub missing_directory: bool,
    pub files: BTreeMap<String, Vec<u8>>,
    /// Names that appear in NLST but fail on RETR.
    pub broken: BTreeSet<String>,
    /// Bytes written to the sink before a broken retrieval fails.
    pub partial_bytes: Vec<u8>,
    pub calls: CallLog,
}

impl MockServer {
    pub fn with_files(files: &[(&str, &[u8])]) -> Self {
        MockServer {
            files: files
                .iter()
                .map(|(name, data)| (name.to_string(), data.to_vec()))
                .collect(),
            ..Default::default()
        }
    }

    pub fn break_file(mut self, name: &str) -> Self {
        self.broken.insert(name.to_string());
        self.files.entry(name.to_string()).or_default();
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.borrow().clone()
    }
}

pub struct MockConnection {
    files: BTreeMap<String, Vec<u8>>,
    broken: BTreeSet<String>,
    partial_bytes: Vec<u8>,
    refuse_login: bool,
    missing_directory: bool,
    calls: CallLog,
}

impl MockConnection {
    fn record(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl Connector for MockServer {
    type Connection = MockConnection;

    fn connect(&self, host: &str, port: u16) -> Result<MockConnection, RemoteError> {
        self.calls.borrow_mut().push(format!("connect {host}:{port}"));
        if self.refuse_connect {
            return Err(RemoteError("Connection refused (os error 111)".to_string()));
        }
        Ok(MockConnection {
            files: self.files.clone(),
            broken: self.broken.clone(),
            partial_bytes: self.partial_bytes.clone(),
            refuse_login: self.refuse_login,
            missing_directory: self.missing_directory,
            calls: self.calls.clone(),
        })
    }
}

impl RemoteConnection for MockConnection {
    fn login(&mut self, user: &str, _password: &str) -> Result<(), RemoteError> {
        self.record(format!("login {user}"));
        if self.refuse_login {
            return Err(RemoteError("530 Login incorrect.".to_string()));
        }
        Ok(())
    }

    fn cwd(&mut self, directory: &str) -> Result<(), RemoteError> {
        self.record(format!("cwd {directory}"));
        if self.missing_directory {
            return Err(RemoteError("550 No such file or directory.".to_string()));
        }
        Ok(())
    }

    fn list_names(&mut self) -> Result<Vec<String>, RemoteError> {
        self.record("nlst".to_string());
        Ok(self.files.keys().cloned().collect())
    }

    fn retrieve(&mut self, name: &str, sink: &mut dyn Write) -> Result<u64, RemoteError> {
        self.record(format!("retr {name}"));
        if self.broken.contains(name) {
            sink.write_all(&self.partial_bytes)?;
            return Err(RemoteError("426 Connection closed; transfer aborted.".to_string()));
        }
        let data = self
            .files
            .get(name)
            .ok_or_else(|| RemoteError(format!("550 {name}: No such file.")))?;
        sink.write_all(data)?;
        Ok(data.len() as u64)
    }

    fn quit(&mut self) -> Result<(), RemoteError> {
        self.record("quit".to_string());
        Ok(())
    }
}
