use log::{error, info, warn};

use crate::remote::{Connector, Endpoint, RemoteConnection};

/// Connect and log in on a throwaway connection to check the server and the
/// credentials before anything is scheduled.
///
/// Login is only attempted after a successful connect. On success the
/// session is closed again; nothing is kept for later runs.
pub fn check_reachability<C: Connector>(connector: &C, endpoint: &Endpoint) -> bool {
    let mut connection = match connector.connect(&endpoint.host, endpoint.port) {
        Ok(connection) => {
            info!("FTP server {}:{} is reachable", endpoint.host, endpoint.port);
            connection
        }
        Err(e) => {
            error!("Connection error: {}", e);
            return false;
        }
    };

    if let Err(e) = connection.login(&endpoint.user, &endpoint.password) {
        error!("Login error: {}", e);
        return false;
    }
    info!("Valid username and password for {}", endpoint.user);

    if let Err(e) = connection.quit() {
        warn!("Closing the reachability check session failed: {}", e);
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutils::MockServer;

    fn endpoint() -> Endpoint {
        Endpoint {
            host: "ftp.example.com".to_string(),
            port: 21,
            user: "partner".to_string(),
            password: "s3cret".to_string(),
            directory: "/outgoing".to_string(),
        }
    }

    #[test]
    fn connect_failure_skips_login() {
        let server = MockServer { refuse_connect: true, ..Default::default() };
        assert!(!check_reachability(&server, &endpoint()));
        assert_eq!(server.calls(), vec!["connect ftp.example.com:21"]);
    }

    #[test]
    fn login_failure_is_unreachable() {
        let server = MockServer { refuse_login: true, ..Default::default() };
        assert!(!check_reachability(&server, &endpoint()));
        assert_eq!(server.calls(), vec!["connect ftp.example.com:21", "login partner"]);
    }

    #[test]
    fn success_closes_the_session() {
        let server = MockServer::default();
        assert!(check_reachability(&server, &endpoint()));
        assert_eq!(
            server.calls(),
            vec!["connect ftp.example.com:21", "login partner", "quit"]
        );
    }
}
