// Authentication client: exchanges a username/password pair for a bearer
// token against the cluster's auth endpoint. It is a small blocking client,
// one request per call and no retries.

use std::fmt;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

pub const DEFAULT_AUTH_PATH: &str = "/auth";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Settings for one authenticator. `server` is the only required field;
/// everything else has a usable default.
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub server: String,
    pub auth_path: String,
    pub timeout: Duration,
    pub insecure_skip_verify: bool,
}

impl AuthConfig {
    pub fn new(server: impl Into<String>) -> Self {
        AuthConfig {
            server: server.into(),
            ..AuthConfig::default()
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            server: String::new(),
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            insecure_skip_verify: false,
        }
    }
}

/// Request body of the auth endpoint.
#[derive(Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

impl Credentials<'_> {
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

impl fmt::Debug for Credentials<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Response body of the auth endpoint. Both fields are optional on the wire:
/// failures usually only carry `error`, successes only `token`.
#[derive(Deserialize, Debug, Default)]
pub struct AuthResponse {
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub error: Option<String>,
}

/// Anything able to turn credentials into a token for a given server.
pub trait Authenticator {
    /// Canonical base URL of the server this authenticator talks to.
    fn server(&self) -> &str;

    fn authenticate(&self, username: &str, password: &str) -> Result<String>;
}

/// `Authenticator` speaking the JSON-over-HTTP POST protocol.
#[derive(Clone, Debug)]
pub struct HttpAuthenticator {
    client: Client,
    server: String,
    auth_path: String,
}

impl HttpAuthenticator {
    /// Validate and normalise the configuration and build the HTTP client.
    /// The server URL is canonicalised here once so every request is built
    /// from the same base.
    pub fn new(config: AuthConfig) -> Result<Self> {
        let server = normalize_server(&config.server)?;
        let auth_path = normalize_auth_path(&config.auth_path);
        let client = Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .build()
            .map_err(Error::Network)?;
        Ok(HttpAuthenticator {
            client,
            server,
            auth_path,
        })
    }

    pub fn auth_url(&self) -> String {
        format!("{}{}", self.server, self.auth_path)
    }
}

impl Authenticator for HttpAuthenticator {
    fn server(&self) -> &str {
        &self.server
    }

    fn authenticate(&self, username: &str, password: &str) -> Result<String> {
        let credentials = Credentials { username, password };
        if !credentials.is_complete() {
            return Err(Error::EmptyCredentials);
        }

        let url = self.auth_url();
        debug!(%url, username, "sending authentication request");
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(&credentials)
            .send()
            .map_err(Error::Network)?;

        // Reading the whole body drains the connection before it is dropped,
        // which keeps it reusable by the pool.
        let status = response.status();
        let body = response.bytes().map_err(Error::Network)?;
        debug!(status = status.as_u16(), bytes = body.len(), "received authentication response");
        let decoded = serde_json::from_slice::<AuthResponse>(&body);

        if status != StatusCode::OK {
            let message = decoded
                .ok()
                .and_then(|resp| resp.error)
                .filter(|message| !message.is_empty());
            return Err(match message {
                Some(message) => Error::AuthRejected {
                    status: status.as_u16(),
                    message,
                },
                None => Error::AuthFailed {
                    status: status.as_u16(),
                },
            });
        }

        let decoded = decoded.map_err(Error::InvalidResponse)?;
        if decoded.token.is_empty() {
            return Err(Error::EmptyToken);
        }
        Ok(decoded.token)
    }
}

/// Give the server an explicit scheme (https unless one is present) and
/// strip trailing slashes.
pub fn normalize_server(server: &str) -> Result<String> {
    let server = server.trim();
    if server.is_empty() {
        return Err(Error::MissingServer);
    }
    let candidate = if server.contains("://") {
        server.to_string()
    } else {
        format!("https://{}", server)
    };
    let url = Url::parse(&candidate).map_err(|err| Error::InvalidServer {
        url: server.to_string(),
        reason: err.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidServer {
            url: server.to_string(),
            reason: format!("unsupported scheme {:?}", url.scheme()),
        });
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

/// Exactly one leading slash; an empty path falls back to the default.
pub fn normalize_auth_path(path: &str) -> String {
    let path = path.trim();
    if path.is_empty() {
        return DEFAULT_AUTH_PATH.to_string();
    }
    format!("/{}", path.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::mpsc;
    use std::thread;

    use tiny_http::{Response, Server, StatusCode as StubStatus};

    struct Recorded {
        method: String,
        url: String,
        content_type: Option<String>,
        accept: Option<String>,
        body: String,
    }

    /// Serve a single canned response and report what was received.
    fn stub(status: u16, body: &'static str) -> (String, mpsc::Receiver<Recorded>) {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            if let Ok(mut request) = server.recv() {
                let header = |name: &str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.as_str().as_str().eq_ignore_ascii_case(name))
                        .map(|h| h.value.as_str().to_string())
                };
                let content_type = header("Content-Type");
                let accept = header("Accept");
                let mut received = String::new();
                request.as_reader().read_to_string(&mut received).unwrap();
                let _ = tx.send(Recorded {
                    method: request.method().to_string(),
                    url: request.url().to_string(),
                    content_type,
                    accept,
                    body: received,
                });
                let response = Response::from_string(body).with_status_code(StubStatus(status));
                let _ = request.respond(response);
            }
        });
        (format!("http://{}", addr), rx)
    }

    fn authenticator(server: &str) -> HttpAuthenticator {
        let mut config = AuthConfig::new(server);
        config.timeout = Duration::from_secs(5);
        HttpAuthenticator::new(config).unwrap()
    }

    #[test]
    fn defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.auth_path, "/auth");
        assert_eq!(config.timeout, Duration::from_secs(10));
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn server_is_required() {
        let err = HttpAuthenticator::new(AuthConfig::default()).unwrap_err();
        assert!(matches!(err, Error::MissingServer));
        assert_eq!(err.to_string(), "server URL is required");
    }

    #[test]
    fn unparsable_server_is_rejected() {
        let err = HttpAuthenticator::new(AuthConfig::new("://invalid-url")).unwrap_err();
        assert!(matches!(err, Error::InvalidServer { .. }));
        assert!(err.to_string().contains("invalid server URL"));

        let err = normalize_server("ftp://files.example.com").unwrap_err();
        assert!(err.to_string().contains("unsupported scheme"));
    }

    #[test]
    fn server_gets_scheme_and_loses_trailing_slash() {
        assert_eq!(
            normalize_server("api.example.com:6443").unwrap(),
            "https://api.example.com:6443"
        );
        assert_eq!(
            normalize_server("https://api.example.com/").unwrap(),
            "https://api.example.com"
        );
        assert_eq!(
            normalize_server("http://10.0.0.1:8080/base/").unwrap(),
            "http://10.0.0.1:8080/base"
        );
    }

    #[test]
    fn auth_url_never_has_double_slashes() {
        let cases = [
            ("https://api.example.com", "/auth"),
            ("https://api.example.com/", "/auth"),
            ("https://api.example.com/", "auth"),
            ("https://api.example.com//", "//auth"),
        ];
        for (server, path) in cases {
            let mut config = AuthConfig::new(server);
            config.auth_path = path.to_string();
            let auth = HttpAuthenticator::new(config).unwrap();
            assert_eq!(auth.auth_url(), "https://api.example.com/auth", "{} + {}", server, path);
        }

        let mut config = AuthConfig::new("https://api.example.com");
        config.auth_path = String::new();
        assert_eq!(
            HttpAuthenticator::new(config).unwrap().auth_url(),
            "https://api.example.com/auth"
        );
    }

    #[test]
    fn empty_credentials_fail_before_any_request() {
        let (server, requests) = stub(200, r#"{"token":"never"}"#);
        let auth = authenticator(&server);

        for (username, password) in [("", "pw"), ("admin", ""), ("", "")] {
            let err = auth.authenticate(username, password).unwrap_err();
            assert!(matches!(err, Error::EmptyCredentials));
        }
        assert!(requests.try_recv().is_err());
    }

    #[test]
    fn successful_authentication_returns_token() {
        let (server, requests) = stub(200, r#"{"token":"abc"}"#);
        let token = authenticator(&server).authenticate("admin", "pw").unwrap();
        assert_eq!(token, "abc");

        let recorded = requests.recv().unwrap();
        assert_eq!(recorded.method, "POST");
        assert_eq!(recorded.url, "/auth");
        assert_eq!(recorded.content_type.as_deref(), Some("application/json"));
        assert_eq!(recorded.accept.as_deref(), Some("application/json"));
        let body: serde_json::Value = serde_json::from_str(&recorded.body).unwrap();
        assert_eq!(body, serde_json::json!({"username": "admin", "password": "pw"}));
    }

    #[test]
    fn empty_token_is_rejected() {
        let (server, _requests) = stub(200, r#"{"token":""}"#);
        let err = authenticator(&server).authenticate("admin", "pw").unwrap_err();
        assert!(matches!(err, Error::EmptyToken));
    }

    #[test]
    fn server_error_reports_status_code() {
        let (server, _requests) = stub(500, "");
        let err = authenticator(&server).authenticate("admin", "pw").unwrap_err();
        assert!(matches!(err, Error::AuthFailed { status: 500 }));
        assert!(err.to_string().contains("500"));
    }

    #[test]
    fn server_error_message_is_surfaced() {
        let (server, _requests) = stub(404, r#"{"error":"bad creds"}"#);
        let err = authenticator(&server).authenticate("admin", "pw").unwrap_err();
        assert!(matches!(err, Error::AuthRejected { status: 404, .. }));
        assert!(err.to_string().contains("bad creds"));
    }

    #[test]
    fn undecodable_success_body_is_a_decode_error() {
        let (server, _requests) = stub(200, "<html>not json</html>");
        let err = authenticator(&server).authenticate("admin", "pw").unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
    }

    #[test]
    fn custom_auth_path_is_used() {
        let (server, requests) = stub(200, r#"{"token":"abc"}"#);
        let mut config = AuthConfig::new(format!("{}/", server));
        config.auth_path = "oauth/token".to_string();
        HttpAuthenticator::new(config)
            .unwrap()
            .authenticate("admin", "pw")
            .unwrap();
        assert_eq!(requests.recv().unwrap().url, "/oauth/token");
    }

    #[test]
    fn timeout_surfaces_as_network_error() {
        let server = Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_ip().unwrap();
        thread::spawn(move || {
            // Hold the request without answering.
            if let Ok(request) = server.recv() {
                thread::sleep(Duration::from_secs(3));
                drop(request);
            }
        });

        let mut config = AuthConfig::new(format!("http://{}", addr));
        config.timeout = Duration::from_millis(200);
        let err = HttpAuthenticator::new(config)
            .unwrap()
            .authenticate("admin", "pw")
            .unwrap_err();
        assert!(matches!(err, Error::Network(_)));
    }

    #[test]
    fn credentials_debug_hides_password() {
        let credentials = Credentials {
            username: "admin",
            password: "hunter2",
        };
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("admin"));
        assert!(!printed.contains("hunter2"));
    }
}
