// Command flows. `login` prompts for whatever credentials were not passed
// in, exchanges them for a token and records the server in the kubeconfig;
// `use_context` switches the current context. Both load the file first and
// only write it back once everything else succeeded, so a failed command
// leaves the file as it was.

use std::path::{Path, PathBuf};
use std::time::Duration;

use dialoguer::Select;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use crate::api::{AuthConfig, Authenticator, HttpAuthenticator, DEFAULT_AUTH_PATH, DEFAULT_TIMEOUT};
use crate::error::{Error, Result};
use crate::input::Prompt;
use crate::kubeconfig::KubeConfig;

/// Everything one `login` invocation needs.
#[derive(Clone, Debug)]
pub struct LoginOptions {
    pub server: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Store this token as-is instead of authenticating.
    pub token: Option<String>,
    pub insecure_skip_tls_verify: bool,
    pub auth_path: String,
    pub timeout: Duration,
    pub kubeconfig: PathBuf,
}

impl LoginOptions {
    pub fn new(server: impl Into<String>, kubeconfig: impl Into<PathBuf>) -> Self {
        LoginOptions {
            server: server.into(),
            username: None,
            password: None,
            token: None,
            insecure_skip_tls_verify: false,
            auth_path: DEFAULT_AUTH_PATH.to_string(),
            timeout: DEFAULT_TIMEOUT,
            kubeconfig: kubeconfig.into(),
        }
    }

    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            server: self.server.clone(),
            auth_path: self.auth_path.clone(),
            timeout: self.timeout,
            insecure_skip_verify: self.insecure_skip_tls_verify,
        }
    }
}

/// What a successful login recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginOutcome {
    /// Normalised server URL, also the cluster/user/context name.
    pub server: String,
    /// `None` when a token was supplied directly.
    pub username: Option<String>,
}

/// Log in over HTTP using the options' server and auth settings.
pub fn login<P: Prompt>(options: &LoginOptions, prompt: &mut P) -> Result<LoginOutcome> {
    let authenticator = HttpAuthenticator::new(options.auth_config())?;
    login_with(options, &authenticator, prompt)
}

/// Log in with any `Authenticator`. Entries are keyed by the
/// authenticator's canonical server URL.
pub fn login_with<A, P>(options: &LoginOptions, authenticator: &A, prompt: &mut P) -> Result<LoginOutcome>
where
    A: Authenticator,
    P: Prompt,
{
    let mut config = KubeConfig::load_or_default(&options.kubeconfig)?;
    let server = authenticator.server().to_string();

    let (token, username) = match &options.token {
        Some(token) if token.is_empty() => return Err(Error::EmptyToken),
        Some(token) => (token.clone(), None),
        None => {
            let username = match &options.username {
                Some(username) => username.clone(),
                None => prompt.read_line("Username: ")?,
            };
            if username.is_empty() {
                return Err(Error::EmptyCredentials);
            }
            let password = match &options.password {
                Some(password) => password.clone(),
                None => prompt.read_masked("Password: ")?,
            };
            if password.is_empty() {
                return Err(Error::EmptyCredentials);
            }

            let spinner = spinner(format!("Logging in to {}...", server));
            let token = authenticator.authenticate(&username, &password);
            spinner.finish_and_clear();
            (token?, Some(username))
        }
    };

    config.upsert_login(&server, &token, options.insecure_skip_tls_verify);
    config.save(&options.kubeconfig)?;
    info!(%server, "login recorded");
    Ok(LoginOutcome { server, username })
}

/// Make `name` the current context of the file at `path`.
pub fn use_context(path: &Path, name: &str) -> Result<()> {
    let mut config = KubeConfig::load_or_default(path)?;
    config.switch_context(name)?;
    for dangling in config.dangling_references() {
        warn!(
            context = %dangling.context,
            kind = dangling.kind,
            target = %dangling.target,
            "context refers to a missing entry"
        );
    }
    config.save(path)
}

/// Let the user pick one of the contexts in the file at `path`. The current
/// context is preselected; cancelling the menu counts as an interrupt.
pub fn choose_context(path: &Path) -> Result<String> {
    let config = KubeConfig::load_or_default(path)?;
    if config.contexts.is_empty() {
        return Err(Error::NoContexts {
            path: path.to_path_buf(),
        });
    }
    let names: Vec<&String> = config.contexts.keys().collect();
    let current = names
        .iter()
        .position(|name| **name == config.current_context)
        .unwrap_or(0);
    let selection = Select::new()
        .with_prompt("Select a context")
        .items(&names)
        .default(current)
        .interact_opt()
        .map_err(Error::Input)?;
    match selection {
        Some(index) => Ok(names[index].clone()),
        None => Err(Error::Interrupted),
    }
}

// Hidden automatically when stderr is not a terminal.
fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    // Ticks from indicatif's own thread while the request blocks this one.
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}
