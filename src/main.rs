// Entrypoint for the CLI.
// - Parses arguments, resolves the kubeconfig path and hands off to the
//   flows in `ui`.
// - Returns `anyhow::Result` so failures print their cause chain to stderr
//   and exit non-zero.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};
use skectl::input::TerminalPrompt;
use skectl::ui::{self, LoginOptions};
use skectl::{kubeconfig, logging};

/// Log in to clusters and manage kubeconfig contexts.
#[derive(Debug, Parser)]
#[command(name = "skectl", author, version, about)]
struct Args {
    /// Path to the kubeconfig file [default: $KUBECONFIG or ~/.kube/config]
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,
    /// Print debug diagnostics to stderr
    #[arg(short, long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Log in to a server
    Login {
        /// Server URL, e.g. https://api.example.com:6443
        server: String,
        /// Username for authentication (prompted if omitted)
        #[arg(short, long)]
        username: Option<String>,
        /// Password for authentication (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
        /// Store this bearer token instead of authenticating
        #[arg(long, conflicts_with_all = ["username", "password"])]
        token: Option<String>,
        /// Skip TLS certificate verification
        #[arg(long)]
        insecure_skip_tls_verify: bool,
        /// Path of the authentication endpoint on the server
        #[arg(long, default_value = skectl::api::DEFAULT_AUTH_PATH)]
        auth_path: String,
        /// Request timeout in seconds
        #[arg(long, default_value_t = 10)]
        timeout: u64,
    },
    /// Switch to a different context (choose interactively if no name given)
    UseContext {
        /// Context name
        name: Option<String>,
    },
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.debug);

    let path = kubeconfig::resolve_path(args.kubeconfig.as_deref())
        .context("failed to locate kubeconfig")?;

    match args.command {
        Command::Login {
            server,
            username,
            password,
            token,
            insecure_skip_tls_verify,
            auth_path,
            timeout,
        } => {
            let options = LoginOptions {
                username,
                password,
                token,
                insecure_skip_tls_verify,
                auth_path,
                timeout: Duration::from_secs(timeout),
                ..LoginOptions::new(server, path)
            };
            let outcome = ui::login(&options, &mut TerminalPrompt).context("login failed")?;
            match outcome.username {
                Some(username) => println!("Logged into {:?} as {:?}.", outcome.server, username),
                None => println!("Logged into {:?} using the provided token.", outcome.server),
            }
        }
        Command::UseContext { name } => {
            let name = match name {
                Some(name) => name,
                None => ui::choose_context(&path)?,
            };
            ui::use_context(&path, &name)
                .with_context(|| format!("failed to switch to context {:?}", name))?;
            println!("Switched to context {:?}.", name);
        }
    }
    Ok(())
}
