// Library root
// -----------
// The `skectl` binary (`main.rs`) is a thin argument parser over these
// modules.
//
// Module responsibilities:
// - `api`: exchanges a username/password for a bearer token over HTTP.
// - `input`: echoing and masked terminal line readers.
// - `kubeconfig`: the multi-cluster config file (load, save, upsert,
//   context switch, path resolution).
// - `ui`: the `login` and `use-context` flows tying the above together.
// - `error`: the error type shared by all of them.
// - `logging`: tracing subscriber setup for the binary.
pub mod api;
pub mod error;
pub mod input;
pub mod kubeconfig;
pub mod logging;
pub mod ui;

pub use error::{Error, Result};
