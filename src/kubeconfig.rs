// Multi-cluster configuration store in the kubeconfig format.
//
// In memory the clusters, users and contexts are maps keyed by name; on disk
// they are the conventional lists of `{name, <kind>: {...}}` entries so the
// file stays readable by kubectl and friends. Fields this tool does not know
// about are carried through load/save untouched.
//
// There is no locking: two processes writing the same file race and the last
// rename wins.

use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_yaml::Value;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Environment variable overriding the config file location.
pub const KUBECONFIG_ENV: &str = "KUBECONFIG";

type Extra = BTreeMap<String, Value>;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Cluster {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub server: String,
    #[serde(
        rename = "insecure-skip-tls-verify",
        default,
        skip_serializing_if = "is_false"
    )]
    pub insecure_skip_tls_verify: bool,
    #[serde(flatten)]
    pub extra: Extra,
}

/// Credentials of a kubeconfig `user` entry.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub token: String,
    #[serde(flatten)]
    pub extra: Extra,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cluster: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(flatten)]
    pub extra: Extra,
}

/// A context whose cluster or user reference points at a missing entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DanglingReference {
    pub context: String,
    pub kind: &'static str,
    pub target: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawKubeConfig", into = "RawKubeConfig")]
pub struct KubeConfig {
    pub clusters: BTreeMap<String, Cluster>,
    pub users: BTreeMap<String, AuthInfo>,
    pub contexts: BTreeMap<String, Context>,
    pub current_context: String,
    api_version: String,
    kind: String,
    extra: Extra,
}

impl Default for KubeConfig {
    fn default() -> Self {
        KubeConfig {
            clusters: BTreeMap::new(),
            users: BTreeMap::new(),
            contexts: BTreeMap::new(),
            current_context: String::new(),
            api_version: "v1".to_string(),
            kind: "Config".to_string(),
            extra: Extra::new(),
        }
    }
}

impl KubeConfig {
    /// Parse the file at `path`. A missing file is an `Io` error here; use
    /// `load_or_default` where absence means "start empty".
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::io("read", path, source))?;
        Self::parse(&text).map_err(|source| Error::ConfigParse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load_or_default(path: &Path) -> Result<Self> {
        match Self::load(path) {
            Err(Error::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "kubeconfig not found, starting empty");
                Ok(KubeConfig::default())
            }
            other => other,
        }
    }

    pub fn parse(text: &str) -> std::result::Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(KubeConfig::default());
        }
        serde_yaml::from_str(text)
    }

    /// Write the config to `path`, creating parent directories as needed.
    /// The content goes to a temporary file next to the target which is then
    /// renamed over it, so readers never observe a partial file. A symlinked
    /// `path` is followed so the link survives, and an existing file keeps
    /// its permissions.
    pub fn save(&self, path: &Path) -> Result<()> {
        let target = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir).map_err(|source| Error::io("create directory", dir, source))?;

        let yaml = serde_yaml::to_string(self).map_err(Error::ConfigSerialize)?;
        let mut file =
            NamedTempFile::new_in(dir).map_err(|source| Error::io("create temporary file in", dir, source))?;
        if let Ok(metadata) = fs::metadata(&target) {
            file.as_file()
                .set_permissions(metadata.permissions())
                .map_err(|source| Error::io("set permissions on", file.path().to_path_buf(), source))?;
        }
        file.write_all(yaml.as_bytes())
            .and_then(|_| file.as_file().sync_all())
            .map_err(|source| Error::io("write", file.path().to_path_buf(), source))?;
        file.persist(&target)
            .map_err(|err| Error::io("write", &target, err.error))?;
        info!(path = %target.display(), "kubeconfig saved");
        Ok(())
    }

    /// Make `name` the current context. Nothing changes if it is unknown.
    pub fn switch_context(&mut self, name: &str) -> Result<()> {
        if !self.contexts.contains_key(name) {
            return Err(Error::ContextNotFound(name.to_string()));
        }
        self.current_context = name.to_string();
        Ok(())
    }

    /// Insert or overwrite the cluster, user and context named after
    /// `server` and make that context current. Other entries are untouched.
    pub fn upsert_login(&mut self, server: &str, token: &str, insecure_skip_tls_verify: bool) {
        self.clusters.insert(
            server.to_string(),
            Cluster {
                server: server.to_string(),
                insecure_skip_tls_verify,
                extra: Extra::new(),
            },
        );
        self.users.insert(
            server.to_string(),
            AuthInfo {
                token: token.to_string(),
                extra: Extra::new(),
            },
        );
        self.contexts.insert(
            server.to_string(),
            Context {
                cluster: server.to_string(),
                user: server.to_string(),
                extra: Extra::new(),
            },
        );
        self.current_context = server.to_string();
    }

    pub fn current(&self) -> Option<(&str, &Context)> {
        self.contexts
            .get_key_value(&self.current_context)
            .map(|(name, context)| (name.as_str(), context))
    }

    /// References that break the cross-map integrity: a current context that
    /// does not exist, or contexts naming a missing cluster or user. Unset
    /// references are not reported.
    pub fn dangling_references(&self) -> Vec<DanglingReference> {
        let mut dangling = Vec::new();
        if !self.current_context.is_empty() && !self.contexts.contains_key(&self.current_context) {
            dangling.push(DanglingReference {
                context: self.current_context.clone(),
                kind: "context",
                target: self.current_context.clone(),
            });
        }
        for (name, context) in &self.contexts {
            if !context.cluster.is_empty() && !self.clusters.contains_key(&context.cluster) {
                dangling.push(DanglingReference {
                    context: name.clone(),
                    kind: "cluster",
                    target: context.cluster.clone(),
                });
            }
            if !context.user.is_empty() && !self.users.contains_key(&context.user) {
                dangling.push(DanglingReference {
                    context: name.clone(),
                    kind: "user",
                    target: context.user.clone(),
                });
            }
        }
        dangling
    }
}

/// Config path to use: `explicit` if given, else the `KUBECONFIG` override,
/// else `~/.kube/config`.
pub fn resolve_path(explicit: Option<&Path>) -> Result<PathBuf> {
    resolve_path_from(explicit, env::var_os(KUBECONFIG_ENV), dirs::home_dir())
}

/// `resolve_path` with the environment and home directory passed in. The
/// override may be a path list; its first non-empty entry is used.
pub fn resolve_path_from(
    explicit: Option<&Path>,
    env_override: Option<OsString>,
    home: Option<PathBuf>,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Some(value) = env_override {
        if let Some(first) = env::split_paths(&value).find(|p| !p.as_os_str().is_empty()) {
            return Ok(first);
        }
    }
    home.map(|home| home.join(".kube").join("config"))
        .ok_or(Error::HomeDirUnavailable)
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_kind() -> String {
    "Config".to_string()
}

// On-disk layout.

#[derive(Serialize, Deserialize)]
struct NamedCluster {
    name: String,
    cluster: Cluster,
}

#[derive(Serialize, Deserialize)]
struct NamedAuthInfo {
    name: String,
    user: AuthInfo,
}

#[derive(Serialize, Deserialize)]
struct NamedContext {
    name: String,
    context: Context,
}

#[derive(Serialize, Deserialize)]
struct RawKubeConfig {
    #[serde(rename = "apiVersion", default = "default_api_version")]
    api_version: String,
    #[serde(default = "default_kind")]
    kind: String,
    #[serde(default, deserialize_with = "nullable")]
    clusters: Vec<NamedCluster>,
    #[serde(default, deserialize_with = "nullable")]
    users: Vec<NamedAuthInfo>,
    #[serde(default, deserialize_with = "nullable")]
    contexts: Vec<NamedContext>,
    #[serde(rename = "current-context", default, deserialize_with = "nullable")]
    current_context: String,
    #[serde(flatten)]
    extra: Extra,
}

impl From<RawKubeConfig> for KubeConfig {
    fn from(raw: RawKubeConfig) -> Self {
        KubeConfig {
            clusters: raw.clusters.into_iter().map(|c| (c.name, c.cluster)).collect(),
            users: raw.users.into_iter().map(|u| (u.name, u.user)).collect(),
            contexts: raw.contexts.into_iter().map(|c| (c.name, c.context)).collect(),
            current_context: raw.current_context,
            api_version: raw.api_version,
            kind: raw.kind,
            extra: raw.extra,
        }
    }
}

impl From<KubeConfig> for RawKubeConfig {
    fn from(config: KubeConfig) -> Self {
        RawKubeConfig {
            api_version: config.api_version,
            kind: config.kind,
            clusters: config
                .clusters
                .into_iter()
                .map(|(name, cluster)| NamedCluster { name, cluster })
                .collect(),
            users: config
                .users
                .into_iter()
                .map(|(name, user)| NamedAuthInfo { name, user })
                .collect(),
            contexts: config
                .contexts
                .into_iter()
                .map(|(name, context)| NamedContext { name, context })
                .collect(),
            current_context: config.current_context,
            extra: config.extra,
        }
    }
}
