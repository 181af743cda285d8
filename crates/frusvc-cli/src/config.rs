//! Daemon configuration – reads `~/.frusvc/config.toml` (or `--config`).

use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::{Path, PathBuf};

use frusvc_description::{DEFAULT_MAX_DEPTH, DEFAULT_MAX_NODES, DescriptionLimits};
use frusvc_service::DEFAULT_PORT;
use serde::{Deserialize, Serialize};

/// A discovery document attached once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapEntry {
    /// Existing object the document is attached beneath.
    pub parent_path: String,
    /// Document file; relative paths resolve against the config file's
    /// directory.
    pub file: PathBuf,
}

/// Persisted daemon configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Address the call endpoint binds to.
    #[serde(default = "default_bind_address")]
    pub bind_address: IpAddr,

    /// TCP port of the call endpoint.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Root objects created before any call is served.
    #[serde(default = "default_roots")]
    pub roots: Vec<String>,

    #[serde(default = "default_max_depth")]
    pub max_description_depth: usize,

    #[serde(default = "default_max_nodes")]
    pub max_description_nodes: usize,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bootstrap: Vec<BootstrapEntry>,
}

fn default_bind_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::LOCALHOST)
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_roots() -> Vec<String> {
    vec!["/system".to_string()]
}
fn default_max_depth() -> usize {
    DEFAULT_MAX_DEPTH
}
fn default_max_nodes() -> usize {
    DEFAULT_MAX_NODES
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            roots: default_roots(),
            max_description_depth: default_max_depth(),
            max_description_nodes: default_max_nodes(),
            bootstrap: Vec::new(),
        }
    }
}

impl Config {
    pub fn limits(&self) -> DescriptionLimits {
        DescriptionLimits {
            max_depth: self.max_description_depth,
            max_nodes: self.max_description_nodes,
        }
    }
}

/// Where the configuration came from.
#[derive(Debug)]
pub struct Loaded {
    pub config: Config,
    /// File that was read, if any.
    pub source: Option<PathBuf>,
}

impl Loaded {
    /// Directory relative bootstrap paths resolve against.
    pub fn base_dir(&self) -> PathBuf {
        self.source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Return the path to `~/.frusvc/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".frusvc").join("config.toml")
}

/// Load the configuration and apply `FRUSVC_*` overrides.
///
/// An explicit path must exist; the default path may be absent, in which
/// case the defaults are used.
pub fn load(explicit: Option<&Path>) -> Result<Loaded, String> {
    let (path, required) = match explicit {
        Some(p) => (p.to_path_buf(), true),
        None => (config_path(), false),
    };

    let mut loaded = match load_from(&path)? {
        Some(config) => Loaded {
            config,
            source: Some(path),
        },
        None if required => {
            return Err(format!("Config file {} does not exist", path.display()));
        }
        None => Loaded {
            config: Config::default(),
            source: None,
        },
    };
    apply_env_overrides(&mut loaded.config, |key| std::env::var(key).ok());
    Ok(loaded)
}

/// Read a config file. Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<Config>, String> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config at {}: {}", path.display(), e))?;
    let cfg: Config = toml::from_str(&raw)
        .map_err(|e| format!("Failed to parse config at {}: {}", path.display(), e))?;
    Ok(Some(cfg))
}

/// Apply environment overrides, looked up through `var`.
///
/// | Variable | Config field |
/// |---|---|
/// | `FRUSVC_BIND_ADDRESS` | `bind_address` |
/// | `FRUSVC_PORT` | `port` |
/// | `FRUSVC_ROOTS` | `roots` (comma-separated) |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut Config, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("FRUSVC_BIND_ADDRESS")
        && let Ok(addr) = v.trim().parse::<IpAddr>()
    {
        cfg.bind_address = addr;
    }
    if let Some(v) = var("FRUSVC_PORT")
        && let Ok(port) = v.trim().parse::<u16>()
    {
        cfg.port = port;
    }
    if let Some(v) = var("FRUSVC_ROOTS") {
        let roots: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(String::from)
            .collect();
        if !roots.is_empty() {
            cfg.roots = roots;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_service_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.port, 9100);
        assert_eq!(cfg.bind_address, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(cfg.roots, vec!["/system"]);
        assert_eq!(cfg.limits(), DescriptionLimits::default());
        assert!(cfg.bootstrap.is_empty());
    }

    #[test]
    fn config_path_points_to_frusvc_dir() {
        let p = config_path_for_home("/home/operator");
        assert!(p.to_string_lossy().contains(".frusvc"));
        assert!(p.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn load_from_returns_none_when_missing() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = config_path_for_home(&dir.path().to_string_lossy());
        assert!(load_from(&path).expect("no error").is_none());
    }

    #[test]
    fn load_from_fills_missing_fields_with_defaults() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
port = 9200
roots = ["/system", "/chassis"]

[[bootstrap]]
parent_path = "/system"
file = "board.json"
"#,
        )
        .unwrap();

        let cfg = load_from(&path).expect("load ok").expect("some");
        assert_eq!(cfg.port, 9200);
        assert_eq!(cfg.roots, vec!["/system", "/chassis"]);
        assert_eq!(cfg.max_description_depth, DEFAULT_MAX_DEPTH);
        assert_eq!(cfg.bootstrap.len(), 1);
        assert_eq!(cfg.bootstrap[0].file, PathBuf::from("board.json"));
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("config.toml");
        fs::write(&path, "port = \"not a number\"").unwrap();
        let err = load_from(&path).unwrap_err();
        assert!(err.contains("Failed to parse config"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let missing = dir.path().join("nope.toml");
        assert!(load(Some(&missing)).is_err());
    }

    #[test]
    fn base_dir_follows_source_file() {
        let loaded = Loaded {
            config: Config::default(),
            source: Some(PathBuf::from("/etc/frusvc/config.toml")),
        };
        assert_eq!(loaded.base_dir(), PathBuf::from("/etc/frusvc"));

        let loaded = Loaded {
            config: Config::default(),
            source: None,
        };
        assert_eq!(loaded.base_dir(), PathBuf::from("."));
    }

    #[test]
    fn env_overrides_replace_fields() {
        let mut cfg = Config::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("FRUSVC_BIND_ADDRESS", "0.0.0.0"),
                ("FRUSVC_PORT", "9300"),
                ("FRUSVC_ROOTS", "/system, /chassis ,"),
            ]),
        );
        assert_eq!(cfg.bind_address, IpAddr::V4(Ipv4Addr::UNSPECIFIED));
        assert_eq!(cfg.port, 9300);
        assert_eq!(cfg.roots, vec!["/system", "/chassis"]);
    }

    #[test]
    fn env_overrides_ignore_unparsable_values() {
        let mut cfg = Config::default();
        apply_env_overrides(
            &mut cfg,
            env(&[
                ("FRUSVC_BIND_ADDRESS", "not-an-ip"),
                ("FRUSVC_PORT", "not-a-port"),
                ("FRUSVC_ROOTS", " , "),
            ]),
        );
        assert_eq!(cfg, Config::default());
    }
}
