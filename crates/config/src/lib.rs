//! Layered configuration.
//!
//! Sources, later ones winning:
//!
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, by extension): the one given
//!    explicitly, or `folio.toml` in the platform configuration directory if
//!    it exists,
//! 3. `FOLIO_`-prefixed environment variables, with `__` separating nested
//!    keys (`FOLIO_SERVER__BIND=0.0.0.0:8080`).

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

const ENV_PREFIX: &str = "FOLIO_";
const CONFIG_FILE: &str = "folio.toml";
const STORE_FILE: &str = "positions.json";

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub proxy: ProxyConfig,
    pub cache: CacheConfig,
    pub library: LibraryConfig,
    pub session: SessionConfig,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// Origin manifest hrefs are built from. Taken from each request's `Host`
    /// header when unset.
    pub public_origin: Option<String>,
    /// Directory served for everything the proxy does not claim.
    pub static_dir: Option<PathBuf>,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)), public_origin: None, static_dir: None }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// First path segment of the virtual namespace.
    pub prefix: String,
    /// Start intercepting as soon as the proxy is installed.
    pub skip_waiting: bool,
}
impl Default for ProxyConfig {
    fn default() -> Self {
        Self { prefix: "streamer".to_string(), skip_waiting: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum number of loaded archives kept. Unbounded when unset.
    pub capacity: Option<NonZeroUsize>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Absolute directory that relative locators resolve against.
    pub root: Option<PathBuf>,
    /// Whether `http(s)://` locators may be fetched.
    pub remote: bool,
}
impl Default for LibraryConfig {
    fn default() -> Self {
        Self { root: None, remote: true }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Where the reading position is persisted. Defaults to the platform
    /// data directory.
    pub store: Option<PathBuf>,
}

impl Config {
    /// Load from every source and validate.
    pub fn load(file: Option<&Path>) -> Result<Self> {
        Self::from_figment(Self::figment(file)?.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    /// Defaults plus the configuration file, without the environment.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let figment = Figment::from(Serialized::defaults(Config::default()));
        let file = match file {
            Some(file) if !file.is_file() => exn::bail!(ErrorKind::NotFound(file.display().to_string())),
            Some(file) => Some(file.to_path_buf()),
            None => default_file().filter(|file| file.is_file()),
        };
        let Some(file) = file else {
            return Ok(figment);
        };
        tracing::debug!(path = %file.display(), "Reading configuration file");
        let extension = file.extension().and_then(|extension| extension.to_str()).unwrap_or_default();
        Ok(match extension.to_ascii_lowercase().as_str() {
            "toml" => figment.merge(Toml::file_exact(&file)),
            "yaml" | "yml" => figment.merge(Yaml::file_exact(&file)),
            "json" => figment.merge(Json::file_exact(&file)),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(file.display().to_string())),
        })
    }

    pub fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment
            .extract()
            .map_err(|err| exn::Exn::from(ErrorKind::Parse(err.to_string())))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let prefix = &self.proxy.prefix;
        if prefix.is_empty() || prefix.contains('/') || prefix.contains('%') {
            exn::bail!(ErrorKind::Invalid {
                key: "proxy.prefix",
                reason: format!("must be a single non-empty path segment, got {prefix:?}"),
            });
        }
        if let Some(origin) = &self.server.public_origin
            && !(origin.starts_with("http://") || origin.starts_with("https://"))
        {
            exn::bail!(ErrorKind::Invalid {
                key: "server.public_origin",
                reason: format!("must be an http(s) origin, got {origin:?}"),
            });
        }
        if let Some(root) = &self.library.root
            && !root.is_absolute()
        {
            exn::bail!(ErrorKind::Invalid {
                key: "library.root",
                reason: format!("must be an absolute path, got {}", root.display()),
            });
        }
        if let Some(dir) = &self.server.static_dir
            && !dir.is_dir()
        {
            exn::bail!(ErrorKind::Invalid {
                key: "server.static_dir",
                reason: format!("not a directory: {}", dir.display()),
            });
        }
        Ok(())
    }

    /// The position store location, if one can be determined.
    pub fn store_path(&self) -> Option<PathBuf> {
        self.session
            .store
            .clone()
            .or_else(|| project_dirs().map(|dirs| dirs.data_dir().join(STORE_FILE)))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "folio")
}

/// `folio.toml` in the platform configuration directory.
pub fn default_file() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, contents: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_figment(Figment::from(Serialized::defaults(Config::default()))).unwrap();
        assert_eq!(config.server.bind.to_string(), "127.0.0.1:8080");
        assert_eq!(config.proxy.prefix, "streamer");
        assert!(config.proxy.skip_waiting);
        assert_eq!(config.cache.capacity, None);
        assert!(config.library.remote);
    }

    #[rstest]
    #[case("folio.toml", "[proxy]\nprefix = \"books\"\n[cache]\ncapacity = 4\n")]
    #[case("folio.yaml", "proxy:\n  prefix: books\ncache:\n  capacity: 4\n")]
    #[case("folio.json", r#"{"proxy": {"prefix": "books"}, "cache": {"capacity": 4}}"#)]
    fn test_file_formats(#[case] name: &str, #[case] contents: &str) {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, name, contents);
        let config = Config::from_figment(Config::figment(Some(&path)).unwrap()).unwrap();
        assert_eq!(config.proxy.prefix, "books");
        assert_eq!(config.cache.capacity, NonZeroUsize::new(4));
        // Untouched sections keep their defaults.
        assert!(config.proxy.skip_waiting);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_later_sources_win() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "folio.toml", "[server]\nbind = \"0.0.0.0:9000\"\n");
        let figment = Config::figment(Some(&path))
            .unwrap()
            .merge(Serialized::default("server.bind", "127.0.0.1:7000"));
        let config = Config::from_figment(figment).unwrap();
        assert_eq!(config.server.bind.port(), 7000);
    }

    #[test]
    fn test_missing_explicit_file() {
        let dir = TempDir::new().unwrap();
        let err = Config::figment(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[test]
    fn test_unsupported_format() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "folio.ini", "prefix=books");
        let err = Config::figment(Some(&path)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
    }

    #[test]
    fn test_type_errors() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "folio.toml", "[cache]\ncapacity = 0\n");
        let err = Config::from_figment(Config::figment(Some(&path)).unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Parse(_)));
    }

    #[rstest]
    #[case("proxy.prefix", "")]
    #[case("proxy.prefix", "a/b")]
    #[case("server.public_origin", "ftp://books")]
    #[case("library.root", "relative/books")]
    #[case("server.static_dir", "/definitely/not/here")]
    fn test_validation(#[case] key: &'static str, #[case] value: &str) {
        let figment = Figment::from(Serialized::defaults(Config::default())).merge(Serialized::default(key, value));
        let err = Config::from_figment(figment).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { key: invalid, .. } if *invalid == key));
    }

    #[test]
    fn test_store_path() {
        let mut config = Config::default();
        config.session.store = Some(PathBuf::from("/tmp/positions.json"));
        assert_eq!(config.store_path(), Some(PathBuf::from("/tmp/positions.json")));
    }
}
