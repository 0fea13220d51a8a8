pub mod env;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::Context;

pub use self::env::EnvSource;

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8000";

/// Configuration for the model registry, read from environment variables.
///
/// Nested settings use a `__` delimiter, e.g. `MODELS_REPOSITORY__SOURCE`.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Application version label. Controlled by `VERSION` (required).
    pub version: String,
    /// Deployment environment label. Controlled by `ENVIRONMENT` (required).
    pub environment: String,
    pub models_repository: ModelsRepositoryConfig,
    /// Controlled by `LISTEN_ADDR` (default: `0.0.0.0:8000`).
    pub listen_addr: SocketAddr,
}

/// Which backend stores the models, selected by `MODELS_REPOSITORY__SOURCE`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelsRepositoryConfig {
    /// `fs`: one file per model in `MODELS_REPOSITORY__DIRECTORY`.
    FileSystem { directory: PathBuf },
    /// `mongo`: one document per model, one collection per model name.
    Mongo(MongoConfig),
}

#[derive(Clone, PartialEq, Eq)]
pub struct MongoConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database_name: String,
}

impl std::fmt::Debug for MongoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MongoConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("database_name", &self.database_name)
            .finish_non_exhaustive()
    }
}

impl RegistryConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, String> {
        Self::from_source(&EnvSource::process())
    }

    /// Read configuration from the process environment, using `path` for
    /// anything the environment does not set.
    pub fn from_env_file(path: &Path) -> Result<Self, String> {
        Self::from_source(&EnvSource::with_file(path)?)
    }

    pub fn from_source(src: &EnvSource) -> Result<Self, String> {
        Ok(Self {
            version: src.require("VERSION")?,
            environment: src.require("ENVIRONMENT")?,
            models_repository: ModelsRepositoryConfig::from_source(src)?,
            listen_addr: src.parse_or(
                "LISTEN_ADDR",
                DEFAULT_LISTEN_ADDR
                    .parse::<SocketAddr>()
                    .map_err(|e| format!("invalid default listen address: {e}"))?,
            )?,
        })
    }
}

impl ModelsRepositoryConfig {
    pub fn from_source(src: &EnvSource) -> Result<Self, String> {
        let source = src.require("MODELS_REPOSITORY__SOURCE")?;
        match source.as_str() {
            "fs" => Ok(Self::FileSystem {
                directory: PathBuf::from(src.require("MODELS_REPOSITORY__DIRECTORY")?),
            }),
            "mongo" => Ok(Self::Mongo(MongoConfig {
                host: src.require("MODELS_REPOSITORY__HOST")?,
                port: src.require_port("MODELS_REPOSITORY__PORT")?,
                username: src.require("MODELS_REPOSITORY__USERNAME")?,
                password: src.require("MODELS_REPOSITORY__PASSWORD")?,
                database_name: src.require("MODELS_REPOSITORY__DATABASE_NAME")?,
            })),
            other => Err(format!(
                "unknown MODELS_REPOSITORY__SOURCE '{other}' (expected 'fs' or 'mongo')"
            )),
        }
    }

    /// The selector value this configuration was read from.
    pub const fn source(&self) -> &'static str {
        match self {
            Self::FileSystem { .. } => "fs",
            Self::Mongo(_) => "mongo",
        }
    }
}

impl MongoConfig {
    /// `mongodb://{username}:{password}@{host}:{port}`, with user info percent-encoded.
    pub fn connection_string(&self) -> anyhow::Result<String> {
        let mut url = url::Url::parse(&format!("mongodb://{}:{}", self.host, self.port))
            .with_context(|| format!("invalid mongo host '{}'", self.host))?;
        url.set_username(&self.username)
            .map_err(|()| anyhow::anyhow!("cannot set mongo username"))?;
        url.set_password(Some(&self.password))
            .map_err(|()| anyhow::anyhow!("cannot set mongo password"))?;
        Ok(url.to_string())
    }
}
