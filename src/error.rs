use std::fmt;
use std::path::PathBuf;

/// Errors from model store operations.
///
/// Every backend reports the same variants for the same conditions:
/// - `AlreadyExists` / `NotFound` → caller can recover (pick another version, delete first)
/// - `InvalidKey` → the name or version cannot be stored; caller must pick another
/// - `CompromisedLayout` → a local directory holds several files for one key; needs an operator
/// - `Storage` → the underlying medium failed (I/O, database driver)
#[derive(Debug)]
pub enum ModelStoreError {
    /// A model with this name and version is already stored.
    AlreadyExists { name: String, version: String },
    /// No model with this name and version is stored.
    NotFound { name: String, version: String },
    /// The name or version could escape the store or break the served file name.
    InvalidKey {
        name: String,
        version: String,
        reason: &'static str,
    },
    /// More than one file in the store directory matches a single key.
    CompromisedLayout { pattern: String, directory: PathBuf },
    /// The storage medium itself failed.
    Storage(anyhow::Error),
}

impl ModelStoreError {
    pub fn already_exists(name: &str, version: &str) -> Self {
        Self::AlreadyExists {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    pub fn not_found(name: &str, version: &str) -> Self {
        Self::NotFound {
            name: name.to_string(),
            version: version.to_string(),
        }
    }

    pub fn invalid_key(name: &str, version: &str, reason: &'static str) -> Self {
        Self::InvalidKey {
            name: name.to_string(),
            version: version.to_string(),
            reason,
        }
    }

    /// HTTP status the router answers with.
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::AlreadyExists { .. } => 409,
            Self::NotFound { .. } => 404,
            Self::InvalidKey { .. } => 400,
            Self::CompromisedLayout { .. } | Self::Storage(_) => 500,
        }
    }

    /// Whether the caller can resolve this error without operator intervention.
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AlreadyExists { .. } | Self::NotFound { .. } | Self::InvalidKey { .. }
        )
    }
}

impl fmt::Display for ModelStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AlreadyExists { name, version } => write!(f, "model exists: {name}-{version}"),
            Self::NotFound { name, version } => write!(f, "no such model: {name}-{version}"),
            Self::InvalidKey {
                name,
                version,
                reason,
            } => write!(f, "invalid model key {name:?}/{version:?}: {reason}"),
            Self::CompromisedLayout { pattern, directory } => write!(
                f,
                "file layout of {} is compromised: several files match '{pattern}'",
                directory.display()
            ),
            Self::Storage(err) => write!(f, "storage error: {err:#}"),
        }
    }
}

impl std::error::Error for ModelStoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err.as_ref()),
            Self::AlreadyExists { .. }
            | Self::NotFound { .. }
            | Self::InvalidKey { .. }
            | Self::CompromisedLayout { .. } => None,
        }
    }
}

impl From<anyhow::Error> for ModelStoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(err)
    }
}
