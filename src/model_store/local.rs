use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use regex::Regex;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::ModelStore;
use crate::error::ModelStoreError;
use crate::model::{Model, create_model_file_name, validate_model_key};

/// Stores each model as a single file `{name}-{version}.{extension}` in one
/// directory. The directory listing is the index.
///
/// The extension is not part of the key, so reads locate the file by pattern.
/// At most one file may match a key; more than one is reported as
/// `CompromisedLayout` and never resolved silently.
#[derive(Debug)]
pub struct LocalModelStore {
    directory: PathBuf,
}

impl LocalModelStore {
    pub const fn new(directory: PathBuf) -> Self {
        Self { directory }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Path a model is written to.
    pub fn model_path(&self, model: &Model) -> PathBuf {
        self.directory.join(model.file_name())
    }

    /// Find the file holding `(name, version)`, whatever its extension.
    ///
    /// Name and version are matched literally; only the extension is a wildcard.
    /// Keys that would resolve outside the directory are rejected.
    pub async fn find_model_path(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<PathBuf>, ModelStoreError> {
        validate_model_key(name, version)?;
        let pattern = model_file_pattern(name, version);
        let re = Regex::new(&pattern)
            .with_context(|| format!("compiling model file pattern '{pattern}'"))?;

        let mut entries = tokio::fs::read_dir(&self.directory)
            .await
            .with_context(|| format!("reading model directory {}", self.directory.display()))?;

        let mut matches: Vec<PathBuf> = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .with_context(|| format!("reading entry in {}", self.directory.display()))?
        {
            let file_name = entry.file_name();
            let Some(file_name) = file_name.to_str() else {
                continue;
            };
            if re.is_match(file_name) {
                matches.push(entry.path());
            }
        }

        if matches.len() > 1 {
            return Err(ModelStoreError::CompromisedLayout {
                pattern,
                directory: self.directory.clone(),
            });
        }
        Ok(matches.pop())
    }
}

/// Whole-string regex for the files of one key: the escaped
/// `{name}-{version}.` prefix followed by a wildcard extension.
fn model_file_pattern(name: &str, version: &str) -> String {
    let prefix = regex::escape(&create_model_file_name(name, version, ""));
    format!("^{prefix}.*$")
}

/// Write `content` into a freshly created model file. On failure the file is
/// removed so a truncated write never claims the key.
async fn write_or_discard<W>(mut file: W, path: &Path, content: &[u8]) -> Result<(), ModelStoreError>
where
    W: AsyncWrite + Unpin,
{
    let written: anyhow::Result<()> = async {
        file.write_all(content)
            .await
            .with_context(|| format!("writing model file {}", path.display()))?;
        file.flush()
            .await
            .with_context(|| format!("flushing model file {}", path.display()))
    }
    .await;

    if let Err(err) = written {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            warn!(path = %path.display(), error = %e, "could not remove partially written model file");
        }
        return Err(err.into());
    }
    Ok(())
}

/// Extension of a located model file: everything after the last `.`.
fn extension_of(path: &Path) -> String {
    path.file_name()
        .and_then(|f| f.to_str())
        .and_then(|f| f.rsplit_once('.'))
        .map(|(_, ext)| ext.to_string())
        .unwrap_or_default()
}

#[async_trait]
impl ModelStore for LocalModelStore {
    async fn save_model(&self, model: &Model) -> Result<(), ModelStoreError> {
        if self.find_model_path(&model.name, &model.version).await?.is_some() {
            return Err(ModelStoreError::already_exists(&model.name, &model.version));
        }

        let path = self.model_path(model);
        let file = match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(ModelStoreError::already_exists(&model.name, &model.version));
            }
            Err(e) => {
                return Err(anyhow::Error::new(e)
                    .context(format!("creating model file {}", path.display()))
                    .into());
            }
        };
        write_or_discard(file, &path, &model.content).await?;

        info!(path = %path.display(), bytes = model.content.len(), "saved model file");
        Ok(())
    }

    async fn get_model(&self, name: &str, version: &str) -> Result<Model, ModelStoreError> {
        let path = self
            .find_model_path(name, version)
            .await?
            .ok_or_else(|| ModelStoreError::not_found(name, version))?;

        let content = tokio::fs::read(&path)
            .await
            .with_context(|| format!("reading model file {}", path.display()))?;
        debug!(path = %path.display(), bytes = content.len(), "read model file");

        Ok(Model::new(name, version, content, extension_of(&path)))
    }

    async fn delete_model(&self, name: &str, version: &str) -> Result<(), ModelStoreError> {
        let path = self
            .find_model_path(name, version)
            .await?
            .ok_or_else(|| ModelStoreError::not_found(name, version))?;

        tokio::fs::remove_file(&path)
            .await
            .with_context(|| format!("removing model file {}", path.display()))?;

        info!(path = %path.display(), "deleted model file");
        Ok(())
    }
}
