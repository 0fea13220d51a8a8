mod local;
#[cfg(feature = "mongo")]
mod mongo;

pub use local::LocalModelStore;
#[cfg(feature = "mongo")]
pub use mongo::MongoModelStore;

use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::ModelsRepositoryConfig;
use crate::error::ModelStoreError;
use crate::model::{Model, create_model_file_name};

/// Storage for models keyed by `(name, version)`.
///
/// Every operation checks for the key first and then acts. The check and the
/// act are separate calls against the backend, so two concurrent saves of the
/// same new key can both pass the check; what happens next is up to the
/// backend's own write semantics.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Persist a model. Fails with `AlreadyExists` if the key is taken, whatever
    /// the stored extension or content.
    async fn save_model(&self, model: &Model) -> Result<(), ModelStoreError>;

    /// Fetch a model. Fails with `NotFound` if the key is absent.
    async fn get_model(&self, name: &str, version: &str) -> Result<Model, ModelStoreError>;

    /// Remove a model. Fails with `NotFound` if the key is absent.
    async fn delete_model(&self, name: &str, version: &str) -> Result<(), ModelStoreError>;

    /// `{name}-{version}.{extension}`; identical for every backend.
    fn create_model_file_name(&self, name: &str, version: &str, extension: &str) -> String {
        create_model_file_name(name, version, extension)
    }
}

/// Build the configured backend. Called once at startup so that a bad
/// configuration stops the process before it serves anything.
pub async fn build_model_store(config: &ModelsRepositoryConfig) -> Result<Arc<dyn ModelStore>> {
    match config {
        ModelsRepositoryConfig::FileSystem { directory } => {
            tokio::fs::create_dir_all(directory)
                .await
                .with_context(|| format!("creating model directory {}", directory.display()))?;
            info!(directory = %directory.display(), "using local filesystem model store");
            Ok(Arc::new(LocalModelStore::new(directory.clone())))
        }
        #[cfg(feature = "mongo")]
        ModelsRepositoryConfig::Mongo(mongo_config) => {
            let store = MongoModelStore::connect(mongo_config).await?;
            info!(
                host = %mongo_config.host,
                port = mongo_config.port,
                database = %mongo_config.database_name,
                "using mongo model store"
            );
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "mongo"))]
        ModelsRepositoryConfig::Mongo(_) => {
            anyhow::bail!("the mongo model store requires the 'mongo' feature flag")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn build_local_store_creates_directory() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("model-registry-build-{}", uuid::Uuid::new_v4()));
        let config = ModelsRepositoryConfig::FileSystem {
            directory: dir.join("nested"),
        };

        let store = build_model_store(&config).await?;
        assert!(dir.join("nested").is_dir());
        assert_eq!(
            store.create_model_file_name("my-model", "1.2.3", "pickle"),
            "my-model-1.2.3.pickle"
        );

        std::fs::remove_dir_all(&dir).ok();
        Ok(())
    }

    #[tokio::test]
    async fn built_local_store_round_trips() -> Result<()> {
        let dir = std::env::temp_dir().join(format!("model-registry-build-{}", uuid::Uuid::new_v4()));
        let config = ModelsRepositoryConfig::FileSystem {
            directory: dir.clone(),
        };
        let store = build_model_store(&config).await?;

        let model = Model::new("my-model", "0.0.7", b"binary repr of a model".to_vec(), "cbm");
        store.save_model(&model).await?;
        assert_eq!(store.get_model("my-model", "0.0.7").await?, model);

        std::fs::remove_dir_all(&dir).ok();
        Ok(())
    }
}
