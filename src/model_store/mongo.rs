use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{Binary, Document, doc, spec::BinarySubtype};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::ModelStore;
use crate::config::MongoConfig;
use crate::error::ModelStoreError;
use crate::model::{Model, validate_model_key};

/// One stored model. The collection is named after the model, so `name` is
/// redundant with it but kept so a document is self-describing.
///
/// Fields the driver adds (such as `_id`) are ignored on read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ModelDocument {
    name: String,
    version: String,
    content: Binary,
    file_extension: String,
}

impl From<&Model> for ModelDocument {
    fn from(model: &Model) -> Self {
        Self {
            name: model.name.clone(),
            version: model.version.clone(),
            content: Binary {
                subtype: BinarySubtype::Generic,
                bytes: model.content.clone(),
            },
            file_extension: model.file_extension.clone(),
        }
    }
}

impl From<ModelDocument> for Model {
    fn from(document: ModelDocument) -> Self {
        Self {
            name: document.name,
            version: document.version,
            content: document.content.bytes,
            file_extension: document.file_extension,
        }
    }
}

/// Filter selecting a model version inside its collection.
fn version_filter(version: &str) -> Document {
    doc! { "version": version }
}

/// Stores each model as one document in a collection named after the model,
/// selected by an exact match on `version`.
#[derive(Debug, Clone)]
pub struct MongoModelStore {
    database: Database,
}

impl MongoModelStore {
    /// Connect with the configured credentials and select the database.
    pub async fn connect(config: &MongoConfig) -> anyhow::Result<Self> {
        let uri = config.connection_string()?;
        let client = Client::with_uri_str(&uri).await.with_context(|| {
            format!("building mongo client for {}:{}", config.host, config.port)
        })?;
        Ok(Self::new(client.database(&config.database_name)))
    }

    pub const fn new(database: Database) -> Self {
        Self { database }
    }

    fn collection(&self, name: &str) -> Collection<ModelDocument> {
        self.database.collection(name)
    }

    async fn find_document(
        &self,
        name: &str,
        version: &str,
    ) -> Result<Option<ModelDocument>, ModelStoreError> {
        let document = self
            .collection(name)
            .find_one(version_filter(version))
            .await
            .with_context(|| format!("querying collection '{name}' for version '{version}'"))?;
        Ok(document)
    }

    async fn model_exists(&self, name: &str, version: &str) -> Result<bool, ModelStoreError> {
        validate_model_key(name, version)?;
        Ok(self.find_document(name, version).await?.is_some())
    }
}

#[async_trait]
impl ModelStore for MongoModelStore {
    async fn save_model(&self, model: &Model) -> Result<(), ModelStoreError> {
        if self.model_exists(&model.name, &model.version).await? {
            return Err(ModelStoreError::already_exists(&model.name, &model.version));
        }

        let document = ModelDocument::from(model);
        self.collection(&model.name)
            .insert_one(&document)
            .await
            .with_context(|| format!("inserting model {model}"))?;

        info!(
            collection = %model.name,
            version = %model.version,
            bytes = model.content.len(),
            "saved model document"
        );
        Ok(())
    }

    async fn get_model(&self, name: &str, version: &str) -> Result<Model, ModelStoreError> {
        if !self.model_exists(name, version).await? {
            return Err(ModelStoreError::not_found(name, version));
        }

        // The document can vanish between the check and the fetch.
        let document = self
            .find_document(name, version)
            .await?
            .ok_or_else(|| ModelStoreError::not_found(name, version))?;
        Ok(document.into())
    }

    async fn delete_model(&self, name: &str, version: &str) -> Result<(), ModelStoreError> {
        if !self.model_exists(name, version).await? {
            return Err(ModelStoreError::not_found(name, version));
        }

        let result = self
            .collection(name)
            .delete_one(version_filter(version))
            .await
            .with_context(|| format!("deleting model {name}-{version}"))?;

        info!(
            collection = %name,
            version = %version,
            deleted = result.deleted_count,
            "deleted model document"
        );
        Ok(())
    }
}
