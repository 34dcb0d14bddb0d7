//! Typed facade over a [`TableStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::keys::{IndexKey, IndexQuery, ItemKey};
use crate::repositories::RepositoryError;
use crate::store::{InMemoryTableStore, SqlTableStore, StoredItem, TableStore, WriteRequest};
use crate::DbPool;

/// A domain type stored in the club table.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const ENTITY_TYPE: &'static str;

    type Id: Send + Sync + ?Sized;

    fn key_for(id: &Self::Id) -> ItemKey;

    fn key(&self) -> ItemKey;

    fn gsi1(&self) -> Option<IndexKey> {
        None
    }

    fn gsi2(&self) -> Option<IndexKey> {
        None
    }

    fn created_at(&self) -> DateTime<Utc>;

    fn updated_at(&self) -> DateTime<Utc> {
        self.created_at()
    }

    /// Called on the result of [`SingleTable::update`] before it is written.
    ///
    /// Re-derives computed attributes and rejects patches that break the
    /// entity's invariants relative to the stored `previous` version.
    fn normalize(&mut self, _previous: &Self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

pub fn to_item<E: Entity>(entity: &E) -> Result<StoredItem, RepositoryError> {
    let data = serde_json::to_value(entity)
        .map_err(|error| RepositoryError::Decode(format!("{}: {error}", E::ENTITY_TYPE)))?;
    Ok(StoredItem {
        key: entity.key(),
        entity_type: E::ENTITY_TYPE.to_string(),
        gsi1: entity.gsi1(),
        gsi2: entity.gsi2(),
        data,
        created_at: entity.created_at(),
        updated_at: entity.updated_at(),
    })
}

pub fn from_item<E: Entity>(item: StoredItem) -> Result<E, RepositoryError> {
    if item.entity_type != E::ENTITY_TYPE {
        return Err(RepositoryError::Decode(format!(
            "item {} holds {} but {} was requested",
            item.key,
            item.entity_type,
            E::ENTITY_TYPE
        )));
    }
    serde_json::from_value(item.data)
        .map_err(|error| RepositoryError::Decode(format!("{}: {error}", E::ENTITY_TYPE)))
}

/// Builds a put request for a typed entity.
pub fn put_request<E: Entity>(entity: &E) -> Result<WriteRequest, RepositoryError> {
    to_item(entity).map(WriteRequest::Put)
}

pub fn delete_request<E: Entity>(id: &E::Id) -> WriteRequest {
    WriteRequest::Delete(E::key_for(id))
}

#[derive(Debug)]
pub struct BatchItemResult {
    pub key: ItemKey,
    pub result: Result<(), RepositoryError>,
}

impl BatchItemResult {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct SingleTable {
    store: Arc<dyn TableStore>,
}

impl SingleTable {
    pub fn new(store: Arc<dyn TableStore>) -> Self {
        Self { store }
    }

    pub fn sql(pool: DbPool) -> Self {
        Self::new(Arc::new(SqlTableStore::new(pool)))
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryTableStore::default()))
    }

    pub fn store(&self) -> &Arc<dyn TableStore> {
        &self.store
    }

    pub async fn get<E: Entity>(&self, id: &E::Id) -> Result<Option<E>, RepositoryError> {
        match self.store.get_item(&E::key_for(id)).await? {
            Some(item) => Ok(Some(from_item(item)?)),
            None => Ok(None),
        }
    }

    /// Upsert keyed by the entity's primary key.
    pub async fn put<E: Entity>(&self, entity: &E) -> Result<(), RepositoryError> {
        let item = to_item(entity)?;
        debug!(entity_type = E::ENTITY_TYPE, key = %item.key, "put item");
        self.store.put_item(item).await
    }

    pub async fn query<E: Entity>(&self, query: IndexQuery) -> Result<Vec<E>, RepositoryError> {
        self.store
            .query(&query, Some(E::ENTITY_TYPE))
            .await?
            .into_iter()
            .map(from_item)
            .collect()
    }

    /// Merges top-level attributes of `patch` into the stored record.
    ///
    /// The merged entity passes through [`Entity::normalize`] first. Index keys
    /// are recomputed from the result, so a patch that moves an entity between
    /// index partitions is reflected in later queries.
    pub async fn update<E: Entity>(
        &self,
        id: &E::Id,
        patch: Map<String, Value>,
    ) -> Result<E, RepositoryError> {
        let key = E::key_for(id);
        let item = self.store.get_item(&key).await?.ok_or_else(|| RepositoryError::NotFound {
            entity_type: E::ENTITY_TYPE,
            key: key.to_string(),
        })?;

        let previous: E = from_item(item.clone())?;
        let mut data = match item.data {
            Value::Object(map) => map,
            _ => {
                return Err(RepositoryError::Decode(format!(
                    "{} at {key} is not a JSON object",
                    E::ENTITY_TYPE
                )))
            }
        };
        for (attribute, value) in patch {
            data.insert(attribute, value);
        }

        let mut merged: E = serde_json::from_value(Value::Object(data))
            .map_err(|error| RepositoryError::Decode(format!("{}: {error}", E::ENTITY_TYPE)))?;
        if merged.key() != key {
            return Err(RepositoryError::Decode(format!(
                "patch may not change the key of {} at {key}",
                E::ENTITY_TYPE
            )));
        }
        merged.normalize(&previous)?;

        self.put(&merged).await?;
        Ok(merged)
    }

    pub async fn delete<E: Entity>(&self, id: &E::Id) -> Result<bool, RepositoryError> {
        self.store.delete_item(&E::key_for(id)).await
    }

    /// Applies every request or none of them.
    pub async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<(), RepositoryError> {
        debug!(items = requests.len(), "transact write");
        self.store.transact_write(requests).await
    }

    /// Best-effort batch. The result list is aligned with `requests`.
    pub async fn batch_write(&self, requests: Vec<WriteRequest>) -> Vec<BatchItemResult> {
        let keys: Vec<ItemKey> = requests.iter().map(|request| request.key().clone()).collect();
        let results = self.store.batch_write(requests).await;
        keys.into_iter()
            .zip(results)
            .map(|(key, result)| BatchItemResult { key, result })
            .collect()
    }
}
