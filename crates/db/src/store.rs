use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqliteConnection};
use tokio::sync::RwLock;

use crate::keys::{
    sort_timestamp, IndexKey, IndexName, IndexQuery, ItemKey, SortCondition, SortOrder,
};
use crate::repositories::RepositoryError;
use crate::DbPool;

/// Raw item as held by a [`TableStore`]; `data` is the entity's JSON document.
#[derive(Clone, Debug, PartialEq)]
pub struct StoredItem {
    pub key: ItemKey,
    pub entity_type: String,
    pub gsi1: Option<IndexKey>,
    pub gsi2: Option<IndexKey>,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredItem {
    fn index_key(&self, index: IndexName) -> Option<(&str, &str)> {
        match index {
            IndexName::Primary => Some((self.key.pk.as_str(), self.key.sk.as_str())),
            IndexName::Gsi1 => self.gsi1.as_ref().map(|key| (key.pk.as_str(), key.sk.as_str())),
            IndexName::Gsi2 => self.gsi2.as_ref().map(|key| (key.pk.as_str(), key.sk.as_str())),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum WriteRequest {
    Put(StoredItem),
    Delete(ItemKey),
}

impl WriteRequest {
    pub fn key(&self) -> &ItemKey {
        match self {
            Self::Put(item) => &item.key,
            Self::Delete(key) => key,
        }
    }
}

/// Raw access to the club table.
///
/// Implementations never retry; callers decide based on
/// [`RepositoryError::is_retryable`].
#[async_trait]
pub trait TableStore: Send + Sync {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<StoredItem>, RepositoryError>;

    /// Upsert. An existing item keeps its original `created_at`.
    async fn put_item(&self, item: StoredItem) -> Result<(), RepositoryError>;

    /// Returns whether an item was removed.
    async fn delete_item(&self, key: &ItemKey) -> Result<bool, RepositoryError>;

    /// Items whose index key satisfies `query`, restricted to `entity_type` when given,
    /// ordered by index sort key, then primary key.
    async fn query(
        &self,
        query: &IndexQuery,
        entity_type: Option<&str>,
    ) -> Result<Vec<StoredItem>, RepositoryError>;

    /// Best effort: one result per request, in input order. A failed request
    /// does not stop the ones after it.
    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Vec<Result<(), RepositoryError>>;

    /// All or nothing: either every request is applied or none is.
    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<(), RepositoryError>;
}

fn ensure_valid_key(key: &ItemKey) -> Result<(), RepositoryError> {
    if key.is_valid() {
        Ok(())
    } else {
        Err(RepositoryError::InvalidKey(format!(
            "partition and sort key are required, got `{key}`"
        )))
    }
}

pub struct SqlTableStore {
    pool: DbPool,
}

impl SqlTableStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|error| RepositoryError::Decode(format!("invalid timestamp `{raw}`: {error}")))
}

fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> Result<StoredItem, RepositoryError> {
    let pk: String = row.try_get("pk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let sk: String = row.try_get("sk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let entity_type: String =
        row.try_get("entity_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let gsi1pk: Option<String> =
        row.try_get("gsi1pk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let gsi1sk: Option<String> =
        row.try_get("gsi1sk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let gsi2pk: Option<String> =
        row.try_get("gsi2pk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let gsi2sk: Option<String> =
        row.try_get("gsi2sk").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let data: String = row.try_get("data").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(StoredItem {
        key: ItemKey::new(pk, sk),
        entity_type,
        gsi1: gsi1pk.zip(gsi1sk).map(|(pk, sk)| IndexKey::new(pk, sk)),
        gsi2: gsi2pk.zip(gsi2sk).map(|(pk, sk)| IndexKey::new(pk, sk)),
        data: serde_json::from_str(&data)
            .map_err(|error| RepositoryError::Decode(format!("item data is not JSON: {error}")))?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

async fn upsert(conn: &mut SqliteConnection, item: &StoredItem) -> Result<(), RepositoryError> {
    ensure_valid_key(&item.key)?;
    let data = serde_json::to_string(&item.data)
        .map_err(|error| RepositoryError::Decode(error.to_string()))?;

    sqlx::query(
        "INSERT INTO club_items (pk, sk, entity_type, gsi1pk, gsi1sk, gsi2pk, gsi2sk,
                                 data, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
         ON CONFLICT(pk, sk) DO UPDATE SET
             entity_type = excluded.entity_type,
             gsi1pk = excluded.gsi1pk,
             gsi1sk = excluded.gsi1sk,
             gsi2pk = excluded.gsi2pk,
             gsi2sk = excluded.gsi2sk,
             data = excluded.data,
             updated_at = excluded.updated_at",
    )
    .bind(&item.key.pk)
    .bind(&item.key.sk)
    .bind(&item.entity_type)
    .bind(item.gsi1.as_ref().map(|key| key.pk.as_str()))
    .bind(item.gsi1.as_ref().map(|key| key.sk.as_str()))
    .bind(item.gsi2.as_ref().map(|key| key.pk.as_str()))
    .bind(item.gsi2.as_ref().map(|key| key.sk.as_str()))
    .bind(data)
    .bind(sort_timestamp(item.created_at))
    .bind(sort_timestamp(item.updated_at))
    .execute(&mut *conn)
    .await?;

    Ok(())
}

async fn remove(conn: &mut SqliteConnection, key: &ItemKey) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM club_items WHERE pk = ? AND sk = ?")
        .bind(&key.pk)
        .bind(&key.sk)
        .execute(&mut *conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

const ITEM_COLUMNS: &str =
    "pk, sk, entity_type, gsi1pk, gsi1sk, gsi2pk, gsi2sk, data, created_at, updated_at";

#[async_trait]
impl TableStore for SqlTableStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<StoredItem>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM club_items WHERE pk = ? AND sk = ?"
        ))
        .bind(&key.pk)
        .bind(&key.sk)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_item(r)?)),
            None => Ok(None),
        }
    }

    async fn put_item(&self, item: StoredItem) -> Result<(), RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        upsert(&mut *conn, &item).await
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<bool, RepositoryError> {
        let mut conn = self.pool.acquire().await?;
        remove(&mut *conn, key).await
    }

    async fn query(
        &self,
        query: &IndexQuery,
        entity_type: Option<&str>,
    ) -> Result<Vec<StoredItem>, RepositoryError> {
        let (pk_column, sk_column) = query.index.columns();
        let mut sql = format!("SELECT {ITEM_COLUMNS} FROM club_items WHERE {pk_column} = ?");

        match &query.sort {
            SortCondition::Any => sql.push_str(&format!(" AND {sk_column} IS NOT NULL")),
            SortCondition::Equals(_) => sql.push_str(&format!(" AND {sk_column} = ?")),
            SortCondition::BeginsWith(_) => {
                sql.push_str(&format!(" AND substr({sk_column}, 1, ?) = ?"))
            }
            SortCondition::Between(_, _) => {
                sql.push_str(&format!(" AND {sk_column} BETWEEN ? AND ?"))
            }
            SortCondition::GreaterOrEqual(_) => sql.push_str(&format!(" AND {sk_column} >= ?")),
        }
        if entity_type.is_some() {
            sql.push_str(" AND entity_type = ?");
        }

        let direction = match query.order {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        };
        sql.push_str(&format!(
            " ORDER BY {sk_column} {direction}, pk {direction}, sk {direction}"
        ));
        if query.limit.is_some() {
            sql.push_str(" LIMIT ?");
        }

        let mut statement = sqlx::query(&sql).bind(&query.partition);
        statement = match &query.sort {
            SortCondition::Any => statement,
            SortCondition::Equals(value) | SortCondition::GreaterOrEqual(value) => {
                statement.bind(value)
            }
            SortCondition::BeginsWith(prefix) => {
                let length = i64::try_from(prefix.chars().count()).unwrap_or(i64::MAX);
                statement.bind(length).bind(prefix)
            }
            SortCondition::Between(low, high) => statement.bind(low).bind(high),
        };
        if let Some(entity_type) = entity_type {
            statement = statement.bind(entity_type);
        }
        if let Some(limit) = query.limit {
            statement = statement.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = statement.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_item).collect()
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Vec<Result<(), RepositoryError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match request {
                WriteRequest::Put(item) => self.put_item(item).await,
                WriteRequest::Delete(key) => self.delete_item(&key).await.map(|_| ()),
            };
            results.push(result);
        }
        results
    }

    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<(), RepositoryError> {
        // Dropping `tx` without commit rolls back the writes already applied.
        let mut tx = self.pool.begin().await?;
        for request in &requests {
            match request {
                WriteRequest::Put(item) => upsert(&mut *tx, item).await?,
                WriteRequest::Delete(key) => {
                    remove(&mut *tx, key).await?;
                }
            }
        }
        tx.commit().await?;
        Ok(())
    }
}

/// Process-local store with the same ordering rules as [`SqlTableStore`].
pub struct InMemoryTableStore {
    items: RwLock<BTreeMap<ItemKey, StoredItem>>,
    available: AtomicBool,
}

impl Default for InMemoryTableStore {
    fn default() -> Self {
        Self { items: RwLock::new(BTreeMap::new()), available: AtomicBool::new(true) }
    }
}

impl InMemoryTableStore {
    /// While unavailable every operation fails with [`RepositoryError::Unavailable`].
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), RepositoryError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(RepositoryError::Unavailable("in-memory store switched off".to_string()))
        }
    }

    pub async fn len(&self) -> usize {
        self.items.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.items.read().await.is_empty()
    }
}

#[async_trait]
impl TableStore for InMemoryTableStore {
    async fn get_item(&self, key: &ItemKey) -> Result<Option<StoredItem>, RepositoryError> {
        self.check_available()?;
        let items = self.items.read().await;
        Ok(items.get(key).cloned())
    }

    async fn put_item(&self, mut item: StoredItem) -> Result<(), RepositoryError> {
        self.check_available()?;
        ensure_valid_key(&item.key)?;
        let mut items = self.items.write().await;
        if let Some(existing) = items.get(&item.key) {
            item.created_at = existing.created_at;
        }
        items.insert(item.key.clone(), item);
        Ok(())
    }

    async fn delete_item(&self, key: &ItemKey) -> Result<bool, RepositoryError> {
        self.check_available()?;
        let mut items = self.items.write().await;
        Ok(items.remove(key).is_some())
    }

    async fn query(
        &self,
        query: &IndexQuery,
        entity_type: Option<&str>,
    ) -> Result<Vec<StoredItem>, RepositoryError> {
        self.check_available()?;
        let items = self.items.read().await;

        let mut matched: Vec<(String, StoredItem)> = items
            .values()
            .filter(|item| entity_type.map_or(true, |kind| item.entity_type == kind))
            .filter_map(|item| {
                let (pk, sk) = item.index_key(query.index)?;
                (pk == query.partition && query.sort.matches(sk))
                    .then(|| (sk.to_string(), item.clone()))
            })
            .collect();

        matched.sort_by(|(left_sk, left), (right_sk, right)| {
            left_sk.cmp(right_sk).then_with(|| left.key.cmp(&right.key))
        });
        if query.order == SortOrder::Descending {
            matched.reverse();
        }

        let limit = query.limit.unwrap_or(usize::MAX);
        Ok(matched.into_iter().take(limit).map(|(_, item)| item).collect())
    }

    async fn batch_write(&self, requests: Vec<WriteRequest>) -> Vec<Result<(), RepositoryError>> {
        let mut results = Vec::with_capacity(requests.len());
        for request in requests {
            let result = match request {
                WriteRequest::Put(item) => self.put_item(item).await,
                WriteRequest::Delete(key) => self.delete_item(&key).await.map(|_| ()),
            };
            results.push(result);
        }
        results
    }

    async fn transact_write(&self, requests: Vec<WriteRequest>) -> Result<(), RepositoryError> {
        self.check_available()?;
        for request in &requests {
            if let WriteRequest::Put(item) = request {
                ensure_valid_key(&item.key)?;
            }
        }

        let mut items = self.items.write().await;
        for request in requests {
            match request {
                WriteRequest::Put(mut item) => {
                    if let Some(existing) = items.get(&item.key) {
                        item.created_at = existing.created_at;
                    }
                    items.insert(item.key.clone(), item);
                }
                WriteRequest::Delete(key) => {
                    items.remove(&key);
                }
            }
        }
        Ok(())
    }
}
