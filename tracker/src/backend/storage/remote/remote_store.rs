//! Remote store: one PostgREST table per collection under `{url}/rest/v1`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use shared::{CalendarDate, StorageInfo, StorageMode};

use crate::backend::domain::clock::LocalZone;
use crate::backend::storage::error::StorageError;
use crate::backend::storage::record::StoredRecord;
use crate::backend::storage::traits::{Collection, Entry, EntryStorage};

/// Upper bound on rows fetched by a full listing
pub const LIST_ALL_LIMIT: u32 = 5000;

#[derive(Clone)]
pub struct RemoteStore {
    client: Client,
    base_url: String,
    anon_key: String,
    zone: LocalZone,
}

impl RemoteStore {
    pub fn new(url: &str, anon_key: &str, zone: LocalZone) -> Self {
        Self {
            client: Client::new(),
            base_url: url.trim().trim_end_matches('/').to_string(),
            anon_key: anon_key.trim().to_string(),
            zone,
        }
    }

    pub fn info(&self) -> StorageInfo {
        StorageInfo {
            mode: StorageMode::Remote,
            description: format!("Shared cloud storage at {}", self.base_url),
        }
    }

    fn endpoint(&self, collection: Collection) -> String {
        format!("{}/rest/v1/{}", self.base_url, collection.table())
    }

    fn request(&self, method: Method, collection: Collection, prefer: &str) -> RequestBuilder {
        self.client
            .request(method, self.endpoint(collection))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Content-Type", "application/json")
            .header("Prefer", prefer)
    }

    async fn fetch<E: Entry>(&self, operation: String, query: Vec<(String, String)>) -> Result<Vec<E>> {
        debug!("{} with {:?}", operation, query);
        let response = self
            .request(Method::GET, E::COLLECTION, "return=representation")
            .query(&query)
            .send()
            .await
            .map_err(StorageError::from)?;
        let response = ensure_success(operation.clone(), response).await?;
        let rows = response.json::<Vec<Value>>().await.map_err(StorageError::from)?;
        // Rows that do not decode are skipped, as in the local store
        Ok(rows
            .into_iter()
            .filter_map(|row| StoredRecord::<E>::decode(row, &operation).into_entry())
            .collect())
    }
}

/// Serialize an instant the way the remote filters expect it
pub fn format_instant(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Filter for the entries of one local day
pub fn list_by_date_query(
    collection: Collection,
    date: CalendarDate,
    zone: &LocalZone,
) -> Vec<(String, String)> {
    let column = collection.date_column();
    let mut query = vec![("select".to_string(), collection.select().to_string())];
    match collection {
        Collection::Diary => {
            query.push((column.to_string(), format!("eq.{}", date)));
            query.push(("order".to_string(), "created_at.desc".to_string()));
        }
        Collection::Feeding | Collection::Toilet => {
            let (start, end) = zone.day_bounds(date);
            query.push((column.to_string(), format!("gte.{}", format_instant(start))));
            query.push((column.to_string(), format!("lte.{}", format_instant(end))));
            query.push(("order".to_string(), format!("{}.desc", column)));
        }
    }
    query
}

pub fn list_all_query(collection: Collection) -> Vec<(String, String)> {
    vec![
        ("select".to_string(), collection.select().to_string()),
        ("order".to_string(), collection.order().to_string()),
        ("limit".to_string(), LIST_ALL_LIMIT.to_string()),
    ]
}

async fn ensure_success(operation: String, response: Response) -> Result<Response, StorageError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StorageError::Remote {
        operation,
        status,
        body,
    })
}

#[async_trait]
impl<E: Entry> EntryStorage<E> for RemoteStore {
    async fn list_by_date(&self, date: CalendarDate) -> Result<Vec<E>> {
        let query = list_by_date_query(E::COLLECTION, date, &self.zone);
        self.fetch(format!("list {} for {}", E::COLLECTION.name(), date), query)
            .await
    }

    async fn list_all(&self) -> Result<Vec<E>> {
        self.fetch(
            format!("list all {}", E::COLLECTION.name()),
            list_all_query(E::COLLECTION),
        )
        .await
    }

    async fn create(&self, draft: E::Draft) -> Result<E> {
        let operation = format!("create {}", E::COLLECTION.name());
        let response = self
            .request(Method::POST, E::COLLECTION, "return=representation")
            .json(&[draft])
            .send()
            .await
            .map_err(StorageError::from)?;
        let response = ensure_success(operation.clone(), response).await?;
        let created: Vec<E> = response.json().await.map_err(StorageError::from)?;
        let entry = created
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("{} returned no rows", operation))?;
        info!("Stored {} entry {} remotely", E::COLLECTION.name(), entry.id());
        Ok(entry)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        let response = self
            .request(Method::DELETE, E::COLLECTION, "return=minimal")
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .map_err(StorageError::from)?;
        ensure_success(format!("delete {} {}", E::COLLECTION.name(), id), response).await?;
        info!("Deleted {} entry {} remotely", E::COLLECTION.name(), id);
        Ok(())
    }
}
