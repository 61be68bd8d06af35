//! Raw elements of a stored collection.
//!
//! A collection may hold records written by other app versions or damaged by
//! hand edits. They are kept as plain JSON next to the decoded entries so that
//! rewriting the collection never drops them.

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;
use serde_json::Value;

use super::traits::Entry;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StoredRecord<E> {
    Entry(E),
    /// Kept verbatim; never shown and never exported
    Unreadable(Value),
}

impl<E: Entry> StoredRecord<E> {
    /// Decode one JSON value, keeping it raw when it does not fit `E`
    pub fn decode(value: Value, source: &str) -> Self {
        match serde_json::from_value::<E>(value.clone()) {
            Ok(entry) => StoredRecord::Entry(entry),
            Err(e) => {
                warn!("Unreadable {} record in {}: {}", E::COLLECTION.name(), source, e);
                StoredRecord::Unreadable(value)
            }
        }
    }

    /// Non-empty id, also for raw records with a string or numeric `id`
    pub fn id(&self) -> Option<String> {
        let id = match self {
            StoredRecord::Entry(entry) => Some(entry.id().to_string()),
            StoredRecord::Unreadable(value) => match value.get("id") {
                Some(Value::String(id)) => Some(id.clone()),
                Some(Value::Number(id)) => Some(id.to_string()),
                _ => None,
            },
        };
        id.filter(|id| !id.is_empty())
    }

    /// `created_at`, else the event time
    pub fn recency(&self) -> Option<DateTime<Utc>> {
        match self {
            StoredRecord::Entry(entry) => entry.recency(),
            StoredRecord::Unreadable(value) => ["created_at", E::COLLECTION.date_column()]
                .iter()
                .find_map(|field| {
                    value
                        .get(*field)
                        .and_then(Value::as_str)
                        .and_then(|raw| raw.parse::<DateTime<Utc>>().ok())
                }),
        }
    }

    pub fn entry(&self) -> Option<&E> {
        match self {
            StoredRecord::Entry(entry) => Some(entry),
            StoredRecord::Unreadable(_) => None,
        }
    }

    pub fn into_entry(self) -> Option<E> {
        match self {
            StoredRecord::Entry(entry) => Some(entry),
            StoredRecord::Unreadable(_) => None,
        }
    }
}
