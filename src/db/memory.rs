use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use futures::future::{BoxFuture, FutureExt};
use serde_json::{Map, Value};

use super::{Db, Document, Filter, Order, Query};
use crate::address::RecordId;
use crate::config::StoreConfig;
use crate::errors::CatalogError;
use crate::language::Language;
use crate::prompts::Prompts;

/// A record store kept entirely in process memory. Each collection
/// iterates in insertion order.
#[derive(Default)]
pub struct MemoryDb {
    config: StoreConfig,
    collections: RwLock<HashMap<String, Vec<Document>>>,
    prompts: RwLock<HashMap<(Language, String), String>>,
}

impl MemoryDb {
    pub fn new(config: StoreConfig) -> Self {
        MemoryDb {
            config,
            ..Default::default()
        }
    }

    pub fn insert_prompt(&self, language: Language, key: impl Into<String>, prompt: impl Into<String>) {
        self.prompts
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((language, key.into()), prompt.into());
    }

    /// The number of documents stored for `language`, whatever their shape.
    pub fn len(&self, language: Language) -> usize {
        self.collections
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&self.config.collection(language))
            .map_or(0, Vec::len)
    }

    fn not_found(&self, language: Language, id: &RecordId) -> CatalogError {
        CatalogError::NotFound {
            collection: self.config.collection(language),
            id: id.to_string(),
        }
    }

    fn run_query(&self, language: Language, query: Query) -> Vec<Document> {
        let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);

        let mut documents: Vec<Document> = collections
            .get(&self.config.collection(language))
            .map(|c| {
                c.iter()
                    .filter(|d| query.filter.matches(&d.data))
                    .filter(|d| query.start_after.as_ref().map_or(true, |s| d.is_after(s)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if query.order == Order::UpdatedAtDescending {
            documents.sort_by(|a, b| {
                (b.updated_at, b.id.as_str()).cmp(&(a.updated_at, a.id.as_str()))
            });
        }

        if let Some(limit) = query.limit {
            documents.truncate(limit.max(0) as usize);
        }

        documents
    }
}

impl Db for MemoryDb {
    fn collection(&self, language: Language) -> String {
        self.config.collection(language)
    }

    fn allocate_id(&self) -> RecordId {
        super::new_record_id()
    }

    fn query(
        &self,
        language: Language,
        query: Query,
    ) -> BoxFuture<Result<Vec<Document>, CatalogError>> {
        async move { Ok(self.run_query(language, query)) }.boxed()
    }

    fn count(&self, language: Language, filter: Filter) -> BoxFuture<Result<i64, CatalogError>> {
        let query = Query {
            filter,
            order: Order::Natural,
            limit: None,
            start_after: None,
        };

        async move { Ok(self.run_query(language, query).len() as i64) }.boxed()
    }

    fn get(
        &self,
        language: Language,
        id: &RecordId,
    ) -> BoxFuture<Result<Option<Document>, CatalogError>> {
        let id = id.clone();

        async move {
            let collections = self.collections.read().unwrap_or_else(PoisonError::into_inner);

            Ok(collections
                .get(&self.config.collection(language))
                .and_then(|c| c.iter().find(|d| d.id == id))
                .cloned())
        }
        .boxed()
    }

    fn set(
        &self,
        language: Language,
        id: &RecordId,
        data: Value,
    ) -> BoxFuture<Result<(), CatalogError>> {
        let document = Document::new(id.clone(), data);

        async move {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let collection = collections
                .entry(self.config.collection(language))
                .or_default();

            match collection.iter_mut().find(|d| d.id == document.id) {
                Some(existing) => *existing = document,
                None => collection.push(document),
            }

            Ok(())
        }
        .boxed()
    }

    fn update(
        &self,
        language: Language,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> BoxFuture<Result<(), CatalogError>> {
        let id = id.clone();

        async move {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let existing = collections
                .get_mut(&self.config.collection(language))
                .and_then(|c| c.iter_mut().find(|d| d.id == id))
                .ok_or_else(|| self.not_found(language, &id))?;

            if let Value::Object(data) = &mut existing.data {
                data.extend(fields);
            } else {
                existing.data = Value::Object(fields);
            }
            existing.updated_at = super::updated_at_of(&existing.data);

            Ok(())
        }
        .boxed()
    }

    fn delete(&self, language: Language, id: &RecordId) -> BoxFuture<Result<(), CatalogError>> {
        let id = id.clone();

        async move {
            let mut collections = self.collections.write().unwrap_or_else(PoisonError::into_inner);
            let collection = collections.get_mut(&self.config.collection(language));
            let index = collection
                .as_ref()
                .and_then(|c| c.iter().position(|d| d.id == id));

            match (collection, index) {
                (Some(c), Some(index)) => {
                    c.remove(index);
                    Ok(())
                }
                _ => Err(self.not_found(language, &id)),
            }
        }
        .boxed()
    }
}

impl Prompts for MemoryDb {
    fn retrieve_prompt(
        &self,
        language: Language,
        key: &str,
    ) -> BoxFuture<Result<Option<String>, CatalogError>> {
        let key = (language, key.to_owned());

        async move {
            Ok(self
                .prompts
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .get(&key)
                .cloned())
        }
        .boxed()
    }
}
