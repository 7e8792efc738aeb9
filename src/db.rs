use futures::future::BoxFuture;
use serde_json::{Map, Value};

use crate::address::{AddressRecord, RecordId};
use crate::errors::CatalogError;
use crate::language::Language;

pub mod memory;

/// A raw stored address: the document body plus the fields the store
/// indexes for ordering and pagination.
#[derive(Clone, Debug, PartialEq)]
pub struct Document {
    pub id: RecordId,
    pub updated_at: i64,
    pub data: Value,
}

impl Document {
    pub fn new(id: RecordId, data: Value) -> Self {
        let updated_at = updated_at_of(&data);

        Document {
            id,
            updated_at,
            data,
        }
    }

    /// Whether this document sorts strictly after `cursor` in
    /// `Order::UpdatedAtDescending`.
    pub(crate) fn is_after(&self, cursor: &Document) -> bool {
        (self.updated_at, self.id.as_str()) < (cursor.updated_at, cursor.id.as_str())
    }

    /// Decodes the body into an address. The document key wins over any
    /// `id` stored in the body.
    pub fn decode(self) -> Result<AddressRecord, CatalogError> {
        let Document { id, mut data, .. } = self;

        if let Some(body) = data.as_object_mut() {
            body.insert("id".to_owned(), Value::String(id.to_string()));
        }

        serde_json::from_value(data).map_err(|e| CatalogError::MalformedDocument {
            id: id.to_string(),
            source: e,
        })
    }
}

/// Restricts which documents a query or count sees.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Filter {
    /// Documents must share at least one of these tags. Ignored when empty.
    pub tags_any: Vec<String>,

    /// Documents must have exactly this name.
    pub name: Option<String>,
}

impl Filter {
    pub fn tags_any(tags: Vec<String>) -> Self {
        Filter {
            tags_any: tags,
            name: None,
        }
    }

    pub fn name_equals(name: impl Into<String>) -> Self {
        Filter {
            tags_any: vec![],
            name: Some(name.into()),
        }
    }

    pub fn matches(&self, data: &Value) -> bool {
        if let Some(name) = &self.name {
            if data.get("name").and_then(Value::as_str) != Some(name.as_str()) {
                return false;
            }
        }

        self.tags_any.is_empty() || tags_of(data).iter().any(|t| self.tags_any.contains(t))
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Order {
    /// Whatever order the store iterates in.
    Natural,

    /// Most recently updated first. Ties are broken by descending id, but
    /// callers must not rely on that.
    UpdatedAtDescending,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub filter: Filter,
    pub order: Order,
    pub limit: Option<i64>,

    /// Resume strictly after this document.
    pub start_after: Option<Document>,
}

/// The record store holding one collection per language.
pub trait Db {
    /// The name of the partition holding `language`'s addresses.
    fn collection(&self, language: Language) -> String;

    /// Reserves a fresh identifier for a document about to be created.
    fn allocate_id(&self) -> RecordId;

    fn query(
        &self,
        language: Language,
        query: Query,
    ) -> BoxFuture<Result<Vec<Document>, CatalogError>>;

    fn count(&self, language: Language, filter: Filter) -> BoxFuture<Result<i64, CatalogError>>;

    fn get(
        &self,
        language: Language,
        id: &RecordId,
    ) -> BoxFuture<Result<Option<Document>, CatalogError>>;

    /// Writes the whole document, replacing any existing one.
    fn set(
        &self,
        language: Language,
        id: &RecordId,
        data: Value,
    ) -> BoxFuture<Result<(), CatalogError>>;

    /// Merges `fields` into an existing document.
    fn update(
        &self,
        language: Language,
        id: &RecordId,
        fields: Map<String, Value>,
    ) -> BoxFuture<Result<(), CatalogError>>;

    fn delete(&self, language: Language, id: &RecordId) -> BoxFuture<Result<(), CatalogError>>;
}

pub(crate) fn created_at_of(data: &Value) -> Option<i64> {
    data.get("createdAt").and_then(Value::as_i64)
}

pub(crate) fn updated_at_of(data: &Value) -> i64 {
    data.get("updatedAt").and_then(Value::as_i64).unwrap_or(0)
}

pub(crate) fn name_of(data: &Value) -> Option<&str> {
    data.get("name").and_then(Value::as_str)
}

pub(crate) fn tags_of(data: &Value) -> Vec<String> {
    data.get("tags")
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

pub(crate) fn new_record_id() -> RecordId {
    RecordId::new(uuid::Uuid::new_v4().simple().to_string())
}

pub use self::postgres::*;

mod postgres {
    use futures::future::BoxFuture;
    use futures::FutureExt;
    use serde_json::{Map, Value};
    use sqlx::postgres::PgPool;
    use sqlx::types::Json;

    use super::{Document, Filter, Order, Query};
    use crate::address::RecordId;
    use crate::config::StoreConfig;
    use crate::errors::CatalogError;
    use crate::language::Language;
    use crate::prompts::Prompts;

    type DocumentRow = (String, i64, Json<Value>);

    pub struct PgDb {
        pool: PgPool,
        config: StoreConfig,
    }

    impl PgDb {
        pub fn new(pool: PgPool, config: StoreConfig) -> Self {
            PgDb { pool, config }
        }

        /// Creates the tables and indexes if they don't exist yet.
        pub async fn initialize(&self) -> Result<(), CatalogError> {
            sqlx::Executor::execute(&self.pool, include_str!("queries/schema.sql"))
                .await
                .map_err(map_sqlx_error)?;

            Ok(())
        }

        fn not_found(&self, language: Language, id: &RecordId) -> CatalogError {
            CatalogError::NotFound {
                collection: self.config.collection(language),
                id: id.to_string(),
            }
        }
    }

    // these can be simplified once async functions in traits are stabilized
    impl super::Db for PgDb {
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
            let collection = self.config.collection(language);

            async move {
                let sql = match query.order {
                    Order::Natural => include_str!("queries/query.sql"),
                    Order::UpdatedAtDescending => include_str!("queries/query_ordered.sql"),
                };
                let (after_updated_at, after_id) = match &query.start_after {
                    Some(d) => (Some(d.updated_at), Some(d.id.to_string())),
                    None => (None, None),
                };

                let rows: Vec<DocumentRow> = sqlx::query_as(sql)
                    .bind(&collection)
                    .bind(&query.filter.tags_any)
                    .bind(&query.filter.name)
                    .bind(after_updated_at)
                    .bind(after_id)
                    .bind(query.limit)
                    .fetch_all(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(rows.into_iter().map(document_from_row).collect())
            }
            .boxed()
        }

        fn count(&self, language: Language, filter: Filter) -> BoxFuture<Result<i64, CatalogError>> {
            let collection = self.config.collection(language);

            async move {
                let (count,): (i64,) = sqlx::query_as(include_str!("queries/count.sql"))
                    .bind(&collection)
                    .bind(&filter.tags_any)
                    .bind(&filter.name)
                    .fetch_one(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(count)
            }
            .boxed()
        }

        fn get(
            &self,
            language: Language,
            id: &RecordId,
        ) -> BoxFuture<Result<Option<Document>, CatalogError>> {
            let collection = self.config.collection(language);
            let id = id.clone();

            async move {
                let row: Option<DocumentRow> = sqlx::query_as(include_str!("queries/get.sql"))
                    .bind(&collection)
                    .bind(id.as_str())
                    .fetch_optional(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

                Ok(row.map(document_from_row))
            }
            .boxed()
        }

        fn set(
            &self,
            language: Language,
            id: &RecordId,
            data: Value,
        ) -> BoxFuture<Result<(), CatalogError>> {
            let collection = self.config.collection(language);
            let id = id.clone();

            async move {
                sqlx::query(include_str!("queries/set.sql"))
                    .bind(&collection)
                    .bind(id.as_str())
                    .bind(super::name_of(&data).unwrap_or_default())
                    .bind(super::tags_of(&data))
                    .bind(super::updated_at_of(&data))
                    .bind(Json(&data))
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;

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
            let collection = self.config.collection(language);
            let id = id.clone();

            async move {
                let count = sqlx::query(include_str!("queries/update.sql"))
                    .bind(&collection)
                    .bind(id.as_str())
                    .bind(Json(Value::Object(fields)))
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(self.not_found(language, &id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }

        fn delete(&self, language: Language, id: &RecordId) -> BoxFuture<Result<(), CatalogError>> {
            let collection = self.config.collection(language);
            let id = id.clone();

            async move {
                let count = sqlx::query(include_str!("queries/delete.sql"))
                    .bind(&collection)
                    .bind(id.as_str())
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?
                    .rows_affected();

                if count == 0 {
                    Err(self.not_found(language, &id))
                } else {
                    Ok(())
                }
            }
            .boxed()
        }
    }

    impl Prompts for PgDb {
        fn retrieve_prompt(
            &self,
            language: Language,
            key: &str,
        ) -> BoxFuture<Result<Option<String>, CatalogError>> {
            let key = key.to_owned();

            async move {
                let row: Option<(String,)> =
                    sqlx::query_as(include_str!("queries/retrieve_prompt.sql"))
                        .bind(language.code())
                        .bind(&key)
                        .fetch_optional(&self.pool)
                        .await
                        .map_err(map_sqlx_error)?;

                Ok(row.map(|(prompt,)| prompt))
            }
            .boxed()
        }
    }

    fn document_from_row((id, updated_at, Json(data)): DocumentRow) -> Document {
        Document {
            id: RecordId::new(id),
            updated_at,
            data,
        }
    }

    fn map_sqlx_error(error: sqlx::Error) -> CatalogError {
        CatalogError::Sqlx { source: error }
    }
}
