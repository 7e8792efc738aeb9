use std::sync::Arc;

use log::{debug, info, o, Logger};
use serde_json::{Map, Value};

use crate::address::{AddressRecord, GenerationDraft, NewAddress, RecordId, Times};
use crate::db::{self, Document};
use crate::duplicate::check_duplicate;
use crate::environment::Environment;
use crate::errors::CatalogError;
use crate::generation::{self, GenerationRequest};
use crate::language::Language;
use crate::listing::{self, ListingRequest, Page};
use crate::prompts::ADDRESS_GENERATION_KEY;

/// The operations an admin client performs on the catalog.
#[derive(Clone)]
pub struct Catalog {
    environment: Environment,
}

impl Catalog {
    pub fn new(environment: Environment) -> Self {
        Catalog { environment }
    }

    fn logger(&self, language: Language) -> Logger {
        self.environment
            .logger
            .new(o!("language" => language.code()))
    }

    fn now(&self) -> i64 {
        (self.environment.clock)()
    }

    fn not_found(&self, language: Language, id: &RecordId) -> CatalogError {
        CatalogError::NotFound {
            collection: self.environment.db.collection(language),
            id: id.to_string(),
        }
    }

    pub async fn list(
        &self,
        language: Language,
        request: ListingRequest,
    ) -> Result<Page, CatalogError> {
        listing::list(
            Arc::new(self.logger(language)),
            self.environment.db.clone(),
            language,
            request,
        )
        .await
    }

    pub async fn retrieve(
        &self,
        language: Language,
        id: &RecordId,
    ) -> Result<AddressRecord, CatalogError> {
        let document = self
            .environment
            .db
            .get(language, id)
            .await?
            .ok_or_else(|| self.not_found(language, id))?;

        document.decode()
    }

    /// Stores a new address unless a near-duplicate with the same name
    /// already exists.
    pub async fn create(
        &self,
        language: Language,
        new: NewAddress,
    ) -> Result<AddressRecord, CatalogError> {
        let new = new.normalized();
        new.validate()?;

        let logger = self.logger(language);

        check_duplicate(
            Arc::new(logger.clone()),
            self.environment.db.clone(),
            language,
            &new.name,
            &new.tags,
        )
        .await?
        .into_result()?;

        let id = self.environment.db.allocate_id();
        let now = self.now();
        let times = Times {
            created_at: now,
            updated_at: now,
        };
        let record = AddressRecord::from_new(id, times, new);

        self.environment
            .db
            .set(language, &record.id, encode(&record)?)
            .await?;

        info!(logger, "Created address"; "id" => %record.id);

        Ok(record)
    }

    /// Replaces the content of an existing address. The id and creation
    /// time are kept.
    pub async fn update(
        &self,
        language: Language,
        id: &RecordId,
        submitted: NewAddress,
    ) -> Result<AddressRecord, CatalogError> {
        let submitted = submitted.normalized();
        submitted.validate()?;

        let logger = self.logger(language).new(o!("id" => id.to_string()));

        let existing: Document = self
            .environment
            .db
            .get(language, id)
            .await?
            .ok_or_else(|| self.not_found(language, id))?;

        let now = self.now();
        let times = Times {
            created_at: db::created_at_of(&existing.data).unwrap_or(now),
            updated_at: now.max(existing.updated_at),
        };
        let record = AddressRecord::from_new(id.clone(), times, submitted);

        let fields: Map<String, Value> = serde_json::from_value(encode(&record)?)
            .map_err(|e| CatalogError::Encode { source: e })?;

        self.environment.db.update(language, id, fields).await?;

        info!(logger, "Updated address");

        Ok(record)
    }

    pub async fn delete(&self, language: Language, id: &RecordId) -> Result<RecordId, CatalogError> {
        self.environment.db.delete(language, id).await?;

        info!(self.logger(language), "Deleted address"; "id" => %id);

        Ok(id.clone())
    }

    /// Generates drafts without storing them. Save a draft by passing it
    /// to `create`.
    pub async fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<Vec<GenerationDraft>, CatalogError> {
        generation::generate(
            self.environment.logger.clone(),
            self.environment.llm.clone(),
            request,
        )
        .await
    }

    /// The stored system prompt for address generation in `language`, or
    /// in English when no language is given.
    pub async fn system_generation_prompt(
        &self,
        language: Option<Language>,
    ) -> Result<String, CatalogError> {
        let language = language.unwrap_or_default();

        debug!(self.logger(language), "Retrieving generation prompt...");

        self.environment
            .prompts
            .retrieve_prompt(language, ADDRESS_GENERATION_KEY)
            .await?
            .ok_or_else(|| CatalogError::PromptNotFound {
                language: language.to_string(),
                key: ADDRESS_GENERATION_KEY.to_owned(),
            })
    }
}

fn encode(record: &AddressRecord) -> Result<Value, CatalogError> {
    serde_json::to_value(record).map_err(|e| CatalogError::Encode { source: e })
}
