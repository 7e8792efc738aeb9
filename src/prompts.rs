use futures::future::BoxFuture;

use crate::errors::CatalogError;
use crate::language::Language;

/// The key under which the address generation system prompt is stored.
pub const ADDRESS_GENERATION_KEY: &str = "address_generation";

/// Stored system prompts, one set per language.
pub trait Prompts {
    fn retrieve_prompt(
        &self,
        language: Language,
        key: &str,
    ) -> BoxFuture<Result<Option<String>, CatalogError>>;
}
