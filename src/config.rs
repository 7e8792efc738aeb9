use std::env;

use url::Url;

use crate::language::Language;

const ADDRESS_COLLECTION: &str = "addresses";
const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1/";

/// Returns the value of the named environment variable if it exists or panics.
pub fn get_variable(name: &str) -> String {
    env::var(name).unwrap_or_else(|_| panic!("must define {} environment variable", name))
}

/// Returns the value of the named environment variable if it exists and isn't blank.
pub fn get_optional_variable(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Settings for a record store adapter.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct StoreConfig {
    /// Deployment mode prefixed to every collection, e.g. `development`.
    pub prefix: String,
}

impl StoreConfig {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// The partition key holding the addresses for `language`.
    pub fn collection(&self, language: Language) -> String {
        if self.prefix.is_empty() {
            format!("{}_{}", ADDRESS_COLLECTION, language.code())
        } else {
            format!("{}_{}_{}", self.prefix, ADDRESS_COLLECTION, language.code())
        }
    }
}

/// Settings for the language model backend.
#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: Url,
}

/// Everything a binary needs to assemble an environment.
#[derive(Clone, Debug)]
pub struct Config {
    pub connection_string: String,
    pub store: StoreConfig,
    pub llm: LlmConfig,
}

impl Config {
    /// Reads the configuration from the process environment, panicking on
    /// anything missing or malformed.
    pub fn from_env() -> Self {
        let base_url = get_optional_variable("CATALOG_LLM_BASE_URL")
            .unwrap_or_else(|| DEFAULT_LLM_BASE_URL.to_owned());
        let base_url = Url::parse(&base_url).expect("parse CATALOG_LLM_BASE_URL");

        Config {
            connection_string: get_variable("CATALOG_DB_CONNECTION_STRING"),
            store: StoreConfig::new(get_optional_variable("CATALOG_MODE").unwrap_or_default()),
            llm: LlmConfig {
                api_key: get_variable("OPENAI_API_KEY"),
                base_url,
            },
        }
    }
}
