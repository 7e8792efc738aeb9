use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::CatalogError;

/// A supported catalog language. Each language is an independent
/// partition of the catalog.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum Language {
    #[serde(rename = "EN")]
    En,

    #[serde(rename = "ZH")]
    Zh,
}

impl Language {
    /// The lower-case code used in partition keys.
    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Zh => "zh",
        }
    }
}

impl Default for Language {
    fn default() -> Self {
        Language::En
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::En => "EN",
            Language::Zh => "ZH",
        })
    }
}

impl FromStr for Language {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EN" => Ok(Language::En),
            "ZH" => Ok(Language::Zh),
            _ => Err(CatalogError::UnsupportedLanguage(s.to_owned())),
        }
    }
}
