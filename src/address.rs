use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::CatalogError;
use crate::normalization;

/// The identifier the store assigned to a persisted address.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        RecordId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A correlation token for a generated draft. Never used as a store key.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(transparent)]
pub struct DraftId(Uuid);

impl DraftId {
    pub fn generate() -> Self {
        DraftId(Uuid::new_v4())
    }
}

impl fmt::Display for DraftId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A structured postal address.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostalAddress {
    pub country: String,

    pub city: String,

    pub line1: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line2: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,

    pub region: String,
}

impl PostalAddress {
    fn validate(&self) -> Result<(), CatalogError> {
        let required = [
            ("address.country", &self.country),
            ("address.city", &self.city),
            ("address.line1", &self.line1),
            ("address.region", &self.region),
        ];

        for (field, value) in required.iter() {
            if value.trim().is_empty() {
                return Err(CatalogError::validation(format!("{} is required", field)));
            }
        }

        Ok(())
    }
}

/// The times an address was created and last modified, in seconds
/// since the epoch.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Times {
    pub created_at: i64,

    pub updated_at: i64,
}

/// A single address in the catalog.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressRecord {
    pub id: RecordId,

    pub name: String,

    pub brief_intro: String,

    #[serde(flatten)]
    pub times: Times,

    pub tags: Vec<String>,

    pub address: PostalAddress,
}

impl AddressRecord {
    pub(crate) fn from_new(id: RecordId, times: Times, new: NewAddress) -> Self {
        let NewAddress {
            name,
            brief_intro,
            tags,
            address,
        } = new;

        AddressRecord {
            id,
            name,
            brief_intro,
            times,
            tags,
            address,
        }
    }
}

/// The client-supplied content of an address: no identifier, no times.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAddress {
    #[serde(deserialize_with = "normalization::deserialize")]
    pub name: String,

    pub brief_intro: String,

    #[serde(deserialize_with = "normalization::deserialize_tags")]
    pub tags: Vec<String>,

    pub address: PostalAddress,
}

impl NewAddress {
    /// Applies the same normalization deserialization would.
    pub fn normalized(mut self) -> Self {
        self.name = normalization::normalize_name(&self.name);
        self.tags = normalization::normalize_tags(&self.tags);
        self
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.name.is_empty() {
            return Err(CatalogError::validation("name is required"));
        }

        self.address.validate()
    }
}

/// A generated, unpersisted address.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationDraft {
    pub provisional_id: DraftId,

    pub name: String,

    pub brief_intro: String,

    pub tags: Vec<String>,

    pub address: PostalAddress,
}

impl From<GenerationDraft> for NewAddress {
    /// Drops the provisional identifier; the store assigns the real one.
    fn from(draft: GenerationDraft) -> Self {
        NewAddress {
            name: draft.name,
            brief_intro: draft.brief_intro,
            tags: draft.tags,
            address: draft.address,
        }
        .normalized()
    }
}
