use std::sync::Arc;

use log::{debug, warn, Logger};

use crate::address::AddressRecord;
use crate::db::{Db, Filter, Order, Query};
use crate::errors::CatalogError;
use crate::language::Language;
use crate::similarity::similarity;

/// How many same-name addresses are compared. Duplicates beyond this many
/// are not detected.
pub const NAME_SCAN_LIMIT: i64 = 10;

/// Similarity above which a candidate counts as a duplicate.
pub const SIMILARITY_THRESHOLD: f64 = 0.6;

#[derive(Clone, Debug, PartialEq)]
pub enum Verdict {
    Allowed,
    Rejected { name: String, similarity: f64 },
}

impl Verdict {
    pub fn into_result(self) -> Result<(), CatalogError> {
        match self {
            Verdict::Allowed => Ok(()),
            Verdict::Rejected { name, similarity } => {
                Err(CatalogError::Duplicate { name, similarity })
            }
        }
    }
}

/// Compares a candidate against the existing addresses that share its
/// exact name.
pub async fn check_duplicate(
    logger: Arc<Logger>,
    db: Arc<dyn Db + Send + Sync>,
    language: Language,
    name: &str,
    tags: &[String],
) -> Result<Verdict, CatalogError> {
    let query = Query {
        filter: Filter::name_equals(name),
        order: Order::Natural,
        limit: Some(NAME_SCAN_LIMIT),
        start_after: None,
    };

    let documents = db.query(language, query).await?;
    debug!(logger, "Comparing against same-name addresses..."; "count" => documents.len());

    for document in documents {
        let existing: AddressRecord = match document.decode() {
            Ok(existing) => existing,
            Err(e) => {
                warn!(logger, "failed to parse existing address"; "error" => ?e);
                continue;
            }
        };

        let score = similarity(tags, &existing.tags[..]);

        if score > SIMILARITY_THRESHOLD {
            debug!(logger, "Found near-duplicate"; "id" => %existing.id, "similarity" => score);

            return Ok(Verdict::Rejected {
                name: name.to_owned(),
                similarity: score,
            });
        }
    }

    Ok(Verdict::Allowed)
}
