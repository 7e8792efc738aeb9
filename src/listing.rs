use std::sync::Arc;

use log::{debug, o, warn, Logger};
use serde::Serialize;

use crate::address::{AddressRecord, RecordId};
use crate::db::{Db, Document, Filter, Order, Query};
use crate::errors::CatalogError;
use crate::language::Language;
use crate::normalization::normalize_tags;

/// The page size used when none (or an unusable one) is requested. Also the
/// largest page size served.
pub const DEFAULT_PAGE_SIZE: i64 = 100;

pub fn clamp_page_size(requested: Option<i64>) -> i64 {
    match requested {
        Some(n) if n > 0 && n <= DEFAULT_PAGE_SIZE => n,
        _ => DEFAULT_PAGE_SIZE,
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ListingRequest {
    /// Only list addresses sharing at least one of these tags. Tags are
    /// normalized the same way stored ones are.
    pub tags: Vec<String>,

    pub page_size: Option<i64>,

    /// The id of the last address on the previous page.
    pub cursor: Option<RecordId>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub items: Vec<AddressRecord>,

    /// Only computed for the first page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,

    /// Empty when the page is empty.
    pub next_cursor: String,

    pub has_more: bool,

    /// How many documents on this page could not be decoded.
    pub skipped: usize,
}

/// Fetches one page of a language's addresses, most recently updated first.
pub async fn list(
    logger: Arc<Logger>,
    db: Arc<dyn Db + Send + Sync>,
    language: Language,
    request: ListingRequest,
) -> Result<Page, CatalogError> {
    let ListingRequest {
        tags,
        page_size,
        cursor,
    } = request;

    let page_size = clamp_page_size(page_size);
    let filter = Filter::tags_any(normalize_tags(&tags));

    let total_count = match &cursor {
        None => Some(db.count(language, filter.clone()).await?),
        Some(_) => None,
    };

    let start_after = match cursor {
        Some(id) => Some(resolve_cursor(&*db, language, id).await?),
        None => None,
    };

    let query = Query {
        filter,
        order: Order::UpdatedAtDescending,
        limit: Some(page_size + 1),
        start_after,
    };

    let mut documents = db.query(language, query).await?;
    let has_more = documents.len() as i64 > page_size;
    documents.truncate(page_size as usize);

    let next_cursor = documents
        .last()
        .map(|d| d.id.to_string())
        .unwrap_or_default();

    let fetched = documents.len();
    let items: Vec<AddressRecord> = documents
        .into_iter()
        .filter_map(|d| decode(&logger, d))
        .collect();
    let skipped = fetched - items.len();

    debug!(logger, "Listed addresses"; "count" => items.len(), "skipped" => skipped, "has_more" => has_more);

    Ok(Page {
        items,
        total_count,
        next_cursor,
        has_more,
        skipped,
    })
}

async fn resolve_cursor(
    db: &(dyn Db + Send + Sync),
    language: Language,
    id: RecordId,
) -> Result<Document, CatalogError> {
    db.get(language, &id)
        .await?
        .ok_or_else(|| CatalogError::CursorNotFound(id.to_string()))
}

fn decode(logger: &Logger, document: Document) -> Option<AddressRecord> {
    let id = document.id.to_string();

    match document.decode() {
        Ok(record) => Some(record),
        Err(e) => {
            let logger = logger.new(o!("id" => id));
            warn!(logger, "failed to parse document"; "error" => ?e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use futures::executor::block_on;
    use proptest::collection::vec;
    use proptest::prelude::*;
    use serde_json::json;

    use super::{clamp_page_size, list, ListingRequest, DEFAULT_PAGE_SIZE};
    use crate::address::RecordId;
    use crate::config::StoreConfig;
    use crate::db::memory::MemoryDb;
    use crate::db::Db;
    use crate::errors::ErrorKind;
    use crate::language::Language;

    fn address(name: &str, updated_at: i64, tags: &[&str]) -> serde_json::Value {
        json!({
            "name": name,
            "briefIntro": "",
            "createdAt": 1,
            "updatedAt": updated_at,
            "tags": tags,
            "address": {"country": "NZ", "city": "W", "line1": "1", "region": "R"}
        })
    }

    async fn cafes() -> Arc<MemoryDb> {
        let db = Arc::new(MemoryDb::new(StoreConfig::default()));

        for (id, updated_at, tags) in &[
            ("one", 100, vec!["cafe"]),
            ("two", 300, vec!["cafe", "quiet"]),
            ("three", 200, vec!["cafe"]),
            ("four", 400, vec!["bar"]),
        ] {
            db.set(Language::En, &RecordId::new(*id), address(id, *updated_at, tags))
                .await
                .unwrap();
        }

        db
    }

    fn request(page_size: i64, cursor: Option<&str>) -> ListingRequest {
        ListingRequest {
            tags: vec!["cafe".to_owned()],
            page_size: Some(page_size),
            cursor: cursor.map(RecordId::new),
        }
    }

    fn names(page: &super::Page) -> Vec<&str> {
        page.items.iter().map(|r| r.name.as_str()).collect()
    }

    #[test]
    fn page_sizes_are_clamped() {
        assert_eq!(clamp_page_size(None), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(0)), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(-3)), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(101)), DEFAULT_PAGE_SIZE);
        assert_eq!(clamp_page_size(Some(100)), 100);
        assert_eq!(clamp_page_size(Some(7)), 7);
    }

    #[tokio::test]
    async fn pages_through_filtered_addresses() {
        let db = cafes().await;
        let logger = Arc::new(log::null_logger());

        let first = list(logger.clone(), db.clone(), Language::En, request(2, None))
            .await
            .unwrap();
        assert_eq!(names(&first), vec!["two", "three"]);
        assert_eq!(first.total_count, Some(3));
        assert!(first.has_more);
        assert_eq!(first.next_cursor, "three");

        let second = list(logger, db, Language::En, request(2, Some("three")))
            .await
            .unwrap();
        assert_eq!(names(&second), vec!["one"]);
        assert_eq!(second.total_count, None);
        assert!(!second.has_more);
        assert_eq!(second.next_cursor, "one");
    }

    #[tokio::test]
    async fn exact_page_has_no_more() {
        let db = cafes().await;

        let page = list(Arc::new(log::null_logger()), db, Language::En, request(3, None))
            .await
            .unwrap();
        assert_eq!(page.items.len(), 3);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn empty_listing_has_empty_cursor() {
        let db = Arc::new(MemoryDb::new(StoreConfig::default()));

        let page = list(
            Arc::new(log::null_logger()),
            db,
            Language::Zh,
            ListingRequest::default(),
        )
        .await
        .unwrap();
        assert!(page.items.is_empty());
        assert_eq!(page.next_cursor, "");
        assert_eq!(page.total_count, Some(0));
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn unknown_cursor_is_not_found() {
        let db = cafes().await;

        let e = list(
            Arc::new(log::null_logger()),
            db,
            Language::En,
            request(2, Some("missing")),
        )
        .await
        .unwrap_err();
        assert_eq!(e.kind(), ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn undecodable_documents_are_skipped_and_counted() {
        let db = cafes().await;
        db.set(
            Language::En,
            &RecordId::new("broken"),
            json!({"updatedAt": 250, "tags": ["cafe"]}),
        )
        .await
        .unwrap();

        let page = list(Arc::new(log::null_logger()), db, Language::En, request(2, None))
            .await
            .unwrap();
        assert_eq!(names(&page), vec!["two"]);
        assert_eq!(page.skipped, 1);
        assert_eq!(page.next_cursor, "broken");
        assert!(page.has_more);
        assert_eq!(page.total_count, Some(4));
    }

    #[tokio::test]
    async fn document_key_overrides_body_id() {
        let db = Arc::new(MemoryDb::new(StoreConfig::default()));
        let mut body = address("x", 1, &[]);
        body["id"] = json!("stale");
        db.set(Language::En, &RecordId::new("fresh"), body).await.unwrap();

        let page = list(
            Arc::new(log::null_logger()),
            db,
            Language::En,
            ListingRequest::default(),
        )
        .await
        .unwrap();
        assert_eq!(page.items[0].id.as_str(), "fresh");
    }

    #[tokio::test]
    async fn tag_filters_match_normalized_tags() {
        let db = Arc::new(MemoryDb::new(StoreConfig::default()));
        db.set(
            Language::En,
            &RecordId::new("x"),
            address("x", 1, &["cafe\u{301}", "bar"]),
        )
        .await
        .unwrap();

        for tag in &["caf\u{e9}", " bar "] {
            let page = list(
                Arc::new(log::null_logger()),
                db.clone(),
                Language::En,
                ListingRequest {
                    tags: vec![tag.to_string()],
                    ..Default::default()
                },
            )
            .await
            .unwrap();

            assert_eq!(names(&page), vec!["x"], "filtering by {:?}", tag);
            assert_eq!(page.total_count, Some(1));
        }
    }

    proptest! {
        #[test]
        fn paging_visits_every_address_once(
            updated_at in vec(0i64..4, 0..24),
            page_size in 1i64..7,
        ) {
            let db = Arc::new(MemoryDb::new(StoreConfig::default()));
            let mut expected = vec![];

            for (i, updated_at) in updated_at.iter().enumerate() {
                let id = format!("{:02}", i);
                block_on(db.set(Language::En, &RecordId::new(id.as_str()), address(&id, *updated_at, &["t"]))).unwrap();
                expected.push((*updated_at, id));
            }
            expected.sort_by(|a, b| b.cmp(a));
            let expected: Vec<String> = expected.into_iter().map(|(_, id)| id).collect();

            let mut seen: Vec<String> = vec![];
            let mut cursor = None;

            loop {
                let request = ListingRequest {
                    tags: vec![],
                    page_size: Some(page_size),
                    cursor: cursor.take(),
                };
                let page = block_on(list(Arc::new(log::null_logger()), db.clone(), Language::En, request)).unwrap();

                prop_assert!(page.items.len() as i64 <= page_size);
                seen.extend(page.items.iter().map(|r| r.id.to_string()));
                prop_assert_eq!(page.has_more, seen.len() < expected.len());

                if !page.has_more {
                    break;
                }
                cursor = Some(RecordId::new(page.next_cursor));
            }

            prop_assert_eq!(seen, expected);
        }
    }
}
