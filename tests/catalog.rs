use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use once_cell::sync::OnceCell;
use serde_json::json;

use catalog::address::{NewAddress, RecordId};
use catalog::catalog::Catalog;
use catalog::config::StoreConfig;
use catalog::db::memory::MemoryDb;
use catalog::environment::Environment;
use catalog::errors::{CatalogError, ErrorKind};
use catalog::generation::GenerationRequest;
use catalog::language::Language;
use catalog::listing::ListingRequest;
use catalog::llm::{Choice, Completion, LanguageModel, StructuredCompletion};
use log::Logger;

static LOGGER: OnceCell<Arc<Logger>> = OnceCell::new();

fn logger() -> Arc<Logger> {
    LOGGER.get_or_init(|| Arc::new(log::null_logger())).clone()
}

/// Replies to every request with a fixed body and counts the calls.
struct FixedModel {
    content: String,
    calls: AtomicUsize,
}

impl LanguageModel for FixedModel {
    fn structured_complete(
        &self,
        _request: StructuredCompletion,
    ) -> BoxFuture<Result<Completion, CatalogError>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let content = self.content.clone();

        async move {
            Ok(Completion {
                choices: vec![Choice { content }],
            })
        }
        .boxed()
    }
}

struct Harness {
    db: Arc<MemoryDb>,
    model: Arc<FixedModel>,
    catalog: Catalog,
}

fn harness(content: serde_json::Value) -> Harness {
    let db = Arc::new(MemoryDb::new(StoreConfig::new("test")));
    let model = Arc::new(FixedModel {
        content: content.to_string(),
        calls: AtomicUsize::new(0),
    });
    let ticks = Arc::new(AtomicUsize::new(1000));

    let catalog = Catalog::new(Environment::new(
        logger(),
        db.clone(),
        db.clone(),
        model.clone(),
        Arc::new(move || ticks.fetch_add(1, Ordering::SeqCst) as i64),
    ));

    Harness { db, model, catalog }
}

fn address(name: &str, tags: &[&str]) -> NewAddress {
    serde_json::from_value(json!({
        "name": name,
        "briefIntro": "",
        "tags": tags,
        "address": {"country": "NZ", "city": "Wellington", "line1": "1 Cuba St", "region": "Wellington"}
    }))
    .expect("build address")
}

fn generated_batch() -> serde_json::Value {
    let place = |name: &str, tags: &[&str]| {
        json!({
            "name": name,
            "briefIntro": "generated",
            "tags": tags,
            "address": {
                "country": "NZ",
                "city": "Wellington",
                "line1": "1 Cuba St",
                "line2": null,
                "buildingName": null,
                "postalCode": null,
                "region": "Wellington"
            }
        })
    };

    json!({"addresses": [place("Cafe X", &["cafe", "quiet"]), place("Park Z", &["park"])]})
}

#[tokio::test]
async fn near_duplicates_are_rejected_per_language() {
    let h = harness(generated_batch());

    h.catalog
        .create(Language::En, address("Cafe X", &["quiet", "cafe", "wifi"]))
        .await
        .expect("create first address");

    let e = h
        .catalog
        .create(Language::En, address("Cafe X", &["quiet", "cafe", "parking"]))
        .await
        .expect_err("reject near-duplicate");
    assert_eq!(e.kind(), ErrorKind::Conflict);
    assert_eq!(
        e.to_string(),
        "address with name 'Cafe X' and similar tags (67% similarity) already exists"
    );

    h.catalog
        .create(Language::En, address("Cafe X", &["bakery", "brunch", "quiet"]))
        .await
        .expect("allow dissimilar tags");

    h.catalog
        .create(Language::Zh, address("Cafe X", &["quiet", "cafe", "wifi"]))
        .await
        .expect("languages are independent");

    assert_eq!(h.db.len(Language::En), 2);
    assert_eq!(h.db.len(Language::Zh), 1);
}

#[tokio::test]
async fn updates_keep_identity_and_list_first() {
    let h = harness(generated_batch());

    let first = h
        .catalog
        .create(Language::En, address("Cafe X", &["cafe"]))
        .await
        .expect("create first");
    let second = h
        .catalog
        .create(Language::En, address("Bar Y", &["bar"]))
        .await
        .expect("create second");

    let updated = h
        .catalog
        .update(Language::En, &first.id, address("Cafe X", &["cafe", "wifi"]))
        .await
        .expect("update first");
    assert_eq!(updated.id, first.id);
    assert_eq!(updated.times.created_at, first.times.created_at);
    assert!(updated.times.updated_at > second.times.updated_at);

    let page = h
        .catalog
        .list(Language::En, ListingRequest::default())
        .await
        .expect("list");
    let ids: Vec<&RecordId> = page.items.iter().map(|r| &r.id).collect();
    assert_eq!(ids, vec![&first.id, &second.id]);
    assert_eq!(page.items[0].tags, vec!["cafe", "wifi"]);
    assert_eq!(page.total_count, Some(2));
}

#[tokio::test]
async fn deleted_addresses_disappear() {
    let h = harness(generated_batch());

    let created = h
        .catalog
        .create(Language::En, address("Cafe X", &["cafe"]))
        .await
        .expect("create");

    let deleted = h
        .catalog
        .delete(Language::En, &created.id)
        .await
        .expect("delete");
    assert_eq!(deleted, created.id);

    let e = h
        .catalog
        .retrieve(Language::En, &created.id)
        .await
        .expect_err("retrieve deleted");
    assert_eq!(e.kind(), ErrorKind::NotFound);

    let e = h
        .catalog
        .delete(Language::En, &created.id)
        .await
        .expect_err("delete twice");
    assert_eq!(e.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn generated_drafts_are_saved_through_create() {
    let h = harness(generated_batch());

    let drafts = h
        .catalog
        .generate(GenerationRequest {
            prompt: "places in Wellington".to_owned(),
            ..Default::default()
        })
        .await
        .expect("generate");
    assert_eq!(drafts.len(), 2);
    assert_eq!(h.db.len(Language::En), 0);

    for draft in drafts {
        let provisional_id = draft.provisional_id.to_string();
        let record = h
            .catalog
            .create(Language::En, NewAddress::from(draft))
            .await
            .expect("save draft");
        assert_ne!(record.id.as_str(), provisional_id);
    }

    assert_eq!(h.db.len(Language::En), 2);

    let e = h
        .catalog
        .create(Language::En, address("Cafe X", &["cafe", "quiet"]))
        .await
        .expect_err("saved drafts take part in duplicate checks");
    assert_eq!(e.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn blank_prompts_are_rejected_without_calling_the_model() {
    let h = harness(generated_batch());

    let e = h
        .catalog
        .generate(GenerationRequest {
            prompt: "   ".to_owned(),
            system_prompt: Some("You catalog places.".to_owned()),
            ..Default::default()
        })
        .await
        .expect_err("reject blank prompt");
    assert_eq!(e.kind(), ErrorKind::Validation);
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn off_schema_generations_report_the_content() {
    let h = harness(json!({"places": []}));

    let e = h
        .catalog
        .generate(GenerationRequest {
            prompt: "places".to_owned(),
            ..Default::default()
        })
        .await
        .expect_err("reject off-schema content");
    assert_eq!(e.kind(), ErrorKind::SchemaDecode);

    match e {
        CatalogError::SchemaDecode { content, .. } => assert_eq!(content, "{\"places\":[]}"),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(h.model.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn listing_filters_by_tags_as_submitted() {
    let h = harness(generated_batch());

    let created = h
        .catalog
        .create(Language::En, address("Cafe X", &["caf\u{e9}", " bar "]))
        .await
        .expect("create");

    for tag in &["caf\u{e9}", " bar ", "bar"] {
        let page = h
            .catalog
            .list(
                Language::En,
                ListingRequest {
                    tags: vec![tag.to_string()],
                    ..Default::default()
                },
            )
            .await
            .expect("list");

        assert_eq!(page.items.len(), 1, "filtering by {:?}", tag);
        assert_eq!(page.items[0].id, created.id);
        assert_eq!(page.total_count, Some(1));
    }
}
