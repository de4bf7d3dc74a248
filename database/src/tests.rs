use crate::Database;
use chrono::{TimeZone, Utc};
use keywatch_core::{CollectedVia, LinkCacheEntry, Post};
use std::env;

async fn setup_test_db() -> Database {
    let db_path = env::temp_dir().join(format!("test_keywatch_{}.db", uuid::Uuid::new_v4()));
    let db_url = format!("sqlite://{}", db_path.display());

    let db = Database::connect(&db_url)
        .await
        .expect("Failed to connect to test database");
    db.run_migrations().await.expect("Failed to run migrations");

    db
}

fn post(id: &str, links: &[&str]) -> Post {
    Post {
        id: id.to_string(),
        created_at: Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap(),
        author: "someone".to_string(),
        author_id: Some("7".to_string()),
        text: "a post".to_string(),
        like_count: 1,
        reshare_count: 0,
        links: links.iter().map(|s| s.to_string()).collect(),
        proper_links: None,
        links_to_resolve: !links.is_empty(),
        reshare_of: None,
        collected_via: CollectedVia::Stream,
    }
}

#[tokio::test]
async fn upsert_is_idempotent() {
    let db = setup_test_db().await;
    let p = post("1", &["https://t.co/a"]);

    db.upsert_post(&p).await.unwrap();
    db.upsert_post(&p).await.unwrap();

    assert_eq!(db.count_posts().await.unwrap(), 1);
    let stored = db.get_post("1").await.unwrap().unwrap();
    assert_eq!(stored.links, p.links);
    assert!(stored.links_to_resolve);
}

#[tokio::test]
async fn redelivery_updates_engagement_counters() {
    let db = setup_test_db().await;
    db.upsert_post(&post("1", &["https://t.co/a"])).await.unwrap();

    let mut fresher = post("1", &["https://t.co/a"]);
    fresher.like_count = 50;
    fresher.reshare_count = 3;
    db.upsert_post(&fresher).await.unwrap();

    let stored = db.get_post("1").await.unwrap().unwrap();
    assert_eq!(stored.like_count, 50);
    assert_eq!(stored.reshare_count, 3);
}

#[tokio::test]
async fn redelivery_never_regresses_resolution_state() {
    let db = setup_test_db().await;
    db.upsert_post(&post("1", &["https://t.co/a"])).await.unwrap();
    db.mark_resolved("1", &["https://example.com/article".to_string()])
        .await
        .unwrap();

    // The same record arrives again from the other source, unresolved.
    let mut redelivered = post("1", &["https://t.co/a"]);
    redelivered.collected_via = CollectedVia::Search;
    db.upsert_post(&redelivered).await.unwrap();

    let stored = db.get_post("1").await.unwrap().unwrap();
    assert!(!stored.links_to_resolve);
    assert_eq!(
        stored.proper_links,
        Some(vec!["https://example.com/article".to_string()])
    );
}

#[tokio::test]
async fn find_unresolved_returns_bounded_batch() {
    let db = setup_test_db().await;
    for i in 0..5 {
        db.upsert_post(&post(&i.to_string(), &["https://t.co/x"]))
            .await
            .unwrap();
    }
    db.upsert_post(&post("nolinks", &[])).await.unwrap();

    let batch = db.find_unresolved(3).await.unwrap();
    assert_eq!(batch.len(), 3);
    assert!(batch.iter().all(|p| p.links_to_resolve));
    assert_eq!(db.count_unresolved().await.unwrap(), 5);
}

#[tokio::test]
async fn mark_resolved_reaches_reshares_of_the_original() {
    let db = setup_test_db().await;
    db.upsert_post(&post("100", &["https://t.co/a"])).await.unwrap();

    let mut reshare = post("200", &["https://t.co/a"]);
    reshare.reshare_of = Some("100".to_string());
    db.upsert_post(&reshare).await.unwrap();

    let patched = db
        .mark_resolved("100", &["https://example.com/article".to_string()])
        .await
        .unwrap();
    assert_eq!(patched, 2);

    for id in ["100", "200"] {
        let stored = db.get_post(id).await.unwrap().unwrap();
        assert!(!stored.links_to_resolve);
        assert_eq!(
            stored.proper_links,
            Some(vec!["https://example.com/article".to_string()])
        );
    }
}

#[tokio::test]
async fn mark_resolved_skips_already_resolved_documents() {
    let db = setup_test_db().await;
    db.upsert_post(&post("1", &["https://t.co/a"])).await.unwrap();

    db.mark_resolved("1", &["https://first.example.com".to_string()])
        .await
        .unwrap();
    let patched = db
        .mark_resolved("1", &["https://second.example.com".to_string()])
        .await
        .unwrap();

    assert_eq!(patched, 0);
    let stored = db.get_post("1").await.unwrap().unwrap();
    assert_eq!(
        stored.proper_links,
        Some(vec!["https://first.example.com".to_string()])
    );
}

#[tokio::test]
async fn link_cache_is_write_once_per_key() {
    let db = setup_test_db().await;
    let first = LinkCacheEntry {
        link_id: "https://t.co/a".to_string(),
        real: "https://example.com/one".to_string(),
    };
    let second = LinkCacheEntry {
        link_id: "https://t.co/a".to_string(),
        real: "https://example.com/two".to_string(),
    };

    assert_eq!(db.insert_links(&[first]).await.unwrap(), 1);
    assert_eq!(db.insert_links(&[second]).await.unwrap(), 0);

    let found = db
        .find_links_in(&["https://t.co/a".to_string()])
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].real, "https://example.com/one");
}

#[tokio::test]
async fn find_links_in_only_returns_known_urls() {
    let db = setup_test_db().await;
    db.insert_links(&[
        LinkCacheEntry {
            link_id: "https://t.co/a".to_string(),
            real: "https://example.com/a".to_string(),
        },
        LinkCacheEntry {
            link_id: "https://t.co/b".to_string(),
            real: "https://example.com/b".to_string(),
        },
    ])
    .await
    .unwrap();

    let found = db
        .find_links_in(&[
            "https://t.co/a".to_string(),
            "https://t.co/unknown".to_string(),
        ])
        .await
        .unwrap();

    assert_eq!(found.len(), 1);
    assert_eq!(found[0].link_id, "https://t.co/a");
    assert_eq!(db.count_links().await.unwrap(), 2);
}
