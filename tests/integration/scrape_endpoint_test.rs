// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{detail_endpoint, detail_html, seed_shop, shop_group, TestApp};
use scrapewatch::domain::models::endpoint::{Endpoint, EndpointStatus};
use scrapewatch::domain::models::scrape_result::FieldValue;
use scrapewatch::domain::repositories::group_repository::GroupRepository;
use scrapewatch::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use scrapewatch::utils::errors::{CrawlError, ScrapeRunError};

async fn endpoint_state(app: &TestApp, endpoint_id: &str) -> Endpoint {
    app.groups
        .find_group("g1")
        .await
        .unwrap()
        .unwrap()
        .endpoint(endpoint_id)
        .cloned()
        .unwrap()
}

#[tokio::test]
async fn test_scrape_run_stores_new_records_then_settles() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "")])]);
    seed_shop(&app.engine);

    let first = app.use_case.execute_and_store("g1", "e1").await.unwrap();
    // item "a" appears on both listing pages but is stored once
    assert_eq!(first.new_records.len(), 3);
    assert!(first.replace_records.is_empty());
    assert_eq!(app.results.len(), 3);

    let stored = app.results.list_by_endpoint("g1", "e1").await.unwrap();
    let alpha = stored
        .iter()
        .find(|r| r.value_of("sku") == Some(&FieldValue::text("a")))
        .unwrap();
    assert_eq!(alpha.value_of("price"), Some(&FieldValue::Number(1299.0)));
    assert_eq!(
        alpha.value_of("link"),
        Some(&FieldValue::text("https://shop.test/p/a"))
    );

    let endpoint = endpoint_state(&app, "e1").await;
    assert_eq!(endpoint.status, EndpointStatus::Idle);
    assert!(endpoint.last_scraped.is_some());

    let second = app.use_case.execute_and_store("g1", "e1").await.unwrap();
    assert!(second.is_empty());
    assert_eq!(app.results.len(), 3);
    assert_eq!(app.engine.opened_pages(), app.engine.closed_pages());
}

#[tokio::test]
async fn test_changed_detail_page_replaces_existing_record() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "")])]);
    seed_shop(&app.engine);
    app.use_case.execute_and_store("g1", "e1").await.unwrap();
    let before = app.results.list_by_endpoint("g1", "e1").await.unwrap();

    app.engine
        .insert_page(&TestApp::detail_url("b"), &detail_html("b", "Beta", "$17.25"));
    let outcome = app.use_case.execute_and_store("g1", "e1").await.unwrap();

    assert!(outcome.new_records.is_empty());
    assert_eq!(outcome.replace_records.len(), 1);
    let replaced = &outcome.replace_records[0];
    let original = before.iter().find(|r| r.id == replaced.id).unwrap();
    assert_eq!(original.value_of("sku"), Some(&FieldValue::text("b")));

    let after = app.results.list_by_endpoint("g1", "e1").await.unwrap();
    assert_eq!(after.len(), 3);
    let beta = after.iter().find(|r| r.id == replaced.id).unwrap();
    assert_eq!(beta.value_of("price"), Some(&FieldValue::Number(17.25)));
    assert_eq!(beta.timestamp_initial, original.timestamp_initial);
}

#[tokio::test]
async fn test_failed_detail_pages_do_not_fail_the_run() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "")])]);
    seed_shop(&app.engine);
    app.engine.remove_page(&TestApp::detail_url("c"));
    app.engine.remove_page(&TestApp::page_url(2));

    let outcome = app.use_case.execute_and_store("g1", "e1").await.unwrap();
    assert_eq!(outcome.new_records.len(), 2);
}

#[tokio::test]
async fn test_unknown_group_or_endpoint() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "")])]);

    assert!(matches!(
        app.use_case.execute("nope", "e1").await,
        Err(ScrapeRunError::GroupNotFound(_))
    ));
    assert!(matches!(
        app.use_case.execute("g1", "nope").await,
        Err(ScrapeRunError::EndpointNotFound { .. })
    ));
}

#[tokio::test]
async fn test_misconfigured_endpoint_fails_and_resets_status() {
    let mut endpoint = detail_endpoint("e1", "");
    endpoint.with_detailed_view = false;
    endpoint.main_element_selector = String::new();
    let app = TestApp::new(vec![shop_group("g1", vec![endpoint])]);

    let result = app.use_case.execute_and_store("g1", "e1").await;
    assert!(matches!(
        result,
        Err(ScrapeRunError::Crawl(CrawlError::Config(_)))
    ));
    assert!(app.results.is_empty());

    let endpoint = endpoint_state(&app, "e1").await;
    assert_eq!(endpoint.status, EndpointStatus::Idle);
    assert!(endpoint.last_scraped.is_some());
}

#[tokio::test]
async fn test_preview_does_not_store() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "")])]);
    seed_shop(&app.engine);

    let preview = app.use_case.preview("g1", "e1").await.unwrap();
    assert_eq!(preview.len(), 2);
    assert!(preview
        .iter()
        .all(|r| r.source_url.as_deref().is_some_and(|u| u.starts_with("https://shop.test/p/"))));
    assert!(app.results.is_empty());
    assert!(endpoint_state(&app, "e1").await.last_scraped.is_none());
}
