// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use scrapewatch::domain::models::endpoint::EndpointStatus;
use scrapewatch::domain::models::scrape_result::{FieldValue, ScrapeResult, ScrapeResultDetail};
use scrapewatch::domain::repositories::group_repository::GroupRepository;
use scrapewatch::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use scrapewatch::infrastructure::repositories::memory_repo::{
    MemoryGroupRepository, MemoryScrapeResultRepository,
};
use scrapewatch::utils::errors::RepositoryError;
use std::io::Write;

const CATALOGUE: &str = r#"[
  {
    "id": "g1",
    "name": "Shops",
    "fields": [
      { "id": "sku", "name": "Sku", "key": "unique_identifier", "type": "text", "is_fully_editable": false },
      { "id": "price", "name": "Price", "key": "price", "type": "number" }
    ],
    "endpoints": [
      {
        "id": "e1",
        "url": "https://shop.test/list",
        "main_element_selector": ".item",
        "pagination_config": { "type": "url_parameter", "parameter": "page", "start": 1, "end": 3 },
        "detail_field_selectors": [
          { "id": "s1", "field_id": "sku", "selector": ".sku", "attribute_to_get": "data-sku" }
        ],
        "interval": "*/30 * * * *"
      }
    ]
  },
  { "id": "g2", "name": "Old", "fields": [], "is_archived": true }
]"#;

fn catalogue_file() -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(CATALOGUE.as_bytes()).unwrap();
    file
}

#[tokio::test]
async fn test_group_catalogue_loads_from_json() {
    let file = catalogue_file();
    let repo = MemoryGroupRepository::from_json_file(file.path()).unwrap();

    let groups = repo.list_groups().await.unwrap();
    assert_eq!(groups.len(), 2);
    assert!(groups[1].is_archived);

    let group = repo.find_group("g1").await.unwrap().unwrap();
    assert!(!group.fields[0].is_fully_editable);
    assert!(group.fields[1].is_fully_editable);
    let endpoint = group.endpoint("e1").unwrap();
    assert!(endpoint.active);
    assert_eq!(endpoint.status, EndpointStatus::Idle);
    assert_eq!(endpoint.pagination_config.step, 1);
    assert_eq!(
        endpoint.pagination_config.page_indices().collect::<Vec<_>>(),
        vec![1, 2, 3]
    );
    assert_eq!(
        endpoint.detail_field_selectors[0].attribute(),
        Some("data-sku")
    );

    assert!(repo.find_group("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_invalid_catalogue_is_reported() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"{ not json").unwrap();
    assert!(matches!(
        MemoryGroupRepository::from_json_file(file.path()),
        Err(RepositoryError::Serialization(_))
    ));
    assert!(matches!(
        MemoryGroupRepository::from_json_file("/nonexistent/groups.json"),
        Err(RepositoryError::Io(_))
    ));
}

#[tokio::test]
async fn test_endpoint_status_updates() {
    let file = catalogue_file();
    let repo = MemoryGroupRepository::from_json_file(file.path()).unwrap();

    repo.update_endpoint_status("g1", "e1", EndpointStatus::Running, None)
        .await
        .unwrap();
    let endpoint = repo.find_group("g1").await.unwrap().unwrap().endpoints[0].clone();
    assert_eq!(endpoint.status, EndpointStatus::Running);
    assert!(endpoint.last_scraped.is_none());

    let now = Utc::now();
    repo.update_endpoint_status("g1", "e1", EndpointStatus::Idle, Some(now))
        .await
        .unwrap();
    let endpoint = repo.find_group("g1").await.unwrap().unwrap().endpoints[0].clone();
    assert_eq!(endpoint.status, EndpointStatus::Idle);
    assert_eq!(endpoint.last_scraped, Some(now));

    assert!(matches!(
        repo.update_endpoint_status("g1", "nope", EndpointStatus::Idle, None)
            .await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_scrape_results_lookup_and_replace() {
    let repo = MemoryScrapeResultRepository::new();
    let original = ScrapeResult::new(
        "e1",
        "g1",
        "hash-a".to_string(),
        vec![ScrapeResultDetail::new("price", FieldValue::Number(1.0))],
    );
    repo.insert_new(std::slice::from_ref(&original)).await.unwrap();
    assert_eq!(repo.len(), 1);

    assert!(repo.find_existing("e1", "g1", "hash-a").await.unwrap().is_some());
    assert!(repo.find_existing("e1", "g2", "hash-a").await.unwrap().is_none());
    assert!(repo.find_existing("e2", "g1", "hash-a").await.unwrap().is_none());

    let mut replacement = original.clone();
    replacement.fields = vec![ScrapeResultDetail::new("price", FieldValue::Number(2.0))];
    replacement.timestamp_last_update = Utc::now();
    repo.replace_fields(std::slice::from_ref(&replacement)).await.unwrap();

    let stored = repo.find_existing("e1", "g1", "hash-a").await.unwrap().unwrap();
    assert_eq!(stored.value_of("price"), Some(&FieldValue::Number(2.0)));
    assert_eq!(stored.timestamp_initial, original.timestamp_initial);
    assert_eq!(repo.len(), 1);

    let unknown = ScrapeResult::new("e1", "g1", "hash-b".to_string(), Vec::new());
    assert!(matches!(
        repo.replace_fields(&[unknown]).await,
        Err(RepositoryError::NotFound)
    ));
}

#[tokio::test]
async fn test_replace_with_unknown_id_leaves_batch_unapplied() {
    let repo = MemoryScrapeResultRepository::new();
    let original = ScrapeResult::new(
        "e1",
        "g1",
        "hash-a".to_string(),
        vec![ScrapeResultDetail::new("price", FieldValue::Number(1.0))],
    );
    repo.insert_new(std::slice::from_ref(&original)).await.unwrap();

    let mut known = original.clone();
    known.fields = vec![ScrapeResultDetail::new("price", FieldValue::Number(9.0))];
    let unknown = ScrapeResult::new("e1", "g1", "hash-b".to_string(), Vec::new());

    assert!(matches!(
        repo.replace_fields(&[known, unknown]).await,
        Err(RepositoryError::NotFound)
    ));
    let stored = repo.find_existing("e1", "g1", "hash-a").await.unwrap().unwrap();
    assert_eq!(stored.value_of("price"), Some(&FieldValue::Number(1.0)));
}
