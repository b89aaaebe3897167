// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use async_trait::async_trait;
use scrapewatch::domain::models::group::{Field, FieldType, UNIQUE_IDENTIFIER_KEY};
use scrapewatch::domain::models::scrape_result::{
    ExtractedRecord, FieldValue, ScrapeResult, ScrapeResultDetail,
};
use scrapewatch::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use scrapewatch::domain::services::reconciliation_service::{
    scrape_result_hash, ReconciliationService,
};
use scrapewatch::infrastructure::repositories::memory_repo::MemoryScrapeResultRepository;
use scrapewatch::utils::errors::RepositoryError;
use std::sync::Arc;

fn schema() -> Vec<Field> {
    vec![
        Field::new("sku", "Sku", UNIQUE_IDENTIFIER_KEY, FieldType::Text),
        Field::new("title", "Title", "title", FieldType::Text),
        Field::new("price", "Price", "price", FieldType::Number),
        Field::new("link", "Link", "link", FieldType::Link),
    ]
}

fn record(sku: &str, title: &str, price: f64) -> ExtractedRecord {
    ExtractedRecord {
        fields: vec![
            ScrapeResultDetail::new("sku", FieldValue::text(sku)),
            ScrapeResultDetail::new("title", FieldValue::text(title)),
            ScrapeResultDetail::new("price", FieldValue::Number(price)),
            ScrapeResultDetail::new("link", FieldValue::text(format!("/p/{}", sku))),
        ],
        source_url: None,
    }
}

#[tokio::test]
async fn test_second_run_without_changes_yields_nothing() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo.clone());

    let first = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    assert_eq!(first.new_records.len(), 1);
    assert!(first.replace_records.is_empty());
    assert_eq!(first.new_records[0].unique_hash, scrape_result_hash("e1", "A"));
    repo.insert_new(&first.new_records).await.unwrap();

    let second = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    assert!(second.is_empty());
}

#[tokio::test]
async fn test_duplicates_within_one_batch_are_dropped() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo);

    let outcome = service
        .reconcile(
            "e1",
            "g1",
            vec![
                record("A", "Alpha", 10.0),
                record("B", "Beta", 5.0),
                record("A", "Alpha again", 11.0),
            ],
            &schema(),
        )
        .await;
    assert_eq!(outcome.new_records.len() + outcome.replace_records.len(), 2);
}

#[tokio::test]
async fn test_changed_field_is_replaced_in_place() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo.clone());

    let first = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    repo.insert_new(&first.new_records).await.unwrap();
    let stored = first.new_records[0].clone();

    let second = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 12.5)], &schema())
        .await;
    assert!(second.new_records.is_empty());
    assert_eq!(second.replace_records.len(), 1);
    let replacement = &second.replace_records[0];
    assert_eq!(replacement.id, stored.id);
    assert_eq!(replacement.timestamp_initial, stored.timestamp_initial);
    assert_eq!(replacement.value_of("price"), Some(&FieldValue::Number(12.5)));

    repo.replace_fields(&second.replace_records).await.unwrap();
    let all = repo.list_by_endpoint("g1", "e1").await.unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].value_of("price"), Some(&FieldValue::Number(12.5)));
}

#[tokio::test]
async fn test_link_change_alone_does_not_replace() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo.clone());

    let first = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    repo.insert_new(&first.new_records).await.unwrap();

    let mut moved = record("A", "Alpha", 10.0);
    moved.set_value("link", FieldValue::text("https://shop.test/p/A?from=search"));
    let outcome = service.reconcile("e1", "g1", vec![moved], &schema()).await;
    assert!(outcome.is_empty());
}

#[tokio::test]
async fn test_records_without_identity_are_skipped() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo);

    let outcome = service
        .reconcile(
            "e1",
            "g1",
            vec![record("  ", "Blank", 1.0), record("B", "Beta", 2.0)],
            &schema(),
        )
        .await;
    assert_eq!(outcome.new_records.len(), 1);
    assert_eq!(outcome.new_records[0].value_of("sku"), Some(&FieldValue::text("B")));

    // a schema without a unique identifier cannot reconcile anything
    let no_identity: Vec<Field> = schema().into_iter().skip(1).collect();
    let outcome = service
        .reconcile("e1", "g1", vec![record("C", "Gamma", 3.0)], &no_identity)
        .await;
    assert!(outcome.is_empty());
}

#[tokio::test]
async fn test_same_identity_on_other_endpoint_is_new() {
    let repo = Arc::new(MemoryScrapeResultRepository::new());
    let service = ReconciliationService::new(repo.clone());

    let first = service
        .reconcile("e1", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    repo.insert_new(&first.new_records).await.unwrap();

    let other = service
        .reconcile("e2", "g1", vec![record("A", "Alpha", 10.0)], &schema())
        .await;
    assert_eq!(other.new_records.len(), 1);
}

/// 查找总是失败的仓库
struct FailingRepository;

#[async_trait]
impl ScrapeResultRepository for FailingRepository {
    async fn find_existing(
        &self,
        _endpoint_id: &str,
        _group_id: &str,
        _unique_hash: &str,
    ) -> Result<Option<ScrapeResult>, RepositoryError> {
        Err(RepositoryError::StorageError("connection reset".to_string()))
    }

    async fn insert_new(&self, _results: &[ScrapeResult]) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn replace_fields(&self, _results: &[ScrapeResult]) -> Result<(), RepositoryError> {
        Ok(())
    }

    async fn list_by_endpoint(
        &self,
        _group_id: &str,
        _endpoint_id: &str,
    ) -> Result<Vec<ScrapeResult>, RepositoryError> {
        Ok(Vec::new())
    }
}

#[tokio::test]
async fn test_lookup_failure_drops_record_from_both_sets() {
    let service = ReconciliationService::new(Arc::new(FailingRepository));
    let outcome = service
        .reconcile(
            "e1",
            "g1",
            vec![record("A", "Alpha", 10.0), record("B", "Beta", 2.0)],
            &schema(),
        )
        .await;
    assert!(outcome.new_records.is_empty());
    assert!(outcome.replace_records.is_empty());
}
