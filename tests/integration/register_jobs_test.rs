// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use super::helpers::{detail_endpoint, seed_shop, shop_group, TestApp};
use scrapewatch::application::use_cases::register_jobs::register_group_jobs;
use scrapewatch::queue::scheduler::{FireOutcome, JobScheduler, JobStatus};
use scrapewatch::workers::pool::WorkerPool;
use std::sync::Arc;
use std::time::Duration;

fn scheduler() -> JobScheduler {
    JobScheduler::new(Arc::new(WorkerPool::new(2, 2)), Duration::ZERO)
}

#[tokio::test]
async fn test_registers_one_job_per_scheduled_endpoint() {
    let mut inactive = detail_endpoint("e2", "@daily");
    inactive.active = false;
    let mut archived = shop_group("g2", vec![detail_endpoint("e1", "@hourly")]);
    archived.is_archived = true;

    let app = TestApp::new(vec![
        shop_group(
            "g1",
            vec![
                detail_endpoint("e1", "*/30 * * * *"),
                inactive,
                detail_endpoint("e3", ""),
                detail_endpoint("e4", "every now and then"),
            ],
        ),
        archived,
    ]);

    let scheduler = scheduler();
    let registered = register_group_jobs(&scheduler, app.use_case.clone())
        .await
        .unwrap();

    assert_eq!(registered, 2);
    assert!(scheduler.get_job("g1", "e1").unwrap().active);
    assert!(!scheduler.get_job("g1", "e2").unwrap().active);
    assert!(scheduler.get_job("g1", "e3").is_none());
    assert!(scheduler.get_job("g1", "e4").is_none());
    assert!(scheduler.get_job("g2", "e1").is_none());
    scheduler.stop().await;
}

#[tokio::test]
async fn test_triggered_job_scrapes_and_stores() {
    let app = TestApp::new(vec![shop_group("g1", vec![detail_endpoint("e1", "@every 1h")])]);
    seed_shop(&app.engine);

    let scheduler = scheduler();
    register_group_jobs(&scheduler, app.use_case.clone())
        .await
        .unwrap();

    assert_eq!(scheduler.trigger_now("g1", "e1"), FireOutcome::Submitted);
    for _ in 0..200 {
        let idle = scheduler.get_job("g1", "e1").map(|j| j.status) == Some(JobStatus::Idle);
        if idle && app.results.len() == 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(app.results.len(), 3);
    assert!(scheduler.get_job("g1", "e1").unwrap().last_run.is_some());

    // deleting the endpoint removes its job
    scheduler.destroy_job("g1", "e1").await;
    assert!(scheduler.jobs().is_empty());
    scheduler.stop().await;
}
