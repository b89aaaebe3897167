// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::EndpointStatus;
use crate::domain::models::group::Group;
use crate::domain::models::scrape_result::ScrapeResult;
use crate::domain::repositories::group_repository::GroupRepository;
use crate::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::path::Path;
use tracing::{debug, info};

/// 内存抓取结果仓库
#[derive(Default)]
pub struct MemoryScrapeResultRepository {
    results: RwLock<Vec<ScrapeResult>>,
}

impl MemoryScrapeResultRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已保存的结果数
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

#[async_trait]
impl ScrapeResultRepository for MemoryScrapeResultRepository {
    async fn find_existing(
        &self,
        endpoint_id: &str,
        group_id: &str,
        unique_hash: &str,
    ) -> Result<Option<ScrapeResult>, RepositoryError> {
        Ok(self
            .results
            .read()
            .iter()
            .find(|r| {
                r.endpoint_id == endpoint_id && r.group_id == group_id && r.unique_hash == unique_hash
            })
            .cloned())
    }

    async fn insert_new(&self, results: &[ScrapeResult]) -> Result<(), RepositoryError> {
        self.results.write().extend_from_slice(results);
        debug!(count = results.len(), "Inserted scrape results");
        Ok(())
    }

    async fn replace_fields(&self, results: &[ScrapeResult]) -> Result<(), RepositoryError> {
        let mut stored = self.results.write();
        let positions = results
            .iter()
            .map(|replacement| {
                stored
                    .iter()
                    .position(|r| r.id == replacement.id)
                    .ok_or(RepositoryError::NotFound)
            })
            .collect::<Result<Vec<_>, _>>()?;
        for (replacement, position) in results.iter().zip(positions) {
            let existing = &mut stored[position];
            existing.fields = replacement.fields.clone();
            existing.timestamp_last_update = replacement.timestamp_last_update;
        }
        debug!(count = results.len(), "Replaced scrape result fields");
        Ok(())
    }

    async fn list_by_endpoint(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<Vec<ScrapeResult>, RepositoryError> {
        Ok(self
            .results
            .read()
            .iter()
            .filter(|r| r.group_id == group_id && r.endpoint_id == endpoint_id)
            .cloned()
            .collect())
    }
}

/// 内存分组仓库
#[derive(Default)]
pub struct MemoryGroupRepository {
    groups: RwLock<Vec<Group>>,
}

impl MemoryGroupRepository {
    pub fn new(groups: Vec<Group>) -> Self {
        Self {
            groups: RwLock::new(groups),
        }
    }

    /// 从 JSON 目录文件加载分组
    ///
    /// # 参数
    ///
    /// * `path` - 文件路径，内容为分组数组
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, RepositoryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let groups: Vec<Group> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), groups = groups.len(), "Loaded group catalogue");
        Ok(Self::new(groups))
    }
}

#[async_trait]
impl GroupRepository for MemoryGroupRepository {
    async fn find_group(&self, group_id: &str) -> Result<Option<Group>, RepositoryError> {
        Ok(self.groups.read().iter().find(|g| g.id == group_id).cloned())
    }

    async fn list_groups(&self) -> Result<Vec<Group>, RepositoryError> {
        Ok(self.groups.read().clone())
    }

    async fn update_endpoint_status(
        &self,
        group_id: &str,
        endpoint_id: &str,
        status: EndpointStatus,
        last_scraped: Option<DateTime<Utc>>,
    ) -> Result<(), RepositoryError> {
        let mut groups = self.groups.write();
        let endpoint = groups
            .iter_mut()
            .find(|g| g.id == group_id)
            .and_then(|g| g.endpoint_mut(endpoint_id))
            .ok_or(RepositoryError::NotFound)?;
        endpoint.status = status;
        if let Some(at) = last_scraped {
            endpoint.last_scraped = Some(at);
        }
        Ok(())
    }
}
