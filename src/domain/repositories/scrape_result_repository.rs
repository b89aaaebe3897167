// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::scrape_result::ScrapeResult;
use crate::utils::errors::RepositoryError;
use async_trait::async_trait;

/// 爬取结果仓库特质
///
/// 定义爬取结果数据访问接口
#[async_trait]
pub trait ScrapeResultRepository: Send + Sync {
    /// 按 (端点, 分组, 内容哈希) 查找已保存的结果
    async fn find_existing(
        &self,
        endpoint_id: &str,
        group_id: &str,
        unique_hash: &str,
    ) -> Result<Option<ScrapeResult>, RepositoryError>;

    /// 批量插入新结果
    async fn insert_new(&self, results: &[ScrapeResult]) -> Result<(), RepositoryError>;

    /// 批量替换已有结果的字段值，保留初始时间戳
    async fn replace_fields(&self, results: &[ScrapeResult]) -> Result<(), RepositoryError>;

    /// 列出某端点的全部结果
    async fn list_by_endpoint(
        &self,
        group_id: &str,
        endpoint_id: &str,
    ) -> Result<Vec<ScrapeResult>, RepositoryError>;
}
