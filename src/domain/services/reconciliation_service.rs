// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::group::{field_type_of, unique_identifier_field, Field, FieldType};
use crate::domain::models::scrape_result::{ExtractedRecord, ScrapeResult, ScrapeResultDetail};
use crate::domain::repositories::scrape_result_repository::ScrapeResultRepository;
use chrono::Utc;
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, warn};
use uuid::Uuid;

/// 单条记录的对账结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// 存储中不存在
    New,
    /// 已存在且无变化，丢弃
    Unchanged,
    /// 已存在但字段有变化，需要原地更新
    NeedsReplace { existing_id: Uuid },
}

/// 对账结果
#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub new_records: Vec<ScrapeResult>,
    pub replace_records: Vec<ScrapeResult>,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.new_records.is_empty() && self.replace_records.is_empty()
    }
}

/// 计算记录内容哈希：sha256(端点ID + 唯一标识值) 的十六进制串
pub fn scrape_result_hash(endpoint_id: &str, unique_value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(endpoint_id.as_bytes());
    hasher.update(unique_value.as_bytes());
    hex::encode(hasher.finalize())
}

/// 将新提取的字段与已保存的记录比较
///
/// 唯一标识字段和 link 类型字段不参与比较；
/// image 字段新值为空而旧值非空时视为未变化；只比较两边都存在的字段
pub fn classify(
    existing: Option<&ScrapeResult>,
    candidate: &[ScrapeResultDetail],
    schema: &[Field],
) -> Reconciliation {
    let Some(existing) = existing else {
        return Reconciliation::New;
    };

    let unique_field_id = unique_identifier_field(schema).map(|f| f.id.as_str());

    let changed = candidate.iter().any(|new_detail| {
        if Some(new_detail.field_id.as_str()) == unique_field_id {
            return false;
        }
        let Some(old_value) = existing.value_of(&new_detail.field_id) else {
            return false;
        };
        match field_type_of(schema, &new_detail.field_id) {
            Some(FieldType::Link) => false,
            Some(FieldType::Image) if new_detail.value.is_empty() && !old_value.is_empty() => false,
            _ => &new_detail.value != old_value,
        }
    });

    if changed {
        Reconciliation::NeedsReplace {
            existing_id: existing.id,
        }
    } else {
        Reconciliation::Unchanged
    }
}

/// 对账服务
///
/// 将提取到的记录划分为新记录和需要替换的记录，本身不写入存储
pub struct ReconciliationService<R> {
    repo: Arc<R>,
}

impl<R: ScrapeResultRepository> ReconciliationService<R> {
    pub fn new(repo: Arc<R>) -> Self {
        Self { repo }
    }

    /// 对一批提取记录进行对账
    ///
    /// # 参数
    ///
    /// * `endpoint_id` - 端点ID
    /// * `group_id` - 分组ID
    /// * `records` - 本次运行提取到的记录（顺序无关）
    /// * `schema` - 分组字段结构
    ///
    /// # 返回值
    ///
    /// 新记录与需要替换的记录；唯一标识为空、批内重复、存储查询失败的记录均被丢弃
    pub async fn reconcile(
        &self,
        endpoint_id: &str,
        group_id: &str,
        records: Vec<ExtractedRecord>,
        schema: &[Field],
    ) -> ReconcileOutcome {
        let mut outcome = ReconcileOutcome::default();

        let Some(unique_field) = unique_identifier_field(schema) else {
            warn!(
                group_id = %group_id,
                endpoint_id = %endpoint_id,
                records = records.len(),
                "Schema has no unique identifier field, nothing can be reconciled"
            );
            return outcome;
        };

        let mut seen = HashSet::new();

        for record in records {
            let unique_value = record
                .value_of(&unique_field.id)
                .map(|v| v.to_string())
                .unwrap_or_default();
            if unique_value.trim().is_empty() {
                warn!(
                    endpoint_id = %endpoint_id,
                    source_url = record.source_url.as_deref().unwrap_or(""),
                    "Unique identifier is empty, skipping record"
                );
                continue;
            }

            let hash = scrape_result_hash(endpoint_id, &unique_value);
            if !seen.insert(hash.clone()) {
                debug!(endpoint_id = %endpoint_id, hash = %hash, "Duplicate record in batch, dropping");
                continue;
            }

            let existing = match self.repo.find_existing(endpoint_id, group_id, &hash).await {
                Ok(existing) => existing,
                Err(e) => {
                    let replay = serde_json::to_string(&record.fields).unwrap_or_default();
                    error!(
                        group_id = %group_id,
                        endpoint_id = %endpoint_id,
                        hash = %hash,
                        fields = %replay,
                        error = %e,
                        "Failed to look up existing scrape result, dropping record"
                    );
                    continue;
                }
            };

            match classify(existing.as_ref(), &record.fields, schema) {
                Reconciliation::New => {
                    outcome
                        .new_records
                        .push(ScrapeResult::new(endpoint_id, group_id, hash, record.fields));
                }
                Reconciliation::NeedsReplace { existing_id } => {
                    let mut replacement =
                        ScrapeResult::new(endpoint_id, group_id, hash, record.fields);
                    replacement.id = existing_id;
                    if let Some(existing) = existing {
                        replacement.timestamp_initial = existing.timestamp_initial;
                    }
                    replacement.timestamp_last_update = Utc::now();
                    outcome.replace_records.push(replacement);
                }
                Reconciliation::Unchanged => {}
            }
        }

        debug!(
            endpoint_id = %endpoint_id,
            new = outcome.new_records.len(),
            replace = outcome.replace_records.len(),
            "Reconciliation finished"
        );
        outcome
    }
}
