// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// 字段值
///
/// 数字字段经过价格解析后保存为浮点数，其他字段保存为字符串
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    pub fn text(value: impl Into<String>) -> Self {
        FieldValue::Text(value.into())
    }

    /// 文本值是否为空（数字永远视为非空）
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Text(s) => s.is_empty(),
            FieldValue::Number(_) => false,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            FieldValue::Number(_) => None,
        }
    }
}

impl Default for FieldValue {
    fn default() -> Self {
        FieldValue::Text(String::new())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Number(n) => write!(f, "{}", n),
        }
    }
}

/// 单个字段的抓取值
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResultDetail {
    pub id: String,
    pub field_id: String,
    pub value: FieldValue,
}

impl ScrapeResultDetail {
    pub fn new(field_id: &str, value: FieldValue) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            field_id: field_id.to_string(),
            value,
        }
    }
}

/// 一次提取得到的记录（尚未与存储对账）
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedRecord {
    pub fields: Vec<ScrapeResultDetail>,
    /// 详情页地址，存在时会覆盖链接字段
    pub source_url: Option<String>,
}

impl ExtractedRecord {
    pub fn value_of(&self, field_id: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|d| d.field_id == field_id)
            .map(|d| &d.value)
    }

    /// 设置字段值，字段不存在时追加
    pub fn set_value(&mut self, field_id: &str, value: FieldValue) {
        match self.fields.iter_mut().find(|d| d.field_id == field_id) {
            Some(detail) => detail.value = value,
            None => self.fields.push(ScrapeResultDetail::new(field_id, value)),
        }
    }
}

/// 已保存的抓取结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapeResult {
    pub id: Uuid,
    /// sha256(端点ID + 唯一标识值)
    pub unique_hash: String,
    pub endpoint_id: String,
    pub group_id: String,
    pub fields: Vec<ScrapeResultDetail>,
    pub timestamp_initial: DateTime<Utc>,
    pub timestamp_last_update: DateTime<Utc>,
}

impl ScrapeResult {
    pub fn new(
        endpoint_id: &str,
        group_id: &str,
        unique_hash: String,
        fields: Vec<ScrapeResultDetail>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            unique_hash,
            endpoint_id: endpoint_id.to_string(),
            group_id: group_id.to_string(),
            fields,
            timestamp_initial: now,
            timestamp_last_update: now,
        }
    }

    pub fn value_of(&self, field_id: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .find(|d| d.field_id == field_id)
            .map(|d| &d.value)
    }
}
