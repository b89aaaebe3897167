// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::Endpoint;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 唯一标识字段的键，其值参与记录内容哈希
pub const UNIQUE_IDENTIFIER_KEY: &str = "unique_identifier";

/// 链接字段的键
pub const LINK_FIELD_KEY: &str = "link";

/// 字段类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    #[default]
    Text,
    Number,
    Link,
    Image,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldType::Text => write!(f, "text"),
            FieldType::Number => write!(f, "number"),
            FieldType::Link => write!(f, "link"),
            FieldType::Image => write!(f, "image"),
        }
    }
}

/// 分组字段定义
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: String,
    pub name: String,
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// 是否允许用户完全编辑（保留字段不可编辑）
    #[serde(default = "default_true")]
    pub is_fully_editable: bool,
}

fn default_true() -> bool {
    true
}

impl Field {
    pub fn new(id: &str, name: &str, key: &str, field_type: FieldType) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            key: key.to_string(),
            field_type,
            is_fully_editable: true,
        }
    }

    pub fn is_unique_identifier(&self) -> bool {
        self.key == UNIQUE_IDENTIFIER_KEY
    }
}

/// 抓取分组
///
/// 持有字段结构和一组端点，分组内所有端点共享同一字段结构
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    /// 已归档的分组不会注册定时任务
    #[serde(default)]
    pub is_archived: bool,
}

impl Group {
    pub fn endpoint(&self, endpoint_id: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.id == endpoint_id)
    }

    pub fn endpoint_mut(&mut self, endpoint_id: &str) -> Option<&mut Endpoint> {
        self.endpoints.iter_mut().find(|e| e.id == endpoint_id)
    }
}

/// 查找唯一标识字段
pub fn unique_identifier_field(schema: &[Field]) -> Option<&Field> {
    schema.iter().find(|f| f.is_unique_identifier())
}

/// 查找链接字段：类型为 link 且键为 `link` 或名称为 `Link`
pub fn link_field(schema: &[Field]) -> Option<&Field> {
    schema
        .iter()
        .find(|f| f.field_type == FieldType::Link && (f.key == LINK_FIELD_KEY || f.name == "Link"))
}

/// 按字段ID查找字段类型
pub fn field_type_of(schema: &[Field], field_id: &str) -> Option<FieldType> {
    schema
        .iter()
        .find(|f| f.id == field_id)
        .map(|f| f.field_type)
}
