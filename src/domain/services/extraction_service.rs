// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::FieldSelector;
use crate::domain::models::group::{Field, FieldType};
use crate::domain::models::scrape_result::{FieldValue, ScrapeResultDetail};
use crate::engines::traits::ElementHandle;
use crate::utils::errors::ExtractionError;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static NON_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^0-9.,-]").expect("valid price regex"));

/// 单个字段的提取结果
///
/// 除字段值外还保留原始HTML和正则匹配组，供预览使用
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedField {
    pub detail: ScrapeResultDetail,
    /// 命中子元素的HTML
    pub raw_html: Option<String>,
    /// 正则的全部捕获组（第0项为整体匹配）
    pub regex_matches: Vec<String>,
}

struct CompiledSelector {
    selector: FieldSelector,
    field_type: FieldType,
    regex: Option<Regex>,
}

/// 字段提取器
///
/// 每次运行构造一次，正则只编译一次；无效正则记录一次告警，该字段取空值
pub struct FieldExtractor {
    selectors: Vec<CompiledSelector>,
}

impl FieldExtractor {
    /// 创建字段提取器
    ///
    /// # 参数
    ///
    /// * `selectors` - 端点的字段选择器（按顺序）
    /// * `schema` - 分组字段结构，用于确定字段类型
    pub fn new(selectors: &[FieldSelector], schema: &[Field]) -> Self {
        let selectors = selectors
            .iter()
            .filter_map(|selector| {
                let Some(field) = schema.iter().find(|f| f.id == selector.field_id) else {
                    warn!(
                        selector_id = %selector.id,
                        field_id = %selector.field_id,
                        "Selector references an unknown field, skipping"
                    );
                    return None;
                };

                let regex = selector.regex_pattern().and_then(|pattern| {
                    match compile_regex(pattern) {
                        Ok(re) => Some(re),
                        Err(e) => {
                            warn!(field_id = %selector.field_id, error = %e, "Field regex disabled");
                            None
                        }
                    }
                });

                Some(CompiledSelector {
                    selector: selector.clone(),
                    field_type: field.field_type,
                    regex,
                })
            })
            .collect();

        Self { selectors }
    }

    pub fn is_empty(&self) -> bool {
        self.selectors.is_empty()
    }

    /// 从根元素提取所有字段值
    pub async fn extract(&self, root: &dyn ElementHandle) -> Vec<ScrapeResultDetail> {
        self.extract_with(root, false)
            .await
            .into_iter()
            .map(|field| field.detail)
            .collect()
    }

    /// 从根元素提取所有字段值，并附带原始HTML和正则匹配组
    pub async fn extract_detailed(&self, root: &dyn ElementHandle) -> Vec<ExtractedField> {
        self.extract_with(root, true).await
    }

    /// 按顺序提取字段；`with_raw` 为真时额外读取命中元素的HTML
    pub async fn extract_with(&self, root: &dyn ElementHandle, with_raw: bool) -> Vec<ExtractedField> {
        let mut fields = Vec::with_capacity(self.selectors.len());
        for compiled in &self.selectors {
            fields.push(self.extract_one(root, compiled, with_raw).await);
        }
        fields
    }

    async fn extract_one(
        &self,
        root: &dyn ElementHandle,
        compiled: &CompiledSelector,
        with_raw: bool,
    ) -> ExtractedField {
        let selector = &compiled.selector;
        let attribute = selector.attribute();
        let mut text = String::new();
        let mut raw_html = None;

        match root.find(&selector.selector).await {
            Ok(Some(element)) => {
                text = match attribute {
                    Some(name) => element.attribute(name).await.ok().flatten().unwrap_or_default(),
                    None => element.text_content().await.unwrap_or_default(),
                };
                if with_raw {
                    raw_html = element.outer_html().await.ok();
                }
            }
            Ok(None) => {}
            Err(e) => {
                debug!(selector = %selector.selector, error = %e, "Field selector query failed");
            }
        }

        // Selectors may target the root element itself.
        if text.trim().is_empty() {
            if let Some(name) = attribute {
                text = root.attribute(name).await.ok().flatten().unwrap_or_default();
            }
        }

        let mut regex_matches = Vec::new();
        if let Some(re) = &compiled.regex {
            let (value, groups) = match_with_regex(re, &text, selector.regex_match_index_to_use)
                .unwrap_or_default();
            text = value;
            regex_matches = groups;
        }

        let text = text.trim();
        let value = match compiled.field_type {
            FieldType::Number => FieldValue::Number(cast_price_string_to_float(text)),
            _ => FieldValue::Text(text.to_string()),
        };

        ExtractedField {
            detail: ScrapeResultDetail::new(&selector.field_id, value),
            raw_html,
            regex_matches,
        }
    }
}

fn compile_regex(pattern: &str) -> Result<Regex, ExtractionError> {
    Regex::new(pattern).map_err(|source| ExtractionError::InvalidRegex {
        pattern: pattern.to_string(),
        source,
    })
}

fn match_with_regex(
    re: &Regex,
    input: &str,
    index: usize,
) -> Result<(String, Vec<String>), ExtractionError> {
    let input = input.replace('\u{00A0}', " ");
    let caps = re.captures(&input).ok_or(ExtractionError::NoMatch)?;

    let groups: Vec<String> = caps
        .iter()
        .map(|m| m.map(|m| m.as_str().to_string()).unwrap_or_default())
        .collect();

    let value = if index < groups.len() {
        groups[index].clone()
    } else {
        groups.first().cloned().unwrap_or_default()
    };
    Ok((value, groups))
}

/// 用正则从字符串中提取值
///
/// 先将不间断空格替换为普通空格；序号超出捕获组范围时返回整体匹配
///
/// # 返回值
///
/// * `Ok(String)` - 提取到的值
/// * `Err(ExtractionError)` - 正则无效或没有匹配
pub fn extract_with_regex(input: &str, pattern: &str, index: usize) -> Result<String, ExtractionError> {
    let re = compile_regex(pattern)?;
    match_with_regex(&re, input, index).map(|(value, _)| value)
}

/// 将价格字符串解析为浮点数，保留两位小数
///
/// 去掉数字、`.`、`,`、`-` 以外的字符后，根据分隔符出现次数判断千分位与小数点：
/// 多个 `.` 视为千分位（逗号为小数点）；多个 `,` 视为千分位；
/// 各有一个时后出现的为小数点；只有一个逗号时视为小数点；
/// 只有一个点且其后超过两位数字时视为千分位。无法解析时返回 0.0
pub fn cast_price_string_to_float(price: &str) -> f64 {
    let mut cleaned = NON_NUMERIC.replace_all(price, "").into_owned();

    let dots = cleaned.matches('.').count();
    let commas = cleaned.matches(',').count();

    if dots > 1 {
        cleaned = cleaned.replace('.', "").replacen(',', ".", 1);
    } else if commas > 1 {
        cleaned = cleaned.replace(',', "");
    } else if commas == 1 && dots == 1 {
        let last_dot = cleaned.rfind('.');
        let last_comma = cleaned.rfind(',');
        if last_dot > last_comma {
            cleaned = cleaned.replace(',', "");
        } else {
            cleaned = cleaned.replace('.', "").replacen(',', ".", 1);
        }
    } else if commas == 1 {
        cleaned = cleaned.replacen(',', ".", 1);
    } else if dots == 1 {
        let decimals = cleaned.split('.').nth(1).map(str::len).unwrap_or(0);
        if decimals > 2 {
            cleaned = cleaned.replace('.', "");
        }
    }

    match cleaned.parse::<f64>() {
        Ok(value) if value.is_finite() => (value * 100.0).round() / 100.0,
        _ => 0.0,
    }
}
