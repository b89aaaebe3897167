// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::endpoint::{PaginationConfig, PaginationType};
use regex::{NoExpand, Regex};

const DEFAULT_PATH_REGEX: &str = r"\d+";

/// 构造分页URL
///
/// # 参数
///
/// * `base_url` - 端点配置的源URL
/// * `config` - 分页配置
/// * `page` - 页码
///
/// # 返回值
///
/// 对应页码的完整URL；无分页时返回原URL
pub fn build_pagination_url(base_url: &str, config: &PaginationConfig, page: i64) -> String {
    match config.pagination_type {
        PaginationType::None => base_url.to_string(),
        PaginationType::UrlParameter => with_query_parameter(base_url, &config.parameter, page),
        PaginationType::UrlPath => with_path_page(base_url, config, page),
    }
}

/// 设置查询参数：已存在时替换其值，否则追加
fn with_query_parameter(base_url: &str, parameter: &str, page: i64) -> String {
    if parameter.is_empty() {
        return base_url.to_string();
    }

    let (without_fragment, fragment) = match base_url.find('#') {
        Some(idx) => base_url.split_at(idx),
        None => (base_url, ""),
    };

    let pattern = format!(r"([?&]){}=[^&#]*", regex::escape(parameter));
    if let Ok(re) = Regex::new(&pattern) {
        if re.is_match(without_fragment) {
            let replaced = re.replace(without_fragment, |caps: &regex::Captures| {
                format!("{}{}={}", &caps[1], parameter, page)
            });
            return format!("{}{}", replaced, fragment);
        }
    }

    let separator = if without_fragment.contains('?') {
        if without_fragment.ends_with('?') || without_fragment.ends_with('&') {
            ""
        } else {
            "&"
        }
    } else {
        "?"
    };
    format!(
        "{}{}{}={}{}",
        without_fragment, separator, parameter, page, fragment
    )
}

/// 路径分页：用 `{parameter}{page}` 替换所有匹配正则的片段
fn with_path_page(base_url: &str, config: &PaginationConfig, page: i64) -> String {
    let pattern = config
        .url_regex_to_insert
        .as_deref()
        .filter(|p| !p.trim().is_empty())
        .unwrap_or(DEFAULT_PATH_REGEX);

    match Regex::new(pattern) {
        Ok(re) => {
            let replacement = format!("{}{}", config.parameter, page);
            re.replace_all(base_url, NoExpand(&replacement)).into_owned()
        }
        Err(e) => {
            tracing::warn!(pattern = %pattern, error = %e, "Invalid pagination regex, using base URL");
            base_url.to_string()
        }
    }
}
