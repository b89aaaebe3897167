// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::{ParseError, Url};

/// 将可能为相对路径的URL转换为绝对路径URL
pub fn resolve_url(base_url: &Url, path: &str) -> Result<Url, ParseError> {
    base_url.join(path)
}

/// 将详情链接解析为完整URL
///
/// 端点URL无法解析时原样返回链接，交由浏览器导航阶段报错
///
/// # 参数
///
/// * `endpoint_url` - 端点配置的源URL
/// * `href` - 从列表元素读取到的链接（可能为相对路径）
pub fn full_url(endpoint_url: &str, href: &str) -> String {
    let href = href.trim();
    match Url::parse(endpoint_url) {
        Ok(base) => resolve_url(&base, href)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| href.to_string()),
        Err(_) => href.to_string(),
    }
}

/// 获取URL的站点根地址（scheme://host[:port]）
///
/// 会话缓存以此为键
pub fn base_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let origin = parsed.origin();
            if origin.is_tuple() {
                origin.ascii_serialization()
            } else {
                url.to_string()
            }
        }
        Err(_) => url.to_string(),
    }
}
