// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::utils::errors::ConfigError;
use chrono::{DateTime, Utc};
use std::str::FromStr;
use std::time::Duration;

const EVERY_PREFIX: &str = "@every";
const MIN_EVERY: Duration = Duration::from_secs(1);
const WEEKDAY_NAMES: [&str; 7] = ["SUN", "MON", "TUE", "WED", "THU", "FRI", "SAT"];

/// 定时表达式
///
/// 支持：
/// - 5 段 cron（自动补秒字段 `0`，星期按标准 crontab 取 0-7，0 和 7 都是周日）
/// - 带秒的 6/7 段 cron
/// - `@yearly`、`@monthly`、`@weekly`、`@daily`、`@hourly`
/// - `@every <duration>`，例如 `90s`、`15m`、`1h30m`，不足 1 秒按 1 秒处理
#[derive(Debug, Clone)]
pub enum IntervalSchedule {
    Cron(Box<cron::Schedule>),
    Every(Duration),
}

impl IntervalSchedule {
    /// 解析定时表达式
    pub fn parse(expression: &str) -> Result<Self, ConfigError> {
        let trimmed = expression.trim();
        let invalid = |reason: String| ConfigError::InvalidInterval {
            expression: expression.to_string(),
            reason,
        };

        if trimmed.is_empty() {
            return Err(invalid("empty expression".to_string()));
        }

        if let Some(rest) = trimmed.strip_prefix(EVERY_PREFIX) {
            let every = parse_go_duration(rest.trim()).map_err(invalid)?;
            return Ok(IntervalSchedule::Every(every));
        }

        let normalized = if trimmed.starts_with('@') {
            trimmed.to_string()
        } else {
            match trimmed.split_whitespace().count() {
                5 => standard_crontab(trimmed).map_err(invalid)?,
                6 | 7 => trimmed.to_string(),
                n => return Err(invalid(format!("expected 5, 6 or 7 fields, got {}", n))),
            }
        };

        cron::Schedule::from_str(&normalized)
            .map(|schedule| IntervalSchedule::Cron(Box::new(schedule)))
            .map_err(|e| invalid(e.to_string()))
    }

    /// 距下一次触发的等待时间，没有后续触发时返回 `None`
    pub fn next_delay(&self, now: DateTime<Utc>) -> Option<Duration> {
        match self {
            IntervalSchedule::Every(every) => Some(*every),
            IntervalSchedule::Cron(schedule) => schedule
                .after(&now)
                .next()
                .map(|next| (next - now).to_std().unwrap_or(Duration::ZERO)),
        }
    }
}

/// 解析 Go 风格的时长（`300ms`、`1.5h`、`2h45m`）
fn parse_go_duration(input: &str) -> Result<Duration, String> {
    if input.is_empty() {
        return Err("missing duration after @every".to_string());
    }

    let mut total = 0f64;
    let mut rest = input;
    while !rest.is_empty() {
        let number_len = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if number_len == 0 {
            return Err(format!("invalid duration '{}'", input));
        }
        let value: f64 = rest[..number_len]
            .parse()
            .map_err(|_| format!("invalid number in duration '{}'", input))?;
        rest = &rest[number_len..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit() || c == '.')
            .unwrap_or(rest.len());
        let seconds_per_unit = match &rest[..unit_len] {
            "ns" => 1e-9,
            "us" | "µs" => 1e-6,
            "ms" => 1e-3,
            "s" => 1.0,
            "m" => 60.0,
            "h" => 3600.0,
            "" => return Err(format!("missing unit in duration '{}'", input)),
            unit => return Err(format!("unknown unit '{}' in duration '{}'", unit, input)),
        };
        rest = &rest[unit_len..];
        total += value * seconds_per_unit;
    }

    if total <= 0.0 || !total.is_finite() {
        return Err(format!("duration '{}' must be positive", input));
    }
    let every = Duration::try_from_secs_f64(total)
        .map_err(|e| format!("duration '{}' out of range: {}", input, e))?;
    Ok(every.max(MIN_EVERY))
}

/// 5 段 crontab 转为带秒字段的表达式
///
/// 星期字段中的数字（0-7，周日为 0 或 7）改写为英文缩写
fn standard_crontab(expression: &str) -> Result<String, String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    let [minute, hour, day_of_month, month, day_of_week] = fields.as_slice() else {
        return Err(format!("expected 5 fields, got {}", fields.len()));
    };
    let weekdays = day_of_week
        .split(',')
        .map(weekday_item)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!(
        "0 {} {} {} {} {}",
        minute,
        hour,
        day_of_month,
        month,
        weekdays.join(",")
    ))
}

fn weekday_item(item: &str) -> Result<String, String> {
    let (base, step) = match item.split_once('/') {
        Some((base, step)) => {
            let step: usize = step
                .parse()
                .map_err(|_| format!("invalid weekday step in '{}'", item))?;
            if step == 0 {
                return Err(format!("weekday step must be positive in '{}'", item));
            }
            (base, Some(step))
        }
        None => (item, None),
    };

    let bounds = if base == "*" || base == "?" {
        if step.is_none() {
            return Ok(item.to_string());
        }
        Some((0, 6))
    } else if let Some((low, high)) = base.split_once('-') {
        low.parse::<usize>().ok().zip(high.parse::<usize>().ok())
    } else {
        base.parse::<usize>()
            .ok()
            .map(|day| (day, if step.is_some() { 6 } else { day }))
    };

    // named weekdays pass through unchanged
    let Some((low, high)) = bounds else {
        return Ok(item.to_string());
    };
    if low > 7 || high > 7 || low > high {
        return Err(format!("weekday '{}' out of range 0-7", item));
    }

    let mut days: Vec<usize> = (low..=high)
        .step_by(step.unwrap_or(1))
        .map(|day| day % 7)
        .collect();
    days.sort_unstable();
    days.dedup();
    Ok(days
        .into_iter()
        .map(|day| WEEKDAY_NAMES[day])
        .collect::<Vec<_>>()
        .join(","))
}
