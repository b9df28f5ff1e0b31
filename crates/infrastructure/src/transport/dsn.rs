use std::collections::BTreeMap;
use std::fmt;

use cadence_core::{SchedulerError, SchedulerResult};

const MEMBER_DELIMITERS: [&str; 3] = ["||", "&&", "<>"];

/// 传输层 DSN
///
/// 简单形式为 `scheme://host?key=value`，组合形式在括号内嵌套成员 DSN：
/// `failover://(memory://fifo || fs://fifo?path=/tmp)`。
/// 成员之间可以使用 `||`、`&&` 或 `<>` 分隔。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dsn {
    scheme: String,
    host: String,
    options: BTreeMap<String, String>,
    members: Vec<Dsn>,
}

impl Dsn {
    pub fn parse(input: &str) -> SchedulerResult<Self> {
        let input = input.trim();
        let (scheme, rest) = input
            .split_once("://")
            .ok_or_else(|| invalid(input, "缺少 scheme"))?;
        if scheme.is_empty() {
            return Err(invalid(input, "缺少 scheme"));
        }

        let (host, members, query) = if let Some(inner) = rest.strip_prefix('(') {
            let close = matching_paren(inner).ok_or_else(|| invalid(input, "括号不匹配"))?;
            let members = split_members(&inner[..close])
                .into_iter()
                .map(Dsn::parse)
                .collect::<SchedulerResult<Vec<_>>>()?;
            let remainder = &inner[close + 1..];
            let query = match remainder.trim() {
                "" => "",
                other => other
                    .strip_prefix('?')
                    .ok_or_else(|| invalid(input, "成员列表之后只能跟查询参数"))?,
            };
            (String::new(), members, query)
        } else {
            let (host, query) = rest.split_once('?').unwrap_or((rest, ""));
            (host.to_string(), Vec::new(), query)
        };

        Ok(Self {
            scheme: scheme.to_ascii_lowercase(),
            host,
            options: parse_query(query),
            members,
        })
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn option(&self, key: &str) -> Option<&str> {
        self.options.get(key).map(String::as_str)
    }

    pub fn members(&self) -> &[Dsn] {
        &self.members
    }

    pub fn is_compound(&self) -> bool {
        !self.members.is_empty()
    }
}

impl fmt::Display for Dsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://", self.scheme)?;
        if self.members.is_empty() {
            write!(f, "{}", self.host)?;
        } else {
            let members: Vec<String> = self.members.iter().map(ToString::to_string).collect();
            write!(f, "({})", members.join(" || "))?;
        }
        if !self.options.is_empty() {
            let query: Vec<String> = self
                .options
                .iter()
                .map(|(key, value)| format!("{key}={value}"))
                .collect();
            write!(f, "?{}", query.join("&"))?;
        }
        Ok(())
    }
}

fn invalid(input: &str, reason: &str) -> SchedulerError {
    SchedulerError::InvalidArgument(format!("无效的传输层 DSN \"{input}\": {reason}"))
}

/// 与开头 `(` 匹配的 `)` 在 `inner` 中的位置
fn matching_paren(inner: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (index, ch) in inner.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' if depth == 0 => return Some(index),
            ')' => depth -= 1,
            _ => {}
        }
    }
    None
}

/// 按顶层分隔符拆分成员，嵌套括号内的分隔符保持不变
fn split_members(inner: &str) -> Vec<&str> {
    let mut members = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    let mut index = 0;

    while index < inner.len() {
        let rest = &inner[index..];
        if depth == 0 {
            if let Some(delimiter) = MEMBER_DELIMITERS.iter().find(|d| rest.starts_with(**d)) {
                members.push(inner[start..index].trim());
                index += delimiter.len();
                start = index;
                continue;
            }
        }
        let ch = rest.chars().next().unwrap_or_default();
        match ch {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
        index += ch.len_utf8().max(1);
    }
    members.push(inner[start..].trim());

    members.into_iter().filter(|member| !member.is_empty()).collect()
}

fn parse_query(query: &str) -> BTreeMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) => (key.trim().to_string(), value.trim().to_string()),
            None => (pair.trim().to_string(), String::new()),
        })
        .collect()
}
