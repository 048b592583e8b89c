//! hosts 文件合并
//!
//! 删除上一次写入的托管块以及即将重写的域名的旧条目，
//! 在文件末尾追加新的托管块，其余行原样保留、顺序不变。

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{FixedOffset, Utc};
use tracing::{debug, info, warn};

use crate::common::SetHostsError;

/// 托管块的起止标记
pub const BLOCK_START: &str = "# cnNetTool Start";
pub const BLOCK_END: &str = "# cnNetTool End";

/// 以这些前缀开头的注释行都属于本工具
pub const MARKER_PREFIXES: &[&str] = &["# cnNetTool", "# Update", "# Star", "# GitHub"];

const UTC_PLUS_8_SECS: i32 = 8 * 3600;

pub const ATTRIBUTION: &str = "# GitHub: https://github.com/sinspired/cnNetTool";

/// 一条待写入的 `IP 域名` 记录
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HostsEntry {
    pub ip: String,
    pub domain: String,
}

impl HostsEntry {
    pub fn new(ip: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            ip: ip.into(),
            domain: domain.into(),
        }
    }
}

impl fmt::Display for HostsEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.ip, self.domain)
    }
}

/// 按 IP 长度补制表符，让域名列对齐
pub fn format_entry(entry: &HostsEntry) -> String {
    let tabs = match entry.ip.len() {
        0..=8 => "\t\t\t",
        9..=10 => "\t\t",
        _ => "\t",
    };
    format!("{}{}{}", entry.ip, tabs, entry.domain)
}

/// 东八区时间，形如 `2024-11-11 08:00:00 +08:00`
pub fn update_timestamp() -> String {
    let offset = FixedOffset::east_opt(UTC_PLUS_8_SECS).expect("UTC+8 offset is in range");
    Utc::now()
        .with_timezone(&offset)
        .format("%Y-%m-%d %H:%M:%S %:z")
        .to_string()
}

fn is_marker(trimmed: &str) -> bool {
    MARKER_PREFIXES.iter().any(|p| trimmed.starts_with(p))
}

fn is_block_start(trimmed: &str) -> bool {
    trimmed.starts_with(BLOCK_START)
}

fn is_block_end(trimmed: &str) -> bool {
    trimmed.starts_with(BLOCK_END)
}

/// 计算每一行是否属于托管区域（托管块、零散标记行及其相邻空行）
fn managed_mask(lines: &[&str]) -> Vec<bool> {
    let mut managed = vec![false; lines.len()];
    let mut i = 0;

    while i < lines.len() {
        let trimmed = lines[i].trim();
        if !is_marker(trimmed) {
            i += 1;
            continue;
        }

        let start = i;
        let mut end = i;
        if is_block_start(trimmed) {
            // 结束标记只在下一个起始标记之前查找，不能借用后面那个块的结束标记
            let mut search = lines[i + 1..]
                .iter()
                .take_while(|l| !is_block_start(l.trim()));
            match search.position(|l| is_block_end(l.trim())) {
                Some(offset) => end = i + 1 + offset,
                None => {
                    // 没有结束标记：只吞掉紧随其后的空行与注释
                    while end + 1 < lines.len() {
                        let next = lines[end + 1].trim();
                        if next.is_empty() || next.starts_with('#') {
                            end += 1;
                        } else {
                            break;
                        }
                    }
                }
            }
        }

        for flag in &mut managed[start..=end] {
            *flag = true;
        }

        // 相邻空行一并删除
        let mut before = start;
        while before > 0 && lines[before - 1].trim().is_empty() {
            before -= 1;
            managed[before] = true;
        }
        let mut after = end + 1;
        while after < lines.len() && lines[after].trim().is_empty() {
            managed[after] = true;
            after += 1;
        }

        i = after;
    }

    managed
}

/// 旧条目判定：非注释行且第二个字段是即将写入的域名
fn is_stale_entry(line: &str, domains: &HashSet<&str>) -> bool {
    let trimmed = line.trim();
    if trimmed.starts_with('#') {
        return false;
    }
    let mut parts = trimmed.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some(_), Some(domain)) => domains.contains(domain),
        _ => false,
    }
}

/// 纯文本合并：返回新的 hosts 内容
pub fn merge_hosts(existing: &str, entries: &[HostsEntry], timestamp: &str) -> String {
    let domains: HashSet<&str> = entries.iter().map(|e| e.domain.as_str()).collect();
    let lines: Vec<&str> = existing.lines().collect();
    let managed = managed_mask(&lines);

    let mut out: Vec<String> = Vec::with_capacity(lines.len() + entries.len() + 6);
    for (line, is_managed) in lines.iter().zip(managed) {
        if is_managed {
            continue;
        }
        if is_stale_entry(line, &domains) {
            debug!(line = *line, "dropping stale hosts entry");
            continue;
        }
        out.push(line.to_string());
    }

    while out.last().map_or(false, |l| l.trim().is_empty()) {
        out.pop();
    }
    if !out.is_empty() {
        out.push(String::new());
    }

    out.push(BLOCK_START.to_string());
    out.extend(entries.iter().map(format_entry));
    out.push(String::new());
    out.push(format!("# Update time: {}", timestamp));
    out.push(ATTRIBUTION.to_string());
    out.push(BLOCK_END.to_string());

    let mut content = out.join("\n");
    content.push('\n');
    content
}

/// 系统 hosts 文件写入器
pub struct HostsMerger {
    path: PathBuf,
}

impl HostsMerger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".bak");
        PathBuf::from(name)
    }

    /// 备份后重写 hosts 文件。读写失败是致命错误
    pub fn apply(&self, entries: &[HostsEntry]) -> Result<(), SetHostsError> {
        self.backup();

        let existing = std::fs::read_to_string(&self.path).map_err(|source| {
            SetHostsError::HostsRead {
                path: self.path.clone(),
                source,
            }
        })?;

        let content = merge_hosts(&existing, entries, &update_timestamp());
        std::fs::write(&self.path, content.as_bytes()).map_err(|source| {
            SetHostsError::HostsWrite {
                path: self.path.clone(),
                source,
            }
        })?;

        for entry in entries {
            info!(entry = %format_entry(entry), "hosts entry written");
        }
        info!(path = %self.path.display(), entries = entries.len(), "hosts file updated");
        Ok(())
    }

    fn backup(&self) {
        if !self.path.exists() {
            return;
        }
        let backup = self.backup_path();
        match std::fs::copy(&self.path, &backup) {
            Ok(_) => info!(from = %self.path.display(), to = %backup.display(), "hosts file backed up"),
            Err(e) => warn!(path = %backup.display(), error = %e, "hosts backup failed"),
        }
    }
}
