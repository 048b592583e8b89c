use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::Result;
use serde::Deserialize;

use crate::common::parse_ip_port;

use super::defaults;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub log: LogConfig,
    #[serde(default = "defaults::dns_servers")]
    pub dns_servers: Vec<String>,
    #[serde(default = "defaults::domain_groups")]
    pub groups: Vec<DomainGroup>,
    /// 允许的最大平均延迟（毫秒）
    #[serde(default = "default_max_latency")]
    pub max_latency: u64,
    /// 单一地址族时每组保留的主机数
    #[serde(default = "default_hosts_num")]
    pub hosts_num: usize,
    #[serde(default = "defaults::hosts_file_path")]
    pub hosts_file: PathBuf,
    #[serde(default = "defaults::cache_file_path")]
    pub cache_file: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log: LogConfig::default(),
            dns_servers: defaults::dns_servers(),
            groups: defaults::domain_groups(),
            max_latency: default_max_latency(),
            hosts_num: default_hosts_num(),
            hosts_file: defaults::hosts_file_path(),
            cache_file: defaults::cache_file_path(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.groups.is_empty() {
            anyhow::bail!("at least one domain group is required");
        }
        if self.max_latency == 0 {
            anyhow::bail!("max_latency must be greater than 0");
        }
        if self.hosts_num == 0 {
            anyhow::bail!("hosts_num must be greater than 0");
        }
        for server in &self.dns_servers {
            parse_ip_port(server, 53)?;
        }
        for group in &self.groups {
            group.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_latency() -> u64 {
    300
}

fn default_hosts_num() -> usize {
    1
}

/// 域名组的 IP 选取策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupPolicy {
    /// 组内所有域名共用一个候选池和同一组最优 IP
    #[default]
    Shared,
    /// 每个域名独立解析、独立测速
    Separate,
}

impl GroupPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            GroupPolicy::Shared => "shared",
            GroupPolicy::Separate => "separate",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DomainGroup {
    pub name: String,
    pub domains: Vec<String>,
    /// 额外提供的静态 IP
    #[serde(default, rename = "ips")]
    pub static_ips: BTreeSet<String>,
    #[serde(default)]
    pub policy: GroupPolicy,
}

impl DomainGroup {
    pub fn new(name: &str, policy: GroupPolicy, domains: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            domains: domains.iter().map(|d| d.to_string()).collect(),
            static_ips: BTreeSet::new(),
            policy,
        }
    }

    pub fn with_static_ips(mut self, ips: &[&str]) -> Self {
        self.static_ips = ips.iter().map(|ip| ip.to_string()).collect();
        self
    }

    fn validate(&self) -> Result<()> {
        if self.domains.is_empty() {
            anyhow::bail!("domain group '{}' has no domains", self.name);
        }
        for ip in &self.static_ips {
            if ip.parse::<IpAddr>().is_err() {
                anyhow::bail!("domain group '{}' has invalid static IP '{}'", self.name, ip);
            }
        }
        Ok(())
    }
}
