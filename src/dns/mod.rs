pub mod cache;
pub mod hosts;
pub mod resolver;
pub mod scrape;

use std::collections::BTreeSet;
use std::net::IpAddr;

use anyhow::Result;
use async_trait::async_trait;

pub use cache::{CacheRecord, ResolverCache};
pub use hosts::{HostsEntry, HostsMerger};
pub use resolver::{DomainResolver, HickoryNameServer};
pub use scrape::IpAddressScraper;

/// 单次查询的记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    A,
    Aaaa,
}

impl RecordKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
        }
    }
}

/// 单个 DNS 服务器
#[async_trait]
pub trait NameServer: Send + Sync {
    fn address(&self) -> &str;

    /// 查询一种记录类型。"无此类型记录" 返回 `Ok(vec![])`，其余失败返回 `Err`
    async fn query(&self, domain: &str, kind: RecordKind) -> Result<Vec<IpAddr>>;
}

/// 地址查询网页抓取源
#[async_trait]
pub trait AddressScraper: Send + Sync {
    fn source_name(&self) -> &str;

    /// 拉取页面正文。非 200 响应返回 `Ok(None)`，网络异常返回 `Err`（可重试）
    async fn fetch(&self, domain: &str) -> Result<Option<String>>;
}

/// 协议 DNS 之后走的是哪条兜底路径
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    /// 缓存中已有记录，不再抓取
    Cache,
    /// 向外部网页发起了抓取（无论是否拿到地址）
    Scrape,
}

/// 一次域名解析的结果及来源
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub ips: BTreeSet<String>,
    /// 协议 DNS 得到的地址数
    pub dns_hits: usize,
    pub fallback: Fallback,
}

impl Resolution {
    pub fn is_empty(&self) -> bool {
        self.ips.is_empty()
    }

    pub fn scrape_attempted(&self) -> bool {
        self.fallback == Fallback::Scrape
    }
}

/// 域名 → 候选 IP 集合
#[async_trait]
pub trait HostResolver: Send + Sync {
    async fn resolve(&self, domain: &str) -> Resolution;

    /// 本次运行开始时磁盘缓存是否有效
    fn cache_was_valid(&self) -> bool;
}
