//! 网页抓取兜底：从公开的地址查询页面提取 IP

use std::collections::BTreeSet;
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::common::SetHostsError;

use super::AddressScraper;

const DEFAULT_BASE_URL: &str = "https://sites.ipaddress.com";
const USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/106.0.0.0 Safari/537.36";

/// HTTP 抓取超时
pub const SCRAPE_TIMEOUT: Duration = Duration::from_secs(5);

fn ipv4_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").expect("valid IPv4 regex"))
}

fn ipv6_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?:[0-9a-fA-F]{1,4}:){7}[0-9a-fA-F]{1,4}").expect("valid IPv6 regex")
    })
}

/// 从页面正文中提取 (IPv4, IPv6) 地址
pub fn extract_addresses(body: &str) -> (BTreeSet<String>, BTreeSet<String>) {
    let ipv4 = ipv4_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();
    let ipv6 = ipv6_regex()
        .find_iter(body)
        .map(|m| m.as_str().to_string())
        .collect();
    (ipv4, ipv6)
}

/// 基于 ipaddress.com 的抓取源
pub struct IpAddressScraper {
    client: reqwest::Client,
    base_url: String,
}

impl IpAddressScraper {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(SCRAPE_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn url_for(&self, domain: &str) -> String {
        format!("{}/{}", self.base_url, domain)
    }
}

#[async_trait]
impl AddressScraper for IpAddressScraper {
    fn source_name(&self) -> &str {
        "ipaddress.com"
    }

    async fn fetch(&self, domain: &str) -> Result<Option<String>> {
        let url = self.url_for(domain);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SetHostsError::Scrape(format!("{}: {}", url, e)))?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            info!(domain = domain, status = status.as_u16(), "scrape request rejected");
            return Ok(None);
        }
        let body = response
            .text()
            .await
            .map_err(|e| SetHostsError::Scrape(format!("{}: {}", url, e)))?;
        debug!(domain = domain, bytes = body.len(), "scrape page fetched");
        Ok(Some(body))
    }
}
