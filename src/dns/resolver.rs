use std::collections::BTreeSet;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use hickory_resolver::error::ResolveErrorKind;
use hickory_resolver::proto::rr::RecordType;
use hickory_resolver::TokioAsyncResolver;
use tracing::{debug, error, info, warn};

use crate::app::resilience::{retry_with_policy, RetryPolicy};
use crate::common::{is_ipv6, parse_ip_port, SetHostsError};

use super::cache::{CacheRecord, ResolverCache};
use super::scrape::extract_addresses;
use super::{AddressScraper, Fallback, HostResolver, NameServer, RecordKind, Resolution};

/// 单次 DNS 查询超时
pub const QUERY_TIMEOUT: Duration = Duration::from_secs(1);

/// 抓取结果写入缓存时的来源标记
pub const SCRAPE_SOURCE: &str = "scrape";

/// 基于 hickory-resolver 的单服务器查询器
pub struct HickoryNameServer {
    address: String,
    resolver: TokioAsyncResolver,
}

impl HickoryNameServer {
    pub fn new(address: &str) -> Result<Self> {
        let (config, opts) = parse_dns_address(address)?;
        let resolver = TokioAsyncResolver::tokio(config, opts);
        debug!(address = address, "name server created");
        Ok(Self {
            address: address.to_string(),
            resolver,
        })
    }
}

#[async_trait]
impl NameServer for HickoryNameServer {
    fn address(&self) -> &str {
        &self.address
    }

    async fn query(&self, domain: &str, kind: RecordKind) -> Result<Vec<IpAddr>> {
        let record_type = match kind {
            RecordKind::A => RecordType::A,
            RecordKind::Aaaa => RecordType::AAAA,
        };
        match self.resolver.lookup(domain, record_type).await {
            Ok(lookup) => Ok(lookup.iter().filter_map(|rdata| rdata.ip_addr()).collect()),
            Err(e) if matches!(e.kind(), ResolveErrorKind::NoRecordsFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(SetHostsError::Dns(format!("{} via {}: {}", domain, self.address, e)).into()),
        }
    }
}

/// 单服务器、明文 UDP、1 秒超时、不读本机 hosts
fn parse_dns_address(address: &str) -> Result<(ResolverConfig, ResolverOpts)> {
    let mut opts = ResolverOpts::default();
    opts.use_hosts_file = false;
    opts.timeout = QUERY_TIMEOUT;
    opts.attempts = 1;

    let (ip, port) = parse_ip_port(address, 53)?;
    let group = NameServerConfigGroup::from_ips_clear(&[ip], port, true);
    let config = ResolverConfig::from_parts(None, vec![], group);
    Ok((config, opts))
}

/// 多来源域名解析器：协议 DNS 优先，再由缓存或网页抓取补充
pub struct DomainResolver {
    servers: Vec<Arc<dyn NameServer>>,
    scraper: Arc<dyn AddressScraper>,
    cache: Arc<ResolverCache>,
    retry: RetryPolicy,
}

impl DomainResolver {
    pub fn new(
        servers: Vec<Arc<dyn NameServer>>,
        scraper: Arc<dyn AddressScraper>,
        cache: Arc<ResolverCache>,
    ) -> Self {
        Self {
            servers,
            scraper,
            cache,
            retry: RetryPolicy::default(),
        }
    }

    /// 从地址字符串列表构建全部 hickory 服务器
    pub fn build_name_servers(addresses: &[String]) -> Result<Vec<Arc<dyn NameServer>>> {
        addresses
            .iter()
            .map(|a| Ok(Arc::new(HickoryNameServer::new(a)?) as Arc<dyn NameServer>))
            .collect()
    }

    pub fn cache(&self) -> &ResolverCache {
        &self.cache
    }

    /// 按优先级依次询问 DNS 服务器，首个完整应答且有结果的服务器即终止
    pub async fn resolve_via_dns(&self, domain: &str) -> BTreeSet<String> {
        let mut ips = BTreeSet::new();

        'servers: for server in &self.servers {
            for kind in [RecordKind::A, RecordKind::Aaaa] {
                match server.query(domain, kind).await {
                    Ok(addrs) => ips.extend(addrs.into_iter().map(|ip| ip.to_string())),
                    Err(e) => {
                        debug!(
                            domain = domain,
                            server = server.address(),
                            record = kind.as_str(),
                            error = %e,
                            "DNS query failed, skipping server"
                        );
                        continue 'servers;
                    }
                }
            }

            if !ips.is_empty() {
                debug!(domain = domain, server = server.address(), count = ips.len(), "DNS resolved");
                return ips;
            }
        }

        ips
    }

    /// 抓取地址查询页面，成功提取到地址则写入缓存并落盘
    pub async fn resolve_via_scrape(&self, domain: &str) -> BTreeSet<String> {
        let source = self.scraper.source_name();
        let page = retry_with_policy(&self.retry, |_| self.scraper.fetch(domain)).await;

        let body = match page {
            Ok(Some(body)) => body,
            Ok(None) => return BTreeSet::new(),
            Err(e) => {
                error!(domain = domain, source = source, error = %e, "scrape fallback failed");
                return BTreeSet::new();
            }
        };

        let (ipv4, ipv6) = extract_addresses(&body);
        if ipv4.is_empty() && ipv6.is_empty() {
            warn!(domain = domain, source = source, "no addresses found by scrape fallback");
            return BTreeSet::new();
        }

        let record = CacheRecord::new(
            ipv4.iter().cloned().collect(),
            ipv6.iter().cloned().collect(),
            SCRAPE_SOURCE,
        );
        self.cache.insert(domain, record).await;
        debug!(
            domain = domain,
            ipv4 = ipv4.len(),
            ipv6 = ipv6.len(),
            "scrape fallback resolved, cache updated"
        );

        ipv4.into_iter().chain(ipv6).collect()
    }
}

#[async_trait]
impl HostResolver for DomainResolver {
    async fn resolve(&self, domain: &str) -> Resolution {
        let mut ips = self.resolve_via_dns(domain).await;
        let dns_hits = ips.len();

        let fallback = match self.cache.get(domain) {
            Some(record) => {
                ips.extend(record.addresses().cloned());
                Fallback::Cache
            }
            None => {
                ips.extend(self.resolve_via_scrape(domain).await);
                Fallback::Scrape
            }
        };

        if ips.is_empty() {
            info!(domain = domain, "domain resolved to no addresses");
        } else {
            let v6 = ips.iter().filter(|ip| is_ipv6(ip)).count();
            debug!(
                domain = domain,
                total = ips.len(),
                ipv6 = v6,
                dns = dns_hits,
                fallback = ?fallback,
                "domain resolved"
            );
        }

        Resolution {
            ips,
            dns_hits,
            fallback,
        }
    }

    fn cache_was_valid(&self) -> bool {
        self.cache.valid_at_start()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct MockServer {
        address: String,
        a: Result<Vec<IpAddr>, String>,
        aaaa: Result<Vec<IpAddr>, String>,
        calls: Arc<AtomicUsize>,
    }

    impl MockServer {
        fn new(
            address: &str,
            a: Result<Vec<&str>, &str>,
            aaaa: Result<Vec<&str>, &str>,
        ) -> (Arc<dyn NameServer>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let parse = |r: Result<Vec<&str>, &str>| {
                r.map(|v| v.iter().map(|s| s.parse().unwrap()).collect())
                    .map_err(|e| e.to_string())
            };
            let server = Arc::new(MockServer {
                address: address.to_string(),
                a: parse(a),
                aaaa: parse(aaaa),
                calls: calls.clone(),
            });
            (server, calls)
        }
    }

    #[async_trait]
    impl NameServer for MockServer {
        fn address(&self) -> &str {
            &self.address
        }

        async fn query(&self, _domain: &str, kind: RecordKind) -> Result<Vec<IpAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let r = match kind {
                RecordKind::A => &self.a,
                RecordKind::Aaaa => &self.aaaa,
            };
            r.clone().map_err(|e| anyhow::anyhow!(e))
        }
    }

    struct MockScraper {
        body: Option<String>,
        failures: usize,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl AddressScraper for MockScraper {
        fn source_name(&self) -> &str {
            "mock"
        }

        async fn fetch(&self, _domain: &str) -> Result<Option<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                anyhow::bail!("connection reset");
            }
            Ok(self.body.clone())
        }
    }

    fn scraper(body: Option<&str>, failures: usize) -> (Arc<dyn AddressScraper>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let s = Arc::new(MockScraper {
            body: body.map(String::from),
            failures,
            calls: calls.clone(),
        });
        (s, calls)
    }

    fn temp_cache() -> (tempfile::TempDir, Arc<ResolverCache>) {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(ResolverCache::open(dir.path().join("dns_records.json")));
        (dir, cache)
    }

    #[tokio::test]
    async fn first_answering_server_short_circuits() {
        let (s1, c1) = MockServer::new("10.0.0.1", Ok(vec!["1.1.1.1"]), Ok(vec![]));
        let (s2, c2) = MockServer::new("10.0.0.2", Ok(vec!["9.9.9.9"]), Ok(vec![]));
        let (scr, _) = scraper(None, 0);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![s1, s2], scr, cache);
        let ips = resolver.resolve_via_dns("a.test").await;

        assert_eq!(ips.into_iter().collect::<Vec<_>>(), vec!["1.1.1.1".to_string()]);
        assert_eq!(c1.load(Ordering::SeqCst), 2);
        assert_eq!(c2.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_server_is_abandoned() {
        let (s1, c1) = MockServer::new("10.0.0.1", Err("timeout"), Ok(vec!["::1"]));
        let (s2, _) = MockServer::new("10.0.0.2", Ok(vec![]), Ok(vec!["2001:db8::1"]));
        let (scr, _) = scraper(None, 0);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![s1, s2], scr, cache);
        let ips = resolver.resolve_via_dns("a.test").await;

        // A 查询失败后不再发 AAAA
        assert_eq!(c1.load(Ordering::SeqCst), 1);
        assert!(ips.contains("2001:db8::1"));
        assert_eq!(ips.len(), 1);
    }

    #[tokio::test]
    async fn empty_servers_fall_through() {
        let (s1, _) = MockServer::new("10.0.0.1", Ok(vec![]), Ok(vec![]));
        let (s2, c2) = MockServer::new("10.0.0.2", Ok(vec![]), Ok(vec![]));
        let (scr, _) = scraper(None, 0);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![s1, s2], scr, cache);
        assert!(resolver.resolve_via_dns("a.test").await.is_empty());
        assert_eq!(c2.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cache_hit_skips_scrape() {
        let (s1, _) = MockServer::new("10.0.0.1", Ok(vec!["1.1.1.1"]), Ok(vec![]));
        let (scr, scrape_calls) = scraper(Some("5.5.5.5"), 0);
        let (_dir, cache) = temp_cache();
        cache.insert(
            "a.test",
            CacheRecord::new(vec!["2.2.2.2".into()], vec!["2001:db8::2".into()], SCRAPE_SOURCE),
        )
        .await;

        let resolver = DomainResolver::new(vec![s1], scr, cache);
        let resolution = resolver.resolve("a.test").await;

        assert_eq!(resolution.fallback, Fallback::Cache);
        assert_eq!(resolution.dns_hits, 1);
        assert_eq!(resolution.ips.len(), 3);
        assert!(resolution.ips.contains("2001:db8::2"));
        assert_eq!(scrape_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn scrape_result_is_cached_and_persisted() {
        let (s1, _) = MockServer::new("10.0.0.1", Err("refused"), Err("refused"));
        let (scr, _) = scraper(Some("<td>3.3.3.3</td> <td>1:2:3:4:5:6:7:8</td>"), 0);
        let (dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![s1], scr, cache.clone());
        let resolution = resolver.resolve("a.test").await;

        assert!(resolution.scrape_attempted());
        assert_eq!(resolution.dns_hits, 0);
        assert_eq!(resolution.ips.len(), 2);

        let record = cache.get("a.test").unwrap();
        assert_eq!(record.source, SCRAPE_SOURCE);
        assert_eq!(record.ipv4, vec!["3.3.3.3".to_string()]);
        assert_eq!(record.ipv6, vec!["1:2:3:4:5:6:7:8".to_string()]);

        let on_disk = ResolverCache::load(&dir.path().join("dns_records.json"));
        assert!(on_disk.contains_key("a.test"));
    }

    #[tokio::test]
    async fn scrape_retries_three_times_then_gives_up() {
        let (scr, calls) = scraper(Some("4.4.4.4"), 10);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![], scr, cache.clone());
        let resolution = resolver.resolve("a.test").await;

        assert!(resolution.is_empty());
        assert!(resolution.scrape_attempted());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(cache.get("a.test").is_none());
    }

    #[tokio::test]
    async fn scrape_recovers_after_transient_failure() {
        let (scr, calls) = scraper(Some("4.4.4.4"), 2);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![], scr, cache);
        let resolution = resolver.resolve("a.test").await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(resolution.ips.contains("4.4.4.4"));
    }

    #[tokio::test]
    async fn non_200_page_is_not_cached() {
        let (scr, calls) = scraper(None, 0);
        let (_dir, cache) = temp_cache();

        let resolver = DomainResolver::new(vec![], scr, cache.clone());
        assert!(resolver.resolve("a.test").await.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn parse_udp_address() {
        let (config, opts) = parse_dns_address("223.5.5.5").unwrap();
        assert!(!config.name_servers().is_empty());
        assert_eq!(config.name_servers()[0].socket_addr.port(), 53);
        assert_eq!(opts.timeout, QUERY_TIMEOUT);
        assert!(!opts.use_hosts_file);
    }

    #[test]
    fn parse_ipv6_address_with_port() {
        let (config, _) = parse_dns_address("[2400:3200::1]:5353").unwrap();
        let ns = &config.name_servers()[0];
        assert!(ns.socket_addr.ip().is_ipv6());
        assert_eq!(ns.socket_addr.port(), 5353);
    }

    #[test]
    fn parse_invalid_address() {
        assert!(parse_dns_address("not-an-ip").is_err());
    }
}
