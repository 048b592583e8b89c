//! 按域名组驱动解析、测速，汇总出待写入的 hosts 条目

use std::collections::BTreeSet;
use std::sync::Arc;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::{DomainGroup, GroupPolicy};
use crate::dns::{HostResolver, HostsEntry};

use super::latency_test::LatencyTester;
use super::resilience::ScrapeThrottle;

/// 同时进行中的域名解析上限
pub const MAX_CONCURRENT_RESOLUTIONS: usize = 5;

pub struct HostsUpdater {
    groups: Vec<DomainGroup>,
    resolver: Arc<dyn HostResolver>,
    tester: LatencyTester,
    max_latency: f64,
    semaphore: Arc<Semaphore>,
    throttle: ScrapeThrottle,
}

impl HostsUpdater {
    pub fn new(
        groups: Vec<DomainGroup>,
        resolver: Arc<dyn HostResolver>,
        tester: LatencyTester,
        max_latency: f64,
    ) -> Self {
        Self {
            groups,
            resolver,
            tester,
            max_latency,
            semaphore: Arc::new(Semaphore::new(MAX_CONCURRENT_RESOLUTIONS)),
            throttle: ScrapeThrottle::default(),
        }
    }

    pub fn with_throttle(mut self, throttle: ScrapeThrottle) -> Self {
        self.throttle = throttle;
        self
    }

    /// 处理全部域名组。缓存有效时各组并发，否则逐组顺序执行，避免集中抓取
    pub async fn collect_entries(&self) -> Vec<HostsEntry> {
        let concurrent = self.resolver.cache_was_valid();
        info!(
            groups = self.groups.len(),
            concurrent = concurrent,
            "processing domain groups"
        );

        if concurrent {
            join_all(self.groups.iter().map(|g| self.process_group(g)))
                .await
                .into_iter()
                .flatten()
                .collect()
        } else {
            let mut entries = Vec::new();
            for group in &self.groups {
                entries.extend(self.process_group(group).await);
            }
            entries
        }
    }

    pub async fn process_group(&self, group: &DomainGroup) -> Vec<HostsEntry> {
        info!(
            group = %group.name,
            policy = group.policy.as_str(),
            domains = group.domains.len(),
            "processing group"
        );
        match group.policy {
            GroupPolicy::Separate => self.process_separate(group).await,
            GroupPolicy::Shared => self.process_shared(group).await,
        }
    }

    async fn process_separate(&self, group: &DomainGroup) -> Vec<HostsEntry> {
        let mut entries = Vec::new();

        for domain in &group.domains {
            let pool = self.resolve_domain(domain).await;
            if pool.is_empty() {
                warn!(group = %group.name, domain = %domain, "no addresses found, skipping domain");
                continue;
            }

            let fastest = self
                .tester
                .rank_candidates(&group.name, &pool, self.max_latency)
                .await;
            if fastest.is_empty() {
                warn!(group = %group.name, domain = %domain, "no address met the latency ceiling");
                continue;
            }
            entries.extend(fastest.into_iter().map(|r| HostsEntry::new(r.ip, domain.clone())));
        }

        entries
    }

    async fn process_shared(&self, group: &DomainGroup) -> Vec<HostsEntry> {
        let resolved = join_all(group.domains.iter().map(|d| self.resolve_domain(d))).await;

        let mut pool = group.static_ips.clone();
        for ips in resolved {
            pool.extend(ips);
        }
        if pool.is_empty() {
            warn!(group = %group.name, "no addresses found, skipping group");
            return Vec::new();
        }
        info!(group = %group.name, candidates = pool.len(), "group candidate pool built");

        let fastest = self
            .tester
            .rank_candidates(&group.name, &pool, self.max_latency)
            .await;
        if fastest.is_empty() {
            warn!(group = %group.name, "no address met the latency ceiling, skipping group");
            return Vec::new();
        }

        let mut entries = Vec::with_capacity(group.domains.len() * fastest.len());
        for domain in &group.domains {
            entries.extend(fastest.iter().map(|r| HostsEntry::new(r.ip.clone(), domain.clone())));
            debug!(group = %group.name, domain = %domain, "domain processed");
        }
        entries
    }

    /// 在并发上限内解析一个域名；触发了网页抓取则计入限速
    async fn resolve_domain(&self, domain: &str) -> BTreeSet<String> {
        let resolution = {
            let _permit = match self.semaphore.acquire().await {
                Ok(p) => p,
                Err(_) => return BTreeSet::new(),
            };
            self.resolver.resolve(domain).await
        };

        if resolution.scrape_attempted() {
            self.throttle.record().await;
        }
        resolution.ips
    }
}
