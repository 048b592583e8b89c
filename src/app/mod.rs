pub mod platform;
pub mod resilience;
pub mod updater;

use anyhow::Result;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use crate::config::Config;
use crate::dns::{DomainResolver, HostResolver, HostsMerger, IpAddressScraper, ResolverCache};

use latency_test::{LatencyTester, TcpProber};
use updater::HostsUpdater;

/// 一次运行的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Written { entries: usize, path: PathBuf },
    /// 没有任何可写条目，hosts 保持原样
    NothingToWrite,
}

pub struct App {
    updater: HostsUpdater,
    merger: HostsMerger,
}

impl App {
    pub fn new(config: Config) -> Result<Self> {
        ResolverCache::ensure_dir(&config.cache_file)?;
        let cache = Arc::new(ResolverCache::open(&config.cache_file));

        let servers = DomainResolver::build_name_servers(&config.dns_servers)?;
        let scraper = Arc::new(IpAddressScraper::new()?);
        let resolver: Arc<dyn HostResolver> = Arc::new(DomainResolver::new(servers, scraper, cache));

        let tester = LatencyTester::new(resolver.clone(), Arc::new(TcpProber::default()), config.hosts_num);
        let updater = HostsUpdater::new(config.groups, resolver, tester, config.max_latency as f64);

        Ok(Self::from_parts(updater, HostsMerger::new(config.hosts_file)))
    }

    pub fn from_parts(updater: HostsUpdater, merger: HostsMerger) -> Self {
        Self { updater, merger }
    }

    pub async fn run(&self) -> Result<RunOutcome> {
        let started = Instant::now();
        info!(hosts = %self.merger.path().display(), "hosts update started");

        let entries = self.updater.collect_entries().await;
        let outcome = if entries.is_empty() {
            warn!("no hosts entries to write, leaving the hosts file untouched");
            RunOutcome::NothingToWrite
        } else {
            self.merger.apply(&entries)?;
            RunOutcome::Written {
                entries: entries.len(),
                path: self.merger.path().to_path_buf(),
            }
        };

        info!(elapsed_secs = %format!("{:.2}", started.elapsed().as_secs_f64()), "hosts update finished");
        Ok(outcome)
    }
}
