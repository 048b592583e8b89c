//! End-to-end runs against a temporary hosts file and a loopback listener.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpListener;

use sethosts::app::latency_test::{LatencyTester, TcpProber};
use sethosts::app::updater::HostsUpdater;
use sethosts::app::{App, RunOutcome};
use sethosts::common::{ErrorKind, SetHostsError};
use sethosts::config::{DomainGroup, GroupPolicy};
use sethosts::dns::hosts::BLOCK_START;
use sethosts::dns::{Fallback, HostResolver, HostsMerger, Resolution};

struct StaticResolver(HashMap<String, Vec<String>>);

impl StaticResolver {
    fn new(pairs: &[(&str, &[&str])]) -> Arc<Self> {
        Arc::new(Self(
            pairs
                .iter()
                .map(|(d, ips)| (d.to_string(), ips.iter().map(|s| s.to_string()).collect()))
                .collect(),
        ))
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, domain: &str) -> Resolution {
        Resolution {
            ips: self.0.get(domain).cloned().unwrap_or_default().into_iter().collect(),
            dns_hits: 0,
            fallback: Fallback::Cache,
        }
    }

    fn cache_was_valid(&self) -> bool {
        true
    }
}

async fn loopback_listener() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        loop {
            if let Ok((stream, _)) = listener.accept().await {
                drop(stream);
            }
        }
    });
    port
}

fn build_app(resolver: Arc<StaticResolver>, port: u16, groups: Vec<DomainGroup>, hosts: &std::path::Path) -> App {
    let prober = Arc::new(TcpProber::new(port, Duration::from_millis(500), 2));
    let tester = LatencyTester::new(resolver.clone(), prober, 1);
    let updater = HostsUpdater::new(groups, resolver, tester, 300.0);
    App::from_parts(updater, HostsMerger::new(hosts))
}

#[tokio::test]
async fn run_pins_reachable_address_and_backs_up() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = dir.path().join("hosts");
    let original = "127.0.0.1\tlocalhost\n10.0.0.1 app.test\n";
    std::fs::write(&hosts, original).unwrap();

    let port = loopback_listener().await;
    let resolver = StaticResolver::new(&[("app.test", &["127.0.0.1"]), ("cdn.test", &[])]);
    let group = DomainGroup::new("App", GroupPolicy::Shared, &["app.test", "cdn.test"]);
    let app = build_app(resolver, port, vec![group], &hosts);

    let outcome = app.run().await.unwrap();
    assert_eq!(
        outcome,
        RunOutcome::Written {
            entries: 2,
            path: hosts.clone()
        }
    );

    let content = std::fs::read_to_string(&hosts).unwrap();
    assert!(content.starts_with("127.0.0.1\tlocalhost\n\n# cnNetTool Start\n"));
    assert!(content.contains("127.0.0.1\t\tapp.test\n"));
    assert!(content.contains("127.0.0.1\t\tcdn.test\n"));
    assert!(!content.contains("10.0.0.1"));
    assert!(content.ends_with("# cnNetTool End\n"));

    let backup = std::fs::read_to_string(dir.path().join("hosts.bak")).unwrap();
    assert_eq!(backup, original);
}

#[tokio::test]
async fn second_run_keeps_a_single_block() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = dir.path().join("hosts");
    std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();

    let port = loopback_listener().await;
    let resolver = StaticResolver::new(&[("app.test", &["127.0.0.1"])]);
    let group = DomainGroup::new("App", GroupPolicy::Separate, &["app.test"]);
    let app = build_app(resolver, port, vec![group], &hosts);

    app.run().await.unwrap();
    app.run().await.unwrap();

    let content = std::fs::read_to_string(&hosts).unwrap();
    assert_eq!(content.matches(BLOCK_START).count(), 1);
    assert_eq!(content.matches("app.test").count(), 1);
}

#[tokio::test]
async fn nothing_to_write_leaves_hosts_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = dir.path().join("hosts");
    std::fs::write(&hosts, "127.0.0.1 localhost\n").unwrap();

    let port = loopback_listener().await;
    let resolver = StaticResolver::new(&[]);
    let group = DomainGroup::new("Empty", GroupPolicy::Shared, &["none.test"]);
    let app = build_app(resolver, port, vec![group], &hosts);

    assert_eq!(app.run().await.unwrap(), RunOutcome::NothingToWrite);
    assert_eq!(std::fs::read_to_string(&hosts).unwrap(), "127.0.0.1 localhost\n");
    assert!(!dir.path().join("hosts.bak").exists());
}

#[tokio::test]
async fn missing_hosts_file_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let hosts = dir.path().join("missing").join("hosts");

    let port = loopback_listener().await;
    let resolver = StaticResolver::new(&[("app.test", &["127.0.0.1"])]);
    let group = DomainGroup::new("App", GroupPolicy::Shared, &["app.test"]);
    let app = build_app(resolver, port, vec![group], &hosts);

    let err = app.run().await.unwrap_err();
    let kind = SetHostsError::classify(&err);
    assert_eq!(kind, ErrorKind::HostsRead);
    assert!(kind.is_fatal());
}
